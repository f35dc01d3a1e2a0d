use std::fmt;

use serde::{Deserialize, Serialize};

/// The two isolated backend deployments a credential pair can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Production => "production",
        }
    }

    /// Where to go when credentials are rejected here. Only sandbox falls back.
    pub fn fallback(&self) -> Option<Environment> {
        match self {
            Environment::Sandbox => Some(Environment::Production),
            Environment::Production => None,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_lowercase_name() {
        assert_eq!(Environment::Sandbox.to_string(), "sandbox");
        assert_eq!(Environment::Production.to_string(), "production");
    }

    #[test]
    fn only_sandbox_falls_back() {
        assert_eq!(Environment::Sandbox.fallback(), Some(Environment::Production));
        assert_eq!(Environment::Production.fallback(), None);
    }
}
