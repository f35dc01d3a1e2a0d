use std::process::ExitCode;

use stdchange_core::Environment;

use crate::ActionError;

/// The change request this run ends up pointing at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    pub number: Option<String>,
    pub sys_id: String,
    /// UTC `YYYY-MM-DD HH:MM:SS`, when the backend supplied a usable value.
    pub work_start: Option<String>,
    pub link: String,
    pub environment: Environment,
    /// False when an earlier attempt of the same workflow run filed it.
    pub created: bool,
}

/// How a run ended. Every failure path produces `Fatal` rather than exiting
/// in place, so outputs and annotations are handled in one spot.
#[derive(Debug)]
pub enum Outcome {
    Success(ChangeReport),
    /// A change exists but something about it deserves a warning.
    Degraded {
        report: ChangeReport,
        warnings: Vec<String>,
    },
    Fatal(ActionError),
}

impl Outcome {
    pub fn report(&self) -> Option<&ChangeReport> {
        match self {
            Outcome::Success(report) | Outcome::Degraded { report, .. } => Some(report),
            Outcome::Fatal(_) => None,
        }
    }

    pub fn exit_status(&self) -> u8 {
        match self {
            Outcome::Success(_) | Outcome::Degraded { .. } => 0,
            Outcome::Fatal(_) => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    /// `Success` when there is nothing to warn about.
    pub fn with_warnings(report: ChangeReport, warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            Outcome::Success(report)
        } else {
            Outcome::Degraded { report, warnings }
        }
    }
}

impl From<ActionError> for Outcome {
    fn from(err: ActionError) -> Self {
        Outcome::Fatal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ChangeReport {
        ChangeReport {
            number: Some("CHG0030001".into()),
            sys_id: "abc".into(),
            work_start: Some("2024-07-01 16:00:00".into()),
            link: "https://it.example.edu/change_request.do?sysparm_query=number=CHG0030001"
                .into(),
            environment: Environment::Sandbox,
            created: true,
        }
    }

    #[test]
    fn exit_status_by_variant() {
        assert_eq!(Outcome::Success(report()).exit_status(), 0);
        assert_eq!(
            Outcome::with_warnings(report(), vec!["w".into()]).exit_status(),
            0
        );
        assert_eq!(
            Outcome::Fatal(ActionError::Config("x".into())).exit_status(),
            1
        );
    }

    #[test]
    fn no_warnings_is_success() {
        assert!(matches!(
            Outcome::with_warnings(report(), Vec::new()),
            Outcome::Success(_)
        ));
    }

    #[test]
    fn fatal_has_no_report() {
        let outcome: Outcome = ActionError::UnsupportedTrigger("pull_request".into()).into();
        assert!(outcome.report().is_none());
    }
}
