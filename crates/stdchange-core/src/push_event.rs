use serde::{Deserialize, Serialize};

use crate::CoreError;

/// The subset of a GitHub `push` webhook payload that a change request needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    pub pusher: Pusher,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    pub repository: Repository,
    pub compare: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pusher {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

impl PushEvent {
    pub fn from_json(payload: &str) -> Result<Self, CoreError> {
        serde_json::from_str(payload).map_err(|e| CoreError::InvalidPayload(e.to_string()))
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn commit_messages(&self) -> impl Iterator<Item = &str> {
        self.commits.iter().map(|c| c.message.as_str())
    }

    /// Subject line of every commit, in push order.
    pub fn first_lines(&self) -> Vec<&str> {
        self.commit_messages()
            .map(|m| m.split('\n').next().unwrap_or(""))
            .collect()
    }
}

/// Identifies the workflow run that is filing the change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub server_url: String,
    pub repository: String,
    pub run_id: String,
}

impl RunContext {
    /// URL of the workflow run. Embedded in every description so re-runs can
    /// find the request an earlier attempt already filed.
    pub fn run_link(&self) -> String {
        format!(
            "{}/{}/actions/runs/{}",
            self.server_url.trim_end_matches('/'),
            self.repository,
            self.run_id
        )
    }
}
