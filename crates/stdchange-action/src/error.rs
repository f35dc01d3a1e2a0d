use stdchange_core::redact_secrets;
use stdchange_service::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported trigger '{0}': this action only runs on push events")]
    UnsupportedTrigger(String),

    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("could not find a Net ID for GitHub user '{username}'. {remediation}")]
    Identity {
        username: String,
        remediation: String,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("could not write step outputs: {0}")]
    Output(String),
}

impl ActionError {
    /// The message shown to the user, with anything token-shaped removed.
    pub fn redacted(&self) -> String {
        redact_secrets(&self.to_string())
    }
}
