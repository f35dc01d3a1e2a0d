use async_trait::async_trait;
use stdchange_core::{ChangeRequestDraft, ChangeRequestResult, Environment, ExistingChange};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend answered with success but the body is not usable.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ServiceError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ServiceError::AuthFailed(_))
    }

    /// A malformed success is not retried: the backend may already have
    /// acted on the request.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ServiceError::MalformedResponse(_))
    }
}

/// Operations the action performs against the ITSM backend once a session
/// exists.
///
/// `HttpService` talks to the real API gateway. The action's tests program
/// against `MockChangeService`.
#[async_trait]
pub trait ChangeService: Send + Sync {
    fn environment(&self) -> Environment;

    /// Base URL of the ITSM web UI for this environment.
    fn itsm_url(&self) -> &str;

    /// Map a GitHub username to the organization's Net ID, if one is on file.
    async fn lookup_net_id(&self, github_username: &str) -> Result<Option<String>, ServiceError>;

    /// Find a change request whose description mentions `run_link`.
    async fn find_change_for_run(
        &self,
        run_link: &str,
    ) -> Result<Option<ExistingChange>, ServiceError>;

    async fn create_change(
        &self,
        draft: &ChangeRequestDraft,
    ) -> Result<ChangeRequestResult, ServiceError>;
}
