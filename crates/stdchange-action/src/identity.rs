use stdchange_service::{ChangeService, ServiceError};
use tracing::{info, warn};

use crate::ActionError;

/// Login GitHub reports for pushes made by Dependabot.
pub const DEPENDABOT_LOGIN: &str = "dependabot[bot]";

const REMEDIATION: &str = "Add your GitHub username to your profile in the ITSM system \
     (field \"GitHub username\"), then re-run this workflow.";

/// Map the pusher to the Net ID the change request is assigned to.
///
/// Dependabot has no Net ID of its own, so when it is the pusher and a
/// fallback is configured, the fallback stands in for it. That covers both a
/// missing record and a failed lookup.
pub fn resolve_net_id(
    lookup: Result<Option<String>, ServiceError>,
    username: &str,
    dependabot_fallback: Option<&str>,
) -> Result<String, ActionError> {
    let fallback = dependabot_fallback.filter(|_| username == DEPENDABOT_LOGIN);
    match (lookup, fallback) {
        (Ok(Some(net_id)), _) => {
            info!("assigning change to {net_id} (GitHub user {username})");
            Ok(net_id)
        }
        (Ok(None), Some(fallback)) => {
            warn!("{username} has no Net ID, assigning to fallback {fallback}");
            Ok(fallback.to_string())
        }
        (Err(e), Some(fallback)) => {
            warn!(
                "Net ID lookup for {username} failed ({}), assigning to fallback {fallback}",
                stdchange_core::redact_secrets(&e.to_string())
            );
            Ok(fallback.to_string())
        }
        (Ok(None), None) => Err(ActionError::Identity {
            username: username.to_string(),
            remediation: REMEDIATION.to_string(),
        }),
        (Err(e), None) => Err(e.into()),
    }
}

/// Look the pusher up and apply [`resolve_net_id`].
pub async fn lookup_assignee(
    service: &dyn ChangeService,
    username: &str,
    dependabot_fallback: Option<&str>,
) -> Result<String, ActionError> {
    let lookup = service.lookup_net_id(username).await;
    resolve_net_id(lookup, username, dependabot_fallback)
}
