use std::future::Future;

use stdchange_core::redact_secrets;
use tracing::warn;

use crate::ServiceError;

/// Issue `call`, and if it fails, issue the identical call exactly once more.
///
/// There is no backoff. The second failure is returned as-is. Malformed
/// success responses are returned without a second attempt.
pub async fn retry_once<T, F, Fut>(what: &str, mut call: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    match call().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_retryable() => {
            warn!(
                call = what,
                error = %redact_secrets(&e.to_string()),
                "call failed, retrying once"
            );
            call().await
        }
        Err(e) => Err(e),
    }
}
