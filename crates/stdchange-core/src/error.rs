use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid push payload: {0}")]
    InvalidPayload(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unknown time zone: {0}")]
    UnknownTimeZone(String),
}
