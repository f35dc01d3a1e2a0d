pub mod change_request;
pub mod commit;
pub mod environment;
pub mod error;
pub mod push_event;
pub mod redact;
pub mod work_start;

pub use change_request::{ChangeRequestDraft, ChangeRequestResult, ExistingChange};
pub use environment::Environment;
pub use error::CoreError;
pub use push_event::{PushEvent, RunContext};
pub use redact::redact_secrets;
