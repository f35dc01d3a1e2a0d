mod http;
mod retry;
mod session;
mod traits;

pub use http::HttpService;
pub use retry::retry_once;
pub use session::{resolve_session, Credentials, GatewayConfig, GatewayEndpoint, Session};
pub use traits::{ChangeService, ServiceError};
