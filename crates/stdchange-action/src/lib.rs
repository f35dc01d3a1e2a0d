pub mod config;
pub mod error;
pub mod identity;
pub mod mock;
pub mod outcome;
pub mod outputs;
pub mod pipeline;

pub use config::{ActionConfig, Settings};
pub use error::ActionError;
pub use outcome::{ChangeReport, Outcome};

/// Run the whole action: file (or find) the change request, then publish the
/// step outputs.
pub async fn execute(settings: &Settings) -> Outcome {
    let outcome = pipeline::run(settings).await;
    outputs::publish(outcome, settings.output_file.as_deref())
}
