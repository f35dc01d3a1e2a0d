use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::error::ErrorKind;
use clap::Parser;
use stdchange_action::outputs::announce;
use stdchange_action::{execute, ActionConfig, ActionError, Outcome};
use tracing::info;

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("{e:#}");
    }

    let config = match ActionConfig::try_parse() {
        Ok(config) => config,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let outcome = Outcome::Fatal(ActionError::Config(e.to_string()));
            announce(&outcome);
            return outcome.exit_code();
        }
    };

    let outcome = match config.into_settings() {
        Ok(settings) => {
            info!("stdchange-action starting for {}", settings.run.run_link());
            execute(&settings).await
        }
        Err(e) => Outcome::Fatal(e),
    };
    announce(&outcome);
    outcome.exit_code()
}
