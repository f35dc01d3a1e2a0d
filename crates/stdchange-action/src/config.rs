use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;
use stdchange_core::work_start::{parse_time_zone, DEFAULT_BACKEND_TIME_ZONE};
use stdchange_core::RunContext;
use stdchange_service::{Credentials, GatewayConfig, GatewayEndpoint};

use crate::ActionError;

/// Raw options. GitHub Actions passes step inputs as `INPUT_<NAME>`
/// environment variables and the run context as `GITHUB_*` variables, so
/// every option can come from either the command line or the environment.
#[derive(Debug, Parser)]
#[command(
    name = "stdchange-action",
    about = "File a standard change request for a GitHub push"
)]
pub struct ActionConfig {
    /// API gateway OAuth client key
    #[arg(long, env = "INPUT_CLIENT-KEY", hide_env_values = true)]
    pub client_key: Option<String>,

    /// API gateway OAuth client secret
    #[arg(long, env = "INPUT_CLIENT-SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Standard change template to file against
    #[arg(long, env = "INPUT_TEMPLATE-ID")]
    pub template_id: Option<String>,

    /// Minutes from planned start to planned end
    #[arg(long, env = "INPUT_MINUTES-UNTIL-PLANNED-END", default_value = "60")]
    pub minutes_until_planned_end: String,

    /// Net ID to assign when dependabot[bot] is the pusher
    #[arg(long, env = "INPUT_DEPENDABOT-FALLBACK")]
    pub dependabot_fallback: Option<String>,

    #[arg(
        long,
        env = "STDCHANGE_SANDBOX_GATEWAY_URL",
        default_value = "https://api-sandbox.byu.edu"
    )]
    pub sandbox_gateway_url: String,

    #[arg(
        long,
        env = "STDCHANGE_PRODUCTION_GATEWAY_URL",
        default_value = "https://api.byu.edu"
    )]
    pub production_gateway_url: String,

    #[arg(
        long,
        env = "STDCHANGE_SANDBOX_ITSM_URL",
        default_value = "https://support-test.byu.edu"
    )]
    pub sandbox_itsm_url: String,

    #[arg(
        long,
        env = "STDCHANGE_PRODUCTION_ITSM_URL",
        default_value = "https://it.byu.edu"
    )]
    pub production_itsm_url: String,

    /// IANA zone the backend reports work-start times in
    #[arg(long, env = "STDCHANGE_BACKEND_TIME_ZONE", default_value = DEFAULT_BACKEND_TIME_ZONE)]
    pub backend_time_zone: String,

    #[arg(long, env = "GITHUB_EVENT_NAME")]
    pub event_name: Option<String>,

    /// Path of the JSON webhook payload that triggered the workflow
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event_path: Option<PathBuf>,

    #[arg(long, env = "GITHUB_SERVER_URL", default_value = "https://github.com")]
    pub server_url: String,

    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    #[arg(long, env = "GITHUB_RUN_ID")]
    pub run_id: Option<String>,

    /// File that step outputs are appended to
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub output_file: Option<PathBuf>,
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Credentials,
    pub template_id: String,
    pub minutes_until_planned_end: u32,
    pub dependabot_fallback: Option<String>,
    pub gateway: GatewayConfig,
    pub backend_time_zone: Tz,
    pub event_name: String,
    pub event_path: PathBuf,
    pub run: RunContext,
    pub output_file: Option<PathBuf>,
}

impl ActionConfig {
    /// Check required options and parse typed values. Unset and empty are
    /// treated the same, since GitHub passes unset inputs as empty strings.
    pub fn into_settings(self) -> Result<Settings, ActionError> {
        let mut missing = Vec::new();
        let mut require = |name: &'static str, value: Option<String>| -> String {
            match present(value) {
                Some(v) => v,
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };
        let client_key = require("client-key", self.client_key);
        let client_secret = require("client-secret", self.client_secret);
        let template_id = require("template-id", self.template_id);
        let event_name = require("GITHUB_EVENT_NAME", self.event_name);
        let event_path = require(
            "GITHUB_EVENT_PATH",
            self.event_path.map(|p| p.to_string_lossy().into_owned()),
        );
        let repository = require("GITHUB_REPOSITORY", self.repository);
        let run_id = require("GITHUB_RUN_ID", self.run_id);
        if !missing.is_empty() {
            return Err(ActionError::Config(format!(
                "missing required input(s): {}",
                missing.join(", ")
            )));
        }

        let minutes_until_planned_end = self
            .minutes_until_planned_end
            .trim()
            .parse::<u32>()
            .map_err(|_| {
                ActionError::Config(format!(
                    "minutes-until-planned-end must be a non-negative integer, got {:?}",
                    self.minutes_until_planned_end
                ))
            })?;
        let backend_time_zone = parse_time_zone(self.backend_time_zone.trim())
            .map_err(|e| ActionError::Config(e.to_string()))?;

        Ok(Settings {
            credentials: Credentials {
                client_key,
                client_secret,
            },
            template_id,
            minutes_until_planned_end,
            dependabot_fallback: present(self.dependabot_fallback),
            gateway: GatewayConfig {
                sandbox: GatewayEndpoint::new(&self.sandbox_gateway_url, &self.sandbox_itsm_url),
                production: GatewayEndpoint::new(
                    &self.production_gateway_url,
                    &self.production_itsm_url,
                ),
            },
            backend_time_zone,
            event_name,
            event_path: PathBuf::from(event_path),
            run: RunContext {
                server_url: self.server_url,
                repository,
                run_id,
            },
            output_file: self.output_file.filter(|p| !p.as_os_str().is_empty()),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
