use std::fmt;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use stdchange_core::Environment;
use tracing::{debug, info, warn};

use crate::http::{error_from_response, send};
use crate::{retry_once, ServiceError};

/// Where one environment lives: the API gateway and the ITSM web UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub gateway_url: String,
    pub itsm_url: String,
}

impl GatewayEndpoint {
    pub fn new(gateway_url: &str, itsm_url: &str) -> Self {
        Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            itsm_url: itsm_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub sandbox: GatewayEndpoint,
    pub production: GatewayEndpoint,
}

impl GatewayConfig {
    pub fn endpoint(&self, environment: Environment) -> &GatewayEndpoint {
        match environment {
            Environment::Sandbox => &self.sandbox,
            Environment::Production => &self.production,
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub client_key: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_key", &self.client_key)
            .field("client_secret", &"***")
            .finish()
    }
}

/// An authenticated connection to one environment. Passed explicitly to
/// every call made after authentication.
#[derive(Clone)]
pub struct Session {
    pub environment: Environment,
    pub endpoint: GatewayEndpoint,
    access_token: String,
}

impl Session {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("environment", &self.environment)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Work out which environment the credentials belong to.
///
/// Sandbox is tried first. If it rejects the credentials, production is tried
/// once. Any other failure, or a rejection by production, is returned.
pub async fn resolve_session(
    client: &Client,
    config: &GatewayConfig,
    credentials: &Credentials,
) -> Result<Session, ServiceError> {
    let mut environment = Environment::Sandbox;
    loop {
        let endpoint = config.endpoint(environment);
        match authenticate(client, endpoint, credentials).await {
            Ok(access_token) => {
                info!(environment = %environment, "authenticated with API gateway");
                return Ok(Session {
                    environment,
                    endpoint: endpoint.clone(),
                    access_token,
                });
            }
            Err(e) if e.is_auth_failure() => match environment.fallback() {
                Some(next) => {
                    warn!(
                        rejected_by = %environment,
                        trying = %next,
                        "credentials rejected, trying the other environment"
                    );
                    environment = next;
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        }
    }
}

async fn authenticate(
    client: &Client,
    endpoint: &GatewayEndpoint,
    credentials: &Credentials,
) -> Result<String, ServiceError> {
    let token = retry_once("token", || request_token(client, endpoint, credentials)).await?;
    retry_once("echo probe", || echo_probe(client, endpoint, &token)).await?;
    Ok(token)
}

async fn request_token(
    client: &Client,
    endpoint: &GatewayEndpoint,
    credentials: &Credentials,
) -> Result<String, ServiceError> {
    let builder = client
        .post(format!("{}/token", endpoint.gateway_url))
        .basic_auth(&credentials.client_key, Some(&credentials.client_secret))
        .form(&[("grant_type", "client_credentials")]);
    let resp = send(builder).await?;
    let status = resp.status();
    if status == StatusCode::BAD_REQUEST {
        // OAuth servers answer a bad client with 400 invalid_client.
        let err = error_from_response(resp).await;
        return Err(ServiceError::AuthFailed(err.to_string()));
    }
    if !status.is_success() {
        return Err(error_from_response(resp).await);
    }
    let token = resp
        .json::<TokenResponse>()
        .await
        .map_err(|e| ServiceError::MalformedResponse(format!("token response: {e}")))?;
    debug!(expires_in = ?token.expires_in, "received access token");
    Ok(token.access_token)
}

async fn echo_probe(
    client: &Client,
    endpoint: &GatewayEndpoint,
    token: &str,
) -> Result<(), ServiceError> {
    let builder = client
        .get(format!("{}/echo/v1/echo/test", endpoint.gateway_url))
        .bearer_auth(token);
    let resp = send(builder).await?;
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(resp).await)
    }
}
