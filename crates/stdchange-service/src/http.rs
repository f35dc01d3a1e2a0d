use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use stdchange_core::change_request::mentions_run;
use stdchange_core::{ChangeRequestDraft, ChangeRequestResult, Environment, ExistingChange};
use tracing::{debug, info};

use crate::session::{resolve_session, Credentials, GatewayConfig, Session};
use crate::{retry_once, ChangeService, ServiceError};

const TABLE_API: &str = "/domains/servicenow/tableapi/v1/table";
const STANDARD_CHANGE_API: &str = "/domains/servicenow/standardchange/v1/change_request";

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ResultEnvelope<T> {
    #[serde(default)]
    result: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    #[serde(default)]
    user_name: String,
}

#[derive(Debug, Deserialize)]
struct ChangeRow {
    #[serde(default)]
    number: String,
    #[serde(default)]
    sys_id: String,
    #[serde(default)]
    work_start: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRow {
    number: Option<String>,
    change_sys_id: Option<String>,
    #[serde(rename = "workStart")]
    work_start: Option<String>,
}

/// Async HTTP client for the ITSM backend, reached through the API gateway.
pub struct HttpService {
    client: Client,
    session: Session,
}

impl HttpService {
    /// Authenticate, discovering which environment the credentials belong to.
    pub async fn connect(
        config: &GatewayConfig,
        credentials: &Credentials,
    ) -> Result<Self, ServiceError> {
        let client = Client::new();
        let session = resolve_session(&client, config, credentials).await?;
        Ok(Self { client, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.session.endpoint.gateway_url)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.session.access_token())
    }

    async fn query_table<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        fields: &str,
    ) -> Result<Vec<T>, ServiceError> {
        let builder = self
            .client
            .get(self.url(&format!("{TABLE_API}/{table}")))
            .query(&[("sysparm_query", query), ("sysparm_fields", fields)]);
        let resp = send(self.with_auth(builder)).await?;
        let envelope: ResultEnvelope<T> = handle_response(resp).await?;
        Ok(envelope.result)
    }

    async fn put_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let builder = self.client.put(self.url(path)).json(body);
        let resp = send(self.with_auth(builder)).await?;
        handle_response(resp).await
    }
}

#[async_trait]
impl ChangeService for HttpService {
    fn environment(&self) -> Environment {
        self.session.environment
    }

    fn itsm_url(&self) -> &str {
        &self.session.endpoint.itsm_url
    }

    async fn lookup_net_id(&self, github_username: &str) -> Result<Option<String>, ServiceError> {
        let query = format!("u_github_username={github_username}");
        let rows: Vec<UserRow> = retry_once("identity lookup", || {
            self.query_table("sys_user", &query, "user_name")
        })
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| r.user_name)
            .find(|name| !name.is_empty()))
    }

    async fn find_change_for_run(
        &self,
        run_link: &str,
    ) -> Result<Option<ExistingChange>, ServiceError> {
        let query = format!("descriptionLIKE{run_link}");
        let rows: Vec<ChangeRow> = retry_once("existing change lookup", || {
            self.query_table(
                "change_request",
                &query,
                "number,sys_id,work_start,description",
            )
        })
        .await?;
        let rows: Vec<ChangeRow> = rows
            .into_iter()
            .filter(|r| mentions_run(&r.description, run_link))
            .collect();
        if rows.len() > 1 {
            debug!(matches = rows.len(), "several change requests reference this run");
        }
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        if row.sys_id.is_empty() {
            return Err(ServiceError::MalformedResponse(
                "existing change request has no sys_id".into(),
            ));
        }
        Ok(Some(ExistingChange {
            number: non_empty(row.number),
            sys_id: row.sys_id,
            work_start: non_empty(row.work_start),
        }))
    }

    async fn create_change(
        &self,
        draft: &ChangeRequestDraft,
    ) -> Result<ChangeRequestResult, ServiceError> {
        let body = serde_json::json!({ "changes": [draft] });
        let envelope: ResultEnvelope<CreatedRow> = retry_once("create change request", || {
            self.put_json(STANDARD_CHANGE_API, &body)
        })
        .await?;
        let row = envelope.result.into_iter().next().ok_or_else(|| {
            ServiceError::MalformedResponse("change request response has no result".into())
        })?;
        let number = row.number.and_then(non_empty).ok_or_else(|| {
            ServiceError::MalformedResponse("change request response has no number".into())
        })?;
        let sys_id = row.change_sys_id.and_then(non_empty).ok_or_else(|| {
            ServiceError::MalformedResponse("change request response has no change_sys_id".into())
        })?;
        let work_start = row.work_start.and_then(non_empty).ok_or_else(|| {
            ServiceError::MalformedResponse("change request response has no workStart".into())
        })?;
        info!(number = %number, "change request created");
        Ok(ChangeRequestResult {
            number,
            sys_id,
            work_start,
        })
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

pub(crate) async fn send(builder: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
    builder
        .send()
        .await
        .map_err(|e| ServiceError::Transport(e.to_string()))
}

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ServiceError> {
    if resp.status().is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::MalformedResponse(format!("json decode: {e}")))
    } else {
        Err(error_from_response(resp).await)
    }
}

pub(crate) async fn error_from_response(resp: reqwest::Response) -> ServiceError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let msg = error_message(&body);

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ServiceError::AuthFailed(format!("{status}: {msg}"))
    } else {
        ServiceError::Status {
            status: status.as_u16(),
            message: msg,
        }
    }
}

/// Pull a readable message out of the error bodies the gateway and the ITSM
/// backend produce, falling back to the raw body.
fn error_message(body: &str) -> String {
    let Ok(v) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    v["error"]["message"]
        .as_str()
        .or_else(|| v["error_description"].as_str())
        .or_else(|| v["error"].as_str())
        .map(String::from)
        .unwrap_or_else(|| body.to_string())
}
