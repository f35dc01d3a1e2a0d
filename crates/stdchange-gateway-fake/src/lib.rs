//! In-process fake of the API gateway and the ITSM tables behind it.
//!
//! Each [`FakeGateway`] stands in for one environment. Tests that exercise
//! environment detection spawn two of them and accept the credentials in only
//! one. The fake records every hit per [`Route`] and can be told to fail the
//! next N calls of a route with a 503.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Token the fake issues and expects back as a bearer token.
pub const ACCESS_TOKEN: &str = "0123456789abcdef0123456789abcdef";

pub const DEFAULT_WORK_START: &str = "2024-07-01 10:00:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Token,
    Echo,
    Users,
    Changes,
    Create,
}

#[derive(Debug, Clone)]
pub struct StoredChange {
    pub number: String,
    pub sys_id: String,
    pub description: String,
    pub work_start: String,
}

#[derive(Default)]
struct FakeState {
    credentials: Option<(String, String)>,
    users: HashMap<String, String>,
    changes: Vec<StoredChange>,
    fail_next: HashMap<Route, usize>,
    hits: HashMap<Route, usize>,
    created: Vec<Value>,
    malformed_create: bool,
    work_start: String,
}

type Shared = Arc<Mutex<FakeState>>;

/// A running fake gateway. Dropping it does not stop the server; the
/// background task ends with the test runtime.
pub struct FakeGateway {
    pub base_url: String,
    state: Shared,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn a fake gateway on a random port. It accepts no credentials until
/// [`FakeGateway::accept_credentials`] is called.
pub async fn spawn_fake_gateway() -> FakeGateway {
    let state: Shared = Arc::new(Mutex::new(FakeState {
        work_start: DEFAULT_WORK_START.to_string(),
        ..Default::default()
    }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    FakeGateway {
        base_url: format!("http://{addr}"),
        state,
        _handle: handle,
    }
}

impl FakeGateway {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn accept_credentials(&self, client_key: &str, client_secret: &str) {
        self.lock().credentials = Some((client_key.to_string(), client_secret.to_string()));
    }

    pub fn add_user(&self, github_username: &str, net_id: &str) {
        self.lock()
            .users
            .insert(github_username.to_string(), net_id.to_string());
    }

    pub fn add_change(&self, number: &str, sys_id: &str, description: &str, work_start: &str) {
        self.lock().changes.push(StoredChange {
            number: number.to_string(),
            sys_id: sys_id.to_string(),
            description: description.to_string(),
            work_start: work_start.to_string(),
        });
    }

    /// Answer the next `times` calls of `route` with 503.
    pub fn fail_next(&self, route: Route, times: usize) {
        self.lock().fail_next.insert(route, times);
    }

    /// Make change creation answer 200 with a result that has no identifiers.
    pub fn return_malformed_create(&self) {
        self.lock().malformed_create = true;
    }

    pub fn set_work_start(&self, work_start: &str) {
        self.lock().work_start = work_start.to_string();
    }

    pub fn hits(&self, route: Route) -> usize {
        self.lock().hits.get(&route).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.lock().hits.values().sum()
    }

    /// Bodies of every create call received, in order.
    pub fn created(&self) -> Vec<Value> {
        self.lock().created.clone()
    }

    pub fn changes(&self) -> Vec<StoredChange> {
        self.lock().changes.clone()
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/token", post(token))
        .route("/echo/v1/echo/test", get(echo))
        .route("/domains/servicenow/tableapi/v1/table/{table}", get(table))
        .route(
            "/domains/servicenow/standardchange/v1/change_request",
            put(create_change),
        )
        .with_state(state)
}

/// Count the hit and apply any pending injected failure.
fn enter(state: &Shared, route: Route) -> Result<(), Response> {
    let mut s = state.lock().unwrap();
    *s.hits.entry(route).or_default() += 1;
    if let Some(remaining) = s.fail_next.get_mut(&route) {
        if *remaining > 0 {
            *remaining -= 1;
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": { "message": "upstream unavailable" } })),
            )
                .into_response());
        }
    }
    Ok(())
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let encoded = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (key, secret) = decoded.split_once(':')?;
    Some((key.to_string(), secret.to_string()))
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        == Some(ACCESS_TOKEN)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "message": "Invalid Credentials" } })),
    )
        .into_response()
}

async fn token(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = enter(&state, Route::Token) {
        return resp;
    }
    if form.get("grant_type").map(String::as_str) != Some("client_credentials") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        )
            .into_response();
    }
    let accepted = state.lock().unwrap().credentials.clone();
    match (basic_credentials(&headers), accepted) {
        (Some(presented), Some(accepted)) if presented == accepted => Json(json!({
            "access_token": ACCESS_TOKEN,
            "token_type": "Bearer",
            "expires_in": 3600,
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "invalid_client",
                "error_description": "Client Authentication failed.",
            })),
        )
            .into_response(),
    }
}

async fn echo(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(resp) = enter(&state, Route::Echo) {
        return resp;
    }
    if !bearer_ok(&headers) {
        return unauthorized();
    }
    Json(json!({ "echo": "test" })).into_response()
}

async fn table(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let route = match table.as_str() {
        "sys_user" => Route::Users,
        "change_request" => Route::Changes,
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": { "message": "Invalid table" } })),
            )
                .into_response()
        }
    };
    if let Err(resp) = enter(&state, route) {
        return resp;
    }
    if !bearer_ok(&headers) {
        return unauthorized();
    }
    let query = params.get("sysparm_query").cloned().unwrap_or_default();
    let s = state.lock().unwrap();
    let result: Vec<Value> = match route {
        Route::Users => query
            .strip_prefix("u_github_username=")
            .and_then(|name| s.users.get(name))
            .map(|net_id| vec![json!({ "user_name": net_id })])
            .unwrap_or_default(),
        _ => {
            let needle = query.strip_prefix("descriptionLIKE").unwrap_or("");
            s.changes
                .iter()
                .filter(|c| !needle.is_empty() && c.description.contains(needle))
                .map(|c| {
                    json!({
                        "number": c.number,
                        "sys_id": c.sys_id,
                        "work_start": c.work_start,
                        "description": c.description,
                    })
                })
                .collect()
        }
    };
    Json(json!({ "result": result })).into_response()
}

async fn create_change(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(resp) = enter(&state, Route::Create) {
        return resp;
    }
    if !bearer_ok(&headers) {
        return unauthorized();
    }
    let mut s = state.lock().unwrap();
    s.created.push(body.clone());
    if s.malformed_create {
        return Json(json!({ "result": [{ "status": "accepted" }] })).into_response();
    }
    let n = s.changes.len() + 1;
    let number = format!("CHG{:07}", 30_000 + n);
    let sys_id = format!("{n:032x}");
    let description = body["changes"][0]["description"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let work_start = s.work_start.clone();
    s.changes.push(StoredChange {
        number: number.clone(),
        sys_id: sys_id.clone(),
        description,
        work_start: work_start.clone(),
    });
    Json(json!({
        "result": [{
            "number": number,
            "change_sys_id": sys_id,
            "workStart": work_start,
        }]
    }))
    .into_response()
}
