use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use stdchange_core::{ChangeRequestDraft, ChangeRequestResult, Environment, ExistingChange};
use stdchange_service::{ChangeService, ServiceError};

/// A mock change service for testing that records calls and returns
/// configurable results.
pub struct MockChangeService {
    environment: Environment,
    users: HashMap<String, String>,
    existing: Option<ExistingChange>,
    work_start: String,
    lookup_fail: bool,
    find_fail: bool,
    create_fail: bool,
    create_counter: AtomicU64,
    lookup_counter: AtomicU64,
    drafts: Mutex<Vec<ChangeRequestDraft>>,
}

impl Default for MockChangeService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChangeService {
    pub fn new() -> Self {
        Self {
            environment: Environment::Sandbox,
            users: HashMap::new(),
            existing: None,
            work_start: "2024-07-01 10:00:00".to_string(),
            lookup_fail: false,
            find_fail: false,
            create_fail: false,
            create_counter: AtomicU64::new(0),
            lookup_counter: AtomicU64::new(0),
            drafts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_user(mut self, github_username: &str, net_id: &str) -> Self {
        self.users
            .insert(github_username.to_string(), net_id.to_string());
        self
    }

    pub fn with_existing(mut self, existing: ExistingChange) -> Self {
        self.existing = Some(existing);
        self
    }

    /// Backend-local work start returned for created changes.
    pub fn with_work_start(mut self, work_start: &str) -> Self {
        self.work_start = work_start.to_string();
        self
    }

    pub fn with_lookup_fail(mut self) -> Self {
        self.lookup_fail = true;
        self
    }

    pub fn with_find_fail(mut self) -> Self {
        self.find_fail = true;
        self
    }

    pub fn with_create_fail(mut self) -> Self {
        self.create_fail = true;
        self
    }

    pub fn create_calls(&self) -> u64 {
        self.create_counter.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> u64 {
        self.lookup_counter.load(Ordering::SeqCst)
    }

    pub fn drafts(&self) -> Vec<ChangeRequestDraft> {
        self.drafts.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChangeService for MockChangeService {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn itsm_url(&self) -> &str {
        "https://itsm.example.edu"
    }

    async fn lookup_net_id(&self, github_username: &str) -> Result<Option<String>, ServiceError> {
        self.lookup_counter.fetch_add(1, Ordering::SeqCst);
        if self.lookup_fail {
            return Err(ServiceError::Status {
                status: 503,
                message: "mock lookup failure".into(),
            });
        }
        Ok(self.users.get(github_username).cloned())
    }

    async fn find_change_for_run(
        &self,
        _run_link: &str,
    ) -> Result<Option<ExistingChange>, ServiceError> {
        if self.find_fail {
            return Err(ServiceError::Transport("mock search failure".into()));
        }
        Ok(self.existing.clone())
    }

    async fn create_change(
        &self,
        draft: &ChangeRequestDraft,
    ) -> Result<ChangeRequestResult, ServiceError> {
        let n = self.create_counter.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut drafts) = self.drafts.lock() {
            drafts.push(draft.clone());
        }
        if self.create_fail {
            return Err(ServiceError::Status {
                status: 500,
                message: "mock create failure".into(),
            });
        }
        Ok(ChangeRequestResult {
            number: format!("CHG{n:07}"),
            sys_id: format!("sys-{n}"),
            work_start: self.work_start.clone(),
        })
    }
}
