//! End-to-end runs of the action against two in-process fake gateways.
//!
//! Settings are built through the same clap parser the binary uses, with the
//! payload and output files in a temp dir.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::json;
use stdchange_action::outputs::annotations;
use stdchange_action::{execute, ActionConfig, ActionError, Outcome, Settings};
use stdchange_core::Environment;
use stdchange_gateway_fake::{spawn_fake_gateway, FakeGateway, Route};
use tempfile::TempDir;

const KEY: &str = "client-key";
const SECRET: &str = "client-secret";

struct Harness {
    sandbox: FakeGateway,
    production: FakeGateway,
    dir: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let sandbox = spawn_fake_gateway().await;
        let production = spawn_fake_gateway().await;
        sandbox.add_user("octocat", "cosmo");
        production.add_user("octocat", "cosmo");
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("event.json"), push_payload().to_string()).unwrap();
        Self {
            sandbox,
            production,
            dir,
        }
    }

    fn output_path(&self) -> PathBuf {
        self.dir.path().join("github_output")
    }

    fn args(&self, event_name: &str) -> Vec<String> {
        let event_path = self.dir.path().join("event.json").to_string_lossy().into_owned();
        let output_path = self.output_path().to_string_lossy().into_owned();
        [
            "stdchange-action",
            "--client-key",
            KEY,
            "--client-secret",
            SECRET,
            "--template-id",
            "tmpl-1",
            "--minutes-until-planned-end",
            "45",
            "--sandbox-gateway-url",
            self.sandbox.base_url.as_str(),
            "--production-gateway-url",
            self.production.base_url.as_str(),
            "--sandbox-itsm-url",
            "https://support-test.example.edu",
            "--production-itsm-url",
            "https://it.example.edu",
            "--backend-time-zone",
            "America/Denver",
            "--event-name",
            event_name,
            "--event-path",
            event_path.as_str(),
            "--server-url",
            "https://github.com",
            "--repository",
            "org/repo",
            "--run-id",
            "4242",
            "--output-file",
            output_path.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn settings(&self, event_name: &str) -> Settings {
        ActionConfig::try_parse_from(self.args(event_name))
            .unwrap()
            .into_settings()
            .unwrap()
    }

    fn outputs(&self) -> String {
        read_or_empty(&self.output_path())
    }
}

fn read_or_empty(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

fn push_payload() -> serde_json::Value {
    json!({
        "ref": "refs/heads/main",
        "compare": "https://github.com/org/repo/compare/a...b",
        "pusher": { "name": "octocat", "email": "octocat@example.com" },
        "repository": { "full_name": "org/repo" },
        "commits": [
            { "id": "a1", "message": "Add widget\n\nLonger explanation" },
            { "id": "b2", "message": "Merge pull request #12 from org/dev" }
        ]
    })
}

#[tokio::test]
async fn push_creates_change_and_writes_outputs() {
    let h = Harness::new().await;
    h.sandbox.accept_credentials(KEY, SECRET);

    let outcome = execute(&h.settings("push")).await;

    let Outcome::Success(report) = &outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert!(report.created);
    assert_eq!(report.environment, Environment::Sandbox);
    assert_eq!(report.number.as_deref(), Some("CHG0030001"));
    assert_eq!(
        report.link,
        "https://support-test.example.edu/change_request.do?sysparm_query=number=CHG0030001"
    );
    assert_eq!(outcome.exit_status(), 0);

    let created = h.sandbox.created();
    assert_eq!(created.len(), 1);
    let change = &created[0]["changes"][0];
    assert_eq!(change["assigned_to"], "cosmo");
    assert_eq!(change["start_add_time"], 45);
    assert_eq!(
        change["short_description"],
        "octocat pushed 2 commit(s) to org/repo: Add widget; Merge pull request #12 from org/dev"
    );
    let description = change["description"].as_str().unwrap();
    assert!(description
        .starts_with("Link to workflow run: https://github.com/org/repo/actions/runs/4242\n"));
    assert!(description.contains("Commit Messages (1 merge commit(s)):"));

    // 10:00 MDT is 16:00 UTC.
    assert_eq!(
        h.outputs(),
        format!(
            "change-sys-id={}\nwork-start=2024-07-01 16:00:00\n",
            report.sys_id
        )
    );
}

#[tokio::test]
async fn rerun_reports_existing_change_without_duplicating() {
    let h = Harness::new().await;
    h.sandbox.accept_credentials(KEY, SECRET);
    let settings = h.settings("push");

    let first = execute(&settings).await;
    let second = execute(&settings).await;

    let (Some(a), Some(b)) = (first.report(), second.report()) else {
        panic!("expected two reports, got {first:?} and {second:?}");
    };
    assert!(a.created);
    assert!(!b.created);
    assert_eq!(a.sys_id, b.sys_id);
    assert_eq!(a.work_start, b.work_start);
    assert_eq!(h.sandbox.hits(Route::Create), 1);
    assert_eq!(h.sandbox.changes().len(), 1);
}

#[tokio::test]
async fn production_credentials_file_in_production() {
    let h = Harness::new().await;
    h.production.accept_credentials(KEY, SECRET);

    let outcome = execute(&h.settings("push")).await;

    let report = outcome.report().unwrap();
    assert_eq!(report.environment, Environment::Production);
    assert!(report.link.starts_with("https://it.example.edu/"));
    assert_eq!(h.production.created().len(), 1);
    assert!(h.sandbox.created().is_empty());
}

#[tokio::test]
async fn unsupported_trigger_makes_no_calls() {
    let h = Harness::new().await;
    h.sandbox.accept_credentials(KEY, SECRET);

    let outcome = execute(&h.settings("pull_request")).await;

    assert!(matches!(
        outcome,
        Outcome::Fatal(ActionError::UnsupportedTrigger(_))
    ));
    assert_eq!(outcome.exit_status(), 1);
    assert_eq!(h.sandbox.total_hits() + h.production.total_hits(), 0);
    assert_eq!(h.outputs(), "");
}

#[tokio::test]
async fn missing_input_is_rejected_before_any_call() {
    let h = Harness::new().await;
    let mut args = h.args("push");
    let idx = args.iter().position(|a| a == "--client-secret").unwrap();
    args[idx + 1] = String::new();

    let err = ActionConfig::try_parse_from(args)
        .unwrap()
        .into_settings()
        .unwrap_err();

    assert!(matches!(err, ActionError::Config(_)));
    assert!(err.to_string().contains("client-secret"));
    assert_eq!(h.sandbox.total_hits() + h.production.total_hits(), 0);
}

#[tokio::test]
async fn unknown_pusher_fails_with_remediation() {
    let h = Harness::new().await;
    h.sandbox.accept_credentials(KEY, SECRET);
    let payload = push_payload().to_string().replace("octocat", "stranger");
    std::fs::write(h.dir.path().join("event.json"), payload).unwrap();

    let outcome = execute(&h.settings("push")).await;

    let lines = annotations(&outcome);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("::error::could not find a Net ID for GitHub user 'stranger'"));
    assert!(h.sandbox.created().is_empty());
    assert_eq!(h.outputs(), "");
}

#[tokio::test]
async fn rejected_credentials_are_fatal() {
    let h = Harness::new().await;

    let outcome = execute(&h.settings("push")).await;

    match outcome {
        Outcome::Fatal(ActionError::Service(e)) => assert!(e.is_auth_failure(), "got {e:?}"),
        other => panic!("expected auth failure, got {other:?}"),
    }
    assert_eq!(h.sandbox.hits(Route::Token), 2);
    assert_eq!(h.production.hits(Route::Token), 2);
}

#[tokio::test]
async fn existing_change_without_work_start_is_degraded() {
    let h = Harness::new().await;
    h.sandbox.accept_credentials(KEY, SECRET);
    h.sandbox.add_change(
        "CHG0031000",
        "feedface",
        "Link to workflow run: https://github.com/org/repo/actions/runs/4242\n",
        "",
    );

    let outcome = execute(&h.settings("push")).await;

    let Outcome::Degraded { report, warnings } = &outcome else {
        panic!("expected degraded, got {outcome:?}");
    };
    assert_eq!(report.sys_id, "feedface");
    assert_eq!(warnings.len(), 1);
    assert_eq!(outcome.exit_status(), 0);
    assert!(annotations(&outcome)[0].starts_with("::warning::"));
    assert_eq!(h.outputs(), "change-sys-id=feedface\nwork-start=\n");
    assert!(h.sandbox.created().is_empty());
}
