//! Step outputs and workflow annotations.
//!
//! Outputs are appended to the file named by `GITHUB_OUTPUT`. Annotations are
//! workflow commands (`::error::`, `::warning::`) written to stdout, which the
//! runner turns into messages on the run summary.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use stdchange_core::redact_secrets;
use tracing::{info, warn};

use crate::{ActionError, Outcome};

pub const CHANGE_SYS_ID_OUTPUT: &str = "change-sys-id";
pub const WORK_START_OUTPUT: &str = "work-start";

const MULTILINE_DELIMITER: &str = "STDCHANGE_EOF";

/// Write `change-sys-id` and `work-start` for a run that has a change. A
/// failed write turns the outcome fatal. Without an output file only a
/// warning is logged, so the action can run outside a workflow.
pub fn publish(outcome: Outcome, output_file: Option<&Path>) -> Outcome {
    let Some(report) = outcome.report() else {
        return outcome;
    };
    let Some(path) = output_file else {
        warn!("GITHUB_OUTPUT is not set, step outputs not written");
        return outcome;
    };
    let mut block = String::new();
    block.push_str(&output_line(CHANGE_SYS_ID_OUTPUT, &report.sys_id));
    block.push_str(&output_line(
        WORK_START_OUTPUT,
        report.work_start.as_deref().unwrap_or(""),
    ));
    match append(path, &block) {
        Ok(()) => outcome,
        Err(e) => Outcome::Fatal(ActionError::Output(format!("{}: {e}", path.display()))),
    }
}

fn append(path: &Path, block: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(block.as_bytes())
}

fn output_line(name: &str, value: &str) -> String {
    if value.contains('\n') || value.contains('\r') {
        format!("{name}<<{MULTILINE_DELIMITER}\n{value}\n{MULTILINE_DELIMITER}\n")
    } else {
        format!("{name}={value}\n")
    }
}

/// Tell the user how the run ended: the change number and link through the
/// log, problems as annotations.
pub fn announce(outcome: &Outcome) {
    if let Some(report) = outcome.report() {
        let verb = if report.created { "created" } else { "found existing" };
        info!(
            "{verb} change request {} in {}",
            report.number.as_deref().unwrap_or(&report.sys_id),
            report.environment
        );
        info!("change request link: {}", report.link);
    }
    for line in annotations(outcome) {
        println!("{line}");
    }
}

/// The workflow commands for an outcome, already redacted and escaped.
pub fn annotations(outcome: &Outcome) -> Vec<String> {
    match outcome {
        Outcome::Success(_) => Vec::new(),
        Outcome::Degraded { warnings, .. } => warnings
            .iter()
            .map(|w| format!("::warning::{}", escape_data(&redact_secrets(w))))
            .collect(),
        Outcome::Fatal(err) => vec![format!("::error::{}", escape_data(&err.redacted()))],
    }
}

fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeReport;
    use stdchange_core::Environment;
    use stdchange_service::ServiceError;

    fn report(work_start: Option<&str>) -> ChangeReport {
        ChangeReport {
            number: Some("CHG0030001".into()),
            sys_id: "0123abcd".into(),
            work_start: work_start.map(str::to_string),
            link: "https://it.example.edu/change_request.do?sysparm_query=number=CHG0030001"
                .into(),
            environment: Environment::Production,
            created: true,
        }
    }

    #[test]
    fn publish_appends_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, "earlier=1\n").unwrap();

        let outcome = publish(
            Outcome::Success(report(Some("2024-07-01 16:00:00"))),
            Some(&path),
        );

        assert!(matches!(outcome, Outcome::Success(_)));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "earlier=1\nchange-sys-id=0123abcd\nwork-start=2024-07-01 16:00:00\n"
        );
    }

    #[test]
    fn missing_work_start_is_written_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        publish(
            Outcome::with_warnings(report(None), vec!["no work start".into()]),
            Some(&path),
        );
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("work-start=\n"));
    }

    #[test]
    fn fatal_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        let outcome = publish(
            Outcome::Fatal(ActionError::Config("missing".into())),
            Some(&path),
        );
        assert!(matches!(outcome, Outcome::Fatal(ActionError::Config(_))));
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_output_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("output");
        let outcome = publish(Outcome::Success(report(None)), Some(&path));
        assert!(matches!(outcome, Outcome::Fatal(ActionError::Output(_))));
    }

    #[test]
    fn multiline_values_use_delimiter() {
        assert_eq!(
            output_line("x", "a\nb"),
            "x<<STDCHANGE_EOF\na\nb\nSTDCHANGE_EOF\n"
        );
    }

    #[test]
    fn error_annotation_is_redacted_and_escaped() {
        let outcome = Outcome::Fatal(ActionError::Service(ServiceError::Status {
            status: 500,
            message: "100% broken\ntoken 0123456789abcdef0123456789abcdef".into(),
        }));
        let lines = annotations(&outcome);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("::error::unexpected status 500: 100%25 broken%0Atoken "));
        assert!(lines[0].ends_with("REDACTED"));
    }

    #[test]
    fn each_warning_is_an_annotation() {
        let outcome = Outcome::with_warnings(report(None), vec!["one".into(), "two".into()]);
        assert_eq!(
            annotations(&outcome),
            vec!["::warning::one".to_string(), "::warning::two".to_string()]
        );
    }
}
