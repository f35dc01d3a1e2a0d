use serde::{Deserialize, Serialize};

use crate::commit::is_merge_commit_message;
use crate::push_event::{PushEvent, RunContext};

pub const SHORT_DESCRIPTION_LIMIT: usize = 160;
/// Characters kept before the ellipsis when the short description is cut.
pub const SHORT_DESCRIPTION_KEEP: usize = 157;
pub const DESCRIPTION_LIMIT: usize = 4000;

/// `10` is draft, `20` is submitted.
pub const SUBMITTED_STATE: &str = "20";

const RUN_LINK_LABEL: &str = "Link to workflow run: ";

/// A new standard change, in the shape the standard-change endpoint accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequestDraft {
    pub assigned_to: String,
    /// Minutes from planned start to planned end.
    pub start_add_time: u32,
    pub short_description: String,
    pub description: String,
    pub state: String,
    pub template_id: String,
}

impl ChangeRequestDraft {
    pub fn new(
        assigned_to: &str,
        minutes_until_planned_end: u32,
        template_id: &str,
        event: &PushEvent,
        run: &RunContext,
    ) -> Self {
        Self {
            assigned_to: assigned_to.to_string(),
            start_add_time: minutes_until_planned_end,
            short_description: short_description(event),
            description: long_description(event, &run.run_link()),
            state: SUBMITTED_STATE.to_string(),
            template_id: template_id.to_string(),
        }
    }
}

/// What the backend hands back for a newly filed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequestResult {
    pub number: String,
    pub sys_id: String,
    /// Backend-local `YYYY-MM-DD HH:MM:SS`.
    pub work_start: String,
}

/// A change request an earlier attempt of this workflow run already filed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingChange {
    pub number: Option<String>,
    pub sys_id: String,
    pub work_start: Option<String>,
}

pub fn short_description(event: &PushEvent) -> String {
    let full = format!(
        "{} pushed {} commit(s) to {}: {}",
        event.pusher.name,
        event.commit_count(),
        event.repository.full_name,
        event.first_lines().join("; ")
    );
    if full.chars().count() > SHORT_DESCRIPTION_LIMIT {
        format!("{}...", truncate_chars(&full, SHORT_DESCRIPTION_KEEP))
    } else {
        full
    }
}

pub fn long_description(event: &PushEvent, run_link: &str) -> String {
    let merges = event
        .commit_messages()
        .filter(|m| is_merge_commit_message(m))
        .count();
    let header = if merges > 0 {
        format!("Commit Messages ({merges} merge commit(s)):")
    } else {
        "Commit Messages:".to_string()
    };
    let messages: Vec<&str> = event.commit_messages().collect();
    let full = format!(
        "{RUN_LINK_LABEL}{run_link}\nLink to commits: {}\n\n{header}\n---------------\n{}",
        event.compare,
        messages.join("\n\n")
    );
    truncate_chars(&full, DESCRIPTION_LIMIT).to_string()
}

/// True when `description` carries exactly this run's link line. A substring
/// match alone would confuse run 1 with run 11.
pub fn mentions_run(description: &str, run_link: &str) -> bool {
    description
        .lines()
        .filter_map(|line| line.trim_end().strip_prefix(RUN_LINK_LABEL))
        .any(|link| link == run_link)
}

/// ITSM page for a change, searched by its human-facing number.
pub fn change_link(itsm_url: &str, number: &str) -> String {
    format!(
        "{}/change_request.do?sysparm_query=number={number}",
        itsm_url.trim_end_matches('/')
    )
}

/// ITSM page for a change whose number is unknown.
pub fn change_link_by_sys_id(itsm_url: &str, sys_id: &str) -> String {
    format!(
        "{}/change_request.do?sys_id={sys_id}",
        itsm_url.trim_end_matches('/')
    )
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
