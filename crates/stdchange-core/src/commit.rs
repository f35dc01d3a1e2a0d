use std::sync::LazyLock;

use regex::Regex;

static PULL_REQUEST_MERGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Merge pull request #\d+ from \S+").expect("pull request merge pattern")
});

static BRANCH_MERGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Merge (remote-tracking )?branch \S+( of https://github\.com/\S+)? into \S+")
        .expect("branch merge pattern")
});

/// True for the commit messages git and GitHub generate when merging.
pub fn is_merge_commit_message(message: &str) -> bool {
    PULL_REQUEST_MERGE.is_match(message) || BRANCH_MERGE.is_match(message)
}
