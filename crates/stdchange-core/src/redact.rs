use std::sync::LazyLock;

use regex::Regex;

pub const REDACTION_MARKER: &str = "REDACTED";

/// Opaque gateway tokens issued before the move to JWTs.
static LEGACY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9a-f]{32}").expect("legacy token pattern"));

static JWT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*").expect("jwt pattern")
});

/// Replace anything shaped like a gateway bearer token with [`REDACTION_MARKER`].
///
/// Every message shown to the user or written to the log after a failure
/// passes through here.
pub fn redact_secrets(text: &str) -> String {
    let without_jwts = JWT_TOKEN.replace_all(text, REDACTION_MARKER);
    LEGACY_TOKEN
        .replace_all(&without_jwts, REDACTION_MARKER)
        .into_owned()
}
