use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::CoreError;

/// Format the backend uses for timestamps, and the format we emit.
pub const WORK_START_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_BACKEND_TIME_ZONE: &str = "America/Denver";

pub fn parse_time_zone(name: &str) -> Result<Tz, CoreError> {
    name.parse::<Tz>()
        .map_err(|_| CoreError::UnknownTimeZone(name.to_string()))
}

/// Convert a backend-local `YYYY-MM-DD HH:MM:SS` timestamp to UTC in the same
/// format. Times inside a DST fold resolve to the earlier instant.
pub fn to_utc(local: &str, zone: Tz) -> Result<String, CoreError> {
    let naive = NaiveDateTime::parse_from_str(local.trim(), WORK_START_FORMAT)
        .map_err(|e| CoreError::InvalidTimestamp(format!("{local:?}: {e}")))?;
    let resolved = zone.from_local_datetime(&naive).earliest().ok_or_else(|| {
        CoreError::InvalidTimestamp(format!("{local:?} does not exist in {zone}"))
    })?;
    Ok(resolved.with_timezone(&Utc).format(WORK_START_FORMAT).to_string())
}
