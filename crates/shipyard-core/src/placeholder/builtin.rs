use chrono::{SecondsFormat, Utc};

/// `time.timestamp`: UTC Unix seconds.
pub fn unix_timestamp() -> crate::Result<String> {
    Ok(Utc::now().timestamp().to_string())
}

/// `time.iso8601`: RFC 3339 in UTC with second precision.
pub fn iso8601_timestamp() -> crate::Result<String> {
    Ok(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
}
