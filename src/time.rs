use chrono::prelude::*;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch.
pub fn create_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since_the_epoch| since_the_epoch.as_millis() as u64)
        .unwrap_or(0)
}

pub fn format_timestamp(timestamp: u64) -> String {
    match Utc.timestamp_millis_opt(timestamp as i64) {
        chrono::LocalResult::Single(datetime) => {
            datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
        }
        _ => String::from("invalid timestamp"),
    }
}
