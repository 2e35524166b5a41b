use std::time::{SystemTime, UNIX_EPOCH};

/// Shorten an owner id for log lines; owner ids are opaque bearer-derived
/// values and never logged in full.
pub fn owner_prefix(owner_id: &str) -> &str {
    &owner_id[..owner_id.len().min(12)]
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
