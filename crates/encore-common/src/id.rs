/// Random identifier for locally created records (bus payloads, notifications).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Wall-clock time as epoch milliseconds, the unit used by every stored
/// timestamp in the realtime database and the local cache.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
