/// Current time in unix milliseconds, the unit every stored timestamp uses.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
