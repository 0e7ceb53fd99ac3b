use chrono::NaiveDateTime;

/// Recorder timestamp format, e.g. `2023-05-04T10:11:12:123` (milliseconds after a colon).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S:%3f";

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}

/// Parse a whole column. Returns `None` if any value fails to parse.
pub fn parse_all(values: &[&str]) -> Option<Vec<NaiveDateTime>> {
    values.iter().map(|v| parse_timestamp(v)).collect()
}

/// Estimate samples/second from the median positive interval between timestamps.
pub fn estimate_rate(timestamps: &[NaiveDateTime]) -> Option<f64> {
    let mut intervals: Vec<f64> = timestamps
        .windows(2)
        .filter_map(|w| (w[1] - w[0]).num_microseconds())
        .filter(|&us| us > 0)
        .map(|us| us as f64 / 1_000_000.0)
        .collect();
    if intervals.is_empty() {
        return None;
    }
    intervals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = intervals[intervals.len() / 2];
    Some(1.0 / median)
}
