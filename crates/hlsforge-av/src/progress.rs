//! Parsing of ffmpeg's diagnostic stream.
//!
//! With `-progress pipe:2 -nostats` ffmpeg writes `key=value` blocks such as
//! `out_time=00:00:05.120000`; older builds and plain stats lines carry
//! `time=00:00:05.12` inside a longer line. Both are understood.

/// Keys emitted in `-progress` blocks.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

/// Extract the elapsed output time, in seconds, from one diagnostic line.
///
/// Returns `None` for lines that carry no time, and for `N/A` values that
/// ffmpeg emits before the first frame is written.
///
/// # Examples
///
/// ```
/// use hlsforge_av::progress::parse_elapsed;
///
/// assert_eq!(parse_elapsed("out_time=00:01:02.500000"), Some(62.5));
/// assert_eq!(parse_elapsed("frame=10 fps=0.0 time=00:00:01.00 speed=2x"), Some(1.0));
/// assert_eq!(parse_elapsed("out_time=N/A"), None);
/// ```
pub fn parse_elapsed(line: &str) -> Option<f64> {
    for token in line.split_whitespace() {
        let value = token
            .strip_prefix("out_time=")
            .or_else(|| token.strip_prefix("time="));
        if let Some(value) = value {
            return parse_timestamp(value);
        }
    }
    None
}

/// Parse `HH:MM:SS(.fff)` into seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let value = value.trim();
    let (negative, value) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    if !total.is_finite() {
        return None;
    }
    // ffmpeg reports slightly negative times for streams with a start offset
    Some(if negative { 0.0 } else { total })
}

/// Integer percentage of `elapsed` over `total`, capped at 100.
///
/// `None` when the total duration is unknown.
pub fn percent(elapsed: f64, total: f64) -> Option<u8> {
    if total.is_nan() || total <= 0.0 || !elapsed.is_finite() {
        return None;
    }
    let pct = (elapsed / total * 100.0).clamp(0.0, 100.0);
    Some(pct.floor() as u8)
}

/// Whether a line belongs to a `-progress` block rather than to ffmpeg's
/// human-readable diagnostics.
pub fn is_progress_line(line: &str) -> bool {
    match line.trim().split_once('=') {
        Some((key, _)) => {
            PROGRESS_KEYS.contains(&key)
                || (key.starts_with("stream_") && key.ends_with("_q"))
        }
        None => false,
    }
}
