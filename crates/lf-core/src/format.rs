/// Render a duration in seconds for log messages.
///
/// Under a minute the value keeps two decimals (`12.50s`). Longer durations
/// use whole units and omit zero components (`3m`, `3m 7s`, `1h 2m 3s`).
/// Negative or non-finite input renders as `0s`.
pub fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "0s".into();
    }
    if secs < 60.0 {
        return format!("{secs:.2}s");
    }

    let whole = secs.floor() as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let seconds = whole % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || hours == 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}
