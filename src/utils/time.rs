//! Time parsing and formatting utilities

/// Format seconds as `M:SS`, or `H:MM:SS` from one hour up
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Parse seconds (`12.5`), `MM:SS(.ms)` or `HH:MM:SS(.ms)` into seconds
pub fn parse_time(time_str: &str) -> Result<f64, String> {
    let trimmed = time_str.trim();

    let invalid = || {
        format!(
            "Invalid time format '{}'. Supported formats: seconds (e.g., 12.5), \
             MM:SS.ms (e.g., 2:30.5), HH:MM:SS.ms (e.g., 1:02:30.5)",
            trimmed
        )
    };

    if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() {
            return Err(invalid());
        }
        if seconds < 0.0 {
            return Err(format!("Time cannot be negative: {}", trimmed));
        }
        return Ok(seconds);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (
            0u64,
            m.parse::<u64>().map_err(|_| invalid())?,
            s.parse::<f64>().map_err(|_| invalid())?,
        ),
        [h, m, s] => (
            h.parse::<u64>().map_err(|_| invalid())?,
            m.parse::<u64>().map_err(|_| invalid())?,
            s.parse::<f64>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };

    if !seconds.is_finite() {
        return Err(invalid());
    }
    if parts.len() == 3 && minutes >= 60 {
        return Err("Minutes must be less than 60".to_string());
    }
    if !(0.0..60.0).contains(&seconds) {
        return Err("Seconds must be less than 60".to_string());
    }

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}
