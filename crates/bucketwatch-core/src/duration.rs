//! Human-friendly duration strings used in the config file.

use std::time::Duration;

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
/// Values that do not fit in a `u64` of seconds are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        scaled_secs(mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        scaled_secs(hours, 3600)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn scaled_secs(value: &str, unit: u64) -> Option<Duration> {
    value
        .parse::<u64>()
        .ok()?
        .checked_mul(unit)
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(parse_duration("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration(" 30 "), Some(Duration::from_secs(30)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration("invalid"), None);
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn rejects_overflowing_units() {
        assert_eq!(parse_duration("307445734561825861m"), None);
        assert_eq!(parse_duration("5124095576030432h"), None);
        let max_mins = u64::MAX / 60;
        assert_eq!(
            parse_duration(&format!("{max_mins}m")),
            Some(Duration::from_secs(max_mins * 60))
        );
    }
}
