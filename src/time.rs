use chrono::Local;

const SECOND: u64 = 1;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

#[cfg(test)]
thread_local! {
    static MOCK_OFFSET: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
}

/// Current unix timestamp in seconds. Under test this can be pushed forward
/// with [`advance_mock_time`].
pub fn current_timestamp() -> u64 {
    let now = Local::now().timestamp() as u64;

    #[cfg(test)]
    let now = now + MOCK_OFFSET.with(|offset| offset.get());

    now
}

/// Moves the clock of the current test thread forward.
#[cfg(test)]
pub fn advance_mock_time(secs: u64) {
    MOCK_OFFSET.with(|offset| offset.set(offset.get() + secs));
}

/// Formats a timestamp as "3 hours ago"-style text for terminal output.
pub fn format_since(time: u64) -> String {
    if time == 0 {
        return String::from("never");
    }
    let now = current_timestamp();
    let duration = now.saturating_sub(time);

    let unit: &str;
    let value: u64;
    if duration < MINUTE {
        if duration < 30 {
            return String::from("now");
        }
        unit = "second";
        value = duration;
    } else if duration < HOUR {
        unit = "minute";
        value = duration / MINUTE;
    } else if duration < DAY {
        unit = "hour";
        value = duration / HOUR;
    } else {
        unit = "day";
        value = duration / DAY;
    }

    if value > 1 {
        format!("{value} {unit}s ago")
    } else {
        format!("last {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_since() {
        let now = current_timestamp();
        assert_eq!(format_since(0), "never");
        assert_eq!(format_since(now), "now");
        assert_eq!(format_since(now - 2 * HOUR), "2 hours ago");
        assert_eq!(format_since(now - DAY - 10), "last day");
    }

    #[test]
    fn test_mock_time() {
        let before = current_timestamp();
        advance_mock_time(100);
        let after = current_timestamp();
        assert!(after >= before + 100);
    }
}
