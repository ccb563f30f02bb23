//! Timestamp conventions
//!
//! All timestamps are Unix seconds supplied by the caller. Nothing in the
//! watchdog reads a wall clock; deadlines only advance when a caller passes
//! a later `now`.

/// Unix timestamp in seconds
pub type UnixSeconds = i64;

pub const MINUTE: i64 = 60;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;

/// Deadline reached check, inclusive of the deadline itself
pub fn is_due(now: UnixSeconds, deadline: UnixSeconds) -> bool {
    now >= deadline
}

/// `now + delay`, or `None` when the sum leaves the `i64` range.
pub fn deadline_after(now: UnixSeconds, delay_secs: i64) -> Option<UnixSeconds> {
    now.checked_add(delay_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations() {
        assert_eq!(HOUR, 3_600);
        assert_eq!(DAY, 86_400);
        assert_eq!(48 * HOUR, 172_800);
    }

    #[test]
    fn test_is_due_inclusive() {
        assert!(!is_due(99, 100));
        assert!(is_due(100, 100));
        assert!(is_due(101, 100));
    }

    #[test]
    fn test_deadline_after_overflow() {
        assert_eq!(deadline_after(100, 48 * HOUR), Some(100 + 172_800));
        assert_eq!(deadline_after(1_700_000_000, i64::MAX), None);
        assert_eq!(deadline_after(i64::MAX - 10, DAY), None);
    }
}
