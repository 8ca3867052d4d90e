use chrono::{DateTime, TimeDelta, Utc};

// Length of the two windows, in seconds
pub const HOUR_SECS: i64 = 60 * 60;
pub const FIVE_MINUTE_SECS: i64 = 5 * 60;

/// One window's anchor timestamp and the notifications admitted since then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    pub anchor: DateTime<Utc>,
    pub count: u32,
}

impl WindowCounter {
    // Fresh window starting at `now`
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            anchor: now,
            count: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        now - self.anchor >= window
    }
}

/// Expiry wins over the limit. The returned counter is not incremented, the
/// caller bumps it once every window agreed.
pub fn evaluate(
    counter: WindowCounter,
    now: DateTime<Utc>,
    window: TimeDelta,
    limit: u32,
) -> (WindowCounter, bool) {
    if counter.is_expired(now, window) {
        return (WindowCounter::starting_at(now), limit > 0);
    }

    if counter.count >= limit {
        return (counter, false);
    }

    (counter, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn five_minutes() -> TimeDelta {
        TimeDelta::seconds(FIVE_MINUTE_SECS)
    }

    #[test]
    fn admits_under_limit_without_moving_anchor() {
        let counter = WindowCounter { anchor: t0(), count: 3 };
        let now = t0() + TimeDelta::seconds(30);

        for limit in 4..10 {
            let (next, admitted) = evaluate(counter, now, five_minutes(), limit);
            assert!(admitted);
            assert_eq!(next.anchor, t0());
            assert_eq!(next.count, 3, "evaluate must not increment");
        }
    }

    #[test]
    fn denies_at_limit_and_leaves_counter_alone() {
        let counter = WindowCounter { anchor: t0(), count: 5 };
        let now = t0() + TimeDelta::seconds(299);

        let (next, admitted) = evaluate(counter, now, five_minutes(), 5);
        assert!(!admitted);
        assert_eq!(next, counter);
    }

    #[test]
    fn expiry_beats_limit() {
        for count in [0, 4, 5, 50] {
            let counter = WindowCounter { anchor: t0(), count };
            let now = t0() + five_minutes();

            let (next, admitted) = evaluate(counter, now, five_minutes(), 5);
            assert!(admitted);
            assert_eq!(next, WindowCounter::starting_at(now));
        }
    }

    #[test]
    fn long_expired_window_resets_to_now() {
        let counter = WindowCounter { anchor: t0(), count: 9 };
        let now = t0() + TimeDelta::days(3);

        let (next, _) = evaluate(counter, now, TimeDelta::seconds(HOUR_SECS), 10);
        assert_eq!(next.anchor, now);
        assert_eq!(next.count, 0);
    }

    #[test]
    fn anchor_in_the_future_is_not_expired() {
        // clock stepped backwards between two callers
        let counter = WindowCounter { anchor: t0(), count: 2 };
        let now = t0() - TimeDelta::seconds(10);

        let (next, admitted) = evaluate(counter, now, five_minutes(), 2);
        assert!(!admitted);
        assert_eq!(next, counter);
    }

    #[test]
    fn zero_limit_never_admits() {
        let counter = WindowCounter::starting_at(t0());
        assert!(!evaluate(counter, t0(), five_minutes(), 0).1);
        assert!(!evaluate(counter, t0() + five_minutes(), five_minutes(), 0).1);
    }
}
