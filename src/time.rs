//! Wall clock in 100 nanosecond ticks since the Unix epoch.
//!
//! Certificate validity windows and absolute deadlines are expressed in ticks.
//! [`INFINITE`] is reserved and never produced by arithmetic here; additions
//! saturate just below it.

use std::time::SystemTime;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

pub const HUNDREDS_OF_NANOS_IN_A_MICROSECOND: u64 = 10;
pub const HUNDREDS_OF_NANOS_IN_A_MILLISECOND: u64 = HUNDREDS_OF_NANOS_IN_A_MICROSECOND * 1000;
pub const HUNDREDS_OF_NANOS_IN_A_SECOND: u64 = HUNDREDS_OF_NANOS_IN_A_MILLISECOND * 1000;
pub const HUNDREDS_OF_NANOS_IN_A_MINUTE: u64 = HUNDREDS_OF_NANOS_IN_A_SECOND * 60;
pub const HUNDREDS_OF_NANOS_IN_AN_HOUR: u64 = HUNDREDS_OF_NANOS_IN_A_MINUTE * 60;
pub const HUNDREDS_OF_NANOS_IN_A_DAY: u64 = HUNDREDS_OF_NANOS_IN_AN_HOUR * 24;

/// Sentinel for "no deadline".
pub const INFINITE: u64 = u64::MAX;

// Instant and SystemTime frozen at (nearly) the same moment. Ticks are derived
// from Instant so they never go backwards when the wall clock is adjusted.
// The anchor is pushed back up to an hour so instants taken shortly before
// first use still convert.
static ANCHOR: Lazy<(Instant, SystemTime)> = Lazy::new(|| {
    let now = Instant::now();
    let now_sys = SystemTime::now();

    let anchor = (1..=3600)
        .rev()
        .find_map(|secs| now.checked_sub(Duration::from_secs(secs)))
        .unwrap_or(now);

    match now_sys.checked_sub(now - anchor) {
        Some(anchor_sys) => (anchor, anchor_sys),
        None => (now, now_sys),
    }
});

pub trait InstantExt {
    /// Convert an Instant to ticks since the Unix epoch.
    ///
    /// Instants more than an hour before the first use of the clock are
    /// clamped to the anchor.
    fn to_ticks(&self) -> u64;
}

impl InstantExt for Instant {
    fn to_ticks(&self) -> u64 {
        let (anchor, anchor_sys) = *ANCHOR;

        if *self < anchor {
            warn!("Instant is before the clock anchor, clamping");
        }

        let since_anchor = self.saturating_duration_since(anchor);
        let unix = (anchor_sys + since_anchor)
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();

        from_duration(unix)
    }
}

/// Current time in ticks.
pub fn now() -> u64 {
    Instant::now().to_ticks()
}

/// Duration as ticks, saturating below [`INFINITE`].
pub fn from_duration(d: Duration) -> u64 {
    let ticks = d.as_nanos() / 100;
    u64::try_from(ticks).unwrap_or(INFINITE - 1).min(INFINITE - 1)
}

/// Ticks as a Duration. [`INFINITE`] has no duration.
pub fn to_duration(ticks: u64) -> Option<Duration> {
    if ticks == INFINITE {
        return None;
    }
    Some(Duration::from_nanos(ticks.saturating_mul(100)))
}

/// Absolute deadline `timeout` from now. `None` means no deadline.
pub fn deadline(timeout: Option<Duration>) -> u64 {
    match timeout {
        Some(t) => now().saturating_add(from_duration(t)).min(INFINITE - 1),
        None => INFINITE,
    }
}

/// Time left until `deadline`, zero once it has passed.
pub fn remaining(deadline: u64) -> Option<Duration> {
    if deadline == INFINITE {
        return None;
    }
    to_duration(deadline.saturating_sub(now()))
}

/// Collapse ticks to whole seconds, the granularity of certificate times.
pub fn truncate_to_seconds(ticks: u64) -> u64 {
    ticks - ticks % HUNDREDS_OF_NANOS_IN_A_SECOND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_advance() {
        let a = now();
        std::thread::sleep(Duration::from_millis(2));
        let b = now();
        assert!(b > a);
        // After 2020-01-01.
        assert!(a > 1_577_836_800 * HUNDREDS_OF_NANOS_IN_A_SECOND);
    }

    #[test]
    fn earlier_instant_is_not_clamped() {
        let Some(earlier) = Instant::now().checked_sub(Duration::from_millis(500)) else {
            return;
        };
        let then = earlier.to_ticks();
        let n = now();
        assert!(n - then >= 500 * HUNDREDS_OF_NANOS_IN_A_MILLISECOND, "{} {}", n, then);
    }

    #[test]
    fn day_constant() {
        assert_eq!(HUNDREDS_OF_NANOS_IN_A_DAY, 864_000_000_000);
        assert_eq!(from_duration(Duration::from_secs(86_400)), HUNDREDS_OF_NANOS_IN_A_DAY);
    }

    #[test]
    fn infinite_is_reserved() {
        assert_eq!(deadline(None), INFINITE);
        assert_eq!(remaining(INFINITE), None);
        assert_ne!(from_duration(Duration::MAX), INFINITE);
        assert_ne!(deadline(Some(Duration::MAX)), INFINITE);
    }

    #[test]
    fn deadline_counts_down() {
        let d = deadline(Some(Duration::from_secs(60)));
        let left = remaining(d).unwrap();
        assert!(left <= Duration::from_secs(60));
        assert!(left > Duration::from_secs(50));

        let past = now() - HUNDREDS_OF_NANOS_IN_A_SECOND;
        assert_eq!(remaining(past), Some(Duration::ZERO));
    }

    #[test]
    fn truncation_drops_sub_second() {
        let t = 5 * HUNDREDS_OF_NANOS_IN_A_SECOND + 1234;
        assert_eq!(truncate_to_seconds(t), 5 * HUNDREDS_OF_NANOS_IN_A_SECOND);
    }
}
