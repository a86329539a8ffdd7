use std::time::{Duration, Instant};

/// Whole milliseconds left until `deadline`, rounded up so that an unfinished
/// wait never reports zero.
pub fn millis_until(deadline: Instant, now: Instant) -> i32 {
    let remaining = deadline.saturating_duration_since(now);
    let millis = remaining.as_micros().div_ceil(1000);
    i32::try_from(millis).unwrap_or(i32::MAX)
}

/// `now + millis`, or `None` if the instant is not representable.
pub fn deadline_after(now: Instant, millis: u64) -> Option<Instant> {
    now.checked_add(Duration::from_millis(millis))
}
