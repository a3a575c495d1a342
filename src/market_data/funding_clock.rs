// Funding settles every 8 hours at 00:00, 08:00 and 16:00 UTC.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const FUNDING_INTERVAL: Duration = Duration::from_secs(8 * 60 * 60);

/// First settlement boundary strictly after `now`.
pub fn next_funding_reset(now: SystemTime) -> SystemTime {
    let interval = FUNDING_INTERVAL.as_secs();
    // Clocks before the epoch settle at the epoch.
    let secs = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let next = (secs / interval + 1) * interval;
    UNIX_EPOCH + Duration::from_secs(next)
}

pub fn until_next_funding(now: SystemTime) -> Duration {
    next_funding_reset(now).duration_since(now).unwrap_or(Duration::ZERO)
}
