//! The reservation record written alongside a reserved queue entry (§4.8).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// `{Timestamp}`: the moment an entry was reserved, for the stale-reservation sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Seconds since the Unix epoch.
    reserved_at_secs: u64,
}

impl Reservation {
    /// A reservation stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        let reserved_at_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        Self { reserved_at_secs }
    }

    /// Build a reservation stamped at an arbitrary time, for sweeper tests elsewhere in this crate.
    #[must_use]
    pub(crate) const fn at(reserved_at_secs: u64) -> Self {
        Self { reserved_at_secs }
    }

    /// Whether this reservation is older than `max_age`, measured against the current time.
    #[must_use]
    pub fn is_stale(&self, max_age: Duration) -> bool {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        let age_secs = now_secs.saturating_sub(self.reserved_at_secs);
        age_secs > max_age.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_reservation_is_not_stale() {
        let reservation = Reservation::now();
        assert!(!reservation.is_stale(Duration::from_secs(60)));
    }

    #[test]
    fn a_backdated_reservation_is_stale() {
        let reservation = Reservation { reserved_at_secs: 0 };
        assert!(reservation.is_stale(Duration::from_secs(60)));
    }
}
