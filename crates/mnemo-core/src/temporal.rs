//! Timestamps and validity windows
//!
//! Millisecond-precision UTC timestamps for record creation times and
//! event ordering, plus the optional validity window carried by relations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Millisecond-precision UTC timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp for the current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create from a DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Create from milliseconds since Unix epoch
    pub fn from_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now))
    }

    /// Get as DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Get as milliseconds since Unix epoch
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

/// Optional validity window for a relation
///
/// Either bound may be open. An unbounded window is represented by the
/// relation carrying no window at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// Start of validity (inclusive); None = valid since the beginning
    pub valid_from: Option<Timestamp>,

    /// End of validity (exclusive); None = still valid
    pub valid_until: Option<Timestamp>,
}

impl ValidityWindow {
    /// Create a window open on both ends
    pub fn open() -> Self {
        Self {
            valid_from: None,
            valid_until: None,
        }
    }

    /// Create a window starting now, open-ended
    pub fn from_now() -> Self {
        Self {
            valid_from: Some(Timestamp::now()),
            valid_until: None,
        }
    }

    /// Check whether the window contains the given instant
    pub fn contains(&self, at: Timestamp) -> bool {
        let after_start = self.valid_from.map_or(true, |from| at >= from);
        let before_end = self.valid_until.map_or(true, |until| at < until);
        after_start && before_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_millis_roundtrip() {
        let ts = Timestamp::from_millis(1_700_000_000_000);
        assert_eq!(ts.as_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_timestamp_ordering() {
        let earlier = Timestamp::from_millis(1_000);
        let later = Timestamp::from_millis(2_000);
        assert!(earlier < later);
    }

    #[test]
    fn test_validity_window_contains() {
        let window = ValidityWindow {
            valid_from: Some(Timestamp::from_millis(1_000)),
            valid_until: Some(Timestamp::from_millis(2_000)),
        };

        assert!(window.contains(Timestamp::from_millis(1_000)));
        assert!(window.contains(Timestamp::from_millis(1_500)));
        assert!(!window.contains(Timestamp::from_millis(2_000)));
        assert!(!window.contains(Timestamp::from_millis(500)));
    }

    #[test]
    fn test_open_window_contains_everything() {
        let window = ValidityWindow::open();
        assert!(window.contains(Timestamp::from_millis(0)));
        assert!(window.contains(Timestamp::now()));
    }
}
