// libs/shared/models/src/interval.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time interval `[start, end)`.
///
/// Every scheduling decision in the system reduces to [`TimeWindow::overlaps`]:
/// an interval ending exactly where another begins does not overlap it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Returns `None` unless `end > start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if end > start {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// `None` when `duration` is not positive or the end overflows.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Option<Self> {
        Self::new(start, start.checked_add_signed(duration)?)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// `s1 < e2 AND s2 < e1`
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when `other` lies fully inside `self`.
    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}
