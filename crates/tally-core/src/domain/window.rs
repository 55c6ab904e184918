use crate::domain::UtcDateTime;
use crate::ValidationError;

/// Policy for records that carry no timestamp at all.
///
/// A missing timestamp can never fail an inclusive bound comparison, so the
/// choice between keeping and dropping such records is made explicit here
/// instead of varying per record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingTimestampPolicy {
    /// Treat the record as in-range; downstream normalization decides whether
    /// a concrete timestamp is required to build the event.
    #[default]
    Include,
    /// Drop the record before normalization.
    Drop,
}

/// Inclusive `[start, end]` timestamp window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: UtcDateTime,
    end: UtcDateTime,
}

impl TimeWindow {
    pub fn new(start: UtcDateTime, end: UtcDateTime) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedWindow);
        }
        Ok(Self { start, end })
    }

    pub const fn start(&self) -> UtcDateTime {
        self.start
    }

    pub const fn end(&self) -> UtcDateTime {
        self.end
    }

    /// Boundary-equal timestamps are inside the window.
    pub fn contains(&self, timestamp: UtcDateTime) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Window check for an optional record timestamp under the given policy.
    pub fn admits(
        &self,
        timestamp: Option<UtcDateTime>,
        policy: MissingTimestampPolicy,
    ) -> bool {
        match timestamp {
            Some(timestamp) => self.contains(timestamp),
            None => matches!(policy, MissingTimestampPolicy::Include),
        }
    }
}
