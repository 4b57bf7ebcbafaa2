//! Piecewise-constant configuration schedules.
//!
//! A schedule is an ordered, non-overlapping sequence of half-open
//! segments, each holding one constant value: a numeric rate for the basal
//! schedule, a boolean for the automation history. Callers supply
//! schedules already windowed to the batch's time range.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One constant-valued span of a schedule, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSegment<T> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: T,
}

/// A basal-rate schedule entry (units/hour).
pub type RateSegment = ScheduleSegment<f64>;

/// An automation-state history entry (closed loop = `true`).
pub type AutomationSegment = ScheduleSegment<bool>;

impl<T> ScheduleSegment<T> {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>, value: T) -> Self {
        Self { start, end, value }
    }

    /// Half-open overlap test against `[start, end)`.
    ///
    /// A zero-duration query span `[t, t)` is treated as the point `t`, so
    /// point events still find the segment in force at their timestamp.
    #[must_use]
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if start >= end {
            return self.start <= start && start < self.end;
        }
        self.start < end && start < self.end
    }
}

/// Iterates the segments whose spans intersect `[start, end)`, in schedule
/// order.
pub(crate) fn overlapping<T>(
    segments: &[ScheduleSegment<T>],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> impl Iterator<Item = &ScheduleSegment<T>> {
    segments.iter().filter(move |s| s.intersects(start, end))
}
