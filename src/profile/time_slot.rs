use std::fmt;

use crate::profile::range_list::RangeList;

/// A free fragment of the scheduling queue: a window `[start, finish)`
/// during which a set of resource ranges is continuously available.
///
/// Time slots can be used by policies that perform best-fit, next-fit or
/// worst-fit slot selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    start_time: i64,
    finish_time: i64,
    ranges: RangeList,
}

impl TimeSlot {
    /// Creates a new time slot.
    pub fn new(start_time: i64, finish_time: i64, ranges: RangeList) -> Self {
        Self { start_time, finish_time, ranges }
    }

    /// The start time of this slot.
    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    /// The finish time of this slot.
    pub fn finish_time(&self) -> i64 {
        self.finish_time
    }

    /// The duration of this slot.
    pub fn duration(&self) -> i64 {
        self.finish_time - self.start_time
    }

    /// The resource ranges available during this slot.
    pub fn ranges(&self) -> &RangeList {
        &self.ranges
    }

    /// The number of resources available during this slot.
    pub fn num_resources(&self) -> u32 {
        self.ranges.num_items()
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TimeSlot{{start={}, finish={}, ranges={}}}",
            self.start_time, self.finish_time, self.ranges
        )
    }
}
