use std::fmt;

use crate::job::{Status, WorkUnit, WorkUnitBase};
use crate::kernel::entity::EntityId;
use crate::profile::range_list::RangeList;

/// An advance reservation: a request to hold a number of resources over a
/// fixed future window `[requested_start, requested_start + duration)`.
/// Once accepted, the reservation is immovable; jobs tagged with its id
/// draw their resources from the reserved ranges.
#[derive(Debug, Clone)]
pub struct Reservation {
    base: WorkUnitBase,
    requested_start: i64,
    ranges: Option<RangeList>,
}

impl Reservation {
    /// Creates a reservation request to start at `requested_start` for
    /// `duration` time units over `num_resources` resources.
    pub fn new(id: u32, requested_start: i64, duration: i64, num_resources: u32) -> Self {
        assert!(requested_start >= 0, "Invalid requested start time: {}", requested_start);
        Self {
            base: WorkUnitBase::new(id, duration, num_resources),
            requested_start,
            ranges: None,
        }
    }

    /// Creates a reservation with a priority.
    pub fn with_priority(
        id: u32,
        requested_start: i64,
        duration: i64,
        num_resources: u32,
        priority: i32,
    ) -> Self {
        let mut reservation = Self::new(id, requested_start, duration, num_resources);
        reservation.base.set_priority(priority);
        reservation
    }

    /// The start time requested by this reservation.
    pub fn requested_start(&self) -> i64 {
        self.requested_start
    }

    /// The end of the requested window.
    pub fn requested_finish(&self) -> i64 {
        self.requested_start + self.base.duration()
    }

    pub fn set_owner(&mut self, owner: EntityId) {
        self.base.set_owner(owner);
    }

    pub fn set_submit_time(&mut self, time: i64) {
        self.base.set_submit_time(time);
    }

    /// Records the kernel serial of the submission event.
    pub fn set_submission_serial(&mut self, serial: u64) {
        self.base.set_submission_serial(serial);
    }

    pub fn set_status(&mut self, status: Status, time: i64) -> bool {
        self.base.set_status(status, time)
    }

    /// The ranges reserved for this request, once granted.
    pub fn resource_ranges(&self) -> Option<&RangeList> {
        self.ranges.as_ref()
    }

    /// Sets the reserved ranges. Returns `false` if ranges were already
    /// assigned.
    pub fn set_resource_ranges(&mut self, ranges: RangeList) -> bool {
        if self.ranges.is_some() {
            return false;
        }
        self.ranges = Some(ranges);
        true
    }
}

impl WorkUnit for Reservation {
    fn id(&self) -> u32 {
        self.base.id()
    }

    fn owner(&self) -> Option<EntityId> {
        self.base.owner()
    }

    fn status(&self) -> Status {
        self.base.status()
    }

    fn submit_time(&self) -> i64 {
        self.base.submit_time()
    }

    fn start_time(&self) -> i64 {
        self.base.start_time()
    }

    fn finish_time(&self) -> i64 {
        self.base.finish_time()
    }

    fn duration(&self) -> i64 {
        self.base.duration()
    }

    fn priority(&self) -> i32 {
        self.base.priority()
    }

    fn num_resources(&self) -> u32 {
        self.base.num_resources()
    }

    fn submission_serial(&self) -> u64 {
        self.base.submission_serial()
    }
}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reservation{{id={}, requested_start={}, duration={}, resources={}, status={}}}",
            self.id(),
            self.requested_start,
            self.duration(),
            self.num_resources(),
            self.status()
        )
    }
}
