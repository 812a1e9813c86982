//! Work units: the things scheduled on resources. A work unit is a job or
//! an advance reservation; both carry an identity, timing information, a
//! resource requirement and a status driven by a fixed transition table.

pub mod event;
pub mod job;
pub mod reservation;

pub use event::{WorkUnitEvent, WorkUnitEventType, WorkUnitListener};
pub use job::{FixedResumeOverhead, Job, JobActivity, JobResumeOverhead};
pub use reservation::Reservation;

use std::fmt;

use crate::kernel::entity::EntityId;

/// Marker for times that have not been recorded yet.
pub const TIME_NOT_SET: i64 = -1;

/// The lifecycle status of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Default status of a freshly created unit.
    Unknown,
    /// The unit arrived at a server but the scheduler has not decided yet.
    Enqueued,
    /// The unit waits in a queue, possibly with a future slot allocated.
    Waiting,
    /// Execution has been interrupted by a preemption.
    Paused,
    /// The unit is running.
    InExecution,
    /// The unit finished normally.
    Complete,
    /// The unit was cancelled.
    Cancelled,
    /// The unit could not be served.
    Failed,
}

impl Status {
    /// Checks whether a unit in status `from` may move to `self`.
    pub fn accepts_from(self, from: Status) -> bool {
        use Status::*;
        match self {
            Unknown => false,
            Enqueued => matches!(from, Unknown),
            Waiting => matches!(from, Enqueued),
            InExecution => matches!(from, Enqueued | Waiting | Paused),
            Paused => matches!(from, InExecution),
            Complete => matches!(from, InExecution | Paused),
            Cancelled | Failed => matches!(from, Enqueued | Waiting | InExecution | Paused),
        }
    }

    /// Checks whether this is a final status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Complete | Status::Cancelled | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Unknown => "UNKNOWN",
            Status::Enqueued => "ENQUEUED",
            Status::Waiting => "WAITING",
            Status::Paused => "PAUSED",
            Status::InExecution => "IN_EXECUTION",
            Status::Complete => "COMPLETE",
            Status::Cancelled => "CANCELLED",
            Status::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Read access to the features shared by jobs and reservations.
pub trait WorkUnit {
    /// The unit's identity, unique within a simulation.
    fn id(&self) -> u32;

    /// The entity that created the unit and receives its results.
    fn owner(&self) -> Option<EntityId>;

    /// The current status.
    fn status(&self) -> Status;

    /// The time the unit was submitted, or [`TIME_NOT_SET`].
    fn submit_time(&self) -> i64;

    /// The time the unit started executing, or [`TIME_NOT_SET`].
    fn start_time(&self) -> i64;

    /// The time the unit finished, or [`TIME_NOT_SET`].
    fn finish_time(&self) -> i64;

    /// The unit's (user-estimated) duration.
    fn duration(&self) -> i64;

    /// The unit's priority; lower values mean higher priority.
    fn priority(&self) -> i32;

    /// The number of resources the unit requires.
    fn num_resources(&self) -> u32;

    /// The kernel-assigned serial of the event that submitted this unit.
    /// Queue orderings use it as their final tie-breaker, so units that
    /// arrive in the same tick keep their submission order regardless of
    /// the ids their creator picked.
    fn submission_serial(&self) -> u64;
}

/// The fields and bookkeeping common to jobs and reservations.
#[derive(Debug, Clone)]
pub struct WorkUnitBase {
    id: u32,
    owner: Option<EntityId>,
    submit_time: i64,
    start_time: i64,
    finish_time: i64,
    duration: i64,
    priority: i32,
    status: Status,
    num_resources: u32,
    submission_serial: u64,
}

impl WorkUnitBase {
    pub fn new(id: u32, duration: i64, num_resources: u32) -> Self {
        assert!(duration > 0, "Duration must be > 0");
        assert!(num_resources > 0, "Number of resources must be > 0");
        Self {
            id,
            owner: None,
            submit_time: TIME_NOT_SET,
            start_time: TIME_NOT_SET,
            finish_time: TIME_NOT_SET,
            duration,
            priority: 0,
            status: Status::Unknown,
            num_resources,
            submission_serial: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: EntityId) {
        self.owner = Some(owner);
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn submit_time(&self) -> i64 {
        self.submit_time
    }

    /// Records the submission time and moves the unit to `Enqueued`.
    pub fn set_submit_time(&mut self, time: i64) {
        assert!(time >= 0, "Invalid submission time: {}", time);
        self.submit_time = time;
        self.set_status(Status::Enqueued, time);
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn set_start_time(&mut self, time: i64) {
        self.start_time = time;
    }

    pub fn finish_time(&self) -> i64 {
        self.finish_time
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Sets the unit's priority. The lower the number, the higher the
    /// priority.
    pub fn set_priority(&mut self, priority: i32) {
        assert!(priority >= 0, "Priority must be >= 0");
        self.priority = priority;
    }

    pub fn num_resources(&self) -> u32 {
        self.num_resources
    }

    pub fn submission_serial(&self) -> u64 {
        self.submission_serial
    }

    /// Records the kernel serial of the submission event. Stamped by the
    /// server when the unit arrives, together with the submission time.
    pub fn set_submission_serial(&mut self, serial: u64) {
        self.submission_serial = serial;
    }

    /// Moves the unit to `status` at the given time, if the transition
    /// table allows it. Entering `InExecution` from anything but `Paused`
    /// records the start time; entering a terminal status from
    /// `InExecution` or `Paused` records the finish time.
    ///
    /// # Returns
    /// `false` if the transition is not allowed; the unit is unchanged.
    pub fn set_status(&mut self, status: Status, time: i64) -> bool {
        if !status.accepts_from(self.status) {
            return false;
        }
        match status {
            Status::InExecution => {
                if self.status != Status::Paused {
                    self.start_time = time;
                }
            }
            Status::Complete | Status::Cancelled | Status::Failed => {
                if matches!(self.status, Status::InExecution | Status::Paused) {
                    self.finish_time = time;
                }
            }
            _ => {}
        }
        self.status = status;
        true
    }

    /// The time spent between submission and completion, or
    /// [`TIME_NOT_SET`] if the unit has not finished.
    pub fn response_time(&self) -> i64 {
        if self.finish_time == TIME_NOT_SET {
            TIME_NOT_SET
        } else {
            self.finish_time - self.submit_time
        }
    }

    /// The time spent waiting in queue before the first start, or
    /// [`TIME_NOT_SET`] if the unit has not started.
    pub fn wait_time(&self) -> i64 {
        if self.start_time == TIME_NOT_SET {
            TIME_NOT_SET
        } else {
            self.start_time - self.submit_time
        }
    }
}
