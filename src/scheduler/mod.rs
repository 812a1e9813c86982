//! The scheduling policies of a server and the machinery they share.
//!
//! Every policy translates job arrival, completion and cancellation events
//! into operations on its resource pool's availability profile, and emits
//! future `TASK_START`/`TASK_COMPLETE` events back into the kernel. The
//! policies never over-commit: an allocation is always preceded by a
//! successful feasibility check on the profile.

pub mod aggressive;
pub(crate) mod backfill;
pub mod conservative;
pub mod default;
pub mod preemption;
pub mod queue;
pub mod reservation;
pub mod sort;

pub use aggressive::AggrBackfillScheduler;
pub use conservative::ConsBackfillScheduler;
pub use default::DefaultScheduler;
pub use preemption::PreemptionScheduler;
pub use reservation::ResConsBackfillScheduler;
pub use sort::SortAlgorithm;

use std::cmp::Ordering;

use crate::job::event::{WorkUnitEvent, WorkUnitEventType, WorkUnitListener};
use crate::job::job::Job;
use crate::job::reservation::Reservation;
use crate::job::{Status, WorkUnit};
use crate::kernel::{EventType, Payload, SimContext, SimEvent, SEND_NOW};
use crate::profile::range_list::RangeList;
use crate::server::attributes::ServerAttributes;
use crate::server::pool::ResourcePool;

/// Comparator used to order job queues.
pub type JobComparator = Box<dyn Fn(&Job, &Job) -> Ordering>;

/// The capability set every scheduling policy implements. A server routes
/// arrivals and cancellations to these methods and relays every other
/// event to [`process`](Scheduler::process).
pub trait Scheduler {
    /// The policy's name.
    fn name(&self) -> &str;

    /// Initialises the policy with the server's attributes.
    fn initialize(&mut self, attributes: ServerAttributes);

    /// The server attributes this policy schedules for.
    fn attributes(&self) -> &ServerAttributes;

    /// Registers a listener for work-unit events of this policy.
    fn add_listener(&mut self, listener: Box<dyn WorkUnitListener>);

    /// Handles an event the server did not route to a dedicated method,
    /// in particular the policy's self-addressed `TASK_START` and
    /// `TASK_COMPLETE` events.
    fn process(&mut self, ctx: &mut SimContext<'_>, event: SimEvent);

    /// Handles the arrival of a job.
    fn do_job_processing(&mut self, ctx: &mut SimContext<'_>, job: Job);

    /// Handles the completion of a job.
    fn do_job_completion(&mut self, ctx: &mut SimContext<'_>, job_id: u32);

    /// Handles the cancellation of a job.
    fn do_job_cancel(&mut self, ctx: &mut SimContext<'_>, job_id: u32);

    /// The reservation capabilities of this policy, if it has any.
    fn as_reservation_scheduler(&mut self) -> Option<&mut dyn ReservationScheduler> {
        None
    }
}

/// The additional capabilities of reservation-aware policies.
pub trait ReservationScheduler: Scheduler {
    /// Handles a reservation request.
    fn do_reservation_processing(&mut self, ctx: &mut SimContext<'_>, reservation: Reservation);

    /// Handles the completion of a reservation.
    fn do_reservation_completion(&mut self, ctx: &mut SimContext<'_>, reservation_id: u32);

    /// Handles the cancellation of a reservation.
    fn do_reservation_cancel(&mut self, ctx: &mut SimContext<'_>, reservation_id: u32);
}

/// The time at which a running job will vacate its resources: the end of
/// the window its current execution burst allocated.
pub(crate) fn remaining_finish_time(job: &Job, now: i64) -> i64 {
    let burst_start = job.current_activity().start_time();
    now + job.remaining_work() - (now - burst_start)
}

/// The state and helpers shared by all scheduling policies: the server
/// attributes, the registered listeners, and the allocation primitives.
pub struct SchedulerBase {
    name: String,
    attributes: Option<ServerAttributes>,
    listeners: Vec<Box<dyn WorkUnitListener>>,
}

impl SchedulerBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: None, listeners: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initialize(&mut self, attributes: ServerAttributes) {
        self.attributes = Some(attributes);
    }

    pub fn attributes(&self) -> &ServerAttributes {
        self.attributes.as_ref().expect("Scheduler has not been initialised")
    }

    pub fn pool(&self) -> &dyn ResourcePool {
        self.attributes().resource_pool()
    }

    pub fn pool_mut(&mut self) -> &mut dyn ResourcePool {
        self.attributes
            .as_mut()
            .expect("Scheduler has not been initialised")
            .resource_pool_mut()
    }

    pub fn add_listener(&mut self, listener: Box<dyn WorkUnitListener>) {
        self.listeners.push(listener);
    }

    /// Notifies the registered listeners of a status change.
    pub fn fire_status_change(
        &mut self,
        time: i64,
        unit_id: u32,
        previous: Status,
        current: Status,
    ) {
        if self.listeners.is_empty() {
            return;
        }
        let event = WorkUnitEvent {
            time,
            event_type: WorkUnitEventType::StatusChanged,
            unit_id,
            previous_status: Some(previous),
            current_status: current,
        };
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }

    /// Moves a job to `status` at the current time, firing listeners on
    /// success.
    pub fn set_job_status(&mut self, ctx: &SimContext<'_>, job: &mut Job, status: Status) {
        let previous = job.status();
        if job.set_status(status, ctx.time()) {
            self.fire_status_change(ctx.time(), job.id(), previous, status);
        } else {
            log::trace!("Job #{}: transition {} -> {} ignored", job.id(), previous, status);
        }
    }

    /// Moves a reservation to `status`, firing listeners on success.
    pub fn set_reservation_status(
        &mut self,
        ctx: &SimContext<'_>,
        reservation: &mut Reservation,
        status: Status,
    ) {
        let previous = reservation.status();
        if reservation.set_status(status, ctx.time()) {
            self.fire_status_change(ctx.time(), reservation.id(), previous, status);
        }
    }

    /// Tries to start a job right now.
    ///
    /// On success the job is `IN_EXECUTION`, its resources are allocated
    /// over `[now, now + remaining_work)` and a self-addressed
    /// `TASK_COMPLETE` is scheduled. On failure nothing is mutated.
    pub fn start_job(&mut self, ctx: &mut SimContext<'_>, job: &mut Job) -> bool {
        let now = ctx.time();
        let entry = self.pool().check_availability(job.num_resources(), now, job.remaining_work());
        let selected = match entry.and_then(|e| e.ranges().select_resources(job.num_resources())) {
            Some(selected) => selected,
            None => return false,
        };

        // a resume may add overhead to the remaining work, so the status
        // change comes before the allocation window is computed
        self.set_job_status(ctx, job, Status::InExecution);
        self.pool_mut().allocate_resources(&selected, now, now + job.remaining_work());
        ctx.send_to_self(job.remaining_work(), EventType::TaskComplete, Payload::WorkId(job.id()));
        job.set_resource_ranges(selected);

        log::trace!("Starting job #{} at {}", job.id(), now);
        true
    }

    /// Allocates resources to a job over a window starting in the future
    /// and schedules the self-addressed `TASK_START` for it. The job
    /// becomes `WAITING` and records its tentative start time.
    pub fn allocate_resources_to_job(
        &mut self,
        ctx: &mut SimContext<'_>,
        job: &mut Job,
        start_time: i64,
        selected: RangeList,
    ) {
        let now = ctx.time();
        self.pool_mut().allocate_resources(&selected, start_time, start_time + job.duration());
        ctx.send_to_self(start_time - now, EventType::TaskStart, Payload::WorkId(job.id()));
        self.set_job_status(ctx, job, Status::Waiting);
        job.set_resource_ranges(selected);
        job.set_start_time(start_time);
    }

    /// Sends a job back to its owner.
    pub fn send_job_to_owner(&mut self, ctx: &mut SimContext<'_>, job: Job) {
        match job.owner() {
            None => log::trace!("Job #{} does not have an owner.", job.id()),
            Some(owner) => {
                ctx.send(owner, SEND_NOW, EventType::ResultArrive, Payload::Job(Box::new(job)))
            }
        }
    }

    /// Marks a job as failed and returns it to its owner. Used when a
    /// request can never be served, e.g. it asks for more resources than
    /// the pool has.
    pub fn fail_job(&mut self, ctx: &mut SimContext<'_>, mut job: Job) {
        log::error!(
            "Job #{} requires {} resources, which the server cannot provide",
            job.id(),
            job.num_resources()
        );
        self.set_job_status(ctx, &mut job, Status::Failed);
        self.send_job_to_owner(ctx, job);
    }
}
