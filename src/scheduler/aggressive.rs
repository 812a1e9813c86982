use uuid::Uuid;

use crate::job::job::Job;
use crate::job::{Status, WorkUnit};
use crate::kernel::{EventType, SimContext, SimEvent};
use crate::scheduler::backfill::BackfillState;
use crate::scheduler::{remaining_finish_time, JobComparator, Scheduler, SchedulerBase};
use crate::server::attributes::ServerAttributes;

/// Aggressive (EASY) backfilling, after Mu'alem and Feitelson's work on
/// scheduling the IBM SP2.
///
/// At most one waiting job, the *pivot*, holds a future slot in the
/// profile. Because that slot is allocated in the main profile, the
/// immediate-start feasibility check can only succeed for a later job if
/// its execution leaves the pivot's reserved ranges intact; the pivot's
/// recorded start time is the barrier no backfilled job may cross. All
/// other waiting jobs hold no allocation at all.
pub struct AggrBackfillScheduler {
    base: SchedulerBase,
    state: BackfillState,
    pivot: Option<u32>,
}

impl AggrBackfillScheduler {
    pub fn new() -> Self {
        Self::with_name(format!("AggrBackfillScheduler-{}", Uuid::new_v4()))
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self { base: SchedulerBase::new(name), state: BackfillState::new(), pivot: None }
    }

    /// Sets the comparator used to order the waiting queue.
    pub fn set_sorting_comparator(&mut self, comparator: JobComparator) {
        self.state.comparator = Some(comparator);
    }

    /// The id of the current pivot, if any.
    pub fn pivot(&self) -> Option<u32> {
        self.pivot
    }

    /// Makes a waiting job the pivot: reserves the earliest feasible
    /// future slot for it.
    ///
    /// # Returns
    /// `false` if no feasible slot exists (the job is marked `FAILED`).
    fn make_pivot(&mut self, ctx: &mut SimContext<'_>, job: &mut Job) -> bool {
        if self.state.enqueue_job(&mut self.base, ctx, job) {
            self.pivot = Some(job.id());
            true
        } else {
            false
        }
    }

    /// Releases the pivot's reserved slot and cancels its pending events.
    fn drop_pivot_reservation(&mut self, ctx: &mut SimContext<'_>, job: &Job) {
        let start = job.start_time();
        let finish = start + job.duration();
        if let Some(ranges) = job.resource_ranges().cloned() {
            self.base.pool_mut().release_resources(start.max(ctx.time()), finish, &ranges);
        }
        self.state.cancel_job_events(ctx, &[job.id()]);
        self.pivot = None;
    }

    /// Re-evaluates the waiting queue: the pivot's reservation is
    /// refreshed first (it can only move earlier), then the remaining
    /// jobs are tried for an immediate start, with the first one that
    /// does not fit becoming the pivot if the position is vacant.
    fn reschedule(&mut self, ctx: &mut SimContext<'_>) {
        self.state.sort_waiting();

        if let Some(pivot_id) = self.pivot {
            match self.state.waiting.position(pivot_id) {
                Some(index) => {
                    let mut job = self.state.waiting.take(index);
                    self.drop_pivot_reservation(ctx, &job);
                    if self.base.start_job(ctx, &mut job) {
                        self.state.running.add(job);
                    } else if self.make_pivot(ctx, &mut job) {
                        self.state.waiting.insert(index, job);
                    } else {
                        self.base.send_job_to_owner(ctx, job);
                    }
                }
                None => {
                    log::error!("Pivot job #{} is no longer waiting", pivot_id);
                    self.pivot = None;
                }
            }
        }

        let mut index = 0;
        while index < self.state.waiting.len() {
            if Some(self.state.waiting.at(index).id()) == self.pivot {
                index += 1;
                continue;
            }
            let mut job = self.state.waiting.take(index);
            if self.base.start_job(ctx, &mut job) {
                self.state.running.add(job);
            } else if self.pivot.is_none() {
                if self.make_pivot(ctx, &mut job) {
                    self.state.waiting.insert(index, job);
                    index += 1;
                } else {
                    self.base.send_job_to_owner(ctx, job);
                }
            } else {
                self.state.waiting.insert(index, job);
                index += 1;
            }
        }
    }
}

impl Default for AggrBackfillScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for AggrBackfillScheduler {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn initialize(&mut self, attributes: ServerAttributes) {
        self.base.initialize(attributes);
    }

    fn attributes(&self) -> &ServerAttributes {
        self.base.attributes()
    }

    fn add_listener(&mut self, listener: Box<dyn crate::job::event::WorkUnitListener>) {
        self.base.add_listener(listener);
    }

    fn process(&mut self, ctx: &mut SimContext<'_>, event: SimEvent) {
        match event.event_type() {
            EventType::TaskStart => match event.payload().work_id() {
                Some(id) => {
                    // a start signal can only concern the pivot
                    if self.state.begin_execution(&mut self.base, ctx, id) {
                        if self.pivot == Some(id) {
                            self.pivot = None;
                        }
                        self.reschedule(ctx);
                    }
                }
                None => log::error!("Invalid job received for start."),
            },
            EventType::TaskComplete => match event.payload().work_id() {
                Some(id) => self.do_job_completion(ctx, id),
                None => log::error!("Invalid job received for completion."),
            },
            other => log::warn!("Unknown event type: {:?}", other),
        }
    }

    fn do_job_processing(&mut self, ctx: &mut SimContext<'_>, mut job: Job) {
        if job.num_resources() > self.base.pool().capacity() {
            self.base.fail_job(ctx, job);
            return;
        }

        if self.base.start_job(ctx, &mut job) {
            self.state.running.add(job);
        } else if self.pivot.is_none() {
            if self.make_pivot(ctx, &mut job) {
                self.state.waiting.add(job);
            } else {
                self.base.send_job_to_owner(ctx, job);
            }
        } else {
            self.base.set_job_status(ctx, &mut job, Status::Waiting);
            self.state.waiting.add(job);
            log::trace!("There are {} jobs in the waiting queue.", self.state.waiting.len());
        }
    }

    fn do_job_completion(&mut self, ctx: &mut SimContext<'_>, job_id: u32) {
        log::trace!("Completing job #{} at {}", job_id, ctx.time());
        let mut job = match self.state.running.remove(job_id) {
            Some(job) => job,
            None => {
                log::error!("Job #{} not found in the running queue", job_id);
                return;
            }
        };
        self.base.set_job_status(ctx, &mut job, Status::Complete);
        self.base.send_job_to_owner(ctx, job);
        self.reschedule(ctx);
    }

    fn do_job_cancel(&mut self, ctx: &mut SimContext<'_>, job_id: u32) {
        let now = ctx.time();

        if let Some(mut job) = self.state.running.remove(job_id) {
            let finish = remaining_finish_time(&job, now);
            if let Some(ranges) = job.resource_ranges().cloned() {
                self.base.pool_mut().release_resources(now, finish, &ranges);
            }
            self.state.cancel_job_events(ctx, &[job_id]);
            self.base.set_job_status(ctx, &mut job, Status::Cancelled);
            self.base.send_job_to_owner(ctx, job);
            self.reschedule(ctx);
        } else if let Some(mut job) = self.state.waiting.remove(job_id) {
            if self.pivot == Some(job_id) {
                self.drop_pivot_reservation(ctx, &job);
            }
            self.base.set_job_status(ctx, &mut job, Status::Cancelled);
            self.base.send_job_to_owner(ctx, job);
            self.reschedule(ctx);
        } else {
            log::error!("Job #{} could not be found for cancellation", job_id);
        }
    }
}
