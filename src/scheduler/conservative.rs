use uuid::Uuid;

use crate::job::job::Job;
use crate::job::{Status, WorkUnit};
use crate::kernel::{EventType, SimContext, SimEvent};
use crate::scheduler::backfill::BackfillState;
use crate::scheduler::{remaining_finish_time, JobComparator, Scheduler, SchedulerBase};
use crate::server::attributes::ServerAttributes;

/// Conservative backfilling, after Feitelson and Mu'alem Weil's work on
/// scheduling the IBM SP2.
///
/// Every arriving job that cannot start immediately receives a tentative
/// slot at the earliest feasible future time, so a job can jump ahead in
/// the queue only if doing so delays no other waiting job. Cancelling a
/// job compresses the schedule: the slots of all jobs placed after the
/// cancelled one are released and re-assigned, which can only move their
/// start times earlier.
pub struct ConsBackfillScheduler {
    pub(crate) base: SchedulerBase,
    pub(crate) state: BackfillState,
}

impl ConsBackfillScheduler {
    pub fn new() -> Self {
        Self::with_name(format!("ConsBackfillScheduler-{}", Uuid::new_v4()))
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self { base: SchedulerBase::new(name), state: BackfillState::new() }
    }

    /// Sets the comparator used to order the waiting queue when the
    /// schedule is compressed after a cancellation.
    pub fn set_sorting_comparator(&mut self, comparator: JobComparator) {
        self.state.comparator = Some(comparator);
    }

    /// Cancels a job, returns its slot to the pool and compresses the
    /// schedule from the freed point onwards.
    pub(crate) fn cancel_and_compress(&mut self, ctx: &mut SimContext<'_>, job_id: u32) -> bool {
        let now = ctx.time();

        if let Some(mut job) = self.state.running.remove(job_id) {
            let finish = remaining_finish_time(&job, now);
            if let Some(ranges) = job.resource_ranges().cloned() {
                self.base.pool_mut().release_resources(now, finish, &ranges);
            }
            let mut affected = self.state.compress_schedule(&mut self.base, now);
            affected.push(job_id);
            self.state.cancel_job_events(ctx, &affected);
            self.base.set_job_status(ctx, &mut job, Status::Cancelled);
            self.base.send_job_to_owner(ctx, job);
            self.state.reschedule_jobs(&mut self.base, ctx, &affected);
            return true;
        }

        if let Some(mut job) = self.state.waiting.remove(job_id) {
            // the tentative slot lies entirely in the future
            let start = job.start_time().max(now);
            let finish = job.start_time() + job.duration();
            if let Some(ranges) = job.resource_ranges().cloned() {
                self.base.pool_mut().release_resources(start, finish, &ranges);
            }
            let mut affected = self.state.compress_schedule(&mut self.base, start);
            affected.push(job_id);
            self.state.cancel_job_events(ctx, &affected);
            self.base.set_job_status(ctx, &mut job, Status::Cancelled);
            self.base.send_job_to_owner(ctx, job);
            self.state.reschedule_jobs(&mut self.base, ctx, &affected);
            return true;
        }

        false
    }
}

impl Default for ConsBackfillScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ConsBackfillScheduler {
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
                    self.state.begin_execution(&mut self.base, ctx, id);
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
        } else if self.state.enqueue_job(&mut self.base, ctx, &mut job) {
            self.state.waiting.add(job);
            log::trace!("There are {} jobs in the waiting queue.", self.state.waiting.len());
        } else {
            self.base.send_job_to_owner(ctx, job);
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
    }

    fn do_job_cancel(&mut self, ctx: &mut SimContext<'_>, job_id: u32) {
        if !self.cancel_and_compress(ctx, job_id) {
            log::error!("Job #{} could not be found for cancellation", job_id);
        }
    }
}
