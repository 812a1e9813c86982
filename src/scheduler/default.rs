use uuid::Uuid;

use crate::job::job::Job;
use crate::job::{Status, WorkUnit};
use crate::kernel::{EventType, SimContext, SimEvent};
use crate::predicate;
use crate::scheduler::queue::JobQueue;
use crate::scheduler::{remaining_finish_time, JobComparator, Scheduler, SchedulerBase};
use crate::server::attributes::ServerAttributes;

/// A simple scheduler whose waiting queue can be ordered in different
/// ways. Without a sorting comparator the behaviour is FIFO: jobs start
/// immediately when resources are free, otherwise they wait and are
/// retried from the head of the queue whenever a job completes or is
/// cancelled.
pub struct DefaultScheduler {
    base: SchedulerBase,
    waiting: JobQueue,
    running: JobQueue,
    comparator: Option<JobComparator>,
}

impl DefaultScheduler {
    pub fn new() -> Self {
        Self::with_name(format!("DefaultScheduler-{}", Uuid::new_v4()))
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            base: SchedulerBase::new(name),
            waiting: JobQueue::new(),
            running: JobQueue::new(),
            comparator: None,
        }
    }

    /// Sets the comparator used to sort the waiting queue.
    pub fn set_sorting_comparator(&mut self, comparator: JobComparator) {
        self.comparator = Some(comparator);
    }

    /// Attempts to start jobs waiting in the queue, stopping at the first
    /// job that does not fit.
    fn start_queued_jobs(&mut self, ctx: &mut SimContext<'_>) {
        if let Some(comparator) = &self.comparator {
            self.waiting.sort_by(comparator.as_ref());
        }
        while !self.waiting.is_empty() {
            let mut job = self.waiting.take(0);
            if self.base.start_job(ctx, &mut job) {
                self.running.add(job);
            } else {
                self.waiting.insert(0, job);
                break;
            }
        }
    }
}

impl Default for DefaultScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for DefaultScheduler {
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
            self.running.add(job);
        } else {
            log::trace!("Adding job #{} to waiting queue at time {}", job.id(), ctx.time());
            self.base.set_job_status(ctx, &mut job, Status::Waiting);
            self.waiting.add(job);
            log::trace!("There are {} jobs in the waiting queue.", self.waiting.len());
        }
    }

    fn do_job_completion(&mut self, ctx: &mut SimContext<'_>, job_id: u32) {
        log::trace!("Completing job #{} at {}", job_id, ctx.time());
        let mut job = match self.running.remove(job_id) {
            Some(job) => job,
            None => {
                log::error!("Job #{} not found in the running queue", job_id);
                return;
            }
        };
        self.base.set_job_status(ctx, &mut job, Status::Complete);
        self.start_queued_jobs(ctx);
        self.base.send_job_to_owner(ctx, job);
    }

    fn do_job_cancel(&mut self, ctx: &mut SimContext<'_>, job_id: u32) {
        log::trace!("Cancelling job #{}", job_id);

        if let Some(mut job) = self.running.remove(job_id) {
            let now = ctx.time();
            let finish = remaining_finish_time(&job, now);
            if let Some(ranges) = job.resource_ranges().cloned() {
                self.base.pool_mut().release_resources(now, finish, &ranges);
            }
            ctx.cancel_future_events(predicate::completion_of(job_id));
            self.base.set_job_status(ctx, &mut job, Status::Cancelled);
            // cancelling a running job freed a slot
            self.start_queued_jobs(ctx);
            self.base.send_job_to_owner(ctx, job);
        } else if let Some(mut job) = self.waiting.remove(job_id) {
            self.base.set_job_status(ctx, &mut job, Status::Cancelled);
            self.base.send_job_to_owner(ctx, job);
        } else {
            log::error!("Job #{} could not be found for cancellation", job_id);
        }
    }
}
