use uuid::Uuid;

use crate::job::job::{Job, JobResumeOverhead};
use crate::job::{Status, WorkUnit};
use crate::kernel::{EventType, SimContext, SimEvent};
use crate::predicate;
use crate::scheduler::queue::JobQueue;
use crate::scheduler::{remaining_finish_time, JobComparator, Scheduler, SchedulerBase};
use crate::server::attributes::ServerAttributes;

/// A scheduler with preemption. When an arriving job cannot start and a
/// running job with strictly lower ordering priority exists, the running
/// job is paused, its remaining slot is returned to the pool, and the
/// arrival takes its place. Paused jobs rejoin the waiting queue and may
/// resume later, optionally paying a configured resume overhead.
pub struct PreemptionScheduler {
    base: SchedulerBase,
    waiting: JobQueue,
    running: JobQueue,
    comparator: Option<JobComparator>,
    resume_overhead: Option<Box<dyn JobResumeOverhead>>,
}

impl PreemptionScheduler {
    pub fn new() -> Self {
        Self::with_name(format!("PreemptionScheduler-{}", Uuid::new_v4()))
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            base: SchedulerBase::new(name),
            waiting: JobQueue::new(),
            running: JobQueue::new(),
            comparator: None,
            resume_overhead: None,
        }
    }

    /// Sets the comparator used to sort the queues. Preemption only takes
    /// place when a comparator is configured.
    pub fn set_sorting_comparator(&mut self, comparator: JobComparator) {
        self.comparator = Some(comparator);
    }

    /// Sets the policy that computes the overhead jobs pay on resume.
    pub fn set_resume_overhead(&mut self, overhead: Box<dyn JobResumeOverhead>) {
        self.resume_overhead = Some(overhead);
    }

    /// Picks the running job to preempt in favour of `job`: the last job
    /// in comparator order that still has work left and sorts strictly
    /// after the arriving job.
    fn find_job_to_preempt(&mut self, job: &Job, now: i64) -> Option<u32> {
        let comparator = self.comparator.as_ref()?;
        self.running.sort_by(comparator.as_ref());

        for victim in self.running.iter().rev() {
            let burst_start = victim.current_activity().start_time();
            if now - burst_start >= victim.remaining_work() {
                // already complete; its completion event is due shortly
                continue;
            }
            if comparator(job, victim) == std::cmp::Ordering::Less {
                return Some(victim.id());
            }
        }
        None
    }

    fn preempt(&mut self, ctx: &mut SimContext<'_>, victim_id: u32) {
        let mut victim = self.running.remove(victim_id).expect("Victim left the running queue");
        log::trace!("Preempting job #{} at time {}", victim_id, ctx.time());

        // pausing debits the elapsed slice from the remaining work
        self.base.set_job_status(ctx, &mut victim, Status::Paused);

        let now = ctx.time();
        if let Some(ranges) = victim.resource_ranges().cloned() {
            self.base.pool_mut().release_resources(now, now + victim.remaining_work(), &ranges);
        }
        ctx.cancel_future_events(predicate::completion_of(victim_id));

        log::trace!("Preempted job: {}", victim);
        self.waiting.add(victim);
    }

    /// Tries to restart a paused job, charging the configured overhead.
    fn resume_job(&mut self, ctx: &mut SimContext<'_>, job: &mut Job) -> bool {
        let now = ctx.time();
        if self
            .base
            .pool()
            .check_availability(job.num_resources(), now, job.remaining_work())
            .is_none()
        {
            return false;
        }
        let overhead = self
            .resume_overhead
            .as_ref()
            .map(|policy| policy.resume_overhead(job))
            .unwrap_or(0);
        job.set_next_resume_overhead(overhead);
        let started = self.base.start_job(ctx, job);
        if started {
            log::trace!("Resuming job #{} at {}", job.id(), now);
        }
        started
    }

    /// Starts waiting and paused jobs until one does not fit.
    fn start_waiting_jobs(&mut self, ctx: &mut SimContext<'_>) {
        if let Some(comparator) = &self.comparator {
            self.waiting.sort_by(comparator.as_ref());
        }
        while !self.waiting.is_empty() {
            let mut job = self.waiting.take(0);
            let started = if job.status() == Status::Paused {
                self.resume_job(ctx, &mut job)
            } else {
                self.base.start_job(ctx, &mut job)
            };
            if started {
                self.running.add(job);
            } else {
                self.waiting.insert(0, job);
                break;
            }
        }
    }
}

impl Default for PreemptionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for PreemptionScheduler {
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
        log::trace!("Arrival of job #{} at {}", job.id(), ctx.time());

        if job.num_resources() > self.base.pool().capacity() {
            self.base.fail_job(ctx, job);
            return;
        }

        if self.base.start_job(ctx, &mut job) {
            self.running.add(job);
            return;
        }

        if let Some(victim_id) = self.find_job_to_preempt(&job, ctx.time()) {
            log::trace!(
                "Preempting job #{} at time {} to execute job #{}",
                victim_id,
                ctx.time(),
                job.id()
            );
            self.preempt(ctx, victim_id);
            if self.base.start_job(ctx, &mut job) {
                self.running.add(job);
            } else {
                log::error!(
                    "Job #{} was preempted, but job #{} has not started.",
                    victim_id,
                    job.id()
                );
                self.base.set_job_status(ctx, &mut job, Status::Waiting);
                self.waiting.add(job);
            }
            return;
        }

        log::trace!("Adding job #{} to waiting queue at time {}", job.id(), ctx.time());
        self.base.set_job_status(ctx, &mut job, Status::Waiting);
        self.waiting.add(job);
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
        self.start_waiting_jobs(ctx);
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
            self.start_waiting_jobs(ctx);
            self.base.send_job_to_owner(ctx, job);
        } else if let Some(mut job) = self.waiting.remove(job_id) {
            self.base.set_job_status(ctx, &mut job, Status::Cancelled);
            self.base.send_job_to_owner(ctx, job);
        } else {
            log::error!("Job #{} could not be found for cancellation", job_id);
        }
    }
}
