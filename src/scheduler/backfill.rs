use std::collections::HashSet;

use crate::job::job::Job;
use crate::job::{Status, WorkUnit, TIME_NOT_SET};
use crate::kernel::{EventType, Payload, SimContext};
use crate::predicate;
use crate::profile::range_list::RangeList;
use crate::scheduler::queue::JobQueue;
use crate::scheduler::{JobComparator, SchedulerBase};

/// The queue state shared by the backfilling policies, with the helpers
/// for schedule compression and re-placement of queued jobs.
pub(crate) struct BackfillState {
    pub(crate) waiting: JobQueue,
    pub(crate) running: JobQueue,
    pub(crate) comparator: Option<JobComparator>,
}

impl BackfillState {
    pub(crate) fn new() -> Self {
        Self { waiting: JobQueue::new(), running: JobQueue::new(), comparator: None }
    }

    pub(crate) fn sort_waiting(&mut self) {
        if let Some(comparator) = &self.comparator {
            self.waiting.sort_by(comparator.as_ref());
        }
    }

    /// Releases the tentative slot of every waiting job whose recorded
    /// start time lies after `time`. Jobs holding a reservation are
    /// immovable and skipped.
    ///
    /// # Returns
    /// The ids of the jobs whose slots were released.
    pub(crate) fn compress_schedule(&mut self, base: &mut SchedulerBase, time: i64) -> Vec<u32> {
        let mut affected = Vec::new();
        for job in self.waiting.iter() {
            if job.start_time() == TIME_NOT_SET || job.start_time() <= time || job.has_reservation()
            {
                continue;
            }
            let start = job.start_time().max(0);
            let finish = job.start_time() + job.duration();
            if let Some(ranges) = job.resource_ranges() {
                base.pool_mut().release_resources(start, finish, &ranges.clone());
            }
            affected.push(job.id());
        }
        affected
    }

    /// Cancels the pending `TASK_START`/`TASK_COMPLETE` events of a set of
    /// jobs.
    pub(crate) fn cancel_job_events(&self, ctx: &mut SimContext<'_>, job_ids: &[u32]) {
        let ids: HashSet<u32> = job_ids.iter().copied().collect();
        ctx.cancel_future_events(predicate::job_events_by_ids(ids));
    }

    /// Allocates a future slot to a job and schedules both its
    /// `TASK_START` and its `TASK_COMPLETE`.
    pub(crate) fn allocate_future_slot(
        &mut self,
        base: &mut SchedulerBase,
        ctx: &mut SimContext<'_>,
        job: &mut Job,
        start_time: i64,
        selected: RangeList,
    ) {
        let now = ctx.time();
        base.allocate_resources_to_job(ctx, job, start_time, selected);
        ctx.send_to_self(
            start_time - now + job.duration(),
            EventType::TaskComplete,
            Payload::WorkId(job.id()),
        );
    }

    /// Places a job in the schedule at the earliest feasible future time.
    ///
    /// # Returns
    /// `false` if no feasible slot exists (the job is marked `FAILED`).
    pub(crate) fn enqueue_job(
        &mut self,
        base: &mut SchedulerBase,
        ctx: &mut SimContext<'_>,
        job: &mut Job,
    ) -> bool {
        let num_res = job.num_resources();
        let entry = base.pool().find_start_time(num_res, ctx.time(), job.duration());
        let (start_time, selected) = match entry {
            Some(e) => {
                let start = e.time();
                match e.into_ranges().select_resources(num_res) {
                    Some(selected) => (start, selected),
                    None => {
                        base.set_job_status(ctx, job, Status::Failed);
                        return false;
                    }
                }
            }
            None => {
                base.set_job_status(ctx, job, Status::Failed);
                return false;
            }
        };
        self.allocate_future_slot(base, ctx, job, start_time, selected);
        log::trace!(
            "Adding job #{} to waiting queue to start at time {} using resources {}.",
            job.id(),
            start_time,
            job.resource_ranges().map(|r| r.to_string()).unwrap_or_default()
        );
        true
    }

    /// Re-places every affected job: an immediate start when possible, a
    /// fresh future slot otherwise. Jobs are visited in queue-comparator
    /// order; unaffected jobs keep their original slots.
    pub(crate) fn reschedule_jobs(
        &mut self,
        base: &mut SchedulerBase,
        ctx: &mut SimContext<'_>,
        affected: &[u32],
    ) {
        let affected: HashSet<u32> = affected.iter().copied().collect();
        self.sort_waiting();

        let mut index = 0;
        while index < self.waiting.len() {
            {
                let job = self.waiting.at(index);
                if !affected.contains(&job.id()) || job.has_reservation() {
                    index += 1;
                    continue;
                }
            }
            let mut job = self.waiting.take(index);
            if base.start_job(ctx, &mut job) {
                self.running.add(job);
            } else if self.enqueue_job(base, ctx, &mut job) {
                self.waiting.insert(index, job);
                index += 1;
            } else {
                base.send_job_to_owner(ctx, job);
            }
        }
    }

    /// Moves a job from the waiting to the running queue when its
    /// `TASK_START` fires.
    pub(crate) fn begin_execution(
        &mut self,
        base: &mut SchedulerBase,
        ctx: &SimContext<'_>,
        job_id: u32,
    ) -> bool {
        match self.waiting.position(job_id) {
            Some(index) => {
                let mut job = self.waiting.take(index);
                base.set_job_status(ctx, &mut job, Status::InExecution);
                self.running.add(job);
                true
            }
            None => {
                log::error!("Job #{} received a start signal but is not waiting", job_id);
                false
            }
        }
    }
}
