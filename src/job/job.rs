use std::fmt;

use crate::job::{Status, WorkUnit, WorkUnitBase, TIME_NOT_SET};
use crate::kernel::entity::EntityId;
use crate::profile::range_list::RangeList;

/// Computes the overhead charged to a job when it resumes after being
/// preempted.
pub trait JobResumeOverhead {
    /// The extra work added to the job's remaining work on resume.
    fn resume_overhead(&self, job: &Job) -> i64;
}

/// A constant resume overhead, independent of the job.
#[derive(Debug, Clone, Copy)]
pub struct FixedResumeOverhead(pub i64);

impl JobResumeOverhead for FixedResumeOverhead {
    fn resume_overhead(&self, _job: &Job) -> i64 {
        self.0
    }
}

/// One execution burst of a job: the interval during which a set of
/// resources worked on it. A job that is never preempted has exactly one
/// activity; every preemption closes the current activity and every resume
/// opens a new one.
#[derive(Debug, Clone, Default)]
pub struct JobActivity {
    start_time: Option<i64>,
    finish_time: Option<i64>,
    resume_overhead: i64,
    ranges: Option<RangeList>,
}

impl JobActivity {
    /// Starts the activity. Returns `false` if it had already started.
    pub fn start(&mut self, time: i64) -> bool {
        if self.start_time.is_some() {
            return false;
        }
        self.start_time = Some(time);
        true
    }

    /// Completes the activity. Returns `false` if it had already finished.
    pub fn finish(&mut self, time: i64) -> bool {
        if self.finish_time.is_some() {
            return false;
        }
        self.finish_time = Some(time);
        true
    }

    pub fn has_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finish_time.is_some()
    }

    pub fn start_time(&self) -> i64 {
        self.start_time.unwrap_or(TIME_NOT_SET)
    }

    pub fn finish_time(&self) -> i64 {
        self.finish_time.unwrap_or(TIME_NOT_SET)
    }

    /// The overhead that was charged when this activity resumed the job.
    pub fn resume_overhead(&self) -> i64 {
        self.resume_overhead
    }

    /// The time this activity took, valid once finished.
    pub fn time_taken(&self) -> i64 {
        match (self.start_time, self.finish_time) {
            (Some(s), Some(f)) => f - s,
            _ => panic!("Activity has not been performed"),
        }
    }

    /// The resources that carried out this activity.
    pub fn ranges(&self) -> Option<&RangeList> {
        self.ranges.as_ref()
    }

    /// Sets the resources for this activity. A pending (unfinished)
    /// activity may be re-assigned, which happens when a tentative future
    /// allocation is moved by schedule compression.
    pub fn set_ranges(&mut self, ranges: RangeList) -> bool {
        if self.is_finished() {
            return false;
        }
        self.ranges = Some(ranges);
        true
    }
}

/// A job: a unit of work submitted by a user entity and scheduled on a
/// server. If preempted, the job keeps one [`JobActivity`] per execution
/// burst and tracks the work still to be done.
#[derive(Debug, Clone)]
pub struct Job {
    base: WorkUnitBase,
    remaining_work: i64,
    deadline_duration: Option<i64>,
    reservation_id: Option<u32>,
    activities: Vec<JobActivity>,
    next_resume_overhead: i64,
}

impl Job {
    /// Creates a new job.
    pub fn new(id: u32, duration: i64, num_resources: u32) -> Self {
        Self {
            base: WorkUnitBase::new(id, duration, num_resources),
            remaining_work: duration,
            deadline_duration: None,
            reservation_id: None,
            activities: vec![JobActivity::default()],
            next_resume_overhead: 0,
        }
    }

    /// Returns a builder for a job with the given id.
    pub fn builder(id: u32) -> JobBuilder {
        JobBuilder { id, duration: 1, num_resources: 1, priority: 0, deadline: None }
    }

    /// The amount of work (time) left to be done.
    pub fn remaining_work(&self) -> i64 {
        self.remaining_work
    }

    /// The deadline duration associated with this job, if any.
    pub fn deadline_duration(&self) -> Option<i64> {
        self.deadline_duration
    }

    pub fn set_deadline_duration(&mut self, duration: i64) {
        self.deadline_duration = Some(duration);
    }

    /// Checks if the job finished within its deadline. A job without a
    /// deadline always meets it.
    pub fn met_deadline(&self) -> bool {
        match self.deadline_duration {
            Some(d) => self.base.finish_time() <= self.base.submit_time() + d,
            None => true,
        }
    }

    /// The reservation under which this job runs, if any.
    pub fn reservation_id(&self) -> Option<u32> {
        self.reservation_id
    }

    pub fn set_reservation_id(&mut self, reservation_id: u32) {
        self.reservation_id = Some(reservation_id);
    }

    pub fn has_reservation(&self) -> bool {
        self.reservation_id.is_some()
    }

    pub fn set_owner(&mut self, owner: EntityId) {
        self.base.set_owner(owner);
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.base.set_priority(priority);
    }

    /// Records the submission time and moves the job to `Enqueued`.
    pub fn set_submit_time(&mut self, time: i64) {
        self.base.set_submit_time(time);
    }

    /// Records the kernel serial of the submission event.
    pub fn set_submission_serial(&mut self, serial: u64) {
        self.base.set_submission_serial(serial);
    }

    /// Records the tentative start time of a future allocation.
    pub fn set_start_time(&mut self, time: i64) {
        self.base.set_start_time(time);
    }

    /// The overhead the next resume will charge; set by the scheduler
    /// before the job is restarted.
    pub fn set_next_resume_overhead(&mut self, overhead: i64) {
        self.next_resume_overhead = overhead.max(0);
    }

    /// The number of execution bursts so far.
    pub fn num_activities(&self) -> usize {
        self.activities.len()
    }

    /// The activity currently being performed (or prepared).
    pub fn current_activity(&self) -> &JobActivity {
        self.activities.last().expect("A job always has an activity")
    }

    /// Iterates over all execution bursts of this job.
    pub fn activities(&self) -> std::slice::Iter<'_, JobActivity> {
        self.activities.iter()
    }

    /// The resources currently assigned to the job, if any.
    pub fn resource_ranges(&self) -> Option<&RangeList> {
        self.activities.last().and_then(JobActivity::ranges)
    }

    /// Assigns resources to the current activity.
    ///
    /// # Returns
    /// `false` if the current activity has already finished.
    pub fn set_resource_ranges(&mut self, ranges: RangeList) -> bool {
        self.activities
            .last_mut()
            .map(|a| a.set_ranges(ranges))
            .unwrap_or(false)
    }

    /// Moves the job to `status` at the given time, updating the activity
    /// list and the remaining work.
    ///
    /// Entering `InExecution` opens (or starts) an activity; on resume
    /// from `Paused` the configured resume overhead is added to the
    /// remaining work. Pausing closes the activity and debits the elapsed
    /// slice from the remaining work; completing zeroes it.
    ///
    /// # Returns
    /// `false` if the transition is not allowed; the job is unchanged.
    pub fn set_status(&mut self, status: Status, time: i64) -> bool {
        let previous = self.base.status();
        if !self.base.set_status(status, time) {
            return false;
        }

        match (previous, status) {
            (Status::Enqueued | Status::Waiting, Status::InExecution) => {
                let last = self.activities.last_mut().unwrap();
                if !last.start(time) {
                    let mut activity = JobActivity::default();
                    activity.start(time);
                    self.activities.push(activity);
                }
            }
            (Status::Paused, Status::InExecution) => {
                let overhead = self.next_resume_overhead;
                self.next_resume_overhead = 0;
                self.remaining_work += overhead;
                let mut activity = JobActivity { resume_overhead: overhead, ..Default::default() };
                activity.start(time);
                self.activities.push(activity);
            }
            (Status::InExecution, Status::Paused) => {
                let last = self.activities.last_mut().unwrap();
                last.finish(time);
                self.remaining_work -= last.time_taken();
            }
            (Status::InExecution | Status::Paused, _) if status.is_terminal() => {
                let last = self.activities.last_mut().unwrap();
                if last.has_started() {
                    last.finish(time);
                }
                if status == Status::Complete {
                    self.remaining_work = 0;
                }
            }
            _ => {}
        }
        true
    }
}

impl WorkUnit for Job {
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

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Job{{id={}, submit={}, start={}, finish={}, duration={}, remaining={}, priority={}, status={}}}",
            self.id(),
            self.submit_time(),
            self.start_time(),
            self.finish_time(),
            self.duration(),
            self.remaining_work,
            self.priority(),
            self.status()
        )
    }
}

/// Builder for [`Job`] values.
pub struct JobBuilder {
    id: u32,
    duration: i64,
    num_resources: u32,
    priority: i32,
    deadline: Option<i64>,
}

impl JobBuilder {
    pub fn duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    pub fn num_resources(mut self, num_resources: u32) -> Self {
        self.num_resources = num_resources;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn deadline(mut self, deadline: i64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn build(self) -> Job {
        let mut job = Job::new(self.id, self.duration, self.num_resources);
        job.set_priority(self.priority);
        if let Some(deadline) = self.deadline {
            job.set_deadline_duration(deadline);
        }
        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_without_preemption() {
        let mut job = Job::new(7, 100, 2);
        job.set_submit_time(0);
        assert!(job.set_status(Status::InExecution, 5));
        assert_eq!(job.num_activities(), 1);
        assert!(job.current_activity().has_started());

        assert!(job.set_status(Status::Complete, 105));
        assert_eq!(job.remaining_work(), 0);
        assert_eq!(job.finish_time(), 105);
        assert_eq!(job.current_activity().time_taken(), 100);
    }

    #[test]
    fn preemption_debits_remaining_work() {
        let mut job = Job::new(1, 100, 1);
        job.set_submit_time(0);
        job.set_status(Status::InExecution, 0);
        assert!(job.set_status(Status::Paused, 40));
        assert_eq!(job.remaining_work(), 60);
        assert_eq!(job.start_time(), 0);

        // resume with an overhead of 5
        job.set_next_resume_overhead(5);
        assert!(job.set_status(Status::InExecution, 70));
        assert_eq!(job.remaining_work(), 65);
        assert_eq!(job.num_activities(), 2);
        assert_eq!(job.current_activity().resume_overhead(), 5);
        // start time keeps the first execution burst
        assert_eq!(job.start_time(), 0);

        assert!(job.set_status(Status::Complete, 135));
        assert_eq!(job.remaining_work(), 0);
    }

    #[test]
    fn ranges_can_be_reassigned_until_finished() {
        let mut job = Job::new(1, 10, 4);
        job.set_submit_time(0);
        assert!(job.set_resource_ranges(RangeList::span(0, 3)));
        assert!(job.set_resource_ranges(RangeList::span(4, 7)));
        assert_eq!(job.resource_ranges().unwrap().to_string(), "{[4..7]}");

        job.set_status(Status::InExecution, 0);
        job.set_status(Status::Complete, 10);
        assert!(!job.set_resource_ranges(RangeList::span(0, 3)));
    }

    #[test]
    fn deadline_is_checked_against_submit_time() {
        let mut job = Job::builder(3).duration(50).deadline(80).build();
        job.set_submit_time(10);
        job.set_status(Status::InExecution, 30);
        job.set_status(Status::Complete, 80);
        assert!(job.met_deadline());

        let mut late = Job::builder(4).duration(50).deadline(30).build();
        late.set_submit_time(0);
        late.set_status(Status::InExecution, 20);
        late.set_status(Status::Complete, 70);
        assert!(!late.met_deadline());
    }
}
