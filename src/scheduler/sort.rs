use std::cmp::Ordering;

use crate::job::job::Job;
use crate::job::WorkUnit;

/// The sorting algorithms available for scheduler queues, mapped to their
/// job comparators. All comparators break ties on the submission time and
/// finally the kernel-assigned submission serial, so jobs that compare
/// equal keep their submission order across runs. Job ids are picked by
/// the caller and take no part in the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortAlgorithm {
    /// First in, first out.
    Fifo,
    /// Highest priority first; lower priority values go first.
    HighestPriorityFirst,
    /// Earliest (absolute) deadline first; jobs without a deadline last.
    EarliestDeadlineFirst,
}

impl SortAlgorithm {
    /// A short description of the algorithm.
    pub fn description(&self) -> &'static str {
        match self {
            SortAlgorithm::Fifo => "First In, First Out",
            SortAlgorithm::HighestPriorityFirst => "Highest Priority First",
            SortAlgorithm::EarliestDeadlineFirst => "Earliest Deadline First",
        }
    }

    /// Compares two jobs according to this algorithm.
    pub fn compare(&self, a: &Job, b: &Job) -> Ordering {
        let key = match self {
            SortAlgorithm::Fifo => Ordering::Equal,
            SortAlgorithm::HighestPriorityFirst => a.priority().cmp(&b.priority()),
            SortAlgorithm::EarliestDeadlineFirst => {
                absolute_deadline(a).cmp(&absolute_deadline(b))
            }
        };
        key.then(a.submit_time().cmp(&b.submit_time()))
            .then(a.submission_serial().cmp(&b.submission_serial()))
    }

    /// The comparator function of this algorithm, usable wherever a
    /// scheduler accepts a sorting comparator.
    pub fn comparator(self) -> impl Fn(&Job, &Job) -> Ordering {
        move |a, b| self.compare(a, b)
    }
}

fn absolute_deadline(job: &Job) -> i64 {
    match job.deadline_duration() {
        Some(d) => job.submit_time() + d,
        None => i64::MAX,
    }
}
