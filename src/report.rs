//! Report helpers: a shareable recorder for scheduler status events and a
//! plain-text summary table for finished work units.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::job::event::{WorkUnitEvent, WorkUnitListener};
use crate::job::job::Job;
use crate::job::WorkUnit;

/// A [`WorkUnitListener`] that records every status-change event into a
/// shared buffer, so a driver or test can inspect the transitions after
/// the run. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct StatusRecorder {
    events: Rc<RefCell<Vec<WorkUnitEvent>>>,
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded events, in occurrence order.
    pub fn events(&self) -> Vec<WorkUnitEvent> {
        self.events.borrow().clone()
    }

    /// The recorded events concerning one work unit.
    pub fn events_for(&self, unit_id: u32) -> Vec<WorkUnitEvent> {
        self.events.borrow().iter().filter(|e| e.unit_id == unit_id).cloned().collect()
    }
}

impl WorkUnitListener for StatusRecorder {
    fn on_event(&mut self, event: &WorkUnitEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Renders a plain-text summary table for a set of finished jobs:
/// identity, timing, wait and response times, and final status.
pub fn job_summary_table(jobs: &[Job]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>8} {:>10} {:>10} {:>10} {:>8} {:>10} {:>10}  {}",
        "job", "submit", "start", "finish", "width", "wait", "response", "status"
    );
    for job in jobs {
        let wait = if job.start_time() >= 0 { job.start_time() - job.submit_time() } else { -1 };
        let response =
            if job.finish_time() >= 0 { job.finish_time() - job.submit_time() } else { -1 };
        let _ = writeln!(
            out,
            "{:>8} {:>10} {:>10} {:>10} {:>8} {:>10} {:>10}  {}",
            job.id(),
            job.submit_time(),
            job.start_time(),
            job.finish_time(),
            job.num_resources(),
            wait,
            response,
            job.status()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Status;

    #[test]
    fn table_lists_every_job() {
        let mut job = Job::new(42, 100, 4);
        job.set_submit_time(0);
        job.set_status(Status::InExecution, 10);
        job.set_status(Status::Complete, 110);

        let table = job_summary_table(&[job]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("42"));
        assert!(lines[1].contains("COMPLETE"));
    }

    #[test]
    fn recorder_clones_share_the_buffer() {
        use crate::job::event::WorkUnitEventType;

        let recorder = StatusRecorder::new();
        let mut listener = recorder.clone();
        listener.on_event(&WorkUnitEvent {
            time: 5,
            event_type: WorkUnitEventType::StatusChanged,
            unit_id: 1,
            previous_status: Some(Status::Unknown),
            current_status: Status::Enqueued,
        });

        assert_eq!(recorder.events().len(), 1);
        assert_eq!(recorder.events_for(1)[0].current_status, Status::Enqueued);
        assert!(recorder.events_for(2).is_empty());
    }
}
