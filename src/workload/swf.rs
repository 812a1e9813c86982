use std::path::PathBuf;

use crate::job::job::Job;
use crate::kernel::{EntityId, SimContext, SimEntity, SimEvent};
use crate::server::user;
use crate::workload::read_event_file;

/// Reads a job trace in the Standard Workload Format (SWF) and submits
/// the corresponding jobs to a server.
///
/// The columns consumed are `job_id(0)`, `submit_time(1)`, `duration(3)`
/// and `num_resources(4)`. Some logs carry `-1` as the number of
/// resources, which is coerced to `1`; jobs with a non-positive duration
/// were probably cancelled in the trace and are discarded. Malformed
/// lines are logged and skipped.
pub struct SwfWorkloadReader {
    name: String,
    path: PathBuf,
    server: EntityId,
    delimiter: Option<char>,
    jobs_submitted: usize,
    jobs_returned: usize,
}

impl SwfWorkloadReader {
    pub fn new(path: impl Into<PathBuf>, server: EntityId) -> Self {
        Self {
            name: "Workload Generator".to_string(),
            path: path.into(),
            server,
            delimiter: None,
            jobs_submitted: 0,
            jobs_returned: 0,
        }
    }

    /// Sets the field delimiter. Fields are split on whitespace when no
    /// delimiter is configured.
    pub fn set_delimiter(&mut self, delimiter: char) {
        self.delimiter = Some(delimiter);
    }

    /// The number of jobs created from the trace.
    pub fn jobs_submitted(&self) -> usize {
        self.jobs_submitted
    }

    /// The number of jobs returned by the server so far.
    pub fn jobs_returned(&self) -> usize {
        self.jobs_returned
    }

    fn parse_line(fields: &[&str]) -> Option<(u32, i64, i64, u32)> {
        let job_id = fields.first()?.parse::<u32>().ok()?;
        let submit_time = fields.get(1)?.parse::<i64>().ok()?;
        let duration = fields.get(3)?.parse::<i64>().ok()?;
        let num_resources = fields.get(4)?.parse::<i64>().ok()?;
        let num_resources = if num_resources > 0 { num_resources as u32 } else { 1 };
        Some((job_id, submit_time, duration, num_resources))
    }
}

impl SimEntity for SwfWorkloadReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, ctx: &mut SimContext<'_>) {
        let server = self.server;
        let path = self.path.clone();
        let delimiter = self.delimiter;
        let mut submitted = 0usize;

        let outcome = read_event_file(&path, delimiter, |line, fields| {
            match Self::parse_line(fields) {
                Some((job_id, submit_time, duration, num_resources)) if duration > 0 => {
                    if submit_time < 0 {
                        log::error!("Line {}: negative submission time, skipped", line);
                        return;
                    }
                    let job = Job::new(job_id, duration, num_resources);
                    user::submit_job(ctx, server, submit_time, job);
                    submitted += 1;
                }
                Some(_) => {
                    // non-positive duration: the job was cancelled in the trace
                }
                None => log::error!("Error parsing line {} of workload", line),
            }
        });

        if let Err(e) = outcome {
            log::error!("Error reading workload file: {}", e);
        }
        self.jobs_submitted = submitted;
        log::info!("Submitted {} jobs from {}", submitted, path.display());
    }

    fn process(&mut self, _ctx: &mut SimContext<'_>, event: SimEvent) {
        if event.event_type() == crate::kernel::EventType::ResultArrive {
            self.jobs_returned += 1;
        }
    }

    fn on_shutdown(&mut self, _ctx: &mut SimContext<'_>) {
        log::info!(
            "Workload complete: {} of {} jobs returned",
            self.jobs_returned,
            self.jobs_submitted
        );
    }
}
