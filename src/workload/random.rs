use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::job::job::Job;
use crate::kernel::{EntityId, EventType, SimContext, SimEntity, SimEvent};
use crate::server::user;

/// Generates a synthetic workload: a stream of jobs with uniformly drawn
/// inter-arrival times, durations and widths. The stream is a pure
/// function of the seed, so runs are reproducible.
pub struct RandomWorkloadGenerator {
    name: String,
    server: EntityId,
    seed: u64,
    num_jobs: u32,
    first_id: u32,
    max_interarrival: i64,
    duration: (i64, i64),
    width: (u32, u32),
    jobs_returned: usize,
}

impl RandomWorkloadGenerator {
    pub fn new(server: EntityId, seed: u64, num_jobs: u32) -> Self {
        Self {
            name: format!("RandomWorkload-{}", seed),
            server,
            seed,
            num_jobs,
            first_id: 1,
            max_interarrival: 10,
            duration: (1, 100),
            width: (1, 1),
            jobs_returned: 0,
        }
    }

    /// Sets the id of the first generated job; ids are consecutive.
    pub fn set_first_id(&mut self, first_id: u32) {
        self.first_id = first_id;
    }

    /// Sets the maximum inter-arrival time between consecutive jobs.
    pub fn set_max_interarrival(&mut self, max_interarrival: i64) {
        assert!(max_interarrival > 0, "Inter-arrival bound must be > 0");
        self.max_interarrival = max_interarrival;
    }

    /// Sets the inclusive range durations are drawn from.
    pub fn set_duration_range(&mut self, min: i64, max: i64) {
        assert!(0 < min && min <= max, "Invalid duration range");
        self.duration = (min, max);
    }

    /// Sets the inclusive range job widths are drawn from.
    pub fn set_width_range(&mut self, min: u32, max: u32) {
        assert!(0 < min && min <= max, "Invalid width range");
        self.width = (min, max);
    }

    /// The number of jobs returned by the server so far.
    pub fn jobs_returned(&self) -> usize {
        self.jobs_returned
    }
}

impl SimEntity for RandomWorkloadGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, ctx: &mut SimContext<'_>) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut arrival = 0i64;

        for offset in 0..self.num_jobs {
            arrival += rng.gen_range(0..=self.max_interarrival);
            let duration = rng.gen_range(self.duration.0..=self.duration.1);
            let width = rng.gen_range(self.width.0..=self.width.1);
            let job = Job::new(self.first_id + offset, duration, width);
            user::submit_job(ctx, self.server, arrival, job);
        }
        log::info!("Generated {} jobs with seed {}", self.num_jobs, self.seed);
    }

    fn process(&mut self, _ctx: &mut SimContext<'_>, event: SimEvent) {
        if event.event_type() == EventType::ResultArrive {
            self.jobs_returned += 1;
        }
    }
}
