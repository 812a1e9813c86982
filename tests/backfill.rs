//! Conservative and aggressive backfilling end to end.

mod common;

use clustersim::job::job::Job;
use clustersim::job::{Status, WorkUnit};
use clustersim::kernel::{EntityId, EventType, Payload, SimContext, SimEntity, SimEvent, Simulation};
use clustersim::scheduler::{AggrBackfillScheduler, ConsBackfillScheduler};
use clustersim::server::Server;

use common::{JobRequest, TestUser};

struct Canceller {
    name: String,
    server: EntityId,
    job_id: u32,
    at: i64,
}

impl SimEntity for Canceller {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, ctx: &mut SimContext<'_>) {
        ctx.send(self.server, self.at, EventType::TaskCancel, Payload::WorkId(self.job_id));
    }

    fn process(&mut self, _ctx: &mut SimContext<'_>, _event: SimEvent) {}
}

#[test]
fn conservative_preserves_arrival_order_under_saturation() {
    let server = Server::builder()
        .name("cons")
        .scheduler(Box::new(ConsBackfillScheduler::new()))
        .capacity(10)
        .build();

    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(server));
    let requests: Vec<JobRequest> =
        (1..=10).map(|id| JobRequest::new(Job::new(id, 100, 5), 0)).collect();
    let (user, received) = TestUser::new(server_id, requests);
    sim.register_entity(Box::new(user));

    sim.run().unwrap();

    let received = received.borrow();
    assert_eq!(received[&1].start_time(), 0);
    assert_eq!(received[&2].start_time(), 0);
    assert_eq!(received[&3].start_time(), 100);
    assert_eq!(received[&4].start_time(), 100);
    assert_eq!(received[&5].start_time(), 200);
    assert_eq!(received[&10].start_time(), 400);
    for id in 1..=10 {
        assert_eq!(received[&id].status(), Status::Complete, "job {}", id);
    }
}

#[test]
fn conservative_compression_moves_starts_earlier_only() {
    // job 1 holds the whole machine; jobs 2 and 3 are queued behind it.
    // Cancelling job 1 at t=10 compresses the schedule.
    let server = Server::builder()
        .name("cons")
        .scheduler(Box::new(ConsBackfillScheduler::new()))
        .capacity(10)
        .build();

    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(server));
    let requests = vec![
        JobRequest::new(Job::new(1, 100, 10), 0),
        JobRequest::new(Job::new(2, 100, 10), 0),
        JobRequest::new(Job::new(3, 50, 5), 0),
    ];
    let (user, received) = TestUser::new(server_id, requests);
    sim.register_entity(Box::new(user));
    sim.register_entity(Box::new(Canceller {
        name: "canceller".into(),
        server: server_id,
        job_id: 1,
        at: 10,
    }));

    sim.run().unwrap();

    let received = received.borrow();
    assert_eq!(received[&1].status(), Status::Cancelled);
    // job 2 would have started at 100; compression pulls it to 10
    assert_eq!(received[&2].start_time(), 10);
    assert_eq!(received[&2].status(), Status::Complete);
    // job 3 would have started at 200; it now follows job 2
    assert_eq!(received[&3].start_time(), 110);
    assert_eq!(received[&3].status(), Status::Complete);
}

#[test]
fn aggressive_backfills_without_delaying_the_pivot() {
    let server = Server::builder()
        .name("easy")
        .scheduler(Box::new(AggrBackfillScheduler::new()))
        .capacity(10)
        .build();

    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(server));
    // job 1 leaves half the machine free; job 2 (the pivot) needs all of
    // it; job 3 fits in the free half right now; job 4 must wait
    let requests = vec![
        JobRequest::new(Job::new(1, 100, 5), 0),
        JobRequest::new(Job::new(2, 100, 10), 0),
        JobRequest::new(Job::new(3, 50, 5), 0),
        JobRequest::new(Job::new(4, 200, 5), 0),
    ];
    let (user, received) = TestUser::new(server_id, requests);
    sim.register_entity(Box::new(user));

    sim.run().unwrap();

    let received = received.borrow();
    // job 3 jumped the queue into the idle half
    assert_eq!(received[&3].start_time(), 0);
    // and the pivot still started exactly when its reservation said
    assert_eq!(received[&2].start_time(), 100);
    // job 4 could not backfill past the pivot
    assert_eq!(received[&4].start_time(), 200);
    for id in 1..=4 {
        assert_eq!(received[&id].status(), Status::Complete, "job {}", id);
    }
}

#[test]
fn aggressive_handles_a_saturated_queue() {
    let server = Server::builder()
        .name("easy")
        .scheduler(Box::new(AggrBackfillScheduler::new()))
        .capacity(10)
        .build();

    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(server));
    let requests: Vec<JobRequest> =
        (1..=10).map(|id| JobRequest::new(Job::new(id, 100, 5), 0)).collect();
    let (user, received) = TestUser::new(server_id, requests);
    sim.register_entity(Box::new(user));

    sim.run().unwrap();

    let received = received.borrow();
    assert_eq!(received.len(), 10);
    for id in 1..=10 {
        assert_eq!(received[&id].status(), Status::Complete, "job {}", id);
    }
    // two jobs run side by side at any time
    let mut starts: Vec<i64> = received.values().map(|j| j.start_time()).collect();
    starts.sort_unstable();
    assert_eq!(starts, vec![0, 0, 100, 100, 200, 200, 300, 300, 400, 400]);
}
