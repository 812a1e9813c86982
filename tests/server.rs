//! Server builder defaults and FCFS scheduling end to end.

mod common;

use clustersim::job::job::Job;
use clustersim::job::{Status, WorkUnit};
use clustersim::kernel::{EntityId, EventType, Payload, SimContext, SimEntity, SimEvent, Simulation};
use clustersim::scheduler::DefaultScheduler;
use clustersim::server::Server;

use common::{JobRequest, TestUser};

#[test]
fn builder_fills_in_defaults() {
    let server = Server::builder().name("Server 1").capacity(10).build();
    assert_eq!(server.name(), "Server 1");
    assert_eq!(server.server_attributes().resource_pool().capacity(), 10);
    assert!(server.scheduler().name().starts_with("Server 1_Scheduler"));

    let date = chrono::Utc::now();
    let availability = server.server_attributes().resource_availability().availability(date);
    assert!((availability - 1.0).abs() < f32::EPSILON);
}

#[test]
fn fcfs_saturation_pairs_jobs() {
    // capacity 10; ten jobs, each needing half the machine for 100 units
    let server = Server::builder()
        .name("Server 1")
        .scheduler(Box::new(DefaultScheduler::new()))
        .capacity(10)
        .build();

    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(server));

    let requests: Vec<JobRequest> = (1..=10)
        .map(|id| JobRequest::new(Job::new(id, 100, 5), 0))
        .collect();
    let (user, received) = TestUser::new(server_id, requests);
    sim.register_entity(Box::new(user));

    sim.run().unwrap();

    let received = received.borrow();
    assert_eq!(received.len(), 10);
    for pair in 0u32..5 {
        let expected_start = 100 * i64::from(pair);
        for offset in 1u32..=2 {
            let job = &received[&(pair * 2 + offset)];
            assert_eq!(job.start_time(), expected_start, "job {}", job.id());
            assert_eq!(job.finish_time(), expected_start + 100);
            assert_eq!(job.status(), Status::Complete);
        }
    }
}

#[test]
fn oversized_job_fails_fast() {
    let server = Server::builder().name("tiny").capacity(4).build();

    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(server));
    let (user, received) =
        TestUser::new(server_id, vec![JobRequest::new(Job::new(1, 10, 8), 0)]);
    sim.register_entity(Box::new(user));

    sim.run().unwrap();

    let received = received.borrow();
    assert_eq!(received[&1].status(), Status::Failed);
}

#[test]
fn cancellation_frees_the_machine() {
    let server = Server::builder().name("c").capacity(4).build();

    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(server));

    // the first job hogs the machine; the second waits; cancelling the
    // first at t=30 lets the second start right away
    let requests = vec![
        JobRequest::new(Job::new(1, 100, 4), 0),
        JobRequest::new(Job::new(2, 50, 4), 0),
    ];
    let (user, received) = TestUser::new(server_id, requests);
    sim.register_entity(Box::new(user));
    sim.register_entity(Box::new(Canceller { name: "canceller".into(), server: server_id, job_id: 1, at: 30 }));

    sim.run().unwrap();

    let received = received.borrow();
    assert_eq!(received[&1].status(), Status::Cancelled);
    assert_eq!(received[&2].status(), Status::Complete);
    assert_eq!(received[&2].start_time(), 30);
    assert_eq!(received[&2].finish_time(), 80);
}

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
