//! Advance reservations on top of conservative backfilling.

mod common;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use clustersim::job::job::Job;
use clustersim::job::reservation::Reservation;
use clustersim::job::{Status, WorkUnit};
use clustersim::kernel::{
    EntityId, EventType, Payload, SimContext, SimEntity, SimEvent, Simulation,
};
use clustersim::scheduler::ResConsBackfillScheduler;
use clustersim::server::{user, Server};

/// What a reserving user submits once its reservation is confirmed.
struct Plan {
    reservation: Reservation,
    reserved_jobs: Vec<Job>,
    plain_jobs: Vec<(Job, i64)>,
    cancel_reservation_at: Option<i64>,
}

struct ReservingUser {
    name: String,
    server: EntityId,
    plan: Option<Plan>,
    reservation_id: u32,
    received: Rc<RefCell<HashMap<u32, Job>>>,
    responses: Rc<RefCell<Vec<Reservation>>>,
}

impl ReservingUser {
    fn new(
        server: EntityId,
        plan: Plan,
    ) -> (Self, Rc<RefCell<HashMap<u32, Job>>>, Rc<RefCell<Vec<Reservation>>>) {
        let received = Rc::new(RefCell::new(HashMap::new()));
        let responses = Rc::new(RefCell::new(Vec::new()));
        let reservation_id = plan.reservation.id();
        let user = Self {
            name: format!("ReservingUser-{}", reservation_id),
            server,
            plan: Some(plan),
            reservation_id,
            received: Rc::clone(&received),
            responses: Rc::clone(&responses),
        };
        (user, received, responses)
    }
}

impl SimEntity for ReservingUser {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, ctx: &mut SimContext<'_>) {
        let plan = self.plan.as_mut().unwrap();
        let reservation = plan.reservation.clone();
        user::request_reservation(ctx, self.server, 0, reservation);
    }

    fn process(&mut self, ctx: &mut SimContext<'_>, event: SimEvent) {
        match event.event_type() {
            EventType::ReservationResponse => {
                if let Payload::Reservation(reservation) = event.take_payload() {
                    let granted = reservation.status() != Status::Failed;
                    self.responses.borrow_mut().push(*reservation);
                    if !granted {
                        return;
                    }
                    let plan = self.plan.take().unwrap();
                    for job in plan.reserved_jobs {
                        user::submit_reserved_job(ctx, self.server, self.reservation_id, 0, job);
                    }
                    for (job, delay) in plan.plain_jobs {
                        user::submit_job(ctx, self.server, delay, job);
                    }
                    if let Some(at) = plan.cancel_reservation_at {
                        ctx.send(
                            self.server,
                            at,
                            EventType::ReservationCancel,
                            Payload::WorkId(self.reservation_id),
                        );
                    }
                }
            }
            EventType::ReservationComplete => {
                if let Payload::Reservation(reservation) = event.take_payload() {
                    self.responses.borrow_mut().push(*reservation);
                }
            }
            EventType::ResultArrive => {
                if let Payload::Job(job) = event.take_payload() {
                    self.received.borrow_mut().insert(job.id(), *job);
                }
            }
            _ => {}
        }
    }
}

fn reservation_server() -> Server {
    Server::builder()
        .name("res")
        .scheduler(Box::new(ResConsBackfillScheduler::new()))
        .capacity(10)
        .build()
}

#[test]
fn reserved_window_serves_tagged_jobs_and_blocks_others() {
    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(reservation_server()));

    let plan = Plan {
        reservation: Reservation::new(900, 100, 100, 4),
        reserved_jobs: vec![Job::new(901, 50, 2)],
        plain_jobs: vec![(Job::new(902, 150, 8), 0)],
        cancel_reservation_at: None,
    };
    let (user, received, responses) = ReservingUser::new(server_id, plan);
    sim.register_entity(Box::new(user));

    sim.run().unwrap();

    let received = received.borrow();
    // the tagged job ran inside the reserved window
    assert_eq!(received[&901].start_time(), 100);
    assert_eq!(received[&901].finish_time(), 150);
    assert_eq!(received[&901].status(), Status::Complete);

    // the wide job overlaps the reserved window wherever it is placed
    // before it, so conservative backfilling puts it after the window
    assert_eq!(received[&902].start_time(), 200);
    assert_eq!(received[&902].finish_time(), 350);
    assert_eq!(received[&902].status(), Status::Complete);

    let responses = responses.borrow();
    // acceptance response first, completion notification last
    assert_eq!(responses[0].status(), Status::Waiting);
    assert!(responses[0].resource_ranges().is_some());
    assert_eq!(responses.last().unwrap().status(), Status::Complete);
}

#[test]
fn infeasible_reservation_is_rejected() {
    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(reservation_server()));

    let plan = Plan {
        reservation: Reservation::new(910, 10, 50, 16),
        reserved_jobs: vec![],
        plain_jobs: vec![],
        cancel_reservation_at: None,
    };
    let (user, _received, responses) = ReservingUser::new(server_id, plan);
    sim.register_entity(Box::new(user));

    sim.run().unwrap();

    let responses = responses.borrow();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status(), Status::Failed);
}

#[test]
fn cancelling_a_reservation_cancels_its_jobs_and_frees_the_window() {
    let mut sim = Simulation::new();
    let server_id = sim.register_entity(Box::new(reservation_server()));

    let plan = Plan {
        reservation: Reservation::new(920, 100, 100, 10),
        reserved_jobs: vec![Job::new(921, 50, 4)],
        // the wide job arrives after the cancellation; its window [20,170)
        // runs through the formerly reserved span, so it can only start on
        // arrival if the cancellation really returned [100,200) to the pool
        plain_jobs: vec![(Job::new(922, 150, 10), 20)],
        cancel_reservation_at: Some(10),
    };
    let (user, received, _responses) = ReservingUser::new(server_id, plan);
    sim.register_entity(Box::new(user));

    sim.run().unwrap();

    let received = received.borrow();
    // the dependent job fell with its reservation
    assert_eq!(received[&921].status(), Status::Cancelled);
    // the reserved span is free again, so the late job starts on arrival
    // instead of being pushed past the window to 200
    assert_eq!(received[&922].status(), Status::Complete);
    assert_eq!(received[&922].start_time(), 20);
    assert_eq!(received[&922].finish_time(), 170);
}
