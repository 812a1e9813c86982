#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use clustersim::job::job::Job;
use clustersim::job::reservation::Reservation;
use clustersim::job::WorkUnit;
use clustersim::kernel::{EntityId, EventType, Payload, SimContext, SimEntity, SimEvent};
use clustersim::server::user;

/// A job together with the submission delay the user applies to it.
pub struct JobRequest {
    pub job: Job,
    pub delay: i64,
}

impl JobRequest {
    pub fn new(job: Job, delay: i64) -> Self {
        Self { job, delay }
    }
}

/// Shared handle to the jobs a [`TestUser`] got back from the server,
/// keyed by job id.
pub type ReceivedJobs = Rc<RefCell<HashMap<u32, Job>>>;

/// Shared handle to the reservations a [`TestUser`] got responses for.
pub type ReceivedReservations = Rc<RefCell<Vec<Reservation>>>;

/// A user entity that submits a fixed list of jobs on start and records
/// everything the server sends back.
pub struct TestUser {
    name: String,
    server: EntityId,
    requests: Vec<JobRequest>,
    received: ReceivedJobs,
    reservations: ReceivedReservations,
}

impl TestUser {
    pub fn new(server: EntityId, requests: Vec<JobRequest>) -> (Self, ReceivedJobs) {
        let received: ReceivedJobs = Rc::new(RefCell::new(HashMap::new()));
        let user = Self {
            name: format!("User-{}", uuid::Uuid::new_v4()),
            server,
            requests,
            received: Rc::clone(&received),
            reservations: Rc::new(RefCell::new(Vec::new())),
        };
        (user, received)
    }

    pub fn reservation_responses(&self) -> ReceivedReservations {
        Rc::clone(&self.reservations)
    }
}

impl SimEntity for TestUser {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, ctx: &mut SimContext<'_>) {
        for request in self.requests.drain(..) {
            user::submit_job(ctx, self.server, request.delay, request.job);
        }
    }

    fn process(&mut self, _ctx: &mut SimContext<'_>, event: SimEvent) {
        match event.event_type() {
            EventType::ResultArrive => {
                if let Payload::Job(job) = event.take_payload() {
                    self.received.borrow_mut().insert(job.id(), *job);
                }
            }
            EventType::ReservationResponse | EventType::ReservationComplete => {
                if let Payload::Reservation(reservation) = event.take_payload() {
                    self.reservations.borrow_mut().push(*reservation);
                }
            }
            _ => {}
        }
    }
}
