//! The server shell: the entity that receives work units, stamps their
//! submission times, and routes them to its scheduling policy.

pub mod attributes;
pub mod availability;
pub mod pool;
pub mod user;

pub use attributes::ServerAttributes;
pub use availability::{FullAvailability, ServerAvailability, ServerHourlyAvailability};
pub use pool::{DefaultResourcePool, ResourcePool, ResourceUsage};

use uuid::Uuid;

use crate::job::event::WorkUnitListener;
use crate::kernel::{EventType, Payload, SimContext, SimEntity, SimEvent};
use crate::scheduler::{DefaultScheduler, Scheduler};

/// A server that processes work units with a scheduling policy over a
/// resource pool. Arrivals and cancellations are routed to the policy's
/// dedicated methods; everything else, including the policy's own
/// `TASK_START`/`TASK_COMPLETE` bookkeeping events, goes to
/// [`Scheduler::process`].
pub struct Server {
    name: String,
    scheduler: Box<dyn Scheduler>,
}

impl Server {
    /// Creates a new server and initialises the policy with the given
    /// attributes.
    pub fn new(
        name: impl Into<String>,
        attributes: ServerAttributes,
        mut scheduler: Box<dyn Scheduler>,
    ) -> Self {
        scheduler.initialize(attributes);
        Self { name: name.into(), scheduler }
    }

    /// Returns a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// The server's attributes.
    pub fn server_attributes(&self) -> &ServerAttributes {
        self.scheduler.attributes()
    }

    /// The scheduling policy used by this server.
    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }
}

impl SimEntity for Server {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, ctx: &mut SimContext<'_>, event: SimEvent) {
        match event.event_type() {
            EventType::TaskArrive => {
                let serial = event.serial();
                match event.take_payload() {
                    Payload::Job(mut job) => {
                        // the arrival serial keeps same-tick jobs in
                        // submission order in the scheduler queues
                        job.set_submission_serial(serial);
                        job.set_submit_time(ctx.time());
                        self.scheduler.do_job_processing(ctx, *job);
                    }
                    _ => log::error!("Invalid job received for processing."),
                }
            }
            EventType::TaskCancel => match event.payload().work_id() {
                Some(id) => self.scheduler.do_job_cancel(ctx, id),
                None => log::error!("Invalid job id sent for cancellation."),
            },
            EventType::ReservationRequest => match self.scheduler.as_reservation_scheduler() {
                Some(scheduler) => {
                    let serial = event.serial();
                    match event.take_payload() {
                        Payload::Reservation(mut reservation) => {
                            reservation.set_submission_serial(serial);
                            reservation.set_submit_time(ctx.time());
                            scheduler.do_reservation_processing(ctx, *reservation);
                        }
                        _ => log::error!("Invalid reservation sent for processing."),
                    }
                }
                None => log::error!("Scheduler cannot handle reservation requests"),
            },
            EventType::ReservationCancel => match self.scheduler.as_reservation_scheduler() {
                Some(scheduler) => match event.payload().work_id() {
                    Some(id) => scheduler.do_reservation_cancel(ctx, id),
                    None => log::error!("Invalid reservation id sent for cancellation."),
                },
                None => log::error!("Scheduler cannot handle reservation requests"),
            },
            _ => self.scheduler.process(ctx, event),
        }
    }
}

/// Builder for [`Server`] instances, filling in sensible defaults: a FCFS
/// scheduler, full availability and a single-resource pool.
#[derive(Default)]
pub struct ServerBuilder {
    name: Option<String>,
    scheduler: Option<Box<dyn Scheduler>>,
    pool: Option<Box<dyn pool::ResourcePool>>,
    availability: Option<Box<dyn ServerAvailability>>,
    capacity: Option<u32>,
    listener: Option<Box<dyn WorkUnitListener>>,
}

impl ServerBuilder {
    /// Sets the server name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the scheduling policy to be used.
    pub fn scheduler(mut self, scheduler: Box<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets the resource pool.
    pub fn resource_pool(mut self, pool: Box<dyn pool::ResourcePool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Sets the resource availability scheme.
    pub fn resource_availability(mut self, availability: Box<dyn ServerAvailability>) -> Self {
        self.availability = Some(availability);
        self
    }

    /// Sets the resource capacity used when no pool is provided.
    pub fn capacity(mut self, capacity: u32) -> Self {
        assert!(capacity > 0, "Capacity must be > 0");
        self.capacity = Some(capacity);
        self
    }

    /// Registers a listener for work-unit events of the scheduler.
    pub fn work_unit_listener(mut self, listener: Box<dyn WorkUnitListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Builds the server instance.
    pub fn build(self) -> Server {
        let name = self.name.unwrap_or_else(|| format!("Server-{}", Uuid::new_v4()));
        let mut scheduler = self
            .scheduler
            .unwrap_or_else(|| Box::new(DefaultScheduler::with_name(format!("{}_Scheduler", name))));
        let availability = self.availability.unwrap_or_else(|| Box::new(FullAvailability));
        let pool = self.pool.unwrap_or_else(|| {
            Box::new(DefaultResourcePool::new(self.capacity.unwrap_or(1)))
        });
        if let Some(listener) = self.listener {
            scheduler.add_listener(listener);
        }

        let attributes = ServerAttributes::new(pool, availability);
        Server::new(name, attributes, scheduler)
    }
}
