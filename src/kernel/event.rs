use std::cmp::Ordering;

use crate::job::job::Job;
use crate::job::reservation::Reservation;
use crate::kernel::entity::EntityId;

/// The delay of an event that must be scheduled for the next tick.
pub const SEND_NOW: i64 = 0;

/// The types of simulation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A task arrives at a server.
    TaskArrive,
    /// Signals a scheduler that a task with a future allocation must start.
    TaskStart,
    /// A task is completed by a resource.
    TaskComplete,
    /// A task is cancelled.
    TaskCancel,
    /// A task is paused.
    TaskPause,
    /// Results are received by an entity.
    ResultArrive,
    /// A new simulation entity arrives in the system.
    EntityArrive,
    /// A simulation entity leaves the system.
    EntityLeave,
    /// An internal event an entity sent to itself.
    EntityInternal,
    /// A resource reservation request arrived at a server.
    ReservationRequest,
    /// A resource reservation starts.
    ReservationStart,
    /// A resource reservation is completed.
    ReservationComplete,
    /// A resource reservation is cancelled by its requester.
    ReservationCancel,
    /// Response to a reservation request.
    ReservationResponse,
}

/// The content attached to an event.
///
/// Jobs and reservations move between entities by value: a `TASK_ARRIVE`
/// carries the job itself, while self-addressed bookkeeping events
/// (`TASK_START`, `TASK_COMPLETE`, ...) reference queued work by id.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    None,
    Job(Box<Job>),
    Reservation(Box<Reservation>),
    WorkId(u32),
}

impl Payload {
    /// The id of the work unit this payload concerns, if any.
    pub fn work_id(&self) -> Option<u32> {
        match self {
            Payload::None => None,
            Payload::Job(job) => Some(crate::job::WorkUnit::id(job.as_ref())),
            Payload::Reservation(r) => Some(crate::job::WorkUnit::id(r.as_ref())),
            Payload::WorkId(id) => Some(*id),
        }
    }
}

/// A simulation event sent from one entity to another.
///
/// Events are ordered by `(time, serial)`: the serial is a monotonically
/// increasing number assigned by the kernel at creation, which keeps
/// co-temporal events in insertion order.
#[derive(Debug)]
pub struct SimEvent {
    time: i64,
    serial: u64,
    event_type: EventType,
    source: EntityId,
    destination: EntityId,
    payload: Payload,
}

impl SimEvent {
    pub(crate) fn new(
        time: i64,
        serial: u64,
        event_type: EventType,
        source: EntityId,
        destination: EntityId,
        payload: Payload,
    ) -> Self {
        Self { time, serial, event_type, source, destination, payload }
    }

    /// The simulation time at which the event is handled.
    pub fn time(&self) -> i64 {
        self.time
    }

    /// The creation serial of the event.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// The type of the event.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// The entity that created the event.
    pub fn source(&self) -> EntityId {
        self.source
    }

    /// The entity that handles the event.
    pub fn destination(&self) -> EntityId {
        self.destination
    }

    /// The content of the event.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Consumes the event, yielding its content.
    pub fn take_payload(self) -> Payload {
        self.payload
    }
}

impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.serial == other.serial
    }
}

impl Eq for SimEvent {}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then(self.serial.cmp(&other.serial))
    }
}
