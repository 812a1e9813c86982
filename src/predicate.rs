//! Predicate constructors for filtering and cancelling simulation events.

use std::collections::HashSet;

use crate::kernel::{EntityId, EventType, SimEvent};

/// Matches the events sent by a given entity.
pub fn sent_by(entity: EntityId) -> impl Fn(&SimEvent) -> bool {
    move |ev| ev.source() == entity
}

/// Matches the events addressed to a given entity.
pub fn addressed_to(entity: EntityId) -> impl Fn(&SimEvent) -> bool {
    move |ev| ev.destination() == entity
}

/// Matches the `TASK_START` and `TASK_COMPLETE` events of a set of jobs.
pub fn job_events_by_ids(job_ids: HashSet<u32>) -> impl Fn(&SimEvent) -> bool {
    move |ev| {
        matches!(ev.event_type(), EventType::TaskStart | EventType::TaskComplete)
            && ev.payload().work_id().map(|id| job_ids.contains(&id)).unwrap_or(false)
    }
}

/// Matches the `TASK_COMPLETE` event of a single job.
pub fn completion_of(job_id: u32) -> impl Fn(&SimEvent) -> bool {
    move |ev| {
        ev.event_type() == EventType::TaskComplete && ev.payload().work_id() == Some(job_id)
    }
}

/// Matches the `RESERVATION_START` and `RESERVATION_COMPLETE` events of a
/// reservation.
pub fn reservation_events_of(reservation_id: u32) -> impl Fn(&SimEvent) -> bool {
    move |ev| {
        matches!(
            ev.event_type(),
            EventType::ReservationStart | EventType::ReservationComplete
        ) && ev.payload().work_id() == Some(reservation_id)
    }
}
