//! Helpers for user entities that submit work to servers. A user entity
//! is any [`SimEntity`](crate::kernel::SimEntity) that calls these
//! functions from its hooks and handles the `RESULT_ARRIVE`,
//! `RESERVATION_RESPONSE` and `RESERVATION_COMPLETE` events a server
//! sends back.

use crate::job::job::Job;
use crate::job::reservation::Reservation;
use crate::job::WorkUnit;
use crate::kernel::{EntityId, EventType, Payload, SimContext, SEND_NOW};

/// Sends a job to a server `delay` clock units from now. The sender
/// becomes the job's owner unless one is already set.
pub fn submit_job(ctx: &mut SimContext<'_>, server: EntityId, delay: i64, mut job: Job) {
    if job.owner().is_none() {
        job.set_owner(ctx.self_id());
    }
    ctx.send(server, delay, EventType::TaskArrive, Payload::Job(Box::new(job)));
}

/// Sends a job to run under a previously requested reservation.
pub fn submit_reserved_job(
    ctx: &mut SimContext<'_>,
    server: EntityId,
    reservation_id: u32,
    delay: i64,
    mut job: Job,
) {
    job.set_reservation_id(reservation_id);
    submit_job(ctx, server, delay, job);
}

/// Requests the cancellation of a job.
pub fn cancel_job(ctx: &mut SimContext<'_>, server: EntityId, job_id: u32) {
    ctx.send(server, SEND_NOW, EventType::TaskCancel, Payload::WorkId(job_id));
}

/// Sends a reservation request to a server `delay` clock units from now.
/// The sender becomes the reservation's owner unless one is already set.
pub fn request_reservation(
    ctx: &mut SimContext<'_>,
    server: EntityId,
    delay: i64,
    mut reservation: Reservation,
) {
    if reservation.owner().is_none() {
        reservation.set_owner(ctx.self_id());
    }
    ctx.send(
        server,
        delay,
        EventType::ReservationRequest,
        Payload::Reservation(Box::new(reservation)),
    );
}

/// Requests the cancellation of a reservation.
pub fn cancel_reservation(ctx: &mut SimContext<'_>, server: EntityId, reservation_id: u32) {
    ctx.send(server, SEND_NOW, EventType::ReservationCancel, Payload::WorkId(reservation_id));
}
