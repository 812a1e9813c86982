use std::collections::HashMap;

use uuid::Uuid;

use crate::job::job::Job;
use crate::job::reservation::Reservation;
use crate::job::{Status, WorkUnit};
use crate::kernel::{EventType, Payload, SimContext, SimEvent, SEND_NOW};
use crate::predicate;
use crate::profile::range_list::RangeList;
use crate::profile::single::SingleProfile;
use crate::scheduler::conservative::ConsBackfillScheduler;
use crate::scheduler::{
    remaining_finish_time, JobComparator, ReservationScheduler, Scheduler,
};
use crate::server::attributes::ServerAttributes;

/// Conservative backfilling with support for advance reservations.
///
/// The policy keeps a second availability profile whose initial state is
/// fully allocated. Accepting a reservation allocates the window in the
/// main profile (so ordinary jobs cannot touch it) and releases the same
/// window into the reservation profile (so reservation-tagged jobs can
/// draw from it). When a job is cancelled the reserved windows stay where
/// they are; reservations never move.
pub struct ResConsBackfillScheduler {
    cons: ConsBackfillScheduler,
    reservations: HashMap<u32, Reservation>,
    profile_res: Option<SingleProfile>,
}

impl ResConsBackfillScheduler {
    pub fn new() -> Self {
        Self::with_name(format!("ResConsBackfillScheduler-{}", Uuid::new_v4()))
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            cons: ConsBackfillScheduler::with_name(name),
            reservations: HashMap::new(),
            profile_res: None,
        }
    }

    /// Sets the comparator used to order the waiting queue.
    pub fn set_sorting_comparator(&mut self, comparator: JobComparator) {
        self.cons.set_sorting_comparator(comparator);
    }

    /// The reservation with the given id, if currently held.
    pub fn reservation(&self, id: u32) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    fn profile_res(&self) -> &SingleProfile {
        self.profile_res.as_ref().expect("Scheduler has not been initialised")
    }

    fn profile_res_mut(&mut self) -> &mut SingleProfile {
        self.profile_res.as_mut().expect("Scheduler has not been initialised")
    }

    /// Schedules a job inside its reservation's window, drawing resources
    /// from the reservation profile.
    fn schedule_reservation_job(&mut self, ctx: &mut SimContext<'_>, mut job: Job) {
        let reservation_id = job.reservation_id().expect("Job has no reservation");
        let (res_start, res_ranges) = match self.reservations.get(&reservation_id) {
            Some(r) => (
                r.requested_start(),
                r.resource_ranges().cloned().unwrap_or_default(),
            ),
            None => {
                log::error!(
                    "Job #{} refers to unknown reservation #{}",
                    job.id(),
                    reservation_id
                );
                self.cons.base.set_job_status(ctx, &mut job, Status::Failed);
                self.cons.base.send_job_to_owner(ctx, job);
                return;
            }
        };

        let now = ctx.time();
        let start_time = res_start.max(now);
        let num_res = job.num_resources();

        // what is free for reservations, narrowed to this reservation's ranges
        let selected = self
            .profile_res()
            .check_availability(num_res, start_time, job.duration(), false)
            .map(|e| e.into_ranges().intersection(&res_ranges))
            .and_then(|avail| avail.select_resources(num_res));

        let selected = match selected {
            Some(selected) => selected,
            None => {
                log::error!(
                    "Insufficient resources reserved for job #{} under reservation #{}",
                    job.id(),
                    reservation_id
                );
                self.cons.base.set_job_status(ctx, &mut job, Status::Failed);
                self.cons.base.send_job_to_owner(ctx, job);
                return;
            }
        };

        self.profile_res_mut().allocate_resource_ranges(
            &selected,
            start_time,
            start_time + job.duration(),
        );

        if start_time > now {
            ctx.send_to_self(start_time - now, EventType::TaskStart, Payload::WorkId(job.id()));
            self.cons.base.set_job_status(ctx, &mut job, Status::Waiting);
        } else {
            self.cons.base.set_job_status(ctx, &mut job, Status::InExecution);
        }
        ctx.send_to_self(
            start_time - now + job.duration(),
            EventType::TaskComplete,
            Payload::WorkId(job.id()),
        );
        job.set_resource_ranges(selected);
        job.set_start_time(start_time);

        if job.status() == Status::InExecution {
            self.cons.state.running.add(job);
        } else {
            self.cons.state.waiting.add(job);
        }
    }

    /// Cancels every queued or running job that depends on the given
    /// reservation and returns their slots to the reservation profile.
    fn cancel_dependent_jobs(&mut self, ctx: &mut SimContext<'_>, reservation_id: u32) -> Vec<u32> {
        let now = ctx.time();
        let mut affected = Vec::new();

        let running_ids: Vec<u32> = self
            .cons
            .state
            .running
            .iter()
            .filter(|j| j.reservation_id() == Some(reservation_id))
            .map(|j| j.id())
            .collect();
        for id in running_ids {
            if let Some(mut job) = self.cons.state.running.remove(id) {
                let finish = remaining_finish_time(&job, now);
                if let Some(ranges) = job.resource_ranges().cloned() {
                    self.profile_res_mut().add_time_slot(now, finish, &ranges);
                }
                affected.push(id);
                self.cons.base.set_job_status(ctx, &mut job, Status::Cancelled);
                self.cons.base.send_job_to_owner(ctx, job);
            }
        }

        let waiting_ids: Vec<u32> = self
            .cons
            .state
            .waiting
            .iter()
            .filter(|j| j.reservation_id() == Some(reservation_id))
            .map(|j| j.id())
            .collect();
        for id in waiting_ids {
            if let Some(mut job) = self.cons.state.waiting.remove(id) {
                let start = job.start_time().max(now);
                let finish = job.start_time() + job.duration();
                if let Some(ranges) = job.resource_ranges().cloned() {
                    self.profile_res_mut().add_time_slot(start, finish, &ranges);
                }
                affected.push(id);
                self.cons.base.set_job_status(ctx, &mut job, Status::Cancelled);
                self.cons.base.send_job_to_owner(ctx, job);
            }
        }

        affected
    }
}

impl Default for ResConsBackfillScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ResConsBackfillScheduler {
    fn name(&self) -> &str {
        self.cons.name()
    }

    fn initialize(&mut self, attributes: ServerAttributes) {
        let capacity = attributes.resource_pool().capacity();
        self.cons.initialize(attributes);

        // resources are unavailable to reservations until reserved
        let mut profile = SingleProfile::new(capacity);
        profile.allocate_resource_ranges(&RangeList::span(0, capacity - 1), 0, i64::MAX);
        self.profile_res = Some(profile);
    }

    fn attributes(&self) -> &ServerAttributes {
        self.cons.attributes()
    }

    fn add_listener(&mut self, listener: Box<dyn crate::job::event::WorkUnitListener>) {
        self.cons.add_listener(listener);
    }

    fn process(&mut self, ctx: &mut SimContext<'_>, event: SimEvent) {
        match event.event_type() {
            EventType::ReservationStart => match event.payload().work_id() {
                Some(id) => {
                    let now = ctx.time();
                    match self.reservations.get_mut(&id) {
                        Some(r) => {
                            let previous = r.status();
                            if r.set_status(Status::InExecution, now) {
                                self.cons.base.fire_status_change(
                                    now,
                                    id,
                                    previous,
                                    Status::InExecution,
                                );
                            }
                        }
                        None => log::error!("Reservation #{} is not held by this server", id),
                    }
                }
                None => log::error!("Invalid reservation object"),
            },
            EventType::ReservationComplete => match event.payload().work_id() {
                Some(id) => self.do_reservation_completion(ctx, id),
                None => log::error!("Invalid reservation object"),
            },
            _ => self.cons.process(ctx, event),
        }
    }

    fn do_job_processing(&mut self, ctx: &mut SimContext<'_>, job: Job) {
        if job.has_reservation() {
            self.schedule_reservation_job(ctx, job);
        } else {
            self.cons.do_job_processing(ctx, job);
        }
    }

    fn do_job_completion(&mut self, ctx: &mut SimContext<'_>, job_id: u32) {
        self.cons.do_job_completion(ctx, job_id);
    }

    fn do_job_cancel(&mut self, ctx: &mut SimContext<'_>, job_id: u32) {
        self.cons.do_job_cancel(ctx, job_id);
    }

    fn as_reservation_scheduler(&mut self) -> Option<&mut dyn ReservationScheduler> {
        Some(self)
    }
}

impl ReservationScheduler for ResConsBackfillScheduler {
    fn do_reservation_processing(&mut self, ctx: &mut SimContext<'_>, mut reservation: Reservation) {
        let now = ctx.time();
        let start_time = reservation.requested_start();
        let duration = reservation.duration();
        let num_res = reservation.num_resources();

        let selected = self
            .cons
            .base
            .pool()
            .check_availability(num_res, start_time, duration)
            .and_then(|e| e.into_ranges().select_resources(num_res));

        match selected {
            Some(selected) => {
                self.cons.base.pool_mut().allocate_resources(
                    &selected,
                    start_time,
                    start_time + duration,
                );
                ctx.send_to_self(
                    (start_time - now).max(0),
                    EventType::ReservationStart,
                    Payload::WorkId(reservation.id()),
                );
                self.cons.base.set_reservation_status(ctx, &mut reservation, Status::Waiting);
                ctx.send_to_self(
                    (start_time - now).max(0) + duration,
                    EventType::ReservationComplete,
                    Payload::WorkId(reservation.id()),
                );
                reservation.set_resource_ranges(selected.clone());

                // open the reserved window in the reservation profile
                self.profile_res_mut().add_time_slot(
                    start_time,
                    start_time + duration,
                    &selected,
                );

                log::trace!("Accepted reservation #{} at {}", reservation.id(), now);
                let response = reservation.clone();
                self.reservations.insert(reservation.id(), reservation);
                if let Some(owner) = response.owner() {
                    ctx.send(
                        owner,
                        SEND_NOW,
                        EventType::ReservationResponse,
                        Payload::Reservation(Box::new(response)),
                    );
                }
            }
            None => {
                self.cons.base.set_reservation_status(ctx, &mut reservation, Status::Failed);
                if let Some(owner) = reservation.owner() {
                    ctx.send(
                        owner,
                        SEND_NOW,
                        EventType::ReservationResponse,
                        Payload::Reservation(Box::new(reservation)),
                    );
                }
            }
        }
    }

    fn do_reservation_completion(&mut self, ctx: &mut SimContext<'_>, reservation_id: u32) {
        log::trace!("Completing reservation #{} at {}", reservation_id, ctx.time());
        let mut reservation = match self.reservations.remove(&reservation_id) {
            Some(r) => r,
            None => {
                log::error!("Reservation #{} is not held by this server", reservation_id);
                return;
            }
        };
        self.cons.base.set_reservation_status(ctx, &mut reservation, Status::Complete);
        if let Some(owner) = reservation.owner() {
            ctx.send(
                owner,
                SEND_NOW,
                EventType::ReservationComplete,
                Payload::Reservation(Box::new(reservation)),
            );
        }
    }

    fn do_reservation_cancel(&mut self, ctx: &mut SimContext<'_>, reservation_id: u32) {
        let mut reservation = match self.reservations.remove(&reservation_id) {
            Some(r) => r,
            None => {
                log::error!("Reservation #{} is not held by this server", reservation_id);
                return;
            }
        };

        let start_time = reservation.requested_start();
        let duration = reservation.duration();
        let finish_time = start_time + duration;

        let mut affected = self.cons.state.compress_schedule(&mut self.cons.base, start_time);
        affected.extend(self.cancel_dependent_jobs(ctx, reservation_id));
        self.cons.state.cancel_job_events(ctx, &affected);
        ctx.cancel_future_events(predicate::reservation_events_of(reservation_id));

        // revert both profiles from now on: the rest of the window returns
        // to the main pool and becomes unavailable to reservations again
        let revert_start = start_time.max(ctx.time());
        if revert_start < finish_time {
            if let Some(ranges) = reservation.resource_ranges().cloned() {
                self.cons
                    .base
                    .pool_mut()
                    .release_resources(revert_start, finish_time, &ranges);
                self.profile_res_mut().allocate_resource_ranges(&ranges, revert_start, finish_time);
            }
        }

        self.cons.base.set_reservation_status(ctx, &mut reservation, Status::Cancelled);
        self.cons.state.reschedule_jobs(&mut self.cons.base, ctx, &affected);
    }
}
