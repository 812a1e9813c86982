//! The discrete-event kernel: a strictly monotonic virtual clock driven by
//! a time-ordered event queue.
//!
//! A simulation has two event queues: the *future* queue, ordered by
//! `(time, serial)`, and the *deferred* list holding the events pulled for
//! the current clock tick. At each tick the kernel delivers every deferred
//! event to its destination entity, then moves the earliest future events
//! (all sharing the earliest time) into the deferred list and advances the
//! clock. The simulation ends when the future queue runs dry or when a
//! configured time span lapses.

pub mod clock;
pub mod entity;
pub mod event;

pub use clock::{ClockUnit, SimClock};
pub use entity::{EntityId, SimEntity};
pub use event::{EventType, Payload, SimEvent, SEND_NOW};

use std::cmp::Ordering;
use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use slotmap::SlotMap;

use crate::error::{Error, Result};

/// The lifecycle status of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStatus {
    NotStarted,
    Running,
    Paused,
    Complete,
}

impl SimulationStatus {
    fn can_move_to(self, next: SimulationStatus) -> bool {
        use SimulationStatus::*;
        match self {
            NotStarted => matches!(next, Running),
            Running => matches!(next, Paused | Complete),
            Paused => matches!(next, Running),
            Complete => matches!(next, NotStarted),
        }
    }

    fn name(self) -> &'static str {
        match self {
            SimulationStatus::NotStarted => "not started",
            SimulationStatus::Running => "running",
            SimulationStatus::Paused => "paused",
            SimulationStatus::Complete => "complete",
        }
    }
}

struct EntitySlot {
    name: String,
    enabled: bool,
    entity: Option<Box<dyn SimEntity>>,
}

type TickComparator = Box<dyn Fn(&SimEvent, &SimEvent) -> Ordering>;

/// Manages a simulation run: the clock, the event queues and the entity
/// registry.
///
/// Entities are registered before (or during) the run; [`run`](Self::run)
/// starts them, processes events until completion and shuts them down.
/// Given the same configuration and entity set, the sequence of dispatched
/// events is reproducible: there is no wall-clock or random-source
/// influence on ordering.
pub struct Simulation {
    clock: SimClock,
    future: BTreeSet<SimEvent>,
    deferred: VecDeque<SimEvent>,
    entities: SlotMap<EntityId, EntitySlot>,
    registration_order: Vec<EntityId>,
    next_serial: u64,
    status: SimulationStatus,
    tick_comparator: Option<TickComparator>,
    time_span: Option<i64>,
    abrupt_interrupt: bool,
    end_warm_up: i64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// Creates a new, empty simulation.
    pub fn new() -> Self {
        Self {
            clock: SimClock::new(),
            future: BTreeSet::new(),
            deferred: VecDeque::new(),
            entities: SlotMap::with_key(),
            registration_order: Vec::new(),
            next_serial: 0,
            status: SimulationStatus::NotStarted,
            tick_comparator: None,
            time_span: None,
            abrupt_interrupt: false,
            end_warm_up: 0,
        }
    }

    /// Adds an entity to the simulation. If the simulation is already
    /// running, the entity is started immediately.
    pub fn register_entity(&mut self, entity: Box<dyn SimEntity>) -> EntityId {
        let name = entity.name().to_string();
        let id = self.entities.insert(EntitySlot { name, enabled: true, entity: Some(entity) });
        self.registration_order.push(id);
        if self.status == SimulationStatus::Running {
            self.with_entity(id, |entity, ctx| entity.on_start(ctx));
        }
        id
    }

    /// The current simulation time.
    pub fn current_time(&self) -> i64 {
        self.clock.time()
    }

    /// The wall date the current virtual time corresponds to.
    pub fn current_date(&self) -> DateTime<Utc> {
        self.clock.current_date()
    }

    /// The simulation clock.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Sets the clock unit used by the simulation. Defaults to seconds.
    pub fn set_clock_unit(&mut self, unit: ClockUnit) {
        self.clock.set_unit(unit);
    }

    /// Sets the date that represents the start time of the simulation,
    /// used to derive day-of-week effects.
    pub fn set_start_date(&mut self, date: DateTime<Utc>) -> Result<()> {
        if self.is_running() {
            return Err(Error::InvalidSimulationState(self.status.name()));
        }
        self.clock.set_start_date(date);
        Ok(())
    }

    /// Installs a comparator that sorts the events handled at each clock
    /// tick. The sort is stable and falls back to the creation serial, so
    /// co-temporal events that compare equal keep insertion order.
    pub fn set_tick_comparator(
        &mut self,
        comparator: impl Fn(&SimEvent, &SimEvent) -> Ordering + 'static,
    ) {
        self.tick_comparator = Some(Box::new(comparator));
    }

    /// Gives the simulation a fixed time length.
    ///
    /// Without a time span the simulation runs until the future queue is
    /// empty, which never happens if some entity keeps scheduling internal
    /// events at regular intervals. With `abrupt_interrupt` the run stops
    /// as soon as the clock reaches `span`; otherwise the span only serves
    /// as a marker for entities and the run still ends on queue exhaustion.
    pub fn set_time_span(&mut self, span: i64, abrupt_interrupt: bool) -> Result<()> {
        assert!(span > 0, "Span must be greater than 0");
        if let Some(existing) = self.time_span {
            return Err(Error::TimeSpanAlreadySet(existing));
        }
        self.time_span = Some(span);
        self.abrupt_interrupt = abrupt_interrupt;
        Ok(())
    }

    /// The configured time span, if any.
    pub fn time_span(&self) -> Option<i64> {
        self.time_span
    }

    /// Marks the current clock time as the end of the warm-up phase.
    pub fn set_end_of_warm_up(&mut self) -> Result<()> {
        if self.end_warm_up != 0 {
            return Err(Error::WarmUpAlreadySet(self.end_warm_up));
        }
        self.end_warm_up = self.clock.time();
        Ok(())
    }

    /// The end of the warm-up phase.
    pub fn end_of_warm_up(&self) -> i64 {
        self.end_warm_up
    }

    /// The simulation status.
    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SimulationStatus::Running
    }

    pub fn is_paused(&self) -> bool {
        self.status == SimulationStatus::Paused
    }

    pub fn has_started(&self) -> bool {
        self.status != SimulationStatus::NotStarted
    }

    /// Runs the simulation until completion.
    pub fn run(&mut self) -> Result<()> {
        if !self.status.can_move_to(SimulationStatus::Running) {
            return Err(Error::InvalidSimulationState(self.status.name()));
        }
        log::info!("Starting the simulation...");
        self.status = SimulationStatus::Running;
        self.start_entities();
        if self.process_events() {
            self.shutdown_simulation();
        }
        Ok(())
    }

    /// Pauses a running simulation. Processing stops at the next event
    /// boundary; already deferred events stay queued.
    pub fn pause(&mut self) -> Result<()> {
        if !self.status.can_move_to(SimulationStatus::Paused) {
            return Err(Error::InvalidSimulationState(self.status.name()));
        }
        self.status = SimulationStatus::Paused;
        Ok(())
    }

    /// Resumes a previously paused simulation.
    pub fn resume(&mut self) -> Result<()> {
        if !self.status.can_move_to(SimulationStatus::Running) {
            return Err(Error::InvalidSimulationState(self.status.name()));
        }
        self.status = SimulationStatus::Running;
        if self.process_events() {
            self.shutdown_simulation();
        }
        Ok(())
    }

    /// Resets a completed simulation so the instance can be reused.
    pub fn reset(&mut self) -> Result<()> {
        if !self.status.can_move_to(SimulationStatus::NotStarted) {
            return Err(Error::InvalidSimulationState(self.status.name()));
        }
        self.future.clear();
        self.deferred.clear();
        self.entities.clear();
        self.registration_order.clear();
        self.next_serial = 0;
        self.clock.reset();
        self.time_span = None;
        self.abrupt_interrupt = false;
        self.end_warm_up = 0;
        self.status = SimulationStatus::NotStarted;
        Ok(())
    }

    /// Returns the id of the entity with the given name.
    pub fn entity_id_by_name(&self, name: &str) -> Option<EntityId> {
        self.registration_order
            .iter()
            .copied()
            .find(|id| self.entities.get(*id).map(|s| s.name == name).unwrap_or(false))
    }

    /// Returns the entity with the given id, if registered.
    pub fn entity(&self, id: EntityId) -> Option<&dyn SimEntity> {
        self.entities.get(id).and_then(|slot| slot.entity.as_deref())
    }

    /// Returns the ids of the entities matching the given filter.
    pub fn entity_ids(&self, filter: impl Fn(&dyn SimEntity) -> bool) -> Vec<EntityId> {
        self.registration_order
            .iter()
            .copied()
            .filter(|id| {
                self.entities
                    .get(*id)
                    .and_then(|slot| slot.entity.as_deref())
                    .map(&filter)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Enables or disables an entity. Events addressed to a disabled
    /// entity are silently dropped at delivery.
    pub fn set_entity_enabled(&mut self, id: EntityId, enabled: bool) {
        if let Some(slot) = self.entities.get_mut(id) {
            slot.enabled = enabled;
        }
    }

    /// Counts the future events matching the given filter.
    pub fn count_future_events(&self, filter: impl Fn(&SimEvent) -> bool) -> usize {
        self.future.iter().filter(|ev| filter(ev)).count()
    }

    /// Checks whether at least one future event matches the given filter.
    pub fn has_future_event(&self, filter: impl Fn(&SimEvent) -> bool) -> bool {
        self.future.iter().any(|ev| filter(ev))
    }

    /// Cancels every future event matching the given filter. Events
    /// already deferred for the current tick are not affected.
    pub fn cancel_future_events(&mut self, filter: impl Fn(&SimEvent) -> bool) -> usize {
        let before = self.future.len();
        self.future.retain(|ev| !filter(ev));
        before - self.future.len()
    }

    /// Cancels the first future event (in `(time, serial)` order) matching
    /// the given filter.
    pub fn cancel_next_future_event(&mut self, filter: impl Fn(&SimEvent) -> bool) -> bool {
        let found = self.future.iter().find(|ev| filter(ev)).map(|ev| (ev.time(), ev.serial()));
        if let Some((time, serial)) = found {
            return self.future.remove(&SimEvent::new(
                time,
                serial,
                EventType::EntityInternal,
                EntityId::default(),
                EntityId::default(),
                Payload::None,
            ));
        }
        false
    }

    // Used by an entity, through its context, to send an event to another.
    pub(crate) fn send(
        &mut self,
        source: EntityId,
        destination: EntityId,
        delay: i64,
        event_type: EventType,
        payload: Payload,
    ) {
        assert!(delay >= 0, "Send delay must be >= 0");
        let serial = self.next_serial;
        self.next_serial += 1;
        self.future.insert(SimEvent::new(
            self.clock.time() + delay,
            serial,
            event_type,
            source,
            destination,
            payload,
        ));
    }

    fn start_entities(&mut self) {
        for id in self.registration_order.clone() {
            self.with_entity(id, |entity, ctx| entity.on_start(ctx));
        }
    }

    fn shutdown_simulation(&mut self) {
        for id in self.registration_order.clone() {
            self.with_entity(id, |entity, ctx| entity.on_shutdown(ctx));
        }
        self.status = SimulationStatus::Complete;
        log::info!("The simulation is complete...");
    }

    fn process_events(&mut self) -> bool {
        loop {
            if self.is_paused() {
                return false;
            }
            if let Some(span) = self.time_span {
                if self.abrupt_interrupt && self.clock.time() >= span {
                    return true;
                }
            }
            if self.run_clock_tick() {
                return true;
            }
        }
    }

    /// Executes all events scheduled for one tick of the clock.
    ///
    /// # Returns
    /// `true` when the future queue is empty and the run terminates.
    fn run_clock_tick(&mut self) -> bool {
        if let Some(comparator) = self.tick_comparator.as_ref() {
            self.deferred
                .make_contiguous()
                .sort_by(|a, b| comparator(a, b).then(a.serial().cmp(&b.serial())));
        }

        while let Some(ev) = self.deferred.pop_front() {
            if self.is_paused() {
                self.deferred.push_front(ev);
                return false;
            }
            self.deliver(ev);
        }

        let first = match self.future.pop_first() {
            Some(ev) => ev,
            None => return true,
        };
        assert!(
            first.time() >= self.clock.time(),
            "The event was scheduled for the past: event time {}, clock {}",
            first.time(),
            self.clock.time()
        );
        self.clock.set_time(first.time());
        let tick_time = first.time();
        self.deferred.push_back(first);

        // gather the co-temporal batch
        while let Some(next) = self.future.first() {
            if next.time() != tick_time {
                break;
            }
            let next = self.future.pop_first().unwrap();
            self.deferred.push_back(next);
        }
        false
    }

    fn deliver(&mut self, event: SimEvent) {
        let destination = event.destination();
        let slot = self
            .entities
            .get_mut(destination)
            .unwrap_or_else(|| panic!("Event addressed to an unknown entity: {:?}", destination));
        if !slot.enabled {
            log::trace!("Dropping event for disabled entity {}", slot.name);
            return;
        }
        let mut entity = slot
            .entity
            .take()
            .expect("Entity is already processing an event");
        let mut ctx = SimContext { sim: &mut *self, self_id: destination };
        entity.process(&mut ctx, event);
        if let Some(slot) = self.entities.get_mut(destination) {
            slot.entity = Some(entity);
        }
    }

    fn with_entity(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Box<dyn SimEntity>, &mut SimContext<'_>),
    ) {
        let entity = self.entities.get_mut(id).and_then(|slot| slot.entity.take());
        if let Some(mut entity) = entity {
            let mut ctx = SimContext { sim: &mut *self, self_id: id };
            f(&mut entity, &mut ctx);
            if let Some(slot) = self.entities.get_mut(id) {
                slot.entity = Some(entity);
            }
        }
    }
}

/// The handle through which an entity interacts with the kernel while
/// handling an event or a lifecycle hook.
pub struct SimContext<'a> {
    sim: &'a mut Simulation,
    self_id: EntityId,
}

impl SimContext<'_> {
    /// The id of the entity this context belongs to.
    pub fn self_id(&self) -> EntityId {
        self.self_id
    }

    /// The current simulation time.
    pub fn time(&self) -> i64 {
        self.sim.current_time()
    }

    /// The wall date the current virtual time corresponds to.
    pub fn current_date(&self) -> DateTime<Utc> {
        self.sim.current_date()
    }

    /// The end of the configured warm-up phase.
    pub fn end_of_warm_up(&self) -> i64 {
        self.sim.end_of_warm_up()
    }

    /// Sends an event to another entity, `delay` clock units from now.
    pub fn send(
        &mut self,
        destination: EntityId,
        delay: i64,
        event_type: EventType,
        payload: Payload,
    ) {
        self.sim.send(self.self_id, destination, delay, event_type, payload);
    }

    /// Sends an event to this entity itself.
    pub fn send_to_self(&mut self, delay: i64, event_type: EventType, payload: Payload) {
        self.sim.send(self.self_id, self.self_id, delay, event_type, payload);
    }

    /// Registers a new entity; it is started immediately since the
    /// simulation is running.
    pub fn register_entity(&mut self, entity: Box<dyn SimEntity>) -> EntityId {
        self.sim.register_entity(entity)
    }

    /// Enables or disables an entity.
    pub fn set_entity_enabled(&mut self, id: EntityId, enabled: bool) {
        self.sim.set_entity_enabled(id, enabled);
    }

    /// Returns the id of the entity with the given name.
    pub fn entity_id_by_name(&self, name: &str) -> Option<EntityId> {
        self.sim.entity_id_by_name(name)
    }

    /// Cancels every future event matching the filter.
    pub fn cancel_future_events(&mut self, filter: impl Fn(&SimEvent) -> bool) -> usize {
        self.sim.cancel_future_events(filter)
    }

    /// Cancels the first future event matching the filter.
    pub fn cancel_next_future_event(&mut self, filter: impl Fn(&SimEvent) -> bool) -> bool {
        self.sim.cancel_next_future_event(filter)
    }

    /// Counts the future events matching the filter.
    pub fn count_future_events(&self, filter: impl Fn(&SimEvent) -> bool) -> usize {
        self.sim.count_future_events(filter)
    }

    /// Checks whether at least one future event matches the filter.
    pub fn has_future_event(&self, filter: impl Fn(&SimEvent) -> bool) -> bool {
        self.sim.has_future_event(filter)
    }

    /// Requests the simulation to pause at the next event boundary.
    pub fn pause_simulation(&mut self) -> Result<()> {
        self.sim.pause()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        name: String,
        seen: Rc<RefCell<Vec<(i64, u64)>>>,
    }

    impl SimEntity for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn process(&mut self, ctx: &mut SimContext<'_>, event: SimEvent) {
            self.seen.borrow_mut().push((ctx.time(), event.serial()));
        }
    }

    struct Blaster {
        name: String,
        target: EntityId,
        delays: Vec<i64>,
    }

    impl SimEntity for Blaster {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_start(&mut self, ctx: &mut SimContext<'_>) {
            for delay in &self.delays {
                ctx.send(self.target, *delay, EventType::TaskArrive, Payload::None);
            }
        }

        fn process(&mut self, _ctx: &mut SimContext<'_>, _event: SimEvent) {}
    }

    #[test]
    fn events_are_delivered_in_time_then_serial_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulation::new();
        let recorder = sim.register_entity(Box::new(Recorder {
            name: "recorder".into(),
            seen: Rc::clone(&seen),
        }));
        sim.register_entity(Box::new(Blaster {
            name: "blaster".into(),
            target: recorder,
            delays: vec![30, 10, 10, 20],
        }));

        sim.run().unwrap();
        assert_eq!(sim.status(), SimulationStatus::Complete);

        let seen = seen.borrow();
        let times: Vec<i64> = seen.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![10, 10, 20, 30]);
        // the two co-temporal events keep insertion order
        assert!(seen[0].1 < seen[1].1);
        assert!(sim.entity(recorder).is_some());
        assert_eq!(sim.entity_id_by_name("recorder"), Some(recorder));
    }

    #[test]
    fn tick_comparator_reorders_co_temporal_events() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulation::new();
        let recorder = sim.register_entity(Box::new(Recorder {
            name: "recorder".into(),
            seen: Rc::clone(&seen),
        }));
        sim.register_entity(Box::new(Blaster {
            name: "blaster".into(),
            target: recorder,
            delays: vec![10, 10, 10],
        }));
        // reverse the serial order within a tick
        sim.set_tick_comparator(|a, b| b.serial().cmp(&a.serial()));

        sim.run().unwrap();

        let serials: Vec<u64> = seen.borrow().iter().map(|(_, s)| *s).collect();
        let mut expected = serials.clone();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(serials, expected);
    }

    #[test]
    fn run_twice_requires_reset() {
        let mut sim = Simulation::new();
        sim.run().unwrap();
        assert!(matches!(sim.run(), Err(Error::InvalidSimulationState(_))));
        sim.reset().unwrap();
        sim.run().unwrap();
    }

    #[test]
    fn reset_before_completion_is_rejected() {
        let mut sim = Simulation::new();
        assert!(sim.reset().is_err());
    }

    #[test]
    fn time_span_cannot_be_set_twice() {
        let mut sim = Simulation::new();
        sim.set_time_span(100, true).unwrap();
        assert!(matches!(sim.set_time_span(200, true), Err(Error::TimeSpanAlreadySet(100))));
    }

    #[test]
    #[should_panic(expected = "Send delay must be >= 0")]
    fn negative_delay_panics() {
        let mut sim = Simulation::new();
        let a = sim.register_entity(Box::new(Recorder {
            name: "a".into(),
            seen: Rc::new(RefCell::new(Vec::new())),
        }));
        sim.send(a, a, -1, EventType::TaskArrive, Payload::None);
    }
}
