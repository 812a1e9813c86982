use crate::job::Status;

/// Types of work-unit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkUnitEventType {
    /// The status of a work unit has changed.
    StatusChanged,
}

/// An event triggered by a change in a work unit, delivered to the
/// listeners registered with a scheduler.
#[derive(Debug, Clone)]
pub struct WorkUnitEvent {
    /// The simulation time at which the event occurred.
    pub time: i64,
    /// The kind of change.
    pub event_type: WorkUnitEventType,
    /// The id of the work unit concerned.
    pub unit_id: u32,
    /// The status of the unit prior to the event, if known.
    pub previous_status: Option<Status>,
    /// The status of the unit after the event.
    pub current_status: Status,
}

/// Receives work-unit events from a scheduler.
pub trait WorkUnitListener {
    /// Reacts to an event.
    fn on_event(&mut self, event: &WorkUnitEvent);
}

impl<F> WorkUnitListener for F
where
    F: FnMut(&WorkUnitEvent),
{
    fn on_event(&mut self, event: &WorkUnitEvent) {
        self(event)
    }
}
