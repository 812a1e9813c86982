use slotmap::new_key_type;

use crate::kernel::event::SimEvent;
use crate::kernel::SimContext;

new_key_type! {
    /// Identifies an entity registered with a [`Simulation`].
    ///
    /// [`Simulation`]: crate::kernel::Simulation
    pub struct EntityId;
}

/// A simulation participant: it handles events delivered by the kernel and
/// sends events to other entities through its [`SimContext`].
///
/// The kernel drives three lifecycle hooks:
///
/// - [`on_start`](Self::on_start) when the simulation starts (or at
///   registration time if the simulation is already running). Initial
///   events are created here; an entity that reads a workload file
///   triggers the reading and event creation from this hook.
/// - [`process`](Self::process) whenever an event addressed to the entity
///   is due. Each call runs to completion; an event sent with delay `0` is
///   delivered on the next tick, never within the current call.
/// - [`on_shutdown`](Self::on_shutdown) before the simulation completes.
pub trait SimEntity {
    /// The entity's name.
    fn name(&self) -> &str;

    /// Invoked when the simulation starts.
    fn on_start(&mut self, ctx: &mut SimContext<'_>) {
        let _ = ctx;
    }

    /// Invoked for every event addressed to this entity.
    fn process(&mut self, ctx: &mut SimContext<'_>, event: SimEvent);

    /// Invoked before the simulation finishes.
    fn on_shutdown(&mut self, ctx: &mut SimContext<'_>) {
        let _ = ctx;
    }
}
