//! Services consumed from the hosting world.
//!
//! The core never owns worlds, regions or schedulers. It reaches them through
//! [`Host`], which a server implements on top of its own chunk storage, event
//! bus and tick loop. [`MemoryHost`](crate::memory::MemoryHost) is the
//! in-process implementation used by tests and the demo.

use std::sync::Arc;

use crate::coords::{CellId, HeightRange, RegionId, WorldId};
use crate::events::{MoveReaction, WorldEvent};
use crate::key::{Namespace, NamespacedKey};
use crate::value::DataValue;

/// A unit of work deferred to the next tick.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where a deferred task must run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskAffinity {
    /// On the single global tick loop.
    Global,
    /// On the thread owning the given region.
    Region(RegionId),
}

/// Receives world-mutation events for one tenant.
pub trait WorldEventHandler: Send + Sync {
    /// Handles one event synchronously on the thread owning the affected region.
    fn handle(&self, event: &WorldEvent);
}

/// Blanket implementation for closures.
impl<F> WorldEventHandler for F
where
    F: Fn(&WorldEvent) + Send + Sync,
{
    fn handle(&self, event: &WorldEvent) {
        self(event);
    }
}

/// Everything the core needs from the world it runs in.
///
/// Region container calls load the region on demand; they never fail because
/// a region is not currently loaded.
pub trait Host: Send + Sync {
    /// Height range of a world, or `None` if the world is not known.
    fn height_range(&self, world: WorldId) -> Option<HeightRange>;

    /// Reads an entry from a region's persisted container.
    fn region_get(&self, region: &RegionId, key: &NamespacedKey) -> Option<DataValue>;

    /// Writes an entry into a region's persisted container.
    fn region_set(&self, region: &RegionId, key: NamespacedKey, value: DataValue);

    /// Removes an entry from a region's persisted container.
    fn region_remove(&self, region: &RegionId, key: &NamespacedKey);

    /// Lists every key in a region's persisted container.
    fn region_keys(&self, region: &RegionId) -> Vec<NamespacedKey>;

    /// How `cell` reacts to being pushed or pulled.
    fn move_reaction(&self, cell: &CellId) -> MoveReaction;

    /// Runs `task` exactly one tick from now.
    fn schedule_next_tick(&self, affinity: TaskAffinity, task: Task);

    /// Whether the tenant owning `namespace` is still running.
    fn is_tenant_active(&self, namespace: &Namespace) -> bool;

    /// Subscribes `handler` to world-mutation events on behalf of a tenant.
    fn subscribe(&self, namespace: &Namespace, handler: Arc<dyn WorldEventHandler>);

    /// Drops every handler subscribed on behalf of `namespace`.
    fn unsubscribe(&self, namespace: &Namespace);
}
