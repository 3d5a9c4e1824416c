//! In-process [`Host`] implementation.
//!
//! [`MemoryHost`] keeps worlds, region containers, cell types and tenant
//! liveness in concurrent maps, queues deferred tasks on a channel drained by
//! [`advance_tick`](MemoryHost::advance_tick), and forwards dispatched events
//! to every subscriber. It backs the test-suite and the demo binary.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::DashMap;

use crate::container::DataContainer;
use crate::coords::{CellId, HeightRange, RegionId, WorldId};
use crate::events::{CellType, MoveReaction, WorldEvent};
use crate::host::{Host, Task, TaskAffinity, WorldEventHandler};
use crate::key::{Namespace, NamespacedKey};
use crate::value::DataValue;

/// A task waiting for the next tick.
struct ScheduledTask {
    affinity: TaskAffinity,
    task: Task,
}

/// Host backed entirely by in-memory maps.
pub struct MemoryHost {
    worlds: DashMap<WorldId, HeightRange>,
    /// Region containers, created on first write.
    regions: DashMap<RegionId, DataContainer>,
    cell_types: DashMap<CellId, CellType>,
    reactions: DashMap<CellType, MoveReaction>,
    tenants: DashMap<Namespace, bool>,
    handlers: DashMap<Namespace, Vec<Arc<dyn WorldEventHandler>>>,
    task_sender: Sender<ScheduledTask>,
    task_receiver: Receiver<ScheduledTask>,
    tick: AtomicU64,
}

impl MemoryHost {
    /// Creates a host with no worlds.
    pub fn new() -> Self {
        let (task_sender, task_receiver) = unbounded();
        Self {
            worlds: DashMap::new(),
            regions: DashMap::new(),
            cell_types: DashMap::new(),
            reactions: DashMap::new(),
            tenants: DashMap::new(),
            handlers: DashMap::new(),
            task_sender,
            task_receiver,
            tick: AtomicU64::new(0),
        }
    }

    /// Creates a new world with the given height range.
    pub fn create_world(&self, height: HeightRange) -> WorldId {
        let id = WorldId::new_random();
        self.worlds.insert(id, height);
        id
    }

    /// Unloads a world. Its region data stays on "disk" but the world is no
    /// longer known.
    pub fn unload_world(&self, world: WorldId) {
        self.worlds.remove(&world);
    }

    /// Marks a tenant as running.
    pub fn activate_tenant(&self, namespace: &Namespace) {
        self.tenants.insert(namespace.clone(), true);
    }

    /// Marks a tenant as torn down.
    pub fn deactivate_tenant(&self, namespace: &Namespace) {
        self.tenants.insert(namespace.clone(), false);
    }

    /// Sets the type of a cell.
    pub fn set_cell_type(&self, cell: CellId, cell_type: CellType) {
        self.cell_types.insert(cell, cell_type);
    }

    /// Type of a cell; air when never set.
    pub fn cell_type(&self, cell: &CellId) -> CellType {
        self.cell_types
            .get(cell)
            .map(|t| t.value().clone())
            .unwrap_or(CellType::AIR)
    }

    /// Sets how cells of `cell_type` react to pistons.
    pub fn set_move_reaction(&self, cell_type: CellType, reaction: MoveReaction) {
        self.reactions.insert(cell_type, reaction);
    }

    /// Snapshot of a region's container; empty if the region holds nothing.
    pub fn region_container(&self, region: &RegionId) -> DataContainer {
        self.regions
            .get(region)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    /// Number of regions currently holding a container.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Delivers `event` to every subscribed handler.
    pub fn dispatch(&self, event: &WorldEvent) {
        let handlers: Vec<Arc<dyn WorldEventHandler>> = self
            .handlers
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        for handler in handlers {
            handler.handle(event);
        }
    }

    /// Number of handlers subscribed on behalf of `namespace`.
    pub fn subscriber_count(&self, namespace: &Namespace) -> usize {
        self.handlers.get(namespace).map(|h| h.len()).unwrap_or(0)
    }

    /// Number of tasks waiting for the next tick.
    pub fn pending_tasks(&self) -> usize {
        self.task_receiver.len()
    }

    /// Current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    /// Advances one tick, running every task scheduled before this call.
    ///
    /// Tasks scheduled by the tasks themselves wait for the following tick.
    /// Returns the affinities of the tasks that ran, in scheduling order.
    pub fn advance_tick(&self) -> Vec<TaskAffinity> {
        let due: Vec<ScheduledTask> = self.task_receiver.try_iter().collect();
        self.tick.fetch_add(1, Ordering::Relaxed);

        let mut ran = Vec::with_capacity(due.len());
        for scheduled in due {
            (scheduled.task)();
            ran.push(scheduled.affinity);
        }
        ran
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MemoryHost {
    fn height_range(&self, world: WorldId) -> Option<HeightRange> {
        self.worlds.get(&world).map(|h| *h.value())
    }

    fn region_get(&self, region: &RegionId, key: &NamespacedKey) -> Option<DataValue> {
        self.regions
            .get(region)
            .and_then(|c| c.get_value(key).cloned())
    }

    fn region_set(&self, region: &RegionId, key: NamespacedKey, value: DataValue) {
        self.regions
            .entry(*region)
            .or_default()
            .set_value(key, value);
    }

    fn region_remove(&self, region: &RegionId, key: &NamespacedKey) {
        if let Some(mut container) = self.regions.get_mut(region) {
            container.remove(key);
        }
        self.regions.remove_if(region, |_, container| container.is_empty());
    }

    fn region_keys(&self, region: &RegionId) -> Vec<NamespacedKey> {
        self.regions
            .get(region)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn move_reaction(&self, cell: &CellId) -> MoveReaction {
        let cell_type = self.cell_type(cell);
        self.reactions
            .get(&cell_type)
            .map(|r| *r.value())
            .unwrap_or_default()
    }

    fn schedule_next_tick(&self, affinity: TaskAffinity, task: Task) {
        // The receiver lives as long as `self`, so sending cannot fail.
        let _ = self.task_sender.send(ScheduledTask { affinity, task });
    }

    fn is_tenant_active(&self, namespace: &Namespace) -> bool {
        self.tenants.get(namespace).is_some_and(|active| *active)
    }

    fn subscribe(&self, namespace: &Namespace, handler: Arc<dyn WorldEventHandler>) {
        self.handlers
            .entry(namespace.clone())
            .or_default()
            .push(handler);
    }

    fn unsubscribe(&self, namespace: &Namespace) {
        self.handlers.remove(namespace);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
