//! Short-lived "just written" markers for cells.
//!
//! Saving a cell's data marks it dirty until the next tick. A placement event
//! arriving for a dirty cell is the same action that wrote the data, so the
//! reconciler leaves it alone. The set is shared by every tenant and may be
//! touched from several region threads, hence the concurrent set.

use std::sync::Arc;

use cellmeta_config::SchedulerMode;
use dashmap::DashSet;

use crate::coords::CellId;
use crate::host::{Host, TaskAffinity};
use crate::key::Namespace;

/// Process-wide set of dirty cells with one-tick expiry.
#[derive(Debug)]
pub struct DirtySet {
    entries: Arc<DashSet<CellId>>,
    mode: SchedulerMode,
}

impl DirtySet {
    /// Creates an empty set scheduling expiry according to `mode`.
    pub fn new(mode: SchedulerMode) -> Self {
        Self {
            entries: Arc::new(DashSet::new()),
            mode,
        }
    }

    /// Marks `cell` dirty on behalf of `tenant` and schedules its expiry.
    ///
    /// Does nothing if the tenant is no longer active: the host would refuse
    /// the expiry task.
    pub fn mark(&self, host: &dyn Host, tenant: &Namespace, cell: CellId) {
        if !host.is_tenant_active(tenant) {
            tracing::trace!(%tenant, ?cell, "tenant inactive, not marking dirty");
            return;
        }

        self.entries.insert(cell);

        let affinity = match self.mode {
            SchedulerMode::Global => TaskAffinity::Global,
            SchedulerMode::RegionAffinity => TaskAffinity::Region(cell.region()),
        };
        let entries = Arc::clone(&self.entries);
        host.schedule_next_tick(
            affinity,
            Box::new(move || {
                entries.remove(&cell);
            }),
        );
    }

    /// Returns `true` if `cell` was written during the current tick.
    pub fn is_dirty(&self, cell: &CellId) -> bool {
        self.entries.contains(cell)
    }

    /// Number of dirty cells.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no cell is dirty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every marker. Pending expiry tasks become no-ops.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Scheduling mode used for expiry tasks.
    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::HeightRange;
    use crate::memory::MemoryHost;

    fn setup() -> (MemoryHost, Namespace, CellId) {
        let host = MemoryHost::new();
        let world = host.create_world(HeightRange::default());
        let ns = Namespace::new("tenant").unwrap();
        host.activate_tenant(&ns);
        (host, ns, CellId::new(world, 4, 70, -9))
    }

    #[test]
    fn test_mark_expires_after_one_tick() {
        let (host, ns, cell) = setup();
        let dirty = DirtySet::new(SchedulerMode::Global);

        dirty.mark(&host, &ns, cell);
        assert!(dirty.is_dirty(&cell));

        host.advance_tick();
        assert!(!dirty.is_dirty(&cell));
        assert!(dirty.is_empty());
    }

    #[test]
    fn test_repeated_marks_are_idempotent() {
        let (host, ns, cell) = setup();
        let dirty = DirtySet::new(SchedulerMode::Global);

        dirty.mark(&host, &ns, cell);
        dirty.mark(&host, &ns, cell);
        assert_eq!(dirty.len(), 1);
        assert_eq!(host.pending_tasks(), 2);

        host.advance_tick();
        assert!(!dirty.is_dirty(&cell));
        assert_eq!(host.pending_tasks(), 0);
    }

    #[test]
    fn test_inactive_tenant_is_skipped() {
        let (host, ns, cell) = setup();
        host.deactivate_tenant(&ns);
        let dirty = DirtySet::new(SchedulerMode::Global);

        dirty.mark(&host, &ns, cell);
        assert!(!dirty.is_dirty(&cell));
        assert_eq!(host.pending_tasks(), 0);
    }

    #[test]
    fn test_region_affinity_tags_the_owning_region() {
        let (host, ns, cell) = setup();
        let dirty = DirtySet::new(SchedulerMode::RegionAffinity);

        dirty.mark(&host, &ns, cell);
        let ran = host.advance_tick();
        assert_eq!(ran, vec![TaskAffinity::Region(cell.region())]);
        assert!(!dirty.is_dirty(&cell));
    }

    #[test]
    fn test_clear_drops_markers() {
        let (host, ns, cell) = setup();
        let dirty = DirtySet::new(SchedulerMode::Global);
        dirty.mark(&host, &ns, cell);
        dirty.clear();
        assert!(!dirty.is_dirty(&cell));
        // The expiry task still runs harmlessly.
        host.advance_tick();
        assert!(dirty.is_empty());
    }
}
