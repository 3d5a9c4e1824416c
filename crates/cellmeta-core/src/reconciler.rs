//! Keeps stored cell data consistent with world mutations.
//!
//! For every event the reconciler filters the affected cells down to those
//! holding unprotected data for its tenant, raises a cancellable notice, and
//! only then clears or relocates the data.

use std::sync::Arc;

use crate::coords::{CellId, Direction};
use crate::events::{CellType, MoveNotice, MoveReaction, Notifier, RemoveNotice, WorldEvent};
use crate::host::WorldEventHandler;
use crate::store::{CellStore, Tenant};

/// Applies the per-event data policy for one tenant.
pub struct Reconciler {
    tenant: Tenant,
    notifier: Arc<Notifier>,
}

impl Reconciler {
    /// Creates a reconciler for `tenant`, raising notices on `notifier`.
    pub fn new(tenant: Tenant, notifier: Arc<Notifier>) -> Self {
        Self { tenant, notifier }
    }

    /// The tenant whose data this reconciler maintains.
    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Applies the policy for one world event.
    pub fn reconcile(&self, event: &WorldEvent) {
        match event {
            WorldEvent::Break { cell } | WorldEvent::Burn { cell } => {
                self.remove(*cell, event);
            }
            WorldEvent::Place { cell } => {
                // A dirty cell is being placed by the same action that just
                // stored its data.
                if self.tenant.is_dirty(cell) {
                    tracing::trace!(?cell, "placement of freshly written cell, keeping data");
                    return;
                }
                self.remove(*cell, event);
            }
            WorldEvent::Fade { cell, from, to } => {
                if *from == CellType::FIRE || from == to {
                    return;
                }
                self.remove(*cell, event);
            }
            WorldEvent::EntityChange { cell, from, to } => {
                if from != to {
                    self.remove(*cell, event);
                }
            }
            WorldEvent::BlockExplode { cells } | WorldEvent::EntityExplode { cells } => {
                for cell in cells {
                    self.remove(*cell, event);
                }
            }
            WorldEvent::StructureGrow { states } | WorldEvent::Fertilize { states } => {
                for state in states {
                    self.remove(state.cell, event);
                }
            }
            WorldEvent::PistonExtend { direction, cells }
            | WorldEvent::PistonRetract { direction, cells } => {
                self.relocate(cells, *direction, event);
            }
        }
    }

    /// Opens the store for `cell` if it holds unprotected data.
    fn reconcilable(&self, cell: CellId) -> Option<CellStore> {
        if !self.tenant.has_data(&cell) {
            return None;
        }
        let store = self.tenant.store(cell);
        if store.is_empty() || store.is_protected() {
            return None;
        }
        Some(store)
    }

    /// Clears `cell` unless it has no data, is protected, or a listener vetoes.
    fn remove(&self, cell: CellId, cause: &WorldEvent) {
        let Some(mut store) = self.reconcilable(cell) else {
            return;
        };
        let mut notice = RemoveNotice::new(self.tenant.namespace(), cell, cause);
        if !self.notifier.remove(&mut notice) {
            tracing::debug!(?cell, "removal cancelled by listener");
            return;
        }
        store.clear();
        tracing::debug!(tenant = %self.tenant.namespace(), ?cell, "cleared cell data");
    }

    /// Moves data of pushed/pulled cells one step along `direction`.
    ///
    /// Accepted moves are applied last-to-first. Cells in a push line up so
    /// that each destination is the next mover's source; copying front to
    /// back would overwrite a source before it had been copied out.
    fn relocate(&self, cells: &[CellId], direction: Direction, cause: &WorldEvent) {
        let mut moves: Vec<(CellId, CellStore)> = Vec::with_capacity(cells.len());

        for &cell in cells {
            let Some(store) = self.reconcilable(cell) else {
                continue;
            };
            if self.tenant.host().move_reaction(&cell) == MoveReaction::Break {
                self.remove(cell, cause);
                continue;
            }

            let destination = cell.relative(direction);
            let mut notice = MoveNotice::new(self.tenant.namespace(), cell, destination, cause);
            if !self.notifier.relocate(&mut notice) {
                tracing::debug!(?cell, ?destination, "move cancelled by listener");
                continue;
            }
            moves.push((destination, store));
        }

        for (destination, mut store) in moves.into_iter().rev() {
            store.copy_to(destination);
            store.clear();
            tracing::debug!(from = ?store.id(), to = ?destination, "relocated cell data");
        }
    }
}

impl WorldEventHandler for Reconciler {
    fn handle(&self, event: &WorldEvent) {
        self.reconcile(event);
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("tenant", &self.tenant)
            .field("listeners", &self.notifier.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{HeightRange, WorldId};
    use crate::dirty::DirtySet;
    use crate::events::{CellSnapshot, DataListener};
    use crate::key::{Namespace, NamespacedKey};
    use crate::memory::MemoryHost;
    use cellmeta_config::SchedulerMode;

    struct Fixture {
        host: Arc<MemoryHost>,
        notifier: Arc<Notifier>,
        reconciler: Reconciler,
        world: WorldId,
    }

    impl Fixture {
        fn tenant(&self) -> &Tenant {
            self.reconciler.tenant()
        }

        fn put(&self, cell: CellId, id: i32) {
            self.tenant().store(cell).set(id_key(), id);
        }

        fn id_at(&self, cell: CellId) -> Option<i32> {
            self.tenant().store(cell).get(&id_key())
        }

        fn cell(&self, x: i32, y: i32, z: i32) -> CellId {
            CellId::new(self.world, x, y, z)
        }
    }

    fn fixture() -> Fixture {
        let host = Arc::new(MemoryHost::new());
        let world = host.create_world(HeightRange::default());
        let ns = Namespace::new("tenant").unwrap();
        host.activate_tenant(&ns);
        let tenant = Tenant::new(
            ns,
            host.clone(),
            Arc::new(DirtySet::new(SchedulerMode::Global)),
        );
        let notifier = Arc::new(Notifier::new());
        let reconciler = Reconciler::new(tenant, Arc::clone(&notifier));
        Fixture {
            host,
            notifier,
            reconciler,
            world,
        }
    }

    fn id_key() -> NamespacedKey {
        NamespacedKey::parse("tenant:id").unwrap()
    }

    struct VetoAll;

    impl DataListener for VetoAll {
        fn on_remove(&self, notice: &mut RemoveNotice<'_>) {
            notice.set_cancelled(true);
        }
        fn on_move(&self, notice: &mut MoveNotice<'_>) {
            notice.set_cancelled(true);
        }
    }

    #[test]
    fn test_break_clears_data() {
        let f = fixture();
        let cell = f.cell(0, 64, 0);
        f.put(cell, 1);
        f.reconciler.reconcile(&WorldEvent::Break { cell });
        assert_eq!(f.id_at(cell), None);
        assert!(!f.tenant().has_data(&cell));
    }

    #[test]
    fn test_place_on_dirty_cell_keeps_data_until_tick_passes() {
        let f = fixture();
        let cell = f.cell(3, 70, 3);
        f.put(cell, 7);

        f.reconciler.reconcile(&WorldEvent::Place { cell });
        assert_eq!(f.id_at(cell), Some(7));

        f.host.advance_tick();
        f.reconciler.reconcile(&WorldEvent::Place { cell });
        assert_eq!(f.id_at(cell), None);
    }

    #[test]
    fn test_fade_from_fire_or_same_type_is_ignored() {
        let f = fixture();
        let cell = f.cell(1, 1, 1);
        f.put(cell, 1);
        f.host.advance_tick();

        f.reconciler.reconcile(&WorldEvent::Fade {
            cell,
            from: CellType::FIRE,
            to: CellType::AIR,
        });
        assert_eq!(f.id_at(cell), Some(1));

        let ice = CellType::new("ice");
        f.reconciler.reconcile(&WorldEvent::Fade {
            cell,
            from: ice.clone(),
            to: ice.clone(),
        });
        assert_eq!(f.id_at(cell), Some(1));

        f.reconciler.reconcile(&WorldEvent::Fade {
            cell,
            from: ice,
            to: CellType::new("water"),
        });
        assert_eq!(f.id_at(cell), None);
    }

    #[test]
    fn test_entity_change_only_clears_on_type_change() {
        let f = fixture();
        let cell = f.cell(2, 2, 2);
        f.put(cell, 1);

        let dirt = CellType::new("dirt");
        f.reconciler.reconcile(&WorldEvent::EntityChange {
            cell,
            from: dirt.clone(),
            to: dirt.clone(),
        });
        assert_eq!(f.id_at(cell), Some(1));

        f.reconciler.reconcile(&WorldEvent::EntityChange {
            cell,
            from: dirt,
            to: CellType::AIR,
        });
        assert_eq!(f.id_at(cell), None);
    }

    #[test]
    fn test_explosion_and_growth_clear_every_listed_cell() {
        let f = fixture();
        let a = f.cell(0, 5, 0);
        let b = f.cell(1, 5, 0);
        let untouched = f.cell(2, 5, 0);
        for (i, c) in [a, b, untouched].into_iter().enumerate() {
            f.put(c, i as i32);
        }

        f.reconciler.reconcile(&WorldEvent::EntityExplode { cells: vec![a] });
        f.reconciler.reconcile(&WorldEvent::Fertilize {
            states: vec![CellSnapshot {
                cell: b,
                cell_type: CellType::new("grass"),
            }],
        });

        assert_eq!(f.id_at(a), None);
        assert_eq!(f.id_at(b), None);
        assert_eq!(f.id_at(untouched), Some(2));
    }

    #[test]
    fn test_cancelled_removal_keeps_data() {
        let f = fixture();
        f.notifier.subscribe(Arc::new(VetoAll));
        let cell = f.cell(0, 0, 0);
        f.put(cell, 5);
        f.reconciler.reconcile(&WorldEvent::Burn { cell });
        assert_eq!(f.id_at(cell), Some(5));
    }

    #[test]
    fn test_piston_chain_moves_each_cell_forward() {
        let f = fixture();
        let a = f.cell(0, 64, 0);
        let b = a.relative(Direction::East);
        let c = b.relative(Direction::East);
        let d = c.relative(Direction::East);
        f.put(a, 1);
        f.put(b, 2);
        f.put(c, 3);

        f.reconciler.reconcile(&WorldEvent::PistonExtend {
            direction: Direction::East,
            cells: vec![a, b, c],
        });

        assert_eq!(f.id_at(a), None);
        assert!(!f.tenant().has_data(&a));
        assert_eq!(f.id_at(b), Some(1));
        assert_eq!(f.id_at(c), Some(2));
        assert_eq!(f.id_at(d), Some(3));
    }

    #[test]
    fn test_piston_breaking_cell_loses_data() {
        let f = fixture();
        let torch = CellType::new("torch");
        f.host.set_move_reaction(torch.clone(), MoveReaction::Break);

        let cell = f.cell(0, 64, 0);
        f.host.set_cell_type(cell, torch);
        f.put(cell, 9);

        f.reconciler.reconcile(&WorldEvent::PistonRetract {
            direction: Direction::West,
            cells: vec![cell],
        });
        assert_eq!(f.id_at(cell), None);
        assert_eq!(f.id_at(cell.relative(Direction::West)), None);
    }

    #[test]
    fn test_protected_survives_every_event_kind() {
        let f = fixture();
        let cell = f.cell(8, 8, 8);
        let mut store = f.tenant().store(cell);
        store.set(id_key(), 42);
        store.set_protected(true);
        f.host.advance_tick();

        let stone = CellType::new("stone");
        let snapshot = CellSnapshot {
            cell,
            cell_type: stone.clone(),
        };
        let events = [
            WorldEvent::Break { cell },
            WorldEvent::Place { cell },
            WorldEvent::Burn { cell },
            WorldEvent::Fade {
                cell,
                from: stone.clone(),
                to: CellType::AIR,
            },
            WorldEvent::EntityChange {
                cell,
                from: stone.clone(),
                to: CellType::AIR,
            },
            WorldEvent::BlockExplode { cells: vec![cell] },
            WorldEvent::EntityExplode { cells: vec![cell] },
            WorldEvent::StructureGrow {
                states: vec![snapshot.clone()],
            },
            WorldEvent::Fertilize {
                states: vec![snapshot],
            },
            WorldEvent::PistonExtend {
                direction: Direction::Up,
                cells: vec![cell],
            },
            WorldEvent::PistonRetract {
                direction: Direction::Down,
                cells: vec![cell],
            },
        ];

        for event in &events {
            f.reconciler.reconcile(event);
            assert_eq!(f.id_at(cell), Some(42), "protected data lost on {event:?}");
        }
        assert!(!f.tenant().has_data(&cell.relative(Direction::Up)));
        assert!(!f.tenant().has_data(&cell.relative(Direction::Down)));
    }

    #[test]
    fn test_cells_without_data_raise_no_notice() {
        #[derive(Default)]
        struct Count(std::sync::atomic::AtomicUsize);
        impl DataListener for Count {
            fn on_remove(&self, _: &mut RemoveNotice<'_>) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }

        let f = fixture();
        let count = Arc::new(Count::default());
        f.notifier.subscribe(count.clone());
        f.reconciler.reconcile(&WorldEvent::BlockExplode {
            cells: vec![f.cell(0, 0, 0), f.cell(1, 0, 0)],
        });
        assert_eq!(count.0.load(std::sync::atomic::Ordering::Relaxed), 0);
    }
}
