//! World-mutation events delivered by the host, and the cancellable notices
//! the reconciler raises before it touches stored data.
//!
//! Events arrive after the host has decided they happen; they are never
//! cancelled from here. Notices go out to [`DataListener`]s registered on a
//! [`Notifier`], any of which may veto the pending removal or move.

use std::borrow::Cow;
use std::sync::{Arc, PoisonError, RwLock};

use crate::coords::{CellId, Direction};
use crate::key::Namespace;

/// Identifies the material/kind of a cell, e.g. `"stone"` or `"fire"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellType(Cow<'static, str>);

impl CellType {
    /// Empty space.
    pub const AIR: CellType = CellType(Cow::Borrowed("air"));
    /// Fire. Fire fading away never clears data.
    pub const FIRE: CellType = CellType(Cow::Borrowed("fire"));

    /// Creates a cell type from its name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// How a cell reacts to being pushed or pulled by a piston.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MoveReaction {
    /// Moves along with the piston.
    #[default]
    Move,
    /// Breaks instead of moving.
    Break,
    /// Prevents the piston from moving.
    Block,
    /// Is passed through untouched.
    Ignore,
    /// Can be pushed but not pulled.
    PushOnly,
}

/// A cell together with the type it had before the event changed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellSnapshot {
    /// The cell.
    pub cell: CellId,
    /// Its type before the change.
    pub cell_type: CellType,
}

/// A world mutation reported by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorldEvent {
    /// An agent broke a cell.
    Break {
        /// The broken cell.
        cell: CellId,
    },
    /// An agent placed a cell.
    Place {
        /// The placed cell.
        cell: CellId,
    },
    /// A cell burned away.
    Burn {
        /// The burned cell.
        cell: CellId,
    },
    /// A cell faded or decayed into another type.
    Fade {
        /// The fading cell.
        cell: CellId,
        /// Type before fading.
        from: CellType,
        /// Type after fading.
        to: CellType,
    },
    /// A non-player entity changed a cell's type.
    EntityChange {
        /// The changed cell.
        cell: CellId,
        /// Type before the change.
        from: CellType,
        /// Type after the change.
        to: CellType,
    },
    /// A cell exploded, destroying `cells`.
    BlockExplode {
        /// Destroyed cells.
        cells: Vec<CellId>,
    },
    /// An entity exploded, destroying `cells`.
    EntityExplode {
        /// Destroyed cells.
        cells: Vec<CellId>,
    },
    /// A piston extended, pushing `cells` (in push order) along `direction`.
    PistonExtend {
        /// Push direction.
        direction: Direction,
        /// Moved cells.
        cells: Vec<CellId>,
    },
    /// A piston retracted, pulling `cells` (in pull order) along `direction`.
    PistonRetract {
        /// Pull direction.
        direction: Direction,
        /// Moved cells.
        cells: Vec<CellId>,
    },
    /// A structure (tree, mushroom) grew over the given prior states.
    StructureGrow {
        /// Cells as they were before growth.
        states: Vec<CellSnapshot>,
    },
    /// Fertilizer changed the given prior states.
    Fertilize {
        /// Cells as they were before fertilizing.
        states: Vec<CellSnapshot>,
    },
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// Raised before a cell's data is cleared.
#[derive(Debug)]
pub struct RemoveNotice<'a> {
    /// Tenant whose data is about to be cleared.
    pub tenant: &'a Namespace,
    /// The cell losing its data.
    pub cell: CellId,
    /// The world event that triggered the removal.
    pub cause: &'a WorldEvent,
    cancelled: bool,
}

impl<'a> RemoveNotice<'a> {
    /// Creates an uncancelled notice.
    pub fn new(tenant: &'a Namespace, cell: CellId, cause: &'a WorldEvent) -> Self {
        Self {
            tenant,
            cell,
            cause,
            cancelled: false,
        }
    }

    /// Whether a listener vetoed the removal.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Vetoes (or un-vetoes) the removal.
    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

/// Raised before a cell's data is moved to a neighbouring cell.
#[derive(Debug)]
pub struct MoveNotice<'a> {
    /// Tenant whose data is about to move.
    pub tenant: &'a Namespace,
    /// Where the data is now.
    pub from: CellId,
    /// Where the data will be moved to.
    pub to: CellId,
    /// The world event that triggered the move.
    pub cause: &'a WorldEvent,
    cancelled: bool,
}

impl<'a> MoveNotice<'a> {
    /// Creates an uncancelled notice.
    pub fn new(tenant: &'a Namespace, from: CellId, to: CellId, cause: &'a WorldEvent) -> Self {
        Self {
            tenant,
            from,
            to,
            cause,
            cancelled: false,
        }
    }

    /// Whether a listener vetoed the move.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Vetoes (or un-vetoes) the move.
    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

/// Receives notices before stored data is removed or moved.
pub trait DataListener: Send + Sync {
    /// Called before a removal. Cancel the notice to keep the data.
    fn on_remove(&self, _notice: &mut RemoveNotice<'_>) {}

    /// Called before a move. Cancel the notice to leave the data in place.
    fn on_move(&self, _notice: &mut MoveNotice<'_>) {}
}

/// Ordered set of [`DataListener`]s.
///
/// Every listener sees every notice, in registration order, including
/// notices an earlier listener already cancelled.
#[derive(Default)]
pub struct Notifier {
    listeners: RwLock<Vec<Arc<dyn DataListener>>>,
}

impl Notifier {
    /// Creates a notifier with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener.
    pub fn subscribe(&self, listener: Arc<dyn DataListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatches a removal notice. Returns `true` if the removal may proceed.
    pub fn remove(&self, notice: &mut RemoveNotice<'_>) -> bool {
        for listener in self.snapshot() {
            listener.on_remove(notice);
        }
        !notice.is_cancelled()
    }

    /// Dispatches a move notice. Returns `true` if the move may proceed.
    pub fn relocate(&self, notice: &mut MoveNotice<'_>) -> bool {
        for listener in self.snapshot() {
            listener.on_move(notice);
        }
        !notice.is_cancelled()
    }

    /// Clones the listener list so listeners may subscribe others re-entrantly.
    fn snapshot(&self) -> Vec<Arc<dyn DataListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
