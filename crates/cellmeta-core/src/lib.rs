//! Typed metadata attached to individual grid cells.
//!
//! Each cell's data lives as a nested [`DataContainer`] inside the persistent
//! container of the region that owns the cell, keyed by a compact coordinate
//! key. A [`Tenant`] hands out [`CellStore`]s for reading and writing that
//! data. A [`Reconciler`] keeps it consistent when the world changes: cells
//! that break, burn or explode lose their data, and cells moved by pistons
//! carry it along. Writes mark the cell dirty for one tick so the placement
//! event caused by the same action does not wipe the fresh data.
//!
//! The world itself is reached through the [`Host`] trait; [`MemoryHost`] is
//! an in-process implementation.

pub mod container;
pub mod coords;
pub mod dirty;
pub mod events;
pub mod host;
pub mod key;
pub mod memory;
pub mod reconciler;
pub mod service;
pub mod store;
pub mod value;

pub use container::{ContainerError, DataContainer};
pub use coords::{
    CellId, CellPos, Direction, HeightRange, REGION_SIZE, RegionId, RegionPos, WorldId,
    decode_key, encode_key,
};
pub use dirty::DirtySet;
pub use events::{
    CellSnapshot, CellType, DataListener, MoveNotice, MoveReaction, Notifier, RemoveNotice,
    WorldEvent,
};
pub use host::{Host, Task, TaskAffinity, WorldEventHandler};
pub use key::{KeyError, Namespace, NamespacedKey};
pub use memory::MemoryHost;
pub use reconciler::Reconciler;
pub use service::CellDataService;
pub use store::{CellStore, Tenant, cells_with_data, protected_key};
pub use value::{DataType, DataValue, PersistentType};
