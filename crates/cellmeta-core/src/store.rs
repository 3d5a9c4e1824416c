//! Per-cell data stored inside the owning region's container.
//!
//! A [`Tenant`] binds a namespace to the host and the shared dirty set and
//! hands out [`CellStore`]s. A `CellStore` is a short-lived handle: it reads
//! the cell's sub-container once on construction and writes it back on every
//! mutation, deleting the region entry once nothing is left.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::container::{ContainerError, DataContainer};
use crate::coords::{CellId, RegionId, WorldId, decode_key};
use crate::dirty::DirtySet;
use crate::host::Host;
use crate::key::{Namespace, NamespacedKey};
use crate::value::{DataType, DataValue, PersistentType};

/// Namespace of keys reserved by this crate.
const RESERVED_NAMESPACE: &str = "cellmeta";

/// Key of the entry whose presence marks a cell's data as protected.
pub fn protected_key() -> NamespacedKey {
    NamespacedKey::new_unchecked(
        Namespace::new_unchecked(RESERVED_NAMESPACE),
        "protected".to_string(),
    )
}

// ---------------------------------------------------------------------------
// Tenant
// ---------------------------------------------------------------------------

/// A namespace owning cell data, bound to the services it needs.
#[derive(Clone)]
pub struct Tenant {
    namespace: Namespace,
    host: Arc<dyn Host>,
    dirty: Arc<DirtySet>,
}

impl Tenant {
    /// Binds `namespace` to a host and dirty set.
    pub fn new(namespace: Namespace, host: Arc<dyn Host>, dirty: Arc<DirtySet>) -> Self {
        Self {
            namespace,
            host,
            dirty,
        }
    }

    /// The tenant's namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The host this tenant stores into.
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Opens the store for `cell`.
    pub fn store(&self, cell: CellId) -> CellStore {
        CellStore::load(self.clone(), cell)
    }

    /// Opens the store for the cell at `(x, y, z)` in `world`.
    pub fn store_at(&self, world: WorldId, x: i32, y: i32, z: i32) -> CellStore {
        self.store(CellId::new(world, x, y, z))
    }

    /// Returns `true` if `cell` holds any data for this tenant.
    pub fn has_data(&self, cell: &CellId) -> bool {
        self.host
            .region_get(&cell.region(), &self.cell_key(cell))
            .is_some_and(|v| v.data_type() == DataType::Container)
    }

    /// Returns `true` if `cell`'s data for this tenant is protected.
    ///
    /// Cells without data are never protected.
    pub fn is_protected(&self, cell: &CellId) -> bool {
        self.store(*cell).is_protected()
    }

    /// Returns `true` if `cell` was written during the current tick.
    pub fn is_dirty(&self, cell: &CellId) -> bool {
        self.dirty.is_dirty(cell)
    }

    /// Every cell in `region` holding data for this tenant.
    pub fn cells_with_data(&self, region: &RegionId) -> FxHashSet<CellId> {
        cells_with_data(self.host.as_ref(), region, &self.namespace)
    }

    fn cell_key(&self, cell: &CellId) -> NamespacedKey {
        NamespacedKey::new_unchecked(self.namespace.clone(), cell.key())
    }
}

impl std::fmt::Debug for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tenant")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Every cell in `region` holding data under `namespace`.
///
/// Keys that do not decode to a cell of the region are skipped; other
/// tenants are free to store unrelated entries in the same container.
pub fn cells_with_data(
    host: &dyn Host,
    region: &RegionId,
    namespace: &Namespace,
) -> FxHashSet<CellId> {
    let Some(height) = host.height_range(region.world) else {
        return FxHashSet::default();
    };

    host.region_keys(region)
        .into_iter()
        .filter(|key| key.namespace() == namespace)
        .filter_map(|key| {
            let cell = decode_key(key.key(), *region, height);
            if cell.is_none() {
                tracing::debug!(%key, ?region, "skipping key that is not a cell coordinate");
            }
            cell
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CellStore
// ---------------------------------------------------------------------------

/// Typed view of one cell's data for one tenant.
#[derive(Debug)]
pub struct CellStore {
    tenant: Tenant,
    cell: CellId,
    region: RegionId,
    key: NamespacedKey,
    data: DataContainer,
}

impl CellStore {
    fn load(tenant: Tenant, cell: CellId) -> Self {
        let region = cell.region();
        let key = tenant.cell_key(&cell);
        let data = match tenant.host.region_get(&region, &key) {
            Some(DataValue::Container(container)) => container,
            _ => DataContainer::new(),
        };
        Self {
            tenant,
            cell,
            region,
            key,
            data,
        }
    }

    /// The cell this store was opened for, whether or not its world is known.
    pub fn id(&self) -> CellId {
        self.cell
    }

    /// The owning cell, or `None` if its world is no longer known to the host.
    pub fn cell(&self) -> Option<CellId> {
        self.tenant
            .host
            .height_range(self.cell.world)
            .map(|_| self.cell)
    }

    /// The tenant owning this store.
    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Read-only view of the in-memory sub-container.
    pub fn container(&self) -> &DataContainer {
        &self.data
    }

    /// Reads `key` as `T`.
    pub fn get<T: PersistentType>(&self, key: &NamespacedKey) -> Option<T> {
        self.data.get(key)
    }

    /// Reads `key` as `T`, falling back to `default`.
    pub fn get_or<T: PersistentType>(&self, key: &NamespacedKey, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Raw access to an entry.
    pub fn get_value(&self, key: &NamespacedKey) -> Option<&DataValue> {
        self.data.get_value(key)
    }

    /// Stores `value` under `key` and saves.
    pub fn set<T: PersistentType>(&mut self, key: NamespacedKey, value: T) {
        self.data.set(key, value);
        self.save();
    }

    /// Stores a raw value under `key` and saves.
    pub fn set_value(&mut self, key: NamespacedKey, value: DataValue) {
        self.data.set_value(key, value);
        self.save();
    }

    /// Returns `true` if `key` is stored as `data_type`.
    pub fn has_type(&self, key: &NamespacedKey, data_type: DataType) -> bool {
        self.data.has_type(key, data_type)
    }

    /// Returns `true` if `key` is stored as `T`'s kind.
    pub fn has_as<T: PersistentType>(&self, key: &NamespacedKey) -> bool {
        self.has_type(key, T::DATA_TYPE)
    }

    /// Returns `true` if `key` is stored as any supported kind.
    pub fn has(&self, key: &NamespacedKey) -> bool {
        self.data_type(key).is_some()
    }

    /// Kind `key` is stored as, found by probing [`DataType::PROBE_ORDER`].
    pub fn data_type(&self, key: &NamespacedKey) -> Option<DataType> {
        DataType::PROBE_ORDER
            .into_iter()
            .find(|t| self.data.has_type(key, *t))
    }

    /// Removes `key` and saves.
    pub fn remove(&mut self, key: &NamespacedKey) {
        self.data.remove(key);
        self.save();
    }

    /// Returns `true` if the cell holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All keys stored for the cell.
    pub fn keys(&self) -> impl Iterator<Item = &NamespacedKey> {
        self.data.keys()
    }

    /// Whether reconciliation must leave this cell's data alone.
    pub fn is_protected(&self) -> bool {
        self.data.has_type(&protected_key(), bool::DATA_TYPE)
    }

    /// Sets or removes the protected marker.
    pub fn set_protected(&mut self, protected: bool) {
        if protected {
            self.set(protected_key(), true);
        } else {
            self.remove(&protected_key());
        }
    }

    /// Removes every entry, including the protected marker, and saves.
    pub fn clear(&mut self) {
        self.data.clear();
        self.save();
    }

    /// Copies every entry to `destination` for the same tenant.
    ///
    /// Entries already at the destination survive unless a key collides, in
    /// which case the copied value wins. This store is not modified.
    pub fn copy_to(&self, destination: CellId) {
        let mut target = self.tenant.store(destination);
        let mut copied = 0usize;
        for key in self.data.keys() {
            let Some(data_type) = self.data_type(key) else {
                continue;
            };
            let Some(value) = self.data.get_value(key) else {
                continue;
            };
            debug_assert_eq!(value.data_type(), data_type);
            target.data.set_value(key.clone(), value.clone());
            copied += 1;
        }
        if copied > 0 {
            target.save();
        }
    }

    /// Serializes the cell's entries to bytes.
    pub fn serialize_to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        self.data.to_bytes()
    }

    /// Loads entries from bytes and saves. With `clear`, existing entries are
    /// dropped first; otherwise loaded entries overwrite colliding keys.
    pub fn read_from_bytes(&mut self, bytes: &[u8], clear: bool) -> Result<(), ContainerError> {
        let loaded = DataContainer::from_bytes(bytes)?;
        if clear {
            self.data.clear();
        }
        loaded.copy_into(&mut self.data, true);
        self.save();
        Ok(())
    }

    /// Marks the cell dirty and writes the sub-container back to the region.
    fn save(&self) {
        self.tenant
            .dirty
            .mark(self.tenant.host.as_ref(), &self.tenant.namespace, self.cell);

        if self.data.is_empty() {
            self.tenant.host.region_remove(&self.region, &self.key);
        } else {
            self.tenant.host.region_set(
                &self.region,
                self.key.clone(),
                DataValue::Container(self.data.clone()),
            );
        }
        tracing::trace!(key = %self.key, entries = self.data.len(), "saved cell data");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
