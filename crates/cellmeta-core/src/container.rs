//! Nested key-value container holding a cell's (or a region's) entries.
//!
//! Entries are kept in key order so that serialization is deterministic.
//! The byte form is postcard, which is what the in-memory host persists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::NamespacedKey;
use crate::value::{DataType, DataValue, PersistentType};

/// Errors that can occur while converting a container to or from bytes.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The container could not be encoded.
    #[error("failed to encode container: {0}")]
    Encode(String),
    /// The bytes do not describe a container.
    #[error("failed to decode container: {0}")]
    Decode(String),
}

/// An ordered map from [`NamespacedKey`] to [`DataValue`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataContainer {
    entries: BTreeMap<NamespacedKey, DataValue>,
}

impl DataContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an entry as `T`; `None` if absent or stored as another kind.
    pub fn get<T: PersistentType>(&self, key: &NamespacedKey) -> Option<T> {
        self.entries.get(key).and_then(T::from_value)
    }

    /// Raw access to an entry.
    pub fn get_value(&self, key: &NamespacedKey) -> Option<&DataValue> {
        self.entries.get(key)
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set<T: PersistentType>(&mut self, key: NamespacedKey, value: T) {
        self.entries.insert(key, value.into_value());
    }

    /// Stores a raw value under `key`.
    pub fn set_value(&mut self, key: NamespacedKey, value: DataValue) {
        self.entries.insert(key, value);
    }

    /// Returns `true` if `key` is present and stored as `data_type`.
    pub fn has_type(&self, key: &NamespacedKey, data_type: DataType) -> bool {
        self.entries
            .get(key)
            .is_some_and(|v| v.data_type() == data_type)
    }

    /// Returns `true` if `key` is present with any kind.
    pub fn contains_key(&self, key: &NamespacedKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes an entry, returning it.
    pub fn remove(&mut self, key: &NamespacedKey) -> Option<DataValue> {
        self.entries.remove(key)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over all keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &NamespacedKey> {
        self.entries.keys()
    }

    /// Iterates over all `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&NamespacedKey, &DataValue)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the container has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every entry into `other`. Existing entries in `other` are only
    /// overwritten when `replace` is set.
    pub fn copy_into(&self, other: &mut DataContainer, replace: bool) {
        for (key, value) in &self.entries {
            if replace || !other.entries.contains_key(key) {
                other.entries.insert(key.clone(), value.clone());
            }
        }
    }

    /// Serializes the container to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        postcard::to_allocvec(self).map_err(|e| ContainerError::Encode(e.to_string()))
    }

    /// Deserializes a container from bytes produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContainerError> {
        postcard::from_bytes(bytes).map_err(|e| ContainerError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> NamespacedKey {
        NamespacedKey::parse(s).unwrap()
    }

    #[test]
    fn test_typed_get_and_set() {
        let mut c = DataContainer::new();
        c.set(key("t:count"), 3i32);
        c.set(key("t:name"), "chest".to_string());
        assert_eq!(c.get::<i32>(&key("t:count")), Some(3));
        assert_eq!(c.get::<String>(&key("t:name")).as_deref(), Some("chest"));
        assert_eq!(c.get::<i64>(&key("t:count")), None);
        assert!(c.has_type(&key("t:count"), DataType::Int));
        assert!(!c.has_type(&key("t:count"), DataType::Long));
    }

    #[test]
    fn test_copy_into_respects_replace() {
        let mut src = DataContainer::new();
        src.set(key("t:a"), 1i32);
        src.set(key("t:b"), 2i32);

        let mut dst = DataContainer::new();
        dst.set(key("t:a"), 10i32);
        dst.set(key("t:c"), 30i32);

        let mut kept = dst.clone();
        src.copy_into(&mut kept, false);
        assert_eq!(kept.get::<i32>(&key("t:a")), Some(10));
        assert_eq!(kept.get::<i32>(&key("t:b")), Some(2));

        src.copy_into(&mut dst, true);
        assert_eq!(dst.get::<i32>(&key("t:a")), Some(1));
        assert_eq!(dst.get::<i32>(&key("t:c")), Some(30));
        assert_eq!(dst.len(), 3);
    }

    #[test]
    fn test_bytes_roundtrip_with_nesting() {
        let mut inner = DataContainer::new();
        inner.set(key("t:flag"), true);
        inner.set(key("t:ids"), vec![1i64, -2, 3]);

        let mut outer = DataContainer::new();
        outer.set(key("t:inner"), inner.clone());
        outer.set(key("t:list"), vec![inner.clone(), DataContainer::new()]);
        outer.set(key("t:ratio"), 0.5f64);

        let bytes = outer.to_bytes().unwrap();
        let restored = DataContainer::from_bytes(&bytes).unwrap();
        assert_eq!(restored, outer);
        assert_eq!(restored.get::<DataContainer>(&key("t:inner")), Some(inner));
    }

    #[test]
    fn test_corrupted_bytes_return_error() {
        let result = DataContainer::from_bytes(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(ContainerError::Decode(_))));
    }

    #[test]
    fn test_bytes_with_invalid_key_fail_to_decode() {
        let mut c = DataContainer::new();
        c.set(key("ab:cd"), 1i32);
        let mut bytes = c.to_bytes().unwrap();

        let at = bytes
            .windows(5)
            .position(|w| w == b"ab:cd")
            .expect("key text is stored verbatim");
        bytes[at..at + 5].copy_from_slice(b"A :cd");

        let result = DataContainer::from_bytes(&bytes);
        assert!(matches!(result, Err(ContainerError::Decode(_))));
    }
}
