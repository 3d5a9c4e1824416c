//! Tenant namespaces and namespaced entry keys.
//!
//! Every entry stored in a container is addressed by a [`NamespacedKey`]
//! (`namespace:key`). The namespace isolates tenants sharing a region.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when validating namespaces and keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The namespace is empty or contains characters outside `[a-z0-9._-]`.
    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),
    /// The key is empty or contains characters outside `[a-z0-9/._-]`.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
    /// A `namespace:key` string had no `:` separator.
    #[error("missing ':' separator in {0:?}")]
    MissingSeparator(String),
}

fn valid_namespace_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')
}

fn valid_key_char(c: char) -> bool {
    valid_namespace_char(c) || c == '/'
}

/// A tenant namespace, e.g. the name of the plugin owning the data.
///
/// Deserialization goes through [`Namespace::new`], so decoded namespaces obey
/// the same charset as constructed ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Validates and wraps a namespace string.
    pub fn new(namespace: impl Into<String>) -> Result<Self, KeyError> {
        let namespace = namespace.into();
        if namespace.is_empty() || !namespace.chars().all(valid_namespace_char) {
            return Err(KeyError::InvalidNamespace(namespace));
        }
        Ok(Self(namespace))
    }

    /// Wraps a string already known to satisfy the namespace charset.
    pub(crate) fn new_unchecked(namespace: &str) -> Self {
        Self(namespace.to_string())
    }

    /// The raw namespace string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a key inside this namespace.
    pub fn key(&self, key: impl Into<String>) -> Result<NamespacedKey, KeyError> {
        NamespacedKey::new(self.clone(), key)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Namespace {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Namespace {
    type Error = KeyError;

    fn try_from(namespace: String) -> Result<Self, Self::Error> {
        Self::new(namespace)
    }
}

impl From<Namespace> for String {
    fn from(namespace: Namespace) -> Self {
        namespace.0
    }
}

/// A `namespace:key` pair addressing one container entry.
///
/// Serialized as its `namespace:key` text and validated by
/// [`NamespacedKey::parse`] when deserialized.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespacedKey {
    namespace: Namespace,
    key: String,
}

impl NamespacedKey {
    /// Creates a key in the given namespace.
    pub fn new(namespace: Namespace, key: impl Into<String>) -> Result<Self, KeyError> {
        let key = key.into();
        if key.is_empty() || !key.chars().all(valid_key_char) {
            return Err(KeyError::InvalidKey(key));
        }
        Ok(Self { namespace, key })
    }

    /// Creates a key whose text is already known to be valid, such as a
    /// coordinate key.
    pub(crate) fn new_unchecked(namespace: Namespace, key: String) -> Self {
        Self { namespace, key }
    }

    /// Parses a `namespace:key` string.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        let (namespace, key) = s
            .split_once(':')
            .ok_or_else(|| KeyError::MissingSeparator(s.to_string()))?;
        Self::new(Namespace::new(namespace)?, key)
    }

    /// The namespace half.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The key half.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for NamespacedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.key)
    }
}

impl FromStr for NamespacedKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NamespacedKey {
    type Error = KeyError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Self::parse(&key)
    }
}

impl From<NamespacedKey> for String {
    fn from(key: NamespacedKey) -> Self {
        key.to_string()
    }
}
