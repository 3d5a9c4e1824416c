//! Stored value space: a closed tagged union over every supported kind.
//!
//! [`DataType`] names a kind, [`DataValue`] carries one, and
//! [`PersistentType`] maps Rust types onto them for the typed store API.

use serde::{Deserialize, Serialize};

use crate::container::DataContainer;

/// Tag naming one of the storable value kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Signed 8-bit integer (also the storage kind of booleans).
    Byte,
    /// Signed 16-bit integer.
    Short,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
    /// Array of signed bytes.
    ByteArray,
    /// Array of 32-bit integers.
    IntArray,
    /// Array of 64-bit integers.
    LongArray,
    /// Array of nested containers.
    ContainerArray,
    /// Nested container.
    Container,
}

impl DataType {
    /// Order in which an untyped lookup probes the stored kinds.
    pub const PROBE_ORDER: [DataType; 12] = [
        DataType::Byte,
        DataType::Short,
        DataType::Int,
        DataType::Long,
        DataType::Float,
        DataType::Double,
        DataType::String,
        DataType::ByteArray,
        DataType::IntArray,
        DataType::LongArray,
        DataType::ContainerArray,
        DataType::Container,
    ];
}

/// A single stored value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    /// See [`DataType::Byte`].
    Byte(i8),
    /// See [`DataType::Short`].
    Short(i16),
    /// See [`DataType::Int`].
    Int(i32),
    /// See [`DataType::Long`].
    Long(i64),
    /// See [`DataType::Float`].
    Float(f32),
    /// See [`DataType::Double`].
    Double(f64),
    /// See [`DataType::String`].
    String(String),
    /// See [`DataType::ByteArray`].
    ByteArray(Vec<i8>),
    /// See [`DataType::IntArray`].
    IntArray(Vec<i32>),
    /// See [`DataType::LongArray`].
    LongArray(Vec<i64>),
    /// See [`DataType::ContainerArray`].
    ContainerArray(Vec<DataContainer>),
    /// See [`DataType::Container`].
    Container(DataContainer),
}

impl DataValue {
    /// The kind tag of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Byte(_) => DataType::Byte,
            Self::Short(_) => DataType::Short,
            Self::Int(_) => DataType::Int,
            Self::Long(_) => DataType::Long,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
            Self::ByteArray(_) => DataType::ByteArray,
            Self::IntArray(_) => DataType::IntArray,
            Self::LongArray(_) => DataType::LongArray,
            Self::ContainerArray(_) => DataType::ContainerArray,
            Self::Container(_) => DataType::Container,
        }
    }

    /// Returns the nested container if this value is one.
    pub fn as_container(&self) -> Option<&DataContainer> {
        match self {
            Self::Container(c) => Some(c),
            _ => None,
        }
    }
}

/// A Rust type that can be stored in and read back from a container.
pub trait PersistentType: Sized {
    /// Kind the value is stored as.
    const DATA_TYPE: DataType;

    /// Converts into the stored representation.
    fn into_value(self) -> DataValue;

    /// Reads from the stored representation, `None` on a kind mismatch.
    fn from_value(value: &DataValue) -> Option<Self>;
}

macro_rules! persistent_type {
    ($ty:ty, $variant:ident) => {
        impl PersistentType for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn into_value(self) -> DataValue {
                DataValue::$variant(self)
            }

            fn from_value(value: &DataValue) -> Option<Self> {
                match value {
                    DataValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

persistent_type!(i8, Byte);
persistent_type!(i16, Short);
persistent_type!(i32, Int);
persistent_type!(i64, Long);
persistent_type!(f32, Float);
persistent_type!(f64, Double);
persistent_type!(String, String);
persistent_type!(Vec<i8>, ByteArray);
persistent_type!(Vec<i32>, IntArray);
persistent_type!(Vec<i64>, LongArray);
persistent_type!(Vec<DataContainer>, ContainerArray);
persistent_type!(DataContainer, Container);

/// Booleans are stored as a byte: `1` is true, anything else false.
impl PersistentType for bool {
    const DATA_TYPE: DataType = DataType::Byte;

    fn into_value(self) -> DataValue {
        DataValue::Byte(i8::from(self))
    }

    fn from_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Byte(b) => Some(*b == 1),
            _ => None,
        }
    }
}
