//! Typed access over both decoded tree kinds.
//!
//! A [`KeyValueCollection`] is a borrowed view of either an introspected struct or a KV3 object.
//! Lookups never fail: a missing key or a value that cannot be converted to the requested type is
//! `None` (or an empty list), and callers pick their own defaults.

use std::borrow::Cow;

use crate::{
    kv3::{KvData, KvObject, KvValue},
    ntro::{NtroData, NtroStruct, NtroValue},
};

/// Borrowed view of a struct or object
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyValueCollection<'a> {
    Ntro(&'a NtroStruct),
    Kv(&'a KvObject),
}

/// Borrowed view of a single value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'a> {
    Ntro(&'a NtroValue),
    Kv(&'a KvValue),
}

/// Conversion from a decoded value
pub trait FromValue<'a>: Sized {
    fn from_value(value: ValueRef<'a>) -> Option<Self>;
}

impl<'a> From<&'a NtroStruct> for KeyValueCollection<'a> {
    fn from(value: &'a NtroStruct) -> Self {
        Self::Ntro(value)
    }
}

impl<'a> From<&'a KvObject> for KeyValueCollection<'a> {
    fn from(value: &'a KvObject) -> Self {
        Self::Kv(value)
    }
}

impl<'a> KeyValueCollection<'a> {
    /// Struct name or object key
    pub fn name(self) -> &'a str {
        match self {
            Self::Ntro(ntro) => &ntro.name,
            Self::Kv(kv) => &kv.key,
        }
    }

    pub fn is_array(self) -> bool {
        match self {
            Self::Ntro(_) => false,
            Self::Kv(kv) => kv.is_array,
        }
    }

    pub fn len(self) -> usize {
        match self {
            Self::Ntro(ntro) => ntro.contents.len(),
            Self::Kv(kv) => kv.values.len(),
        }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Entries in stored order
    pub fn entries(self) -> Vec<(&'a str, ValueRef<'a>)> {
        match self {
            Self::Ntro(ntro) => ntro
                .contents
                .iter()
                .map(|(key, value)| (key.as_str(), ValueRef::Ntro(value)))
                .collect(),
            Self::Kv(kv) => kv
                .values
                .iter()
                .map(|(key, value)| (key.as_str(), ValueRef::Kv(value)))
                .collect(),
        }
    }

    pub fn get(self, key: &str) -> Option<ValueRef<'a>> {
        match self {
            Self::Ntro(ntro) => ntro.get(key).map(ValueRef::Ntro),
            Self::Kv(kv) => kv.get(key).map(ValueRef::Kv),
        }
    }

    pub fn find_value<T: FromValue<'a>>(self, key: &str) -> Option<T> {
        self.get(key).and_then(T::from_value)
    }

    pub fn find_value_or<T: FromValue<'a>>(self, key: &str, default: T) -> T {
        self.find_value(key).unwrap_or(default)
    }

    /// Elements of the array at `key` that convert to `T`.
    ///
    /// Empty when the key is missing or does not hold an array.
    pub fn find_array_values<T: FromValue<'a>>(self, key: &str) -> Vec<T> {
        self.get(key)
            .and_then(ValueRef::array_elements)
            .map(|elements| elements.into_iter().filter_map(T::from_value).collect())
            .unwrap_or_default()
    }

    pub fn find_sub_collection(self, key: &str) -> Option<KeyValueCollection<'a>> {
        self.get(key).and_then(ValueRef::as_collection)
    }

    pub fn find_binary_blob(self, key: &str) -> Option<Cow<'a, [u8]>> {
        self.get(key).and_then(ValueRef::as_blob)
    }
}

#[derive(Debug, Clone, Copy)]
enum Scalar<'a> {
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(&'a str),
}

impl<'a> ValueRef<'a> {
    fn scalar(self) -> Option<Scalar<'a>> {
        let scalar = match self {
            Self::Ntro(value) => match &value.data {
                NtroData::SByte(v) => Scalar::Int(*v as i128),
                NtroData::Byte(v) => Scalar::Int(*v as i128),
                NtroData::Int16(v) => Scalar::Int(*v as i128),
                NtroData::UInt16(v) => Scalar::Int(*v as i128),
                NtroData::Int32(v) => Scalar::Int(*v as i128),
                NtroData::UInt32(v) => Scalar::Int(*v as i128),
                NtroData::Int64(v) => Scalar::Int(*v as i128),
                NtroData::UInt64(v) => Scalar::Int(*v as i128),
                NtroData::Float(v) => Scalar::Float(*v as f64),
                NtroData::Boolean(v) => Scalar::Bool(*v),
                NtroData::String(v) => Scalar::Str(v),
                NtroData::Struct(_) | NtroData::Array(_) => return None,
            },
            Self::Kv(value) => match &value.data {
                KvData::Bool(v) => Scalar::Bool(*v),
                KvData::Int32(v) => Scalar::Int(*v as i128),
                KvData::UInt32(v) => Scalar::Int(*v as i128),
                KvData::Int64(v) => Scalar::Int(*v as i128),
                KvData::UInt64(v) => Scalar::Int(*v as i128),
                KvData::Double(v) => Scalar::Float(*v),
                KvData::String(v) => Scalar::Str(v),
                KvData::Null | KvData::Blob(_) | KvData::Object(_) => return None,
            },
        };
        Some(scalar)
    }

    /// Nested struct or object
    pub fn as_collection(self) -> Option<KeyValueCollection<'a>> {
        match self {
            Self::Ntro(NtroValue {
                data: NtroData::Struct(ntro),
                ..
            }) => Some(KeyValueCollection::Ntro(ntro)),
            Self::Kv(KvValue {
                data: KvData::Object(kv),
                ..
            }) => Some(KeyValueCollection::Kv(kv)),
            _ => None,
        }
    }

    /// Elements of an array value in order
    pub fn array_elements(self) -> Option<Vec<ValueRef<'a>>> {
        match self {
            Self::Ntro(NtroValue {
                data: NtroData::Array(array),
                ..
            }) => Some(array.contents.iter().map(ValueRef::Ntro).collect()),
            Self::Kv(KvValue {
                data: KvData::Object(kv),
                ..
            }) if kv.is_array => Some(kv.values.values().map(ValueRef::Kv).collect()),
            _ => None,
        }
    }

    /// Blob bytes, or the bytes of an introspected byte array
    pub fn as_blob(self) -> Option<Cow<'a, [u8]>> {
        match self {
            Self::Kv(KvValue {
                data: KvData::Blob(blob),
                ..
            }) => Some(Cow::Borrowed(blob.as_slice())),
            Self::Ntro(NtroValue {
                data: NtroData::Array(array),
                ..
            }) => array
                .contents
                .iter()
                .map(|element| match element.data {
                    NtroData::Byte(byte) => Some(byte),
                    _ => None,
                })
                .collect::<Option<Vec<u8>>>()
                .map(Cow::Owned),
            _ => None,
        }
    }
}

impl<'a> FromValue<'a> for ValueRef<'a> {
    fn from_value(value: ValueRef<'a>) -> Option<Self> {
        Some(value)
    }
}

impl<'a> FromValue<'a> for KeyValueCollection<'a> {
    fn from_value(value: ValueRef<'a>) -> Option<Self> {
        value.as_collection()
    }
}

macro_rules! from_value_int {
    ($($ty:ty),*) => {
        $(
            impl<'a> FromValue<'a> for $ty {
                fn from_value(value: ValueRef<'a>) -> Option<Self> {
                    match value.scalar()? {
                        Scalar::Int(v) => <$ty>::try_from(v).ok(),
                        Scalar::Float(v) if v.fract() == 0.0 => <$ty>::try_from(v as i128).ok(),
                        Scalar::Float(_) => None,
                        Scalar::Bool(v) => Some(v as $ty),
                        Scalar::Str(v) => v.trim().parse().ok(),
                    }
                }
            }
        )*
    };
}

from_value_int!(i8, u8, i16, u16, i32, u32, i64, u64);

macro_rules! from_value_float {
    ($($ty:ty),*) => {
        $(
            impl<'a> FromValue<'a> for $ty {
                fn from_value(value: ValueRef<'a>) -> Option<Self> {
                    match value.scalar()? {
                        Scalar::Int(v) => Some(v as $ty),
                        Scalar::Float(v) => Some(v as $ty),
                        Scalar::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
                        Scalar::Str(v) => v.trim().parse().ok(),
                    }
                }
            }
        )*
    };
}

from_value_float!(f32, f64);

impl<'a> FromValue<'a> for bool {
    fn from_value(value: ValueRef<'a>) -> Option<Self> {
        match value.scalar()? {
            Scalar::Bool(v) => Some(v),
            Scalar::Int(v) => Some(v != 0),
            Scalar::Float(v) => Some(v != 0.0),
            Scalar::Str(v) => match v.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
        }
    }
}

impl<'a> FromValue<'a> for &'a str {
    fn from_value(value: ValueRef<'a>) -> Option<Self> {
        match value.scalar()? {
            Scalar::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl<'a> FromValue<'a> for String {
    fn from_value(value: ValueRef<'a>) -> Option<Self> {
        let string = match value.scalar()? {
            Scalar::Str(v) => v.to_string(),
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) => v.to_string(),
            Scalar::Bool(v) => v.to_string(),
        };
        Some(string)
    }
}

/// Read `N` floats keyed "0".."N-1" from a positional struct or array
fn positional<const N: usize>(value: ValueRef<'_>) -> Option<[f32; N]> {
    let collection = value.as_collection()?;
    let mut output = [0f32; N];
    for (index, slot) in output.iter_mut().enumerate() {
        *slot = collection.find_value(&index.to_string())?;
    }
    Some(output)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

/// Rotation, stored on disk as x, y, z, w
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

/// Row major 4x4 matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [[f32; 4]; 4]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl<'a> FromValue<'a> for Vector3 {
    fn from_value(value: ValueRef<'a>) -> Option<Self> {
        let [x, y, z] = positional::<3>(value)?;
        Some(Self { x, y, z })
    }
}

impl<'a> FromValue<'a> for Vector4 {
    fn from_value(value: ValueRef<'a>) -> Option<Self> {
        let [x, y, z, w] = positional::<4>(value)?;
        Some(Self { x, y, z, w })
    }
}

impl<'a> FromValue<'a> for Quaternion {
    fn from_value(value: ValueRef<'a>) -> Option<Self> {
        let [x, y, z, w] = positional::<4>(value)?;
        Some(Self { w, x, y, z })
    }
}

impl<'a> FromValue<'a> for Mat4 {
    /// Accepts rows of [`Vector4`], or 12 or 16 flat floats. Three rows get an identity last row.
    fn from_value(value: ValueRef<'a>) -> Option<Self> {
        let collection = value.as_collection()?;
        let mut matrix = Mat4::IDENTITY;

        let nested = collection
            .get("0")
            .is_some_and(|first| first.as_collection().is_some());
        if nested {
            let rows = collection.len();
            if !(3..=4).contains(&rows) {
                return None;
            }
            for (index, row) in matrix.0.iter_mut().take(rows).enumerate() {
                let Vector4 { x, y, z, w } = collection.find_value(&index.to_string())?;
                *row = [x, y, z, w];
            }
            return Some(matrix);
        }

        let rows = match collection.len() {
            12 => 3,
            16 => 4,
            _ => return None,
        };
        for (index, cell) in matrix.0.iter_mut().take(rows).flatten().enumerate() {
            *cell = collection.find_value(&index.to_string())?;
        }
        Some(matrix)
    }
}
