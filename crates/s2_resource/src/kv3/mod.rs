//! Binary KeyValues3 documents.
//!
//! A KV3 block is either the legacy layout (magic `VKV\x03`, encoding GUID, format GUID, then a
//! compressed body holding the string table and an inline typed value tree), or the version 2
//! layout (magic `\x01\x33VK`) where the decoded buffer is split into separate regions for
//! binary bytes, four byte values, eight byte values, strings and type tags.

use indexmap::IndexMap;
use std::fmt;

mod compression;
mod read;

pub use compression::block_decompress;

/// Legacy `VKV\x03` magic
pub const MAGIC: u32 = 0x03564B56;

/// Version 2 magic
pub const MAGIC2: u32 = 0x4B563301;

/// Known encoding and format GUIDs
pub mod guid {
    pub const BLOCK_COMPRESSED: [u8; 16] = [
        0x46, 0x1A, 0x79, 0x95, 0xBC, 0x95, 0x6C, 0x4F, 0xA7, 0x0B, 0x05, 0xBC, 0xA1, 0xB7, 0xDF,
        0xD2,
    ];
    pub const UNCOMPRESSED: [u8; 16] = [
        0x00, 0x05, 0x86, 0x1B, 0xD8, 0xF7, 0xC1, 0x40, 0xAD, 0x82, 0x75, 0xA4, 0x82, 0x67, 0xE7,
        0x14,
    ];
    pub const BLOCK_LZ4: [u8; 16] = [
        0x8A, 0x34, 0x47, 0x68, 0xA1, 0x63, 0x5C, 0x4F, 0xA1, 0x97, 0x53, 0x80, 0x6F, 0xD9, 0xB1,
        0x19,
    ];
    pub const FORMAT_GENERIC: [u8; 16] = [
        0x7C, 0x16, 0x12, 0x74, 0xE9, 0x06, 0x98, 0x46, 0xAF, 0xF2, 0xE6, 0x3E, 0xB5, 0x90, 0x37,
        0xE7,
    ];
}

/// Value type tags, after compressed literal forms are folded into their base type
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KvType {
    Null,
    Boolean,
    Int64,
    UInt64,
    Double,
    String,
    BinaryBlob,
    Array,
    Object,
    Int32,
    UInt32,
}

impl KvType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Double => "double",
            Self::String => "string",
            Self::BinaryBlob => "binary blob",
            Self::Array => "array",
            Self::Object => "object",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
        }
    }
}

impl fmt::Display for KvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resource reference flag attached to a value
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum KvFlag {
    #[default]
    None,
    Resource,
    DeferredResource,
}

impl KvFlag {
    /// Map a raw flag byte, `None` for unknown values
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Resource),
            2 => Some(Self::DeferredResource),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KvData {
    Null,
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    Object(KvObject),
}

/// A decoded value with its type tag and flag
#[derive(Debug, Clone, PartialEq)]
pub struct KvValue {
    pub kv_type: KvType,
    pub flags: KvFlag,
    pub data: KvData,
}

/// An object or array node.
///
/// Arrays share the representation of objects and key their elements by index ("0", "1", ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KvObject {
    pub key: String,
    pub is_array: bool,
    pub count: u32,
    pub values: IndexMap<String, KvValue>,
}

impl KvObject {
    pub fn new(key: impl Into<String>, is_array: bool) -> Self {
        Self {
            key: key.into(),
            is_array,
            ..Default::default()
        }
    }

    /// Add a property. Arrays ignore `name` and use the running element index.
    ///
    /// A repeated object key keeps the first value.
    pub fn add_property(&mut self, name: &str, value: KvValue) {
        let key = if self.is_array {
            self.count.to_string()
        } else {
            name.to_string()
        };
        self.values.entry(key).or_insert(value);
        self.count += 1;
    }

    pub fn get(&self, key: &str) -> Option<&KvValue> {
        self.values.get(key)
    }

    /// Element `index` of an array
    pub fn array_value(&self, index: u32) -> Option<&KvValue> {
        if !self.is_array {
            return None;
        }
        self.values.get(&index.to_string())
    }

    pub fn array_count(&self) -> u32 {
        self.count
    }
}

/// A decoded KV3 block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinaryKv3 {
    /// Shared string table of the document
    pub strings: Vec<String>,

    /// The root object
    pub root: KvObject,
}
