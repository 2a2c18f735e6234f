use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serialize, Serializer,
};

use crate::{
    data::{KeyValueData, SoundEventScript},
    kv3::{BinaryKv3, KvData, KvObject, KvValue},
    ntro::{NtroArray, NtroData, NtroStruct, NtroValue},
};

impl Serialize for NtroStruct {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.contents.len()))?;
        for (k, v) in &self.contents {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for NtroArray {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.contents.len()))?;
        for v in &self.contents {
            seq.serialize_element(v)?;
        }
        seq.end()
    }
}

impl Serialize for NtroValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.data {
            NtroData::SByte(v) => serializer.serialize_i8(*v),
            NtroData::Byte(v) => serializer.serialize_u8(*v),
            NtroData::Int16(v) => serializer.serialize_i16(*v),
            NtroData::UInt16(v) => serializer.serialize_u16(*v),
            NtroData::Int32(v) => serializer.serialize_i32(*v),
            NtroData::UInt32(v) => serializer.serialize_u32(*v),
            NtroData::Int64(v) => serializer.serialize_i64(*v),
            NtroData::UInt64(v) => serializer.serialize_u64(*v),
            NtroData::Float(v) => serializer.serialize_f32(*v),
            NtroData::Boolean(v) => serializer.serialize_bool(*v),
            NtroData::String(v) => serializer.serialize_str(v),
            NtroData::Struct(v) => v.serialize(serializer),
            NtroData::Array(v) => v.serialize(serializer),
        }
    }
}

impl Serialize for KvObject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.is_array {
            let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
            for v in self.values.values() {
                seq.serialize_element(v)?;
            }
            return seq.end();
        }

        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for KvValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.data {
            KvData::Null => serializer.serialize_unit(),
            KvData::Bool(v) => serializer.serialize_bool(*v),
            KvData::Int32(v) => serializer.serialize_i32(*v),
            KvData::UInt32(v) => serializer.serialize_u32(*v),
            KvData::Int64(v) => serializer.serialize_i64(*v),
            KvData::UInt64(v) => serializer.serialize_u64(*v),
            KvData::Double(v) => serializer.serialize_f64(*v),
            KvData::String(v) => serializer.serialize_str(v),
            KvData::Blob(v) => serializer.serialize_bytes(v),
            KvData::Object(v) => v.serialize(serializer),
        }
    }
}

impl Serialize for BinaryKv3 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.root.serialize(serializer)
    }
}

impl Serialize for KeyValueData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            KeyValueData::Ntro(data) => data.serialize(serializer),
            KeyValueData::KeyValues(data) => data.serialize(serializer),
        }
    }
}

/// Event name to operator source
impl Serialize for SoundEventScript {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
