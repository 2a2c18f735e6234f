//! Introspection driven struct decoding.
//!
//! [`NtroReader`] walks raw struct bytes using the field layout from an [`IntrospectionManifest`].
//! Field offsets are relative to the start of the struct being read. Indirected fields store a u32
//! offset relative to the field itself, and counted arrays store their element count after it:
//!
//! | Indirection | Layout at the field    | Payload position           |
//! |-------------|------------------------|----------------------------|
//! | `0x03`      | `u32 offset`           | field + offset, none if 0  |
//! | `0x04`      | `u32 offset, u32 count`| field + offset             |

use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexMap;
use std::io::{Read, Seek};

use crate::{
    error::{Error, Result},
    manifest::{DiskField, DiskStruct, IntrospectionManifest},
    rerl::ExternalReferences,
    stream::{relative, ResourceReadExt},
    types::DataType,
};

const POINTER: u8 = 0x03;
const COUNTED_ARRAY: u8 = 0x04;

/// How deep struct fields may nest inside each other
pub const MAX_STRUCT_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum NtroData {
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    /// Also used for enum fields, which keep their raw value
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Boolean(bool),
    /// Strings and resolved external references
    String(String),
    /// Nested structs and vector or matrix types
    Struct(NtroStruct),
    Array(NtroArray),
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub struct NtroValue {
    /// Type of the field this value was read for
    pub data_type: DataType,
    /// Whether the value was reached through a pointer indirection
    pub pointer: bool,
    pub data: NtroData,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NtroArray {
    /// Whether the elements were reached through an indirection rather than stored inline
    pub is_indirection: bool,
    pub contents: Vec<NtroValue>,
}

/// A decoded struct, fields in on-disk order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NtroStruct {
    pub name: String,
    pub contents: IndexMap<String, NtroValue>,
}

impl NtroStruct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: IndexMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&NtroValue> {
        self.contents.get(key)
    }

    /// Insert a field, replacing any earlier value with the same name
    pub fn insert(&mut self, key: impl Into<String>, value: NtroValue) {
        self.contents.insert(key.into(), value);
    }
}

/// Reads structs described by a manifest
#[derive(Debug, Clone, Copy)]
pub struct NtroReader<'a> {
    manifest: &'a IntrospectionManifest,
    references: Option<&'a ExternalReferences>,
}

impl<'a> NtroReader<'a> {
    pub fn new(
        manifest: &'a IntrospectionManifest,
        references: Option<&'a ExternalReferences>,
    ) -> Self {
        Self {
            manifest,
            references,
        }
    }

    /// Read the block at `offset` as the struct called `struct_name`, or as the first struct in the
    /// manifest when the name is empty
    #[tracing::instrument(skip(self, reader))]
    pub fn read_block<R: Read + Seek>(
        &self,
        reader: &mut R,
        offset: u64,
        struct_name: &str,
    ) -> Result<NtroStruct> {
        let disk_struct = if struct_name.is_empty() {
            match self.manifest.structs.first() {
                Some(first) => first,
                None => return Ok(NtroStruct::default()),
            }
        } else {
            self.manifest
                .struct_by_name(struct_name)
                .ok_or_else(|| Error::StructNotFound(struct_name.to_string()))?
        };

        tracing::debug!(name = disk_struct.name, "reading introspected struct");
        self.read_structure(reader, disk_struct, offset)
    }

    /// Read `disk_struct` starting at `start`, flattening the fields of its base struct into it
    pub fn read_structure<R: Read + Seek>(
        &self,
        reader: &mut R,
        disk_struct: &DiskStruct,
        start: u64,
    ) -> Result<NtroStruct> {
        self.read_nested(reader, disk_struct, start, 0)
    }

    fn read_nested<R: Read + Seek>(
        &self,
        reader: &mut R,
        disk_struct: &DiskStruct,
        start: u64,
        depth: usize,
    ) -> Result<NtroStruct> {
        if depth >= MAX_STRUCT_DEPTH {
            return Err(Error::NestingTooDeep {
                kind: "introspected struct",
                max_depth: MAX_STRUCT_DEPTH,
            });
        }

        let mut output = NtroStruct::new(disk_struct.name.clone());
        self.read_fields(reader, disk_struct, start, depth, &mut output)?;

        // padding after the last field
        reader.seek_to(start + disk_struct.disk_size as u64)?;

        if disk_struct.base_struct_id != 0 {
            let resume = reader.tell()?;
            let base = self.struct_by_id(disk_struct.base_struct_id)?;
            self.read_fields(reader, base, start, depth, &mut output)?;
            reader.seek_to(resume)?;
        }

        Ok(output)
    }

    fn struct_by_id(&self, id: u32) -> Result<&'a DiskStruct> {
        self.manifest
            .struct_by_id(id)
            .ok_or_else(|| Error::StructNotFound(format!("id {id}")))
    }

    fn read_fields<R: Read + Seek>(
        &self,
        reader: &mut R,
        disk_struct: &DiskStruct,
        start: u64,
        depth: usize,
        output: &mut NtroStruct,
    ) -> Result<()> {
        for field in &disk_struct.fields {
            reader.seek_to(start + field.disk_offset as u64)?;
            self.read_field_introspection(reader, field, depth, output)?;
        }
        Ok(())
    }

    fn read_field_introspection<R: Read + Seek>(
        &self,
        reader: &mut R,
        field: &DiskField,
        depth: usize,
        output: &mut NtroStruct,
    ) -> Result<()> {
        let mut count = field.count.max(1) as u32;
        let mut pointer = false;
        let mut resume = None;

        match field.indirections.as_slice() {
            [] => {}
            [indirection] => {
                if field.count > 0 {
                    return Err(Error::IndirectedFixedArray(field.name.clone()));
                }

                let position = reader.tell()?;
                let offset = reader.read_u32::<LittleEndian>()?;
                match *indirection {
                    POINTER => {
                        pointer = true;
                        if offset == 0 {
                            output.insert(
                                field.name.clone(),
                                NtroValue {
                                    data_type: field.data_type(),
                                    pointer: true,
                                    data: NtroData::Byte(0),
                                },
                            );
                            return Ok(());
                        }
                        resume = Some(position + 4);
                        reader.seek_to(relative(position, offset as i64)?)?;
                    }
                    COUNTED_ARRAY => {
                        count = reader.read_u32::<LittleEndian>()?;
                        resume = Some(position + 8);
                        if count > 0 {
                            reader.seek_to(relative(position, offset as i64)?)?;
                        }
                    }
                    other => {
                        return Err(Error::UnknownIndirection {
                            field: field.name.clone(),
                            indirection: other,
                        })
                    }
                }
            }
            many => {
                return Err(Error::UnsupportedIndirectionDepth {
                    field: field.name.clone(),
                    depth: many.len(),
                })
            }
        }

        if field.count > 0 || !field.indirections.is_empty() {
            let mut contents = Vec::new();
            for _ in 0..count {
                contents.push(self.read_field(reader, field, pointer, depth)?);
            }
            output.insert(
                field.name.clone(),
                NtroValue {
                    data_type: field.data_type(),
                    pointer,
                    data: NtroData::Array(NtroArray {
                        is_indirection: !field.indirections.is_empty(),
                        contents,
                    }),
                },
            );
        } else {
            for _ in 0..count {
                let value = self.read_field(reader, field, pointer, depth)?;
                output.insert(field.name.clone(), value);
            }
        }

        if let Some(resume) = resume {
            reader.seek_to(resume)?;
        }
        Ok(())
    }

    fn read_field<R: Read + Seek>(
        &self,
        reader: &mut R,
        field: &DiskField,
        pointer: bool,
        depth: usize,
    ) -> Result<NtroValue> {
        let data_type = field.data_type();

        let data = match data_type {
            DataType::Struct => {
                let disk_struct = self.struct_by_id(field.type_data)?;
                let start = reader.tell()?;
                NtroData::Struct(self.read_nested(reader, disk_struct, start, depth + 1)?)
            }
            DataType::Enum => NtroData::UInt32(reader.read_u32::<LittleEndian>()?),
            DataType::SByte => NtroData::SByte(reader.read_i8()?),
            DataType::Byte => NtroData::Byte(reader.read_u8()?),
            DataType::Boolean => NtroData::Boolean(reader.read_u8()? == 1),
            DataType::Int16 => NtroData::Int16(reader.read_i16::<LittleEndian>()?),
            DataType::UInt16 => NtroData::UInt16(reader.read_u16::<LittleEndian>()?),
            DataType::Int32 => NtroData::Int32(reader.read_i32::<LittleEndian>()?),
            DataType::UInt32 => NtroData::UInt32(reader.read_u32::<LittleEndian>()?),
            DataType::Int64 => NtroData::Int64(reader.read_i64::<LittleEndian>()?),
            DataType::UInt64 => NtroData::UInt64(reader.read_u64::<LittleEndian>()?),
            DataType::Float => NtroData::Float(reader.read_f32::<LittleEndian>()?),
            DataType::ExternalReference => {
                let id = reader.read_u64::<LittleEndian>()?;
                let name = self
                    .references
                    .and_then(|references| references.lookup(id))
                    .unwrap_or_default();
                NtroData::String(name.to_string())
            }
            DataType::String | DataType::String4 => NtroData::String(reader.read_offset_string()?),
            other => match other.float_count() {
                Some(count) => NtroData::Struct(read_floats(reader, count)?),
                None => {
                    return Err(Error::UnknownDataType {
                        field: field.name.clone(),
                        data_type: field.type_code,
                    })
                }
            },
        };

        Ok(NtroValue {
            data_type,
            pointer,
            data,
        })
    }
}

/// Consecutive floats as a struct keyed "0", "1", ...
fn read_floats<R: Read + Seek>(reader: &mut R, count: usize) -> Result<NtroStruct> {
    let mut output = NtroStruct::default();
    for index in 0..count {
        output.insert(
            index.to_string(),
            NtroValue {
                data_type: DataType::Float,
                pointer: false,
                data: NtroData::Float(reader.read_f32::<LittleEndian>()?),
            },
        );
    }
    Ok(output)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::manifest::{DiskField, DiskStruct, IntrospectionManifest};
    use crate::ntro::{NtroData, NtroReader};
    use crate::rerl::{ExternalReference, ExternalReferences};
    use crate::stream::ResourceReadExt;
    use crate::types::DataType;

    fn field(name: &str, data_type: DataType, disk_offset: u16) -> DiskField {
        DiskField {
            name: name.to_string(),
            disk_offset,
            type_code: data_type as i16,
            ..Default::default()
        }
    }

    fn manifest(structs: Vec<DiskStruct>) -> IntrospectionManifest {
        IntrospectionManifest {
            introspection_version: 4,
            structs,
            enums: Vec::new(),
        }
    }

    #[test]
    fn null_pointer_is_a_placeholder() -> Result<()> {
        let mut pointer = field("p", DataType::Int32, 0);
        pointer.indirections = vec![0x03];
        let manifest = manifest(vec![DiskStruct {
            id: 1,
            name: "S".to_string(),
            disk_size: 4,
            fields: vec![pointer.clone()],
            ..Default::default()
        }]);
        let reader = NtroReader::new(&manifest, None);

        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x00, 0x00, 0x00,
            0x2A, 0x00, 0x00, 0x00,
        ]);
        let mut output = crate::ntro::NtroStruct::default();
        reader.read_field_introspection(&mut input, &pointer, 0, &mut output)?;

        assert_eq!(input.tell()?, 4);
        let value = output.get("p").cloned();
        assert_eq!(value.as_ref().map(|v| v.pointer), Some(true));
        assert_eq!(value.as_ref().map(|v| v.data_type), Some(DataType::Int32));
        assert_eq!(value.map(|v| v.data), Some(NtroData::Byte(0)));

        Ok(())
    }

    #[test]
    fn pointer_and_counted_array() -> Result<()> {
        let mut pointer = field("p", DataType::Int32, 0);
        pointer.indirections = vec![0x03];
        let mut list = field("list", DataType::UInt16, 4);
        list.indirections = vec![0x04];
        let tail = field("tail", DataType::Byte, 12);
        let manifest = manifest(vec![DiskStruct {
            id: 1,
            name: "S".to_string(),
            disk_size: 16,
            fields: vec![pointer, list, tail],
            ..Default::default()
        }]);

        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            // p -> 16
            0x10, 0x00, 0x00, 0x00,
            // list -> 4 + 0x10 = 20, 2 elements
            0x10, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
            // tail
            0x07, 0x00, 0x00, 0x00,
            // 16: pointee
            0x2A, 0x00, 0x00, 0x00,
            // 20: elements
            0x05, 0x00, 0x06, 0x00,
        ]);
        let output = NtroReader::new(&manifest, None).read_block(&mut input, 0, "")?;

        let p = output.get("p").map(|v| v.data.clone());
        let element = match p {
            Some(NtroData::Array(array)) => array.contents[0].data.clone(),
            other => panic!("expected pointer array, got {other:?}"),
        };
        assert_eq!(element, NtroData::Int32(42));

        match output.get("list").map(|v| &v.data) {
            Some(NtroData::Array(array)) => {
                assert!(array.is_indirection);
                let values: Vec<_> = array.contents.iter().map(|v| v.data.clone()).collect();
                assert_eq!(values, vec![NtroData::UInt16(5), NtroData::UInt16(6)]);
            }
            other => panic!("expected array, got {other:?}"),
        }

        assert_eq!(output.get("tail").map(|v| &v.data), Some(&NtroData::Byte(7)));
        assert_eq!(input.tell()?, 16);

        Ok(())
    }

    #[test]
    fn base_struct_fields_are_flattened() -> Result<()> {
        let manifest = manifest(vec![
            DiskStruct {
                id: 2,
                name: "B".to_string(),
                disk_size: 8,
                base_struct_id: 1,
                fields: vec![field("y", DataType::Int32, 4)],
                ..Default::default()
            },
            DiskStruct {
                id: 1,
                name: "A".to_string(),
                disk_size: 4,
                fields: vec![field("x", DataType::Int32, 0)],
                ..Default::default()
            },
        ]);

        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
        ]);
        let output = NtroReader::new(&manifest, None).read_block(&mut input, 0, "B")?;

        assert_eq!(output.name, "B");
        assert_eq!(output.get("x").map(|v| &v.data), Some(&NtroData::Int32(1)));
        assert_eq!(output.get("y").map(|v| &v.data), Some(&NtroData::Int32(2)));
        assert_eq!(input.tell()?, 8);

        Ok(())
    }

    #[test]
    fn vectors_strings_and_references() -> Result<()> {
        let mut reference = field("ref", DataType::ExternalReference, 12);
        reference.count = 0;
        let manifest = manifest(vec![DiskStruct {
            id: 1,
            name: "S".to_string(),
            disk_size: 28,
            fields: vec![
                field("v", DataType::Vector, 0),
                reference,
                field("name", DataType::String, 20),
                field("enum", DataType::Enum, 24),
            ],
            ..Default::default()
        }]);
        let references = ExternalReferences {
            references: vec![ExternalReference {
                id: 7,
                name: "models/a.vmdl".to_string(),
            }],
        };

        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x40, 0x40,
            0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // name -> 20 + 8 = 28
            0x08, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            b'h', b'i', 0x00,
        ]);
        let output =
            NtroReader::new(&manifest, Some(&references)).read_block(&mut input, 0, "S")?;

        match output.get("v").map(|v| &v.data) {
            Some(NtroData::Struct(vector)) => {
                assert_eq!(vector.contents.len(), 3);
                assert_eq!(vector.get("2").map(|v| &v.data), Some(&NtroData::Float(3.0)));
            }
            other => panic!("expected vector struct, got {other:?}"),
        }
        assert_eq!(
            output.get("ref").map(|v| &v.data),
            Some(&NtroData::String("models/a.vmdl".to_string()))
        );
        assert_eq!(
            output.get("name").map(|v| &v.data),
            Some(&NtroData::String("hi".to_string()))
        );
        assert_eq!(output.get("enum").map(|v| &v.data), Some(&NtroData::UInt32(3)));

        Ok(())
    }

    #[test]
    fn repeated_field_keeps_last_value() -> Result<()> {
        let manifest = manifest(vec![DiskStruct {
            id: 1,
            name: "S".to_string(),
            disk_size: 8,
            fields: vec![field("a", DataType::Int32, 0), field("a", DataType::Int32, 4)],
            ..Default::default()
        }]);

        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
        ]);
        let output = NtroReader::new(&manifest, None).read_block(&mut input, 0, "")?;

        assert_eq!(output.contents.len(), 1);
        assert_eq!(output.get("a").map(|v| &v.data), Some(&NtroData::Int32(2)));

        Ok(())
    }

    #[test]
    fn self_referencing_struct_stops_at_depth_limit() {
        let inner = DiskField {
            name: "inner".to_string(),
            type_code: DataType::Struct as i16,
            type_data: 1,
            ..Default::default()
        };
        let manifest = manifest(vec![DiskStruct {
            id: 1,
            name: "Loop_t".to_string(),
            fields: vec![inner],
            ..Default::default()
        }]);
        let mut input = Cursor::new(vec![0x00; 4]);

        assert!(matches!(
            NtroReader::new(&manifest, None).read_block(&mut input, 0, "Loop_t"),
            Err(Error::NestingTooDeep {
                max_depth: crate::ntro::MAX_STRUCT_DEPTH,
                ..
            })
        ));
    }

    #[test]
    fn field_errors() {
        let mut two_deep = field("deep", DataType::Int32, 0);
        two_deep.indirections = vec![0x03, 0x03];
        let mut unknown = field("odd", DataType::Int32, 0);
        unknown.indirections = vec![0x09];
        let bad_type = DiskField {
            name: "bad".to_string(),
            type_code: 99,
            ..Default::default()
        };
        let missing_struct = DiskField {
            name: "nested".to_string(),
            type_code: DataType::Struct as i16,
            type_data: 77,
            ..Default::default()
        };

        let manifest = manifest(Vec::new());
        let reader = NtroReader::new(&manifest, None);
        let mut output = crate::ntro::NtroStruct::default();
        let mut input = Cursor::new(vec![0x04, 0x00, 0x00, 0x00]);

        assert!(matches!(
            reader.read_field_introspection(&mut input, &two_deep, 0, &mut output),
            Err(Error::UnsupportedIndirectionDepth { depth: 2, .. })
        ));
        input.set_position(0);
        assert!(matches!(
            reader.read_field_introspection(&mut input, &unknown, 0, &mut output),
            Err(Error::UnknownIndirection {
                indirection: 0x09,
                ..
            })
        ));
        input.set_position(0);
        assert!(matches!(
            reader.read_field_introspection(&mut input, &bad_type, 0, &mut output),
            Err(Error::UnknownDataType { data_type: 99, .. })
        ));
        input.set_position(0);
        assert!(matches!(
            reader.read_field_introspection(&mut input, &missing_struct, 0, &mut output),
            Err(Error::StructNotFound(_))
        ));
        assert!(matches!(
            reader.read_block(&mut input, 0, "Missing_t"),
            Err(Error::StructNotFound(_))
        ));
    }
}
