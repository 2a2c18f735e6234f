//! The introspection manifest stored in `NTRO` blocks.
//!
//! The manifest describes the layout of every struct that appears in the resource's data blocks.
//! Structs are addressed by `id`, never by position in the list.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek};

use crate::{error::Result, stream::ResourceReadExt, types::DataType};

/// A field of an introspected struct
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskField {
    /// Field name, used as the key in decoded structs
    pub name: String,

    /// Fixed array length, 0 for a plain field. Stored as an unsigned 16 bit value.
    pub count: u16,

    /// Offset from the start of the owning struct. Stored as an unsigned 16 bit value, so offsets
    /// past `i16::MAX` stay positive.
    pub disk_offset: u16,

    /// Indirection bytes, `0x03` pointer or `0x04` counted array
    pub indirections: Vec<u8>,

    /// Struct id for [`DataType::Struct`] fields, enum id for [`DataType::Enum`]
    pub type_data: u32,

    /// Raw type code
    pub type_code: i16,
}

impl DiskField {
    /// Decoded field type
    pub fn data_type(&self) -> DataType {
        DataType::from_code(self.type_code)
    }
}

/// An introspected struct
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskStruct {
    pub introspection_version: u32,
    pub id: u32,
    pub name: String,
    pub disk_crc: u32,
    pub user_version: i32,
    pub disk_size: u16,
    pub alignment: u16,
    /// Id of the struct whose fields are flattened into this one, 0 for none
    pub base_struct_id: u32,
    pub flags: u8,
    pub fields: Vec<DiskField>,
}

/// A named value of an introspected enum
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskEnumValue {
    pub name: String,
    pub value: i32,
}

/// An introspected enum
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskEnum {
    pub introspection_version: u32,
    pub id: u32,
    pub name: String,
    pub disk_crc: u32,
    pub user_version: i32,
    pub values: Vec<DiskEnumValue>,
}

/// Decoded `NTRO` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntrospectionManifest {
    pub introspection_version: u32,
    pub structs: Vec<DiskStruct>,
    pub enums: Vec<DiskEnum>,
}

impl IntrospectionManifest {
    /// Read the manifest of a block starting at `offset`
    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self> {
        reader.seek_to(offset)?;
        let introspection_version = reader.read_u32::<LittleEndian>()?;
        let structs = Self::read_structs(reader)?;

        reader.seek_to(offset + 12)?;
        let enums = Self::read_enums(reader)?;

        tracing::debug!(structs = structs.len(), enums = enums.len(), "read manifest");

        Ok(Self {
            introspection_version,
            structs,
            enums,
        })
    }

    /// Find a struct by id
    pub fn struct_by_id(&self, id: u32) -> Option<&DiskStruct> {
        self.structs.iter().find(|s| s.id == id)
    }

    /// Find a struct by name
    pub fn struct_by_name(&self, name: &str) -> Option<&DiskStruct> {
        self.structs.iter().find(|s| s.name == name)
    }

    /// Find an enum by id
    pub fn enum_by_id(&self, id: u32) -> Option<&DiskEnum> {
        self.enums.iter().find(|e| e.id == id)
    }

    fn read_structs<R: Read + Seek>(reader: &mut R) -> Result<Vec<DiskStruct>> {
        let table = reader.read_offset_table()?;
        if table.count == 0 {
            return Ok(Vec::new());
        }

        reader.seek_to(table.target)?;
        (0..table.count)
            .map(|_| {
                let introspection_version = reader.read_u32::<LittleEndian>()?;
                let id = reader.read_u32::<LittleEndian>()?;
                let name = reader.read_offset_string()?;
                let disk_crc = reader.read_u32::<LittleEndian>()?;
                let user_version = reader.read_i32::<LittleEndian>()?;
                let disk_size = reader.read_u16::<LittleEndian>()?;
                let alignment = reader.read_u16::<LittleEndian>()?;
                let base_struct_id = reader.read_u32::<LittleEndian>()?;

                let fields_table = reader.read_offset_table()?;
                let mut fields = Vec::new();
                if fields_table.count > 0 {
                    reader.seek_to(fields_table.target)?;
                    for _ in 0..fields_table.count {
                        fields.push(Self::read_field(reader)?);
                    }
                    reader.seek_to(fields_table.resume)?;
                }

                let flags = reader.read_u8()?;
                reader.skip(3)?;

                Ok(DiskStruct {
                    introspection_version,
                    id,
                    name,
                    disk_crc,
                    user_version,
                    disk_size,
                    alignment,
                    base_struct_id,
                    flags,
                    fields,
                })
            })
            .collect()
    }

    fn read_field<R: Read + Seek>(reader: &mut R) -> Result<DiskField> {
        let name = reader.read_offset_string()?;
        let count = reader.read_u16::<LittleEndian>()?;
        let disk_offset = reader.read_u16::<LittleEndian>()?;

        let indirection_table = reader.read_offset_table()?;
        let mut indirections = Vec::new();
        if indirection_table.count > 0 {
            reader.seek_to(indirection_table.target)?;
            indirections = reader.read_vec(indirection_table.count as usize)?;
            reader.seek_to(indirection_table.resume)?;
        }

        let type_data = reader.read_u32::<LittleEndian>()?;
        let type_code = reader.read_i16::<LittleEndian>()?;
        reader.skip(2)?;

        Ok(DiskField {
            name,
            count,
            disk_offset,
            indirections,
            type_data,
            type_code,
        })
    }

    fn read_enums<R: Read + Seek>(reader: &mut R) -> Result<Vec<DiskEnum>> {
        let table = reader.read_offset_table()?;
        if table.count == 0 {
            return Ok(Vec::new());
        }

        reader.seek_to(table.target)?;
        (0..table.count)
            .map(|_| {
                let introspection_version = reader.read_u32::<LittleEndian>()?;
                let id = reader.read_u32::<LittleEndian>()?;
                let name = reader.read_offset_string()?;
                let disk_crc = reader.read_u32::<LittleEndian>()?;
                let user_version = reader.read_i32::<LittleEndian>()?;

                let values_table = reader.read_offset_table()?;
                let mut values = Vec::new();
                if values_table.count > 0 {
                    reader.seek_to(values_table.target)?;
                    for _ in 0..values_table.count {
                        values.push(DiskEnumValue {
                            name: reader.read_offset_string()?,
                            value: reader.read_i32::<LittleEndian>()?,
                        });
                    }
                    reader.seek_to(values_table.resume)?;
                }

                Ok(DiskEnum {
                    introspection_version,
                    id,
                    name,
                    disk_crc,
                    user_version,
                    values,
                })
            })
            .collect()
    }
}
