//! Resource edit info (`REDI` block)
//!
//! Ten `(offset, count)` headers follow each other from the start of the block. The entries of
//! each list live at the header's target and the reader resumes after the 8 byte header.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek};

use crate::{
    error::{Error, Result},
    stream::ResourceReadExt,
    types::ResourceType,
};

/// A source file the resource was compiled from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDependency {
    pub content_relative_filename: String,
    pub content_search_path: String,
    pub file_crc: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentDependency {
    pub parameter_name: String,
    pub parameter_type: String,
    pub fingerprint: u32,
    pub fingerprint_default: u32,
}

/// A compiler that was involved in building the resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialDependency {
    pub string: String,
    pub compiler_identifier: String,
    pub fingerprint: u32,
    pub user_data: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalRelatedFile {
    pub content_relative_filename: String,
    pub content_search_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildResource {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraData<T> {
    pub name: String,
    pub value: T,
}

/// Decoded `REDI` block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditInfo {
    pub input_dependencies: Vec<InputDependency>,
    pub additional_input_dependencies: Vec<InputDependency>,
    pub argument_dependencies: Vec<ArgumentDependency>,
    pub special_dependencies: Vec<SpecialDependency>,
    pub additional_related_files: Vec<AdditionalRelatedFile>,
    pub child_resources: Vec<ChildResource>,
    pub extra_int_data: Vec<ExtraData<i32>>,
    pub extra_float_data: Vec<ExtraData<f32>>,
    pub extra_string_data: Vec<ExtraData<String>>,
}

impl EditInfo {
    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self> {
        reader.seek_to(offset)?;

        let input_dependencies = read_list(reader, read_input_dependency)?;
        let additional_input_dependencies = read_list(reader, read_input_dependency)?;
        let argument_dependencies = read_list(reader, |reader| {
            Ok(ArgumentDependency {
                parameter_name: reader.read_offset_string()?,
                parameter_type: reader.read_offset_string()?,
                fingerprint: reader.read_u32::<LittleEndian>()?,
                fingerprint_default: reader.read_u32::<LittleEndian>()?,
            })
        })?;
        let special_dependencies = read_list(reader, |reader| {
            Ok(SpecialDependency {
                string: reader.read_offset_string()?,
                compiler_identifier: reader.read_offset_string()?,
                fingerprint: reader.read_u32::<LittleEndian>()?,
                user_data: reader.read_u32::<LittleEndian>()?,
            })
        })?;

        let custom = reader.read_offset_table()?;
        if custom.count > 0 {
            return Err(Error::UnhandledCustomDependencies(custom.count));
        }

        let additional_related_files = read_list(reader, |reader| {
            Ok(AdditionalRelatedFile {
                content_relative_filename: reader.read_offset_string()?,
                content_search_path: reader.read_offset_string()?,
            })
        })?;
        let child_resources = read_list(reader, |reader| {
            let id = reader.read_u64::<LittleEndian>()?;
            let name = reader.read_offset_string()?;
            reader.skip(4)?;
            Ok(ChildResource { id, name })
        })?;
        let extra_int_data = read_list(reader, |reader| {
            Ok(ExtraData {
                name: reader.read_offset_string()?,
                value: reader.read_i32::<LittleEndian>()?,
            })
        })?;
        let extra_float_data = read_list(reader, |reader| {
            Ok(ExtraData {
                name: reader.read_offset_string()?,
                value: reader.read_f32::<LittleEndian>()?,
            })
        })?;
        let extra_string_data = read_list(reader, |reader| {
            Ok(ExtraData {
                name: reader.read_offset_string()?,
                value: reader.read_offset_string()?,
            })
        })?;

        Ok(Self {
            input_dependencies,
            additional_input_dependencies,
            argument_dependencies,
            special_dependencies,
            additional_related_files,
            child_resources,
            extra_int_data,
            extra_float_data,
            extra_string_data,
        })
    }

    /// Resource type named by the first special dependency, if any
    pub fn resource_type(&self) -> ResourceType {
        self.special_dependencies
            .first()
            .map(|dependency| {
                ResourceType::from_compiler_identifier(
                    &dependency.compiler_identifier,
                    &dependency.string,
                )
            })
            .unwrap_or_default()
    }
}

fn read_input_dependency<R: Read + Seek>(reader: &mut R) -> Result<InputDependency> {
    Ok(InputDependency {
        content_relative_filename: reader.read_offset_string()?,
        content_search_path: reader.read_offset_string()?,
        file_crc: reader.read_u32::<LittleEndian>()?,
        flags: reader.read_u32::<LittleEndian>()?,
    })
}

fn read_list<R, T, F>(reader: &mut R, mut read_entry: F) -> Result<Vec<T>>
where
    R: Read + Seek,
    F: FnMut(&mut R) -> Result<T>,
{
    let table = reader.read_offset_table()?;
    let mut entries = Vec::new();
    if table.count > 0 {
        reader.seek_to(table.target)?;
        for _ in 0..table.count {
            entries.push(read_entry(reader)?);
        }
    }
    reader.seek_to(table.resume)?;
    Ok(entries)
}
