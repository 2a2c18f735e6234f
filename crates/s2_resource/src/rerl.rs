//! External reference list (`RERL` block)

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek};

use crate::{
    error::Result,
    stream::{relative, ResourceReadExt},
};

/// A resource referenced by id from introspected data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalReference {
    pub id: u64,
    pub name: String,
}

/// Decoded `RERL` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalReferences {
    pub references: Vec<ExternalReference>,
}

impl ExternalReferences {
    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self> {
        reader.seek_to(offset)?;
        let table = reader.read_offset_table()?;

        let mut references = Vec::new();
        reader.seek_to(table.target)?;
        for _ in 0..table.count {
            let id = reader.read_u64::<LittleEndian>()?;

            let position = reader.tell()?;
            let name_offset = reader.read_i64::<LittleEndian>()?;
            reader.seek_to(relative(position, name_offset)?)?;
            let name = reader.read_cstring()?;
            reader.seek_to(position + 8)?;

            tracing::trace!(id, name, "external reference");
            references.push(ExternalReference { id, name });
        }

        Ok(Self { references })
    }

    /// Name of the resource with the given id
    pub fn lookup(&self, id: u64) -> Option<&str> {
        self.references
            .iter()
            .find(|reference| reference.id == id)
            .map(|reference| reference.name.as_str())
    }
}
