//! Readers for the `DATA` block, selected by the resolved resource type

use std::io::{Read, Seek};

use crate::{
    error::Result,
    kv3::BinaryKv3,
    manifest::IntrospectionManifest,
    ntro::{NtroReader, NtroStruct},
    rerl::ExternalReferences,
    value::KeyValueCollection,
};

mod material;
mod panorama;
mod sound;
mod sound_event_script;
mod texture;

pub use material::Material;
pub use panorama::{Panorama, PanoramaName};
pub use sound::{AudioFileType, Sound};
pub use sound_event_script::SoundEventScript;
pub use texture::{Texture, TextureExtraData, TextureFlags, TextureFormat};

/// Everything a payload reader needs to know about the block it reads
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockContext<'a> {
    /// Absolute start of the block
    pub offset: u64,
    /// Size of the block in bytes
    pub size: u32,
    /// Resource version from the file header
    pub version: u16,
    /// Introspection manifest, when the resource has an NTRO block
    pub manifest: Option<&'a IntrospectionManifest>,
    /// External references, when the resource has a RERL block
    pub references: Option<&'a ExternalReferences>,
    /// Check stored checksums against the data they cover
    pub verify_checksums: bool,
}

impl BlockContext<'_> {
    /// Absolute end of the block
    pub fn end(&self) -> u64 {
        self.offset + self.size as u64
    }
}

/// Generic key-value payload, decoded either through the manifest or as KV3
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValueData {
    Ntro(NtroStruct),
    KeyValues(BinaryKv3),
}

impl KeyValueData {
    /// Read the block as KV3 when the resource has no manifest, else as the introspected struct
    /// named `struct_name` (the first struct when empty)
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        context: &BlockContext<'_>,
        struct_name: &str,
    ) -> Result<Self> {
        match context.manifest {
            Some(manifest) => NtroReader::new(manifest, context.references)
                .read_block(reader, context.offset, struct_name)
                .map(Self::Ntro),
            None => BinaryKv3::read(reader, context.offset, context.size).map(Self::KeyValues),
        }
    }

    pub fn collection(&self) -> KeyValueCollection<'_> {
        match self {
            Self::Ntro(data) => data.into(),
            Self::KeyValues(data) => (&data.root).into(),
        }
    }
}

impl From<KeyValueData> for ResourceData {
    fn from(data: KeyValueData) -> Self {
        match data {
            KeyValueData::Ntro(data) => Self::Ntro(data),
            KeyValueData::KeyValues(data) => Self::KeyValues(data),
        }
    }
}

/// Decoded contents of a `DATA` block
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    /// Placeholder for payloads without a reader
    Empty,
    Ntro(NtroStruct),
    KeyValues(BinaryKv3),
    Panorama(Panorama),
    Sound(Sound),
    Texture(Texture),
    Material(Material),
    SoundEventScript(SoundEventScript),
}

impl ResourceData {
    /// The key-value tree behind this payload, if it has one
    pub fn collection(&self) -> Option<KeyValueCollection<'_>> {
        match self {
            Self::Ntro(data) => Some(data.into()),
            Self::KeyValues(data) => Some((&data.root).into()),
            Self::Material(material) => Some(material.data.collection()),
            Self::SoundEventScript(script) => Some((&script.data).into()),
            Self::Empty | Self::Panorama(_) | Self::Sound(_) | Self::Texture(_) => None,
        }
    }

    /// Short name of the payload kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Ntro(_) => "ntro",
            Self::KeyValues(_) => "kv3",
            Self::Panorama(_) => "panorama",
            Self::Sound(_) => "sound",
            Self::Texture(_) => "texture",
            Self::Material(_) => "material",
            Self::SoundEventScript(_) => "sound event script",
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::data::{BlockContext, KeyValueData, ResourceData};
    use crate::error::{Error, Result};
    use crate::kv3::{guid, MAGIC};
    use crate::manifest::{DiskField, DiskStruct, IntrospectionManifest};
    use crate::test_util::Bytes;

    fn manifest() -> IntrospectionManifest {
        IntrospectionManifest {
            introspection_version: 4,
            structs: vec![DiskStruct {
                id: 1,
                name: "Thing_t".to_string(),
                disk_size: 4,
                fields: vec![DiskField {
                    name: "m_nValue".to_string(),
                    disk_offset: 0,
                    type_code: 14,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            enums: Vec::new(),
        }
    }

    #[test]
    fn manifest_selects_ntro() -> Result<()> {
        let mut b = Bytes::default();
        b.i32(-7);

        let manifest = manifest();
        let context = BlockContext {
            size: 4,
            manifest: Some(&manifest),
            ..Default::default()
        };
        let data = KeyValueData::read(&mut b.cursor(), &context, "")?;

        assert_eq!(data.collection().find_value::<i32>("m_nValue"), Some(-7));
        assert_eq!(ResourceData::from(data).kind(), "ntro");

        Ok(())
    }

    #[test]
    fn missing_manifest_selects_kv3() -> Result<()> {
        let mut b = Bytes::default();
        b.u32(MAGIC)
            .bytes(&guid::UNCOMPRESSED)
            .bytes(&guid::FORMAT_GENERIC)
            // one string, then an object with a single string property
            .u32(1)
            .cstring("name")
            .u8(9)
            .u32(1)
            .i32(0)
            .u8(6)
            .i32(0);

        let context = BlockContext {
            size: b.pos() as u32,
            ..Default::default()
        };
        let data = KeyValueData::read(&mut b.cursor(), &context, "")?;

        assert_eq!(data.collection().find_value::<&str>("name"), Some("name"));

        Ok(())
    }

    #[test]
    fn missing_named_struct() {
        let manifest = manifest();
        let context = BlockContext {
            manifest: Some(&manifest),
            ..Default::default()
        };
        let result = KeyValueData::read(&mut Bytes::default().cursor(), &context, "Other_t");

        assert!(matches!(result, Err(Error::StructNotFound(name)) if name == "Other_t"));
    }
}
