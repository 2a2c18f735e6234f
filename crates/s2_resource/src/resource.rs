//! Reading a compiled resource file and dispatching its blocks

use binrw::BinRead;
use bon::Builder;
use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    fmt,
    fs::File,
    io::{BufReader, Read, Seek},
    path::PathBuf,
    sync::Arc,
};

use crate::{
    data::{
        BlockContext, KeyValueData, Material, Panorama, ResourceData, Sound, SoundEventScript,
        Texture,
    },
    error::{Error, Result},
    kv3::{BinaryKv3, MAGIC, MAGIC2},
    manifest::IntrospectionManifest,
    ntro::NtroReader,
    redi::EditInfo,
    rerl::ExternalReferences,
    stream::ResourceReadExt,
    types::{BlockEntry, BlockType, ResourceHeader, ResourceType},
    vbib::VertexIndexBuffers,
};

/// A seekable byte stream handed out by an [`AssetLoader`]
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Opens resources referenced by name from other resources
pub trait AssetLoader {
    fn open(&self, path: &str) -> Result<Box<dyn ReadSeek>>;
}

impl<F> AssetLoader for F
where
    F: Fn(&str) -> Result<Box<dyn ReadSeek>>,
{
    fn open(&self, path: &str) -> Result<Box<dyn ReadSeek>> {
        self(path)
    }
}

/// Loads assets from a directory of compiled files.
///
/// `path` is tried as given, then with the `_c` suffix of compiled resources.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    pub root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetLoader for FileSystemLoader {
    fn open(&self, path: &str) -> Result<Box<dyn ReadSeek>> {
        let candidates = [self.root.join(path), self.root.join(format!("{path}_c"))];
        for candidate in candidates {
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "opening asset");
                return Ok(Box::new(BufReader::new(File::open(candidate)?)));
            }
        }
        Err(Error::AssetNotFound(path.to_string()))
    }
}

/// Options for reading resources
#[derive(Clone, Builder)]
pub struct ResourceOptions {
    /// Loader for resources referenced by other resources
    pub loader: Option<Arc<dyn AssetLoader + Send + Sync>>,

    /// How many nested resources may be loaded through [`Resource::load_resource`]
    #[builder(default = 8)]
    pub max_depth: usize,

    /// Verify checksums stored alongside payloads
    #[builder(default)]
    pub verify_checksums: bool,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for ResourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOptions")
            .field("loader", &self.loader.as_ref().map(|_| "AssetLoader"))
            .field("max_depth", &self.max_depth)
            .field("verify_checksums", &self.verify_checksums)
            .finish()
    }
}

/// Decoded contents of a block
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContents {
    EditInfo(EditInfo),
    ExternalReferences(ExternalReferences),
    Introspection(IntrospectionManifest),
    VertexIndexBuffers(VertexIndexBuffers),
    /// Key-value blocks other than `DATA`
    KeyValues(KeyValueData),
    Data(ResourceData),
    /// Blocks that are recognized but not decoded
    Unsupported,
}

/// A block of a resource file
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub block_type: BlockType,
    /// Absolute start of the block
    pub offset: u64,
    pub size: u32,
    pub contents: BlockContents,
}

/// How the `DATA` block of a resource is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataReader {
    KeyValues,
    KeyValuesOrNtro,
    Panorama,
    Sound,
    Texture,
    Material,
    SoundEventScript,
    Ntro,
    Empty,
}

impl DataReader {
    fn for_type(resource_type: ResourceType, version: u16, has_manifest: bool) -> Self {
        match resource_type {
            t if t.is_panorama() => Self::Panorama,
            ResourceType::Sound => Self::Sound,
            ResourceType::Texture => Self::Texture,
            ResourceType::Material => Self::Material,
            ResourceType::SoundEventScript => Self::SoundEventScript,
            ResourceType::Model
            | ResourceType::World
            | ResourceType::WorldNode
            | ResourceType::EntityLump
            | ResourceType::Particle => Self::KeyValuesOrNtro,
            ResourceType::Mesh if version != 0 => Self::KeyValues,
            _ if has_manifest => Self::Ntro,
            _ => Self::Empty,
        }
    }
}

/// Types whose `DATA` block is never sniffed for a KV3 magic
fn is_handled_type(resource_type: ResourceType) -> bool {
    matches!(
        resource_type,
        ResourceType::Model
            | ResourceType::World
            | ResourceType::WorldNode
            | ResourceType::Particle
            | ResourceType::Material
            | ResourceType::EntityLump
    )
}

/// Directory entry waiting for the second read pass
#[derive(Debug)]
struct PendingBlock {
    block_type: BlockType,
    offset: u64,
    size: u32,
    contents: Option<BlockContents>,
}

/// A compiled resource file (`*_c`)
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
///
/// use s2_resource::{Resource, ResourceOptions};
///
/// fn print_blocks(path: &str) -> s2_resource::error::Result<()> {
///     let mut reader = BufReader::new(File::open(path)?);
///     let resource = Resource::from_reader(&mut reader, ResourceOptions::default())?;
///
///     println!("{} (version {})", resource.resource_type(), resource.version());
///     for block in resource.blocks() {
///         println!("{} at {} ({} bytes)", block.block_type, block.offset, block.size);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Default)]
pub struct Resource {
    options: ResourceOptions,
    depth: usize,
    header: ResourceHeader,
    resource_type: ResourceType,
    blocks: Vec<Block>,
}

impl Resource {
    /// An empty resource that reads with `options`
    pub fn new(options: ResourceOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Read a resource from `reader`
    pub fn from_reader<R: Read + Seek>(
        reader: &mut R,
        options: ResourceOptions,
    ) -> Result<Self> {
        let mut resource = Self::new(options);
        resource.read(reader)?;
        Ok(resource)
    }

    /// Read the header, the block directory and every block.
    ///
    /// Nothing is replaced when reading fails.
    #[tracing::instrument(skip(self, reader), fields(depth = self.depth))]
    pub fn read<R: Read + Seek>(&mut self, reader: &mut R) -> Result<()> {
        let header = ResourceHeader::read(reader)?;
        match header.file_size {
            ResourceHeader::VPK_SENTINEL => return Err(Error::FormatMismatch("VPK archive")),
            ResourceHeader::SHADER_SENTINEL => return Err(Error::FormatMismatch("compiled shader")),
            _ => {}
        }
        if header.header_version != ResourceHeader::KNOWN_VERSION {
            return Err(Error::UnsupportedVersion {
                kind: "resource header",
                found: header.header_version as u32,
                expected: ResourceHeader::KNOWN_VERSION as u32,
            });
        }

        let (pending, resource_type) = Self::read_directory(reader, &header)?;
        let blocks = self.read_blocks(reader, &header, resource_type, pending)?;

        tracing::debug!(%resource_type, blocks = blocks.len(), "read resource");
        self.header = header;
        self.resource_type = resource_type;
        self.blocks = blocks;
        Ok(())
    }

    /// First pass: walk the directory and read the metadata blocks the rest depend on
    fn read_directory<R: Read + Seek>(
        reader: &mut R,
        header: &ResourceHeader,
    ) -> Result<(Vec<PendingBlock>, ResourceType)> {
        let mut pending = Vec::new();
        let mut from_edit_info = ResourceType::Unknown;
        let mut from_manifest = ResourceType::Unknown;

        for _ in 0..header.block_count {
            let entry_position = reader.tell()?;
            let entry = BlockEntry::read(reader)?;
            let block_type = BlockType::from_tag(&entry.tag).ok_or_else(|| {
                Error::UnsupportedBlockType(String::from_utf8_lossy(&entry.tag).into_owned())
            })?;
            let offset = entry_position + 4 + entry.offset as u64;
            tracing::trace!(%block_type, offset, size = entry.size, "directory entry");

            let contents = match block_type {
                BlockType::REDI => {
                    let edit_info = EditInfo::read(reader, offset)?;
                    if from_edit_info == ResourceType::Unknown {
                        from_edit_info = edit_info.resource_type();
                    }
                    Some(BlockContents::EditInfo(edit_info))
                }
                BlockType::NTRO => {
                    let manifest = IntrospectionManifest::read(reader, offset)?;
                    if from_manifest == ResourceType::Unknown {
                        from_manifest = manifest
                            .structs
                            .first()
                            .map(|first| ResourceType::from_introspection_struct(&first.name))
                            .unwrap_or_default();
                    }
                    Some(BlockContents::Introspection(manifest))
                }
                _ => None,
            };

            pending.push(PendingBlock {
                block_type,
                offset,
                size: entry.size,
                contents,
            });
            reader.seek_to(entry_position + 12)?;
        }

        let resource_type = match from_edit_info {
            ResourceType::Unknown => from_manifest,
            resolved => resolved,
        };
        Ok((pending, resource_type))
    }

    /// Second pass: read every remaining block in directory order
    fn read_blocks<R: Read + Seek>(
        &self,
        reader: &mut R,
        header: &ResourceHeader,
        resource_type: ResourceType,
        pending: Vec<PendingBlock>,
    ) -> Result<Vec<Block>> {
        let manifest = pending.iter().find_map(|block| match &block.contents {
            Some(BlockContents::Introspection(manifest)) => Some(manifest.clone()),
            _ => None,
        });
        let data_reader = DataReader::for_type(resource_type, header.version, manifest.is_some());
        let mut references: Option<ExternalReferences> = None;

        let mut blocks = Vec::with_capacity(pending.len());
        for block in pending {
            let context = BlockContext {
                offset: block.offset,
                size: block.size,
                version: header.version,
                manifest: manifest.as_ref(),
                references: references.as_ref(),
                verify_checksums: self.options.verify_checksums,
            };

            let contents = match block.contents {
                Some(contents) => contents,
                None => {
                    let contents =
                        Self::read_block(reader, block.block_type, &context, resource_type, data_reader)?;
                    if let BlockContents::ExternalReferences(list) = &contents {
                        references.get_or_insert_with(|| list.clone());
                    }
                    contents
                }
            };

            blocks.push(Block {
                block_type: block.block_type,
                offset: block.offset,
                size: block.size,
                contents,
            });
        }
        Ok(blocks)
    }

    #[tracing::instrument(skip(reader, context))]
    fn read_block<R: Read + Seek>(
        reader: &mut R,
        block_type: BlockType,
        context: &BlockContext<'_>,
        resource_type: ResourceType,
        data_reader: DataReader,
    ) -> Result<BlockContents> {
        let struct_name = match block_type {
            BlockType::MRPH => "MorphSetData_t",
            BlockType::ANIM => "AnimationResourceData_t",
            BlockType::ASEQ => "SequenceGroupResourceData_t",
            BlockType::AGRP => "AnimationGroupResourceData_t",
            BlockType::PHYS => "VPhysXAggregateData_t",
            _ => "",
        };

        let contents = match block_type {
            BlockType::RERL => {
                BlockContents::ExternalReferences(ExternalReferences::read(reader, context.offset)?)
            }
            BlockType::REDI => BlockContents::EditInfo(EditInfo::read(reader, context.offset)?),
            BlockType::NTRO => {
                BlockContents::Introspection(IntrospectionManifest::read(reader, context.offset)?)
            }
            BlockType::VBIB | BlockType::MBUF => BlockContents::VertexIndexBuffers(
                VertexIndexBuffers::read(reader, context.offset)?,
            ),
            BlockType::VXVS | BlockType::SNAP => {
                tracing::warn!(%block_type, "block type is not decoded");
                BlockContents::Unsupported
            }
            BlockType::CTRL | BlockType::MDAT => BlockContents::KeyValues(KeyValueData::KeyValues(
                BinaryKv3::read(reader, context.offset, context.size)?,
            )),
            BlockType::MRPH
            | BlockType::ANIM
            | BlockType::ASEQ
            | BlockType::AGRP
            | BlockType::PHYS => {
                BlockContents::KeyValues(KeyValueData::read(reader, context, struct_name)?)
            }
            BlockType::DATA => {
                let data_reader = if context.size >= 4
                    && !is_handled_type(resource_type)
                    && Self::has_kv3_magic(reader, context.offset)?
                {
                    DataReader::KeyValues
                } else {
                    data_reader
                };
                BlockContents::Data(Self::read_data(reader, context, data_reader)?)
            }
        };
        Ok(contents)
    }

    fn has_kv3_magic<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<bool> {
        reader.seek_to(offset)?;
        let magic = reader.read_u32::<LittleEndian>()?;
        Ok(magic == MAGIC || magic == MAGIC2)
    }

    fn read_data<R: Read + Seek>(
        reader: &mut R,
        context: &BlockContext<'_>,
        data_reader: DataReader,
    ) -> Result<ResourceData> {
        tracing::debug!(?data_reader, "reading data block");
        let data = match data_reader {
            DataReader::KeyValues => {
                ResourceData::KeyValues(BinaryKv3::read(reader, context.offset, context.size)?)
            }
            DataReader::KeyValuesOrNtro => KeyValueData::read(reader, context, "")?.into(),
            DataReader::Panorama => ResourceData::Panorama(Panorama::read(reader, context)?),
            DataReader::Sound => ResourceData::Sound(Sound::read(reader, context)?),
            DataReader::Texture => ResourceData::Texture(Texture::read(reader, context)?),
            DataReader::Material => ResourceData::Material(Material::read(reader, context)?),
            DataReader::SoundEventScript => {
                ResourceData::SoundEventScript(SoundEventScript::read(reader, context)?)
            }
            DataReader::Ntro => match context.manifest {
                Some(manifest) => ResourceData::Ntro(
                    NtroReader::new(manifest, context.references).read_block(
                        reader,
                        context.offset,
                        "",
                    )?,
                ),
                None => ResourceData::Empty,
            },
            DataReader::Empty => ResourceData::Empty,
        };
        Ok(data)
    }

    /// Open `path` through the configured loader and read it with the same options
    pub fn load_resource(&self, path: &str) -> Result<Resource> {
        let depth = self.depth + 1;
        if depth > self.options.max_depth {
            return Err(Error::RecursionLimit {
                path: path.to_string(),
                max_depth: self.options.max_depth,
            });
        }

        let loader = self
            .options
            .loader
            .as_ref()
            .ok_or_else(|| Error::AssetNotFound(path.to_string()))?;
        let mut reader = loader.open(path)?;

        let mut resource = Resource {
            options: self.options.clone(),
            depth,
            ..Default::default()
        };
        resource.read(&mut reader)?;
        Ok(resource)
    }

    /// Load the resource an external reference id points to
    pub fn load_reference(&self, id: u64) -> Result<Resource> {
        let path = self
            .external_references()
            .and_then(|references| references.lookup(id))
            .ok_or_else(|| Error::AssetNotFound(format!("{id:#018x}")))?;
        self.load_resource(path)
    }

    pub fn header(&self) -> &ResourceHeader {
        &self.header
    }

    /// Resource version from the header
    pub fn version(&self) -> u16 {
        self.header.version
    }

    /// Block offset field of the header
    pub fn block_offset(&self) -> u32 {
        self.header.block_offset
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// How many resources deep this one was loaded
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    /// Blocks in directory order
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// First block of `block_type`
    pub fn find_block(&self, block_type: BlockType) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|block| block.block_type == block_type)
    }

    pub fn introspection_manifest(&self) -> Option<&IntrospectionManifest> {
        self.blocks.iter().find_map(|block| match &block.contents {
            BlockContents::Introspection(manifest) => Some(manifest),
            _ => None,
        })
    }

    pub fn external_references(&self) -> Option<&ExternalReferences> {
        self.blocks.iter().find_map(|block| match &block.contents {
            BlockContents::ExternalReferences(references) => Some(references),
            _ => None,
        })
    }

    pub fn edit_info(&self) -> Option<&EditInfo> {
        self.blocks.iter().find_map(|block| match &block.contents {
            BlockContents::EditInfo(edit_info) => Some(edit_info),
            _ => None,
        })
    }

    /// Decoded `DATA` block
    pub fn data(&self) -> Option<&ResourceData> {
        self.blocks.iter().find_map(|block| match &block.contents {
            BlockContents::Data(data) => Some(data),
            _ => None,
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::sync::Arc;

    use crate::data::ResourceData;
    use crate::error::{Error, Result};
    use crate::resource::{BlockContents, ReadSeek, Resource, ResourceOptions};
    use crate::test_util::{edit_info, manifest, resource_file, Bytes};
    use crate::types::{BlockType, ResourceType};

    fn read(file: &Bytes) -> Result<Resource> {
        Resource::from_reader(&mut file.cursor(), ResourceOptions::default())
    }

    fn references() -> Bytes {
        let mut b = Bytes::default();
        let table = b.offset();
        b.u32(1);
        b.point(table);
        b.u64(7);
        let name = b.pos();
        b.i64(0);
        let relative = (b.pos() - name) as u32;
        b.patch_u32(name, relative);
        b.cstring("materials/child.vmat");
        b
    }

    #[test]
    fn block_offsets_are_relative_to_their_field() -> Result<()> {
        let rerl = references();
        let redi = edit_info("CompileTexture", "");
        let file = resource_file(1, &[(b"RERL", &rerl), (b"REDI", &redi)]);

        let resource = read(&file)?;
        assert_eq!(resource.blocks().len(), 2);
        for (index, block) in resource.blocks().iter().enumerate() {
            let field = 16 + index * 12 + 4;
            let relative = u32::from_le_bytes(file.data[field..field + 4].try_into().unwrap());
            assert_eq!(block.offset, field as u64 + relative as u64);
        }
        assert_eq!(resource.blocks()[0].size, rerl.data.len() as u32);
        assert_eq!(
            resource.external_references().and_then(|list| list.lookup(7)),
            Some("materials/child.vmat")
        );

        Ok(())
    }

    #[test]
    fn foreign_containers_are_rejected() {
        #[rustfmt::skip]
        let vpk = Bytes { data: vec![
            0x34, 0x12, 0xAA, 0x55,
            0x0C, 0x00, 0x00, 0x00,
            0x08, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ] };
        assert!(matches!(read(&vpk), Err(Error::FormatMismatch("VPK archive"))));

        let mut shader = Bytes::default();
        shader.bytes(b"vcs2").zeros(12);
        assert!(matches!(read(&shader), Err(Error::FormatMismatch(_))));

        let mut header = Bytes::default();
        header.u32(16).u16(11).u16(0).u32(8).u32(0);
        assert!(matches!(
            read(&header),
            Err(Error::UnsupportedVersion { found: 11, expected: 12, .. })
        ));
    }

    #[test]
    fn oversized_block_count_fails_without_allocating() {
        let mut header = Bytes::default();
        header.u32(16).u16(12).u16(0).u32(8).u32(u32::MAX);
        assert!(read(&header).is_err());
    }

    #[test]
    fn unknown_tag_fails() {
        let file = resource_file(0, &[(b"ABCD", &Bytes::default())]);
        assert!(matches!(read(&file), Err(Error::UnsupportedBlockType(tag)) if tag == "ABCD"));
    }

    #[test]
    fn edit_info_wins_over_manifest() -> Result<()> {
        let ntro = manifest(&["CWorldVisibility"]);
        let redi = edit_info("CompileTexture", "");

        for blocks in [
            [(b"REDI", &redi), (b"NTRO", &ntro)],
            [(b"NTRO", &ntro), (b"REDI", &redi)],
        ] {
            let resource = read(&resource_file(1, &blocks))?;
            assert_eq!(resource.resource_type(), ResourceType::Texture);
        }

        let resource = read(&resource_file(1, &[(b"NTRO", &ntro)]))?;
        assert_eq!(resource.resource_type(), ResourceType::WorldVisibility);
        assert!(resource.introspection_manifest().is_some());

        Ok(())
    }

    #[test]
    fn unsupported_blocks_are_kept_empty() -> Result<()> {
        let mut vxvs = Bytes::default();
        vxvs.zeros(8);
        let resource = read(&resource_file(0, &[(b"VXVS", &vxvs)]))?;

        let block = resource.find_block(BlockType::VXVS);
        assert_eq!(block.map(|b| &b.contents), Some(&BlockContents::Unsupported));
        assert_eq!(resource.data(), None);

        Ok(())
    }

    #[test]
    fn data_without_reader_is_empty() -> Result<()> {
        let mut data = Bytes::default();
        data.u32(0xFFFF_FFFF);
        let resource = read(&resource_file(0, &[(b"DATA", &data)]))?;

        assert_eq!(resource.data(), Some(&ResourceData::Empty));

        Ok(())
    }

    #[test]
    fn failed_read_keeps_previous_blocks() -> Result<()> {
        let redi = edit_info("CompileTexture", "");
        let mut resource = read(&resource_file(0, &[(b"REDI", &redi)]))?;

        let broken = resource_file(0, &[(b"REDI", &redi), (b"NOPE", &redi)]);
        assert!(resource.read(&mut broken.cursor()).is_err());
        assert_eq!(resource.blocks().len(), 1);
        assert_eq!(resource.resource_type(), ResourceType::Texture);

        Ok(())
    }

    #[test]
    fn nested_loading_is_limited() -> Result<()> {
        let redi = edit_info("CompileTexture", "");
        let file = resource_file(0, &[(b"REDI", &redi)]);
        let loader = move |path: &str| -> Result<Box<dyn ReadSeek>> {
            match path {
                "child" => Ok(Box::new(Cursor::new(file.data.clone()))),
                other => Err(Error::AssetNotFound(other.to_string())),
            }
        };
        let options = ResourceOptions::builder()
            .loader(Arc::new(loader))
            .max_depth(1)
            .build();

        let root = Resource::new(options);
        let child = root.load_resource("child")?;
        assert_eq!(child.depth(), 1);
        assert_eq!(child.resource_type(), ResourceType::Texture);

        assert!(matches!(
            child.load_resource("child"),
            Err(Error::RecursionLimit { max_depth: 1, .. })
        ));
        assert!(matches!(
            root.load_resource("missing"),
            Err(Error::AssetNotFound(path)) if path == "missing"
        ));

        let unconfigured = Resource::default();
        assert!(matches!(
            unconfigured.load_resource("child"),
            Err(Error::AssetNotFound(_))
        ));

        Ok(())
    }
}
