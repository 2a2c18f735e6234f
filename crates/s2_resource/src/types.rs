//! Base types for the structure of a resource file.

use binrw::BinRead;
use std::fmt;

/// Resource file header
///
/// Every compiled resource starts with this fixed 16 byte header, followed directly by the block
/// directory. All data is stored in little endian format.
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq)]
#[br(little)]
pub struct ResourceHeader {
    /// Size of the whole file, not trusted beyond sentinel checks
    pub file_size: u32,

    /// Version of this header layout, always [`ResourceHeader::KNOWN_VERSION`]
    pub header_version: u16,

    /// Version of the resource payload
    pub version: u16,

    /// Offset to the block directory
    pub block_offset: u32,

    /// Number of entries in the block directory
    pub block_count: u32,
}

impl ResourceHeader {
    /// The only header version in use
    pub const KNOWN_VERSION: u16 = 12;

    /// `file_size` value found at the start of VPK archives
    pub const VPK_SENTINEL: u32 = 0x55AA1234;

    /// `file_size` value found at the start of compiled shaders (`vcs2`)
    pub const SHADER_SENTINEL: u32 = 0x32736376;
}

/// Block directory entry as stored on disk
///
/// `offset` is relative to the position of the offset field, so the absolute block start is the
/// entry position plus 4 plus `offset`.
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq)]
#[br(little)]
pub struct BlockEntry {
    /// Four character block tag
    pub tag: [u8; 4],

    /// Self-relative offset of the block
    pub offset: u32,

    /// Size of the block in bytes
    pub size: u32,
}

/// Kinds of block found in the directory
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlockType {
    RERL,
    REDI,
    NTRO,
    DATA,
    VBIB,
    VXVS,
    SNAP,
    CTRL,
    MDAT,
    MRPH,
    MBUF,
    ANIM,
    ASEQ,
    AGRP,
    PHYS,
}

impl BlockType {
    /// Look up the block type for a directory tag
    pub fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        Some(match tag {
            b"RERL" => Self::RERL,
            b"REDI" => Self::REDI,
            b"NTRO" => Self::NTRO,
            b"DATA" => Self::DATA,
            b"VBIB" => Self::VBIB,
            b"VXVS" => Self::VXVS,
            b"SNAP" => Self::SNAP,
            b"CTRL" => Self::CTRL,
            b"MDAT" => Self::MDAT,
            b"MRPH" => Self::MRPH,
            b"MBUF" => Self::MBUF,
            b"ANIM" => Self::ANIM,
            b"ASEQ" => Self::ASEQ,
            b"AGRP" => Self::AGRP,
            b"PHYS" => Self::PHYS,
            _ => return None,
        })
    }

    /// The four character tag for this block type
    pub fn tag(self) -> &'static str {
        match self {
            Self::RERL => "RERL",
            Self::REDI => "REDI",
            Self::NTRO => "NTRO",
            Self::DATA => "DATA",
            Self::VBIB => "VBIB",
            Self::VXVS => "VXVS",
            Self::SNAP => "SNAP",
            Self::CTRL => "CTRL",
            Self::MDAT => "MDAT",
            Self::MRPH => "MRPH",
            Self::MBUF => "MBUF",
            Self::ANIM => "ANIM",
            Self::ASEQ => "ASEQ",
            Self::AGRP => "AGRP",
            Self::PHYS => "PHYS",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

macro_rules! resource_types {
    ($($variant:ident),* $(,)?) => {
        /// What a resource file contains, resolved while reading its metadata blocks
        #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
        pub enum ResourceType {
            #[default]
            Unknown,
            $($variant,)*
        }

        impl ResourceType {
            /// Every known type, excluding [`ResourceType::Unknown`]
            pub const ALL: &'static [ResourceType] = &[$(ResourceType::$variant,)*];

            /// Name of the variant
            pub fn name(self) -> &'static str {
                match self {
                    ResourceType::Unknown => "Unknown",
                    $(ResourceType::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

resource_types!(
    Animation,
    AnimationGroup,
    ActionList,
    Sequence,
    Particle,
    Material,
    Sheet,
    Mesh,
    Texture,
    Model,
    PhysicsCollisionMesh,
    Sound,
    Morph,
    ResourceManifest,
    World,
    WorldNode,
    WorldVisibility,
    EntityLump,
    SurfaceProperties,
    SoundEventScript,
    SoundStackScript,
    BitmapFont,
    ResourceRemapTable,
    Panorama,
    PanoramaStyle,
    PanoramaLayout,
    PanoramaDynamicImages,
    PanoramaScript,
    PanoramaVectorGraphic,
    ParticleSnapshot,
    Map,
);

impl ResourceType {
    /// Resolve a type from a special dependency's compiler identifier.
    ///
    /// `string` is the companion string of the dependency, which tells apart the Panorama
    /// compilers that all share one identifier.
    pub fn from_compiler_identifier(identifier: &str, string: &str) -> Self {
        let identifier = match identifier.get(..7) {
            Some(prefix) if prefix.eq_ignore_ascii_case("Compile") => &identifier[7..],
            _ => identifier,
        };

        match identifier {
            "Psf" => Self::ParticleSnapshot,
            "AnimGroup" => Self::AnimationGroup,
            "VPhysXData" => Self::PhysicsCollisionMesh,
            "Font" => Self::BitmapFont,
            "RenderMesh" => Self::Mesh,
            "VectorGraphic" => Self::PanoramaVectorGraphic,
            "Panorama" => match string {
                "Panorama Style Compiler Version" => Self::PanoramaStyle,
                "Panorama Script Compiler Version" => Self::PanoramaScript,
                "Panorama Layout Compiler Version" => Self::PanoramaLayout,
                "Panorama Dynamic Images Compiler Version" => Self::PanoramaDynamicImages,
                _ => Self::Panorama,
            },
            name => Self::ALL
                .iter()
                .copied()
                .find(|t| t.name() == name)
                .unwrap_or_default(),
        }
    }

    /// Resolve a type from the name of the first struct in an introspection manifest
    pub fn from_introspection_struct(name: &str) -> Self {
        match name {
            "VSoundEventScript_t" => Self::SoundEventScript,
            "CWorldVisibility" => Self::WorldVisibility,
            _ => Self::Unknown,
        }
    }

    /// Whether this is one of the Panorama UI resource kinds
    pub fn is_panorama(self) -> bool {
        matches!(
            self,
            Self::Panorama
                | Self::PanoramaStyle
                | Self::PanoramaScript
                | Self::PanoramaLayout
                | Self::PanoramaDynamicImages
                | Self::PanoramaVectorGraphic
        )
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Field types of introspected structs
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum DataType {
    #[default]
    Unknown = 0,
    Struct = 1,
    Enum = 2,
    ExternalReference = 3,
    String4 = 4,
    SByte = 10,
    Byte = 11,
    Int16 = 12,
    UInt16 = 13,
    Int32 = 14,
    UInt32 = 15,
    Int64 = 16,
    UInt64 = 17,
    Float = 18,
    Matrix2x4 = 21,
    Vector = 22,
    Vector4D = 23,
    Quaternion = 25,
    Fltx4 = 27,
    Color = 28,
    Boolean = 30,
    String = 31,
    Matrix3x4 = 33,
    Matrix3x4a = 36,
    CTransform = 40,
    Vector4D44 = 44,
}

impl DataType {
    /// Map a raw manifest type code, unknown codes become [`DataType::Unknown`]
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Self::Struct,
            2 => Self::Enum,
            3 => Self::ExternalReference,
            4 => Self::String4,
            10 => Self::SByte,
            11 => Self::Byte,
            12 => Self::Int16,
            13 => Self::UInt16,
            14 => Self::Int32,
            15 => Self::UInt32,
            16 => Self::Int64,
            17 => Self::UInt64,
            18 => Self::Float,
            21 => Self::Matrix2x4,
            22 => Self::Vector,
            23 => Self::Vector4D,
            25 => Self::Quaternion,
            27 => Self::Fltx4,
            28 => Self::Color,
            30 => Self::Boolean,
            31 => Self::String,
            33 => Self::Matrix3x4,
            36 => Self::Matrix3x4a,
            40 => Self::CTransform,
            44 => Self::Vector4D44,
            _ => Self::Unknown,
        }
    }

    /// Number of consecutive f32 values for vector and matrix types
    pub fn float_count(self) -> Option<usize> {
        match self {
            Self::Vector => Some(3),
            Self::Quaternion | Self::Color | Self::Fltx4 | Self::Vector4D | Self::Vector4D44 => {
                Some(4)
            }
            Self::Matrix2x4 | Self::CTransform => Some(8),
            Self::Matrix3x4 | Self::Matrix3x4a => Some(12),
            _ => None,
        }
    }
}
