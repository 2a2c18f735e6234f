use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexMap;
use std::io::{Read, Seek};

use crate::{
    data::BlockContext,
    error::{Error, Result},
    stream::{relative, ResourceReadExt},
};

/// Fixed part of a compiled texture (`vtex`) header
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq)]
#[br(little)]
struct TextureHeader {
    version: u16,
    flags: u16,
    reflectivity: [f32; 4],
    width: u16,
    height: u16,
    depth: u16,
    format: u8,
    mip_count: u8,
    picmip0_resolution: u32,
}

/// Texture flag bits
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct TextureFlags(pub u16);

impl TextureFlags {
    pub const SUGGEST_CLAMP_S: u16 = 0x01;
    pub const SUGGEST_CLAMP_T: u16 = 0x02;
    pub const SUGGEST_CLAMP_U: u16 = 0x04;
    pub const NO_LOD: u16 = 0x08;
    pub const CUBE_TEXTURE: u16 = 0x10;
    pub const VOLUME_TEXTURE: u16 = 0x20;
    pub const TEXTURE_ARRAY: u16 = 0x40;

    pub fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }
}

macro_rules! texture_formats {
    ($($variant:ident = $value:literal => $block:literal),* $(,)?) => {
        /// Pixel format of the texel data
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum TextureFormat {
            #[default]
            Unknown = 0,
            $($variant = $value,)*
        }

        impl TextureFormat {
            pub fn from_byte(byte: u8) -> Self {
                match byte {
                    $($value => Self::$variant,)*
                    _ => Self::Unknown,
                }
            }

            /// Bytes per pixel, or per 4x4 block for block compressed formats
            pub fn block_size(self) -> u32 {
                match self {
                    Self::Unknown => 1,
                    $(Self::$variant => $block,)*
                }
            }
        }
    };
}

texture_formats!(
    DXT1 = 1 => 8,
    DXT5 = 2 => 16,
    I8 = 3 => 1,
    RGBA8888 = 4 => 4,
    R16 = 5 => 2,
    RG1616 = 6 => 4,
    RGBA16161616 = 7 => 8,
    R16F = 8 => 2,
    RG1616F = 9 => 4,
    RGBA16161616F = 10 => 8,
    R32F = 11 => 4,
    RG3232F = 12 => 8,
    RGB323232F = 13 => 12,
    RGBA32323232F = 14 => 16,
    JPEG_RGBA8888 = 15 => 1,
    PNG_RGBA8888 = 16 => 1,
    JPEG_DXT5 = 17 => 1,
    PNG_DXT5 = 18 => 1,
    BC6H = 19 => 16,
    BC7 = 20 => 16,
    ATI2N = 21 => 16,
    IA88 = 22 => 2,
    ETC2 = 23 => 8,
    ETC2_EAC = 24 => 16,
    R11_EAC = 25 => 1,
    RG11_EAC = 26 => 1,
    ATI1N = 27 => 8,
    BGRA8888 = 28 => 4,
);

impl TextureFormat {
    /// Whether texels are stored in 4x4 blocks
    pub fn is_block_compressed(self) -> bool {
        matches!(
            self,
            Self::DXT1
                | Self::DXT5
                | Self::BC6H
                | Self::BC7
                | Self::ETC2
                | Self::ETC2_EAC
                | Self::ATI1N
                | Self::ATI2N
        )
    }
}

/// Kinds of extra data attached to a texture
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureExtraData {
    Unknown,
    FallbackBits,
    Sheet,
    FillToPowerOfTwo,
    CompressedMipSize,
    Other(u32),
}

impl From<u32> for TextureExtraData {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::FallbackBits,
            2 => Self::Sheet,
            3 => Self::FillToPowerOfTwo,
            4 => Self::CompressedMipSize,
            other => Self::Other(other),
        }
    }
}

/// Header of a compiled texture. Texel data follows the block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Texture {
    pub flags: TextureFlags,
    pub reflectivity: [f32; 4],
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub format: TextureFormat,
    pub mip_count: u8,
    pub picmip0_resolution: u32,
    /// Size of the visible area when the texture was padded to a power of two
    pub non_power_of_two_width: u16,
    pub non_power_of_two_height: u16,
    /// Whether mips are stored LZ4 compressed with the sizes in `compressed_mips`
    pub is_compressed: bool,
    pub compressed_mips: Vec<i32>,
    pub extra_data: IndexMap<TextureExtraData, Vec<u8>>,
    /// Absolute position of the texel data
    pub data_offset: u64,
}

impl Texture {
    pub const VERSION: u16 = 1;

    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, context: &BlockContext<'_>) -> Result<Self> {
        reader.seek_to(context.offset)?;
        let header = TextureHeader::read(reader)?;
        if header.version != Self::VERSION {
            return Err(Error::UnsupportedVersion {
                kind: "texture",
                found: header.version as u32,
                expected: Self::VERSION as u32,
            });
        }

        let mut texture = Self {
            flags: TextureFlags(header.flags),
            reflectivity: header.reflectivity,
            width: header.width,
            height: header.height,
            depth: header.depth,
            format: TextureFormat::from_byte(header.format),
            mip_count: header.mip_count,
            picmip0_resolution: header.picmip0_resolution,
            data_offset: context.end(),
            ..Default::default()
        };

        let table = reader.read_offset_table()?;
        for index in 0..table.count as u64 {
            let entry = table.target + index * 12;
            reader.seek_to(entry)?;
            let kind = TextureExtraData::from(reader.read_u32::<LittleEndian>()?);
            let offset = reader.read_u32::<LittleEndian>()?;
            let size = reader.read_u32::<LittleEndian>()?;

            reader.seek_to(relative(entry + 4, offset as i64)?)?;
            let data = reader.read_vec(size as usize)?;
            match kind {
                TextureExtraData::FillToPowerOfTwo => texture.read_fill_to_power_of_two(&data)?,
                TextureExtraData::CompressedMipSize => texture.read_compressed_mips(&data)?,
                _ => {}
            }
            tracing::trace!(?kind, size, "texture extra data");
            texture.extra_data.insert(kind, data);
        }

        Ok(texture)
    }

    fn read_fill_to_power_of_two(&mut self, mut data: &[u8]) -> Result<()> {
        data.read_u16::<LittleEndian>()?;
        let width = data.read_u16::<LittleEndian>()?;
        let height = data.read_u16::<LittleEndian>()?;
        if width > 0 && height > 0 && self.width >= width && self.height >= height {
            self.non_power_of_two_width = width;
            self.non_power_of_two_height = height;
        }
        Ok(())
    }

    fn read_compressed_mips(&mut self, mut data: &[u8]) -> Result<()> {
        let compressed = data.read_u32::<LittleEndian>()?;
        if compressed > 1 {
            return Err(Error::InvalidTextureData(format!(
                "compression flag {compressed}"
            )));
        }
        let marker = data.read_u32::<LittleEndian>()?;
        if marker != 8 {
            return Err(Error::InvalidTextureData(format!(
                "mip size marker {marker}, expected 8"
            )));
        }

        let mips = data.read_u32::<LittleEndian>()?;
        self.is_compressed = compressed == 1;
        self.compressed_mips = (0..mips)
            .map(|_| Ok(data.read_i32::<LittleEndian>()?))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    /// Uncompressed size of mip `level` in bytes
    pub fn mip_size(&self, level: u8) -> u64 {
        let shift = |value: u16| (value as u64).checked_shr(level as u32).unwrap_or(0);
        let mut width = shift(self.width);
        let mut height = shift(self.height);
        let mut depth = shift(self.depth).max(1);
        let block_size = self.format.block_size() as u64;

        if self.format.is_block_compressed() {
            width = width.next_multiple_of(4);
            height = height.next_multiple_of(4);
            if width > 0 && width < 4 {
                width = 4;
            }
            if height > 0 && height < 4 {
                height = 4;
            }
            if depth > 1 && depth < 4 {
                depth = 4;
            }
            return ((width * height) >> 4) * depth * block_size;
        }

        width * height * depth * block_size
    }

    fn stored_mip_size(&self, level: u8) -> Result<u64> {
        if !self.is_compressed {
            return Ok(self.mip_size(level));
        }
        self.compressed_mips
            .get(level as usize)
            .map(|&size| size.max(0) as u64)
            .ok_or_else(|| Error::InvalidTextureData(format!("no compressed size for mip {level}")))
    }

    /// Absolute position of mip `level`. Mips are stored smallest first.
    pub fn mip_offset(&self, level: u8) -> Result<u64> {
        let mut offset = self.data_offset;
        for smaller in (level.saturating_add(1)..self.mip_count).rev() {
            offset = offset
                .checked_add(self.stored_mip_size(smaller)?)
                .ok_or_else(|| Error::InvalidTextureData(format!("mip {smaller} overflows")))?;
        }
        Ok(offset)
    }

    /// Read the texels of mip `level`, expanding LZ4 compressed mips
    pub fn read_mip<R: Read + Seek>(&self, reader: &mut R, level: u8) -> Result<Vec<u8>> {
        reader.seek_to(self.mip_offset(level)?)?;
        let size = self.mip_size(level);
        let stored = self.stored_mip_size(level)?;
        let too_large = || Error::InvalidTextureData(format!("mip {level} of {size} bytes"));
        if stored >= size {
            return reader.read_vec(usize::try_from(size).map_err(|_| too_large())?);
        }

        let compressed = reader.read_vec(usize::try_from(stored).map_err(|_| too_large())?)?;
        // LZ4 blocks expand at most 255 times
        if size > (compressed.len() as u64).saturating_mul(255).saturating_add(16) {
            return Err(too_large());
        }
        lz4_flex::block::decompress(&compressed, size as usize)
            .map_err(|error| Error::DecompressionFailure(error.to_string()))
    }
}
