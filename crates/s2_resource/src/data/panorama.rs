use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek};

use crate::{
    data::BlockContext,
    error::{Error, Result},
    stream::ResourceReadExt,
};

const CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// A file name entry of a Panorama header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanoramaName {
    pub name: String,
    pub unknown1: u32,
    pub unknown2: u32,
}

/// Compiled Panorama UI source (layouts, styles, scripts)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Panorama {
    /// CRC32 of `data`
    pub crc32: u32,
    pub names: Vec<PanoramaName>,
    /// Source text as stored
    pub data: Vec<u8>,
}

impl Panorama {
    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, context: &BlockContext<'_>) -> Result<Self> {
        reader.seek_to(context.offset)?;

        let crc32 = reader.read_u32::<LittleEndian>()?;
        let count = reader.read_u16::<LittleEndian>()?;
        let names = (0..count)
            .map(|_| {
                Ok(PanoramaName {
                    name: reader.read_cstring()?,
                    unknown1: reader.read_u32::<LittleEndian>()?,
                    unknown2: reader.read_u32::<LittleEndian>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let header_size = reader.tell()? - context.offset;
        let len = (context.size as u64)
            .checked_sub(header_size)
            .ok_or(Error::OutOfBounds {
                offset: header_size as usize,
                len: 0,
                size: context.size as usize,
            })?;
        let data = reader.read_vec(len as usize)?;

        if context.verify_checksums {
            let computed = CRC32.checksum(&data);
            if computed != crc32 {
                return Err(Error::ChecksumMismatch {
                    stored: crc32,
                    computed,
                });
            }
        }

        Ok(Self { crc32, names, data })
    }

    /// The payload as text
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}
