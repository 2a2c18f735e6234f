//! Helpers for the self-relative addressing used throughout the format.
//!
//! Almost every pointer in a resource file is a 32-bit offset counted from the position of the
//! offset field itself. [`ResourceReadExt`] wraps the seek arithmetic so block readers never do it
//! by hand.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Location of an `(offset, count)` table after its header has been read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetTable {
    /// Absolute position of the first entry
    pub target: u64,

    /// Number of entries
    pub count: u32,

    /// Position directly after the 8 byte header
    pub resume: u64,
}

/// Resolve a self-relative offset read at `position`
pub fn relative(position: u64, offset: i64) -> Result<u64> {
    position
        .checked_add_signed(offset)
        .ok_or(Error::InvalidOffset { position, offset })
}

/// Extension methods on seekable readers
pub trait ResourceReadExt: Read + Seek {
    /// Current absolute position
    fn tell(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }

    /// Move to an absolute position
    fn seek_to(&mut self, position: u64) -> Result<()> {
        self.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Skip `count` bytes forward
    fn skip(&mut self, count: i64) -> Result<()> {
        self.seek(SeekFrom::Current(count))?;
        Ok(())
    }

    /// Read a null terminated string at the current position
    fn read_cstring(&mut self) -> Result<String> {
        let mut raw = Vec::new();
        loop {
            let char = self.read_u8()?;
            if char == b'\0' {
                break;
            }
            raw.push(char);
        }
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Read a u32 offset and the null terminated string it points to.
    ///
    /// A zero offset is an empty string. The cursor always ends up directly after the offset field.
    fn read_offset_string(&mut self) -> Result<String> {
        let position = self.tell()?;
        let offset = self.read_u32::<LittleEndian>()?;
        if offset == 0 {
            return Ok(String::new());
        }

        self.seek_to(position + offset as u64)?;
        let value = self.read_cstring()?;
        self.seek_to(position + 4)?;
        Ok(value)
    }

    /// Read an `(offset, count)` header whose offset is relative to the header itself
    fn read_offset_table(&mut self) -> Result<OffsetTable> {
        let position = self.tell()?;
        let offset = self.read_u32::<LittleEndian>()?;
        let count = self.read_u32::<LittleEndian>()?;
        Ok(OffsetTable {
            target: position + offset as u64,
            count,
            resume: position + 8,
        })
    }

    /// Read a 16 byte GUID
    fn read_guid(&mut self) -> Result<[u8; 16]> {
        let mut guid = [0u8; 16];
        self.read_exact(&mut guid)?;
        Ok(guid)
    }

    /// Read exactly `len` bytes
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.take(len as u64).read_to_end(&mut buffer)?;
        if buffer.len() != len {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        Ok(buffer)
    }
}

impl<R: Read + Seek + ?Sized> ResourceReadExt for R {}
