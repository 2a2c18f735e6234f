use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{Read, Seek};

use crate::{
    error::{Error, Result},
    kv3::{
        compression::{block_decompress, lz4_decompress},
        guid, BinaryKv3, KvData, KvFlag, KvObject, KvType, KvValue, MAGIC, MAGIC2,
    },
    stream::ResourceReadExt,
};

// On disk type bytes, including the compressed literal forms
const NULL: u8 = 1;
const BOOLEAN: u8 = 2;
const INT64: u8 = 3;
const UINT64: u8 = 4;
const DOUBLE: u8 = 5;
const STRING: u8 = 6;
const BINARY_BLOB: u8 = 7;
const ARRAY: u8 = 8;
const OBJECT: u8 = 9;
const ARRAY_TYPED: u8 = 10;
const INT32: u8 = 11;
const UINT32: u8 = 12;
const BOOLEAN_TRUE: u8 = 13;
const BOOLEAN_FALSE: u8 = 14;
const INT64_ZERO: u8 = 15;
const INT64_ONE: u8 = 16;
const DOUBLE_ZERO: u8 = 17;
const DOUBLE_ONE: u8 = 18;

/// How deep arrays and objects may nest inside each other
const MAX_DEPTH: usize = 256;

/// Bounds checked cursor over a decoded KV3 body
#[derive(Debug)]
struct ByteBuffer {
    data: Vec<u8>,
    position: usize,
}

impl ByteBuffer {
    fn new(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(Error::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            })
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let start = self.position;
        self.slice(start, len)?;
        self.position += len;
        Ok(&self.data[start..start + len])
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn cstring(&mut self) -> Result<String> {
        let rest = self.data.get(self.position..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|&byte| byte == 0)
            .ok_or(Error::OutOfBounds {
                offset: self.position,
                len: rest.len() + 1,
                size: self.data.len(),
            })?;
        let value = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.position += len + 1;
        Ok(value)
    }

    /// Move to `position`, which may equal the length of the buffer
    fn seek(&mut self, position: usize) -> Result<()> {
        self.slice(position, 0)?;
        self.position = position;
        Ok(())
    }
}

fn align(position: usize, alignment: usize) -> usize {
    position.next_multiple_of(alignment)
}

fn header_count(name: &str, value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidKvHeader(format!("{name} is {value}")))
}

/// Decoding state shared by every value in one document
struct Decoder {
    buffer: ByteBuffer,
    strings: Vec<String>,
    /// Type tags of version 2 documents, read in order instead of inline bytes
    types: Option<Vec<u8>>,
    type_index: usize,
    /// Read position of booleans and blob payloads in version 2 documents
    binary_offset: Option<usize>,
    /// Read position of 64 bit values in version 2 documents
    eight_byte_offset: Option<usize>,
    /// Arrays and objects currently open
    depth: usize,
}

impl Decoder {
    fn legacy(mut buffer: ByteBuffer) -> Result<Self> {
        let count = buffer.u32()?;
        let strings = (0..count)
            .map(|_| buffer.cstring())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            buffer,
            strings,
            types: None,
            type_index: 0,
            binary_offset: None,
            eight_byte_offset: None,
            depth: 0,
        })
    }

    /// Split a version 2 body into its regions.
    ///
    /// Layout: binary bytes, padded to 4; string count and the remaining four byte values, padded
    /// to 8; eight byte values; the string table; type tags; a 4 byte trailer.
    fn version2(
        mut buffer: ByteBuffer,
        binary_count: usize,
        integer_count: usize,
        eight_byte_count: usize,
    ) -> Result<Self> {
        buffer.seek(align(binary_count, 4))?;
        let string_count = header_count("string count", buffer.i32()?)?;
        let kv_data = buffer.position;

        let eight_byte_offset = align(kv_data + integer_count.saturating_sub(1) * 4, 8);
        buffer.seek(eight_byte_offset + eight_byte_count * 8)?;

        let strings = (0..string_count)
            .map(|_| buffer.cstring())
            .collect::<Result<Vec<_>>>()?;

        let types_end = buffer.data.len().checked_sub(4).ok_or(Error::OutOfBounds {
            offset: buffer.position,
            len: 4,
            size: buffer.data.len(),
        })?;
        let types_len = types_end
            .checked_sub(buffer.position)
            .ok_or(Error::OutOfBounds {
                offset: buffer.position,
                len: 4,
                size: buffer.data.len(),
            })?;
        let types = buffer.take(types_len)?.to_vec();
        tracing::trace!(
            strings = strings.len(),
            types = types.len(),
            eight_byte_offset,
            "kv3 version 2 regions"
        );

        buffer.seek(kv_data)?;
        Ok(Self {
            buffer,
            strings,
            types: Some(types),
            type_index: 0,
            binary_offset: Some(0),
            eight_byte_offset: Some(eight_byte_offset),
            depth: 0,
        })
    }

    fn type_byte(&mut self) -> Result<u8> {
        match &self.types {
            Some(types) => {
                let byte = *types.get(self.type_index).ok_or(Error::OutOfBounds {
                    offset: self.type_index,
                    len: 1,
                    size: types.len(),
                })?;
                self.type_index += 1;
                Ok(byte)
            }
            None => self.buffer.u8(),
        }
    }

    fn read_type(&mut self) -> Result<(u8, KvFlag)> {
        let byte = self.type_byte()?;
        if byte & 0x80 == 0 {
            return Ok((byte, KvFlag::None));
        }

        let flag_byte = self.type_byte()?;
        let flag = KvFlag::from_byte(flag_byte).unwrap_or_else(|| {
            tracing::warn!(flag = flag_byte, "unknown KV3 flag, treating as none");
            KvFlag::None
        });
        Ok((byte & 0x7F, flag))
    }

    fn string(&self, id: i32) -> Result<String> {
        if id == -1 {
            return Ok(String::new());
        }
        usize::try_from(id)
            .ok()
            .and_then(|index| self.strings.get(index))
            .cloned()
            .ok_or(Error::OutOfBounds {
                offset: id.max(0) as usize,
                len: 1,
                size: self.strings.len(),
            })
    }

    fn eight_bytes(&mut self) -> Result<[u8; 8]> {
        let bytes = match self.eight_byte_offset {
            Some(offset) => {
                let bytes = self.buffer.slice(offset, 8)?;
                self.eight_byte_offset = Some(offset + 8);
                bytes
            }
            None => self.buffer.take(8)?,
        };
        let mut value = [0u8; 8];
        value.copy_from_slice(bytes);
        Ok(value)
    }

    fn boolean(&mut self) -> Result<bool> {
        let byte = match self.binary_offset {
            Some(offset) => {
                let byte = self.buffer.slice(offset, 1)?[0];
                self.binary_offset = Some(offset + 1);
                byte
            }
            None => self.buffer.u8()?,
        };
        Ok(byte != 0)
    }

    fn blob(&mut self) -> Result<Vec<u8>> {
        let len = header_count("blob length", self.buffer.i32()?)?;
        match self.binary_offset {
            Some(offset) => {
                let blob = self.buffer.slice(offset, len)?.to_vec();
                self.binary_offset = Some(offset + len);
                Ok(blob)
            }
            None => Ok(self.buffer.take(len)?.to_vec()),
        }
    }

    /// Run `read` one container level deeper
    fn nested<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::NestingTooDeep {
                kind: "KV3 container",
                max_depth: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    /// Read a named entry (or an array element when `in_array`) into `parent`
    fn parse(&mut self, parent: &mut KvObject, in_array: bool) -> Result<()> {
        let name = if in_array {
            String::new()
        } else {
            let id = self.buffer.i32()?;
            self.string(id)?
        };

        let (kv_type, flag) = self.read_type()?;
        self.read_value(&name, kv_type, flag, parent)
    }

    fn read_value(
        &mut self,
        name: &str,
        raw: u8,
        flags: KvFlag,
        parent: &mut KvObject,
    ) -> Result<()> {
        let (kv_type, data) = match raw {
            NULL => (KvType::Null, KvData::Null),
            BOOLEAN => (KvType::Boolean, KvData::Bool(self.boolean()?)),
            BOOLEAN_TRUE => (KvType::Boolean, KvData::Bool(true)),
            BOOLEAN_FALSE => (KvType::Boolean, KvData::Bool(false)),
            INT64 => (
                KvType::Int64,
                KvData::Int64(i64::from_le_bytes(self.eight_bytes()?)),
            ),
            INT64_ZERO => (KvType::Int64, KvData::Int64(0)),
            INT64_ONE => (KvType::Int64, KvData::Int64(1)),
            UINT64 => (
                KvType::UInt64,
                KvData::UInt64(u64::from_le_bytes(self.eight_bytes()?)),
            ),
            DOUBLE => (
                KvType::Double,
                KvData::Double(f64::from_le_bytes(self.eight_bytes()?)),
            ),
            DOUBLE_ZERO => (KvType::Double, KvData::Double(0.0)),
            DOUBLE_ONE => (KvType::Double, KvData::Double(1.0)),
            INT32 => (KvType::Int32, KvData::Int32(self.buffer.i32()?)),
            UINT32 => (KvType::UInt32, KvData::UInt32(self.buffer.u32()?)),
            STRING => {
                let id = self.buffer.i32()?;
                (KvType::String, KvData::String(self.string(id)?))
            }
            BINARY_BLOB => (KvType::BinaryBlob, KvData::Blob(self.blob()?)),
            ARRAY => {
                let len = header_count("array length", self.buffer.i32()?)?;
                let mut array = KvObject::new(name, true);
                self.nested(|decoder| {
                    for _ in 0..len {
                        decoder.parse(&mut array, true)?;
                    }
                    Ok(())
                })?;
                (KvType::Array, KvData::Object(array))
            }
            ARRAY_TYPED => {
                let len = header_count("typed array length", self.buffer.i32()?)?;
                let (element_type, element_flags) = self.read_type()?;
                let mut array = KvObject::new(name, true);
                self.nested(|decoder| {
                    for _ in 0..len {
                        decoder.read_value(name, element_type, element_flags, &mut array)?;
                    }
                    Ok(())
                })?;
                (KvType::Array, KvData::Object(array))
            }
            OBJECT => {
                let len = header_count("object length", self.buffer.i32()?)?;
                let mut object = KvObject::new(name, false);
                self.nested(|decoder| {
                    for _ in 0..len {
                        decoder.parse(&mut object, false)?;
                    }
                    Ok(())
                })?;
                (KvType::Object, KvData::Object(object))
            }
            kv_type => {
                return Err(Error::UnknownKvType {
                    kv_type,
                    offset: self.buffer.position.saturating_sub(1),
                })
            }
        };

        parent.add_property(
            name,
            KvValue {
                kv_type,
                flags,
                data,
            },
        );
        Ok(())
    }

    fn finish(mut self) -> Result<BinaryKv3> {
        let mut holder = KvObject::new("", true);
        self.parse(&mut holder, true)?;

        let root = holder
            .values
            .swap_remove("0")
            .ok_or_else(|| Error::InvalidKvRoot("empty".to_string()))?;
        match root.data {
            KvData::Object(object) if !object.is_array => Ok(BinaryKv3 {
                strings: self.strings,
                root: object,
            }),
            _ => Err(Error::InvalidKvRoot(root.kv_type.to_string())),
        }
    }
}

impl BinaryKv3 {
    /// Decode the KV3 block occupying `size` bytes at `offset`
    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64, size: u32) -> Result<Self> {
        reader.seek_to(offset)?;
        let end = offset + size as u64;

        let magic = reader.read_u32::<LittleEndian>()?;
        let decoder = match magic {
            MAGIC => {
                let encoding = reader.read_guid()?;
                let _format = reader.read_guid()?;
                let body = read_to(reader, end)?;

                let data = match encoding {
                    guid::BLOCK_COMPRESSED => block_decompress(&body)?,
                    guid::BLOCK_LZ4 => lz4_decompress(&body)?,
                    guid::UNCOMPRESSED => body,
                    other => return Err(Error::UnrecognizedEncoding(other)),
                };
                tracing::debug!(size = data.len(), "decoded legacy kv3 body");
                Decoder::legacy(ByteBuffer::new(data))?
            }
            MAGIC2 => {
                let _format = reader.read_guid()?;
                let method = reader.read_i32::<LittleEndian>()?;
                let binary_count =
                    header_count("binary byte count", reader.read_i32::<LittleEndian>()?)?;
                let integer_count =
                    header_count("integer count", reader.read_i32::<LittleEndian>()?)?;
                let eight_byte_count =
                    header_count("eight byte count", reader.read_i32::<LittleEndian>()?)?;

                let data = match method {
                    0 => {
                        let len = header_count("length", reader.read_i32::<LittleEndian>()?)?;
                        reader.read_vec(len)?
                    }
                    1 => lz4_decompress(&read_to(reader, end)?)?,
                    other => return Err(Error::UnknownCompressionMethod(other)),
                };
                tracing::debug!(size = data.len(), method, "decoded kv3 version 2 body");
                Decoder::version2(
                    ByteBuffer::new(data),
                    binary_count,
                    integer_count,
                    eight_byte_count,
                )?
            }
            other => return Err(Error::InvalidKvHeader(format!("magic {other:#010x}"))),
        };

        decoder.finish()
    }
}

/// Read from the current position up to `end`
fn read_to<R: Read + Seek>(reader: &mut R, end: u64) -> Result<Vec<u8>> {
    let position = reader.tell()?;
    let len = end.saturating_sub(position);
    reader.read_vec(len as usize)
}
