//! Vertex and index buffers (`VBIB` and `MBUF` blocks)
//!
//! Buffers whose stored size differs from `count * stride` are meshoptimizer encoded and are kept
//! as raw bytes with [`VertexBuffer::compressed`] set.

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek};

use crate::{
    error::{Error, Result},
    stream::ResourceReadExt,
};

/// DXGI formats understood by [`VertexBuffer::read_attribute`]
pub mod dxgi {
    pub const R32G32B32A32_FLOAT: u32 = 2;
    pub const R32G32B32_FLOAT: u32 = 6;
    pub const R32G32_FLOAT: u32 = 16;
    pub const R8G8B8A8_UNORM: u32 = 28;
    pub const R8G8B8A8_UINT: u32 = 30;
    pub const R16G16_FLOAT: u32 = 34;
}

#[derive(BinRead, Debug, Copy, Clone)]
#[br(little)]
struct BlockHeader {
    vertex_offset: u32,
    vertex_count: u32,
    index_offset: u32,
    index_count: u32,
}

/// 24 byte vertex buffer header, both table offsets are relative to their own field
#[derive(BinRead, Debug, Copy, Clone)]
#[br(little)]
struct VertexBufferHeader {
    count: u32,
    stride: u32,
    attribute_offset: u32,
    attribute_count: u32,
    data_offset: u32,
    data_size: u32,
}

#[derive(BinRead, Debug, Copy, Clone)]
#[br(little)]
struct IndexBufferHeader {
    count: u32,
    stride: u32,
    _unknown: [u32; 2],
    data_offset: u32,
    data_size: u32,
}

const ATTRIBUTE_SIZE: u64 = 56;

/// A named field inside each vertex
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: String,
    /// DXGI format of the field
    pub format: u32,
    /// Offset of the field inside a vertex
    pub offset: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexBuffer {
    pub count: u32,
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
    pub data: Vec<u8>,
    pub compressed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexBuffer {
    pub count: u32,
    pub stride: u32,
    pub data: Vec<u8>,
    pub compressed: bool,
}

/// Decoded `VBIB` or `MBUF` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexIndexBuffers {
    pub vertex_buffers: Vec<VertexBuffer>,
    pub index_buffers: Vec<IndexBuffer>,
}

impl VertexIndexBuffers {
    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self> {
        reader.seek_to(offset)?;
        let header = BlockHeader::read(reader)?;

        reader.seek_to(offset + header.vertex_offset as u64)?;
        let mut vertex_buffers = Vec::new();
        for _ in 0..header.vertex_count {
            let start = reader.tell()?;
            let buffer = VertexBufferHeader::read(reader)?;

            reader.seek_to(start + 8 + buffer.attribute_offset as u64)?;
            let mut attributes = Vec::new();
            for _ in 0..buffer.attribute_count {
                let attribute = reader.tell()?;
                let name = reader.read_cstring()?;
                reader.seek_to(attribute + 36)?;
                let format = reader.read_u32::<LittleEndian>()?;
                let offset = reader.read_u32::<LittleEndian>()?;
                reader.seek_to(attribute + ATTRIBUTE_SIZE)?;

                attributes.push(VertexAttribute {
                    name,
                    format,
                    offset,
                });
            }

            reader.seek_to(start + 16 + buffer.data_offset as u64)?;
            let data = reader.read_vec(buffer.data_size as usize)?;
            let compressed = buffer.data_size as u64 != buffer.count as u64 * buffer.stride as u64;
            tracing::trace!(
                count = buffer.count,
                stride = buffer.stride,
                compressed,
                "vertex buffer"
            );

            vertex_buffers.push(VertexBuffer {
                count: buffer.count,
                stride: buffer.stride,
                attributes,
                data,
                compressed,
            });
            reader.seek_to(start + 24)?;
        }

        reader.seek_to(offset + 8 + header.index_offset as u64)?;
        let mut index_buffers = Vec::new();
        for _ in 0..header.index_count {
            let start = reader.tell()?;
            let buffer = IndexBufferHeader::read(reader)?;

            reader.seek_to(start + 16 + buffer.data_offset as u64)?;
            let data = reader.read_vec(buffer.data_size as usize)?;
            let compressed = buffer.data_size as u64 != buffer.count as u64 * buffer.stride as u64;

            index_buffers.push(IndexBuffer {
                count: buffer.count,
                stride: buffer.stride,
                data,
                compressed,
            });
            reader.seek_to(start + 24)?;
        }

        Ok(Self {
            vertex_buffers,
            index_buffers,
        })
    }
}

impl VertexBuffer {
    /// Attribute with the given name
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    /// Decode one attribute of the vertex at `index` into floats.
    ///
    /// Two component float formats are texture coordinates and have their second component
    /// flipped.
    pub fn read_attribute(&self, index: u32, attribute: &VertexAttribute) -> Result<Vec<f32>> {
        if self.compressed {
            return Err(Error::CompressedVertexBuffer);
        }

        let start = index as usize * self.stride as usize + attribute.offset as usize;
        let len = match attribute.format {
            dxgi::R32G32B32A32_FLOAT => 16,
            dxgi::R32G32B32_FLOAT => 12,
            dxgi::R32G32_FLOAT => 8,
            dxgi::R16G16_FLOAT | dxgi::R8G8B8A8_UNORM | dxgi::R8G8B8A8_UINT => 4,
            format => {
                return Err(Error::UnsupportedVertexFormat {
                    name: attribute.name.clone(),
                    format,
                })
            }
        };
        let bytes = self
            .data
            .get(start..start + len)
            .ok_or(Error::OutOfBounds {
                offset: start,
                len,
                size: self.data.len(),
            })?;

        let values = match attribute.format {
            dxgi::R32G32B32A32_FLOAT | dxgi::R32G32B32_FLOAT => bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
            dxgi::R32G32_FLOAT => {
                let u = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let v = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
                vec![u, -v]
            }
            dxgi::R16G16_FLOAT => {
                let u = half_to_f32(u16::from_le_bytes([bytes[0], bytes[1]]));
                let v = half_to_f32(u16::from_le_bytes([bytes[2], bytes[3]]));
                vec![u, -v]
            }
            dxgi::R8G8B8A8_UNORM => bytes.iter().map(|&b| b as f32 / 255.0).collect(),
            _ => bytes.iter().map(|&b| b as f32).collect(),
        };

        Ok(values)
    }
}

/// IEEE 754 binary16 to f32
fn half_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) as u32) << 31;
    let exponent = ((bits >> 10) & 0x1F) as u32;
    let mantissa = (bits & 0x3FF) as u32;

    let value = match exponent {
        0 if mantissa == 0 => sign,
        0 => {
            // subnormal
            let magnitude = mantissa as f32 / 1024.0 * 2f32.powi(-14);
            return if sign != 0 { -magnitude } else { magnitude };
        }
        0x1F => sign | 0x7F80_0000 | (mantissa << 13),
        _ => sign | ((exponent + 112) << 23) | (mantissa << 13),
    };
    f32::from_bits(value)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::test_util::Bytes;
    use crate::vbib::{dxgi, half_to_f32, VertexAttribute, VertexIndexBuffers};

    fn block_bytes(vertex_data_size: u32) -> Bytes {
        let mut b = Bytes::default();
        let vertex_table = b.offset();
        b.u32(1);
        let index_table = b.offset();
        b.u32(1);

        b.point(vertex_table);
        b.u32(2).u32(12);
        let attributes = b.offset();
        b.u32(2);
        let vertex_data = b.offset();
        b.u32(vertex_data_size);

        // index table offset is counted from the start of the block plus 8
        let index_header = b.pos();
        b.patch_u32(index_table, (index_header - 8) as u32);
        b.u32(3).u32(2).u32(0).u32(0);
        let index_data = b.offset();
        b.u32(6);

        b.point(attributes);
        let position = b.pos();
        b.cstring("POSITION");
        b.zeros(position + 36 - b.pos());
        b.u32(dxgi::R32G32_FLOAT).u32(0);
        b.zeros(12);
        let texcoord = b.pos();
        b.cstring("TEXCOORD");
        b.zeros(texcoord + 36 - b.pos());
        b.u32(dxgi::R8G8B8A8_UNORM).u32(8);
        b.zeros(12);

        b.point(vertex_data);
        b.f32(1.0).f32(2.0).bytes(&[255, 0, 0, 255]);
        b.f32(3.0).f32(4.0).bytes(&[0, 255, 0, 255]);

        b.point(index_data);
        b.u16(0).u16(1).u16(0);
        b
    }

    #[test]
    fn read_buffers() -> Result<()> {
        let buffers = VertexIndexBuffers::read(&mut block_bytes(24).cursor(), 0)?;

        assert_eq!(buffers.vertex_buffers.len(), 1);
        let vertices = &buffers.vertex_buffers[0];
        assert_eq!(vertices.count, 2);
        assert_eq!(vertices.stride, 12);
        assert!(!vertices.compressed);
        assert_eq!(
            vertices.attributes,
            vec![
                VertexAttribute {
                    name: "POSITION".to_string(),
                    format: dxgi::R32G32_FLOAT,
                    offset: 0
                },
                VertexAttribute {
                    name: "TEXCOORD".to_string(),
                    format: dxgi::R8G8B8A8_UNORM,
                    offset: 8
                },
            ]
        );

        assert_eq!(buffers.index_buffers.len(), 1);
        assert_eq!(buffers.index_buffers[0].data, vec![0, 0, 1, 0, 0, 0]);
        assert!(!buffers.index_buffers[0].compressed);

        Ok(())
    }

    #[test]
    fn read_attribute_values() -> Result<()> {
        let buffers = VertexIndexBuffers::read(&mut block_bytes(24).cursor(), 0)?;
        let vertices = &buffers.vertex_buffers[0];

        let position = vertices.attribute("POSITION").cloned().unwrap_or_default();
        assert_eq!(vertices.read_attribute(1, &position)?, vec![3.0, -4.0]);

        let colour = vertices.attribute("TEXCOORD").cloned().unwrap_or_default();
        assert_eq!(vertices.read_attribute(0, &colour)?, vec![1.0, 0.0, 0.0, 1.0]);

        assert!(matches!(
            vertices.read_attribute(2, &position),
            Err(Error::OutOfBounds { .. })
        ));

        Ok(())
    }

    #[test]
    fn size_mismatch_marks_compressed() -> Result<()> {
        let buffers = VertexIndexBuffers::read(&mut block_bytes(20).cursor(), 0)?;
        let vertices = &buffers.vertex_buffers[0];

        assert!(vertices.compressed);
        assert!(matches!(
            vertices.read_attribute(0, &vertices.attributes[0]),
            Err(Error::CompressedVertexBuffer)
        ));

        Ok(())
    }

    #[test]
    fn half_floats() {
        assert_eq!(half_to_f32(0x3C00), 1.0);
        assert_eq!(half_to_f32(0xC000), -2.0);
        assert_eq!(half_to_f32(0x0000), 0.0);
        assert_eq!(half_to_f32(0x3800), 0.5);
    }
}
