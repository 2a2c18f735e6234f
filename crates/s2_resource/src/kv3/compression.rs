//! Decompression of KV3 bodies

use crate::error::{Error, Result};

/// Expand a `BLOCK_COMPRESSED` body.
///
/// The body starts with four flag bytes. The low three hold the little endian decompressed size,
/// and bit `0x80` of the last one marks the rest of the body as stored uncompressed. Otherwise the
/// body is a stream of 16 bit masks, each followed by 16 items. A set bit is a back reference
/// token `oooo oooo oooo ssss` copying `s + 3` bytes from `o + 1` bytes back, a clear bit is one
/// literal byte.
pub fn block_decompress(input: &[u8]) -> Result<Vec<u8>> {
    let flags: [u8; 4] = input
        .get(..4)
        .and_then(|flags| flags.try_into().ok())
        .ok_or_else(|| Error::DecompressionFailure("missing block flags".to_string()))?;
    let body = &input[4..];

    if flags[3] & 0x80 != 0 {
        return Ok(body.to_vec());
    }

    let size = u32::from_le_bytes([flags[0], flags[1], flags[2], 0]) as usize;
    let mut output = Vec::with_capacity(size);
    let mut position = 0;

    'blocks: while output.len() < size && position + 2 <= body.len() {
        let mask = u16::from_le_bytes([body[position], body[position + 1]]);
        position += 2;

        for bit in 0..16 {
            if output.len() >= size {
                break 'blocks;
            }

            if mask & (1 << bit) != 0 {
                let token = body
                    .get(position..position + 2)
                    .map(|token| u16::from_le_bytes([token[0], token[1]]))
                    .ok_or_else(|| truncated(output.len()))?;
                position += 2;

                let offset = (((token & 0xFFF0) >> 4) + 1) as usize;
                let length = ((token & 0x000F) + 3) as usize;
                if offset > output.len() {
                    return Err(Error::DecompressionFailure(format!(
                        "back reference of {offset} bytes with only {} bytes written",
                        output.len()
                    )));
                }

                // overlapping copies repeat the referenced bytes
                let start = output.len() - offset;
                for index in 0..length {
                    let byte = output[start + index];
                    output.push(byte);
                }
            } else {
                let byte = *body.get(position).ok_or_else(|| truncated(output.len()))?;
                position += 1;
                output.push(byte);
            }
        }
    }

    if output.len() < size {
        return Err(truncated(output.len()));
    }
    output.truncate(size);
    tracing::trace!(compressed = input.len(), decompressed = output.len(), "block decompress");
    Ok(output)
}

/// Expand an LZ4 block prefixed with its u32 decompressed size
pub fn lz4_decompress(input: &[u8]) -> Result<Vec<u8>> {
    let output = lz4_flex::decompress_size_prepended(input)
        .map_err(|error| Error::DecompressionFailure(error.to_string()))?;
    tracing::trace!(compressed = input.len(), decompressed = output.len(), "lz4 decompress");
    Ok(output)
}

fn truncated(written: usize) -> Error {
    Error::DecompressionFailure(format!("input ended after {written} bytes of output"))
}
