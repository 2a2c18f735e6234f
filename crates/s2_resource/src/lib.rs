//! This library reads compiled **Source 2** resource files (the `*_c` files shipped with games on
//! the engine).
//!
//! # Resource File Format
//!
//! A compiled resource is a small header and a directory of typed blocks. Each block is decoded by
//! its own reader, and the `DATA` block is decoded according to the resource type resolved from
//! the metadata blocks.
//!
//! ## File Structure
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | File Size              | 4 bytes: Size of the whole file                            |
//! | 0x0004         | Header Version         | 2 bytes: Fixed value 12                                    |
//! | 0x0006         | Version                | 2 bytes: Version of the resource payload                   |
//! | 0x0008         | Block Offset           | 4 bytes: Offset to the block directory                     |
//! | 0x000C         | Block Count            | 4 bytes: Number of entries in the block directory          |
//!
//! The file size field doubles as a sentinel. `0x55AA1234` marks a VPK archive and `vcs2` marks a
//! compiled shader, neither of which is a resource.
//!
//! ### Block Directory
//!
//! The directory follows the header. Each entry is 12 bytes:
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Tag                    | 4 bytes: ASCII block type, e.g. `DATA`, `NTRO`, `REDI`  |
//! | 0x0004         | Offset                 | 4 bytes: Offset to the block, relative to this field    |
//! | 0x0008         | Size                   | 4 bytes: Size of the block                              |
//!
//! ### Blocks
//!
//! - **REDI**: edit info, the compiler inputs. Special dependencies name the compiler, which
//!   resolves the resource type.
//! - **RERL**: external references, ids mapped to the paths of other resources.
//! - **NTRO**: an introspection manifest describing the struct layouts of the other blocks.
//! - **VBIB** and **MBUF**: vertex and index buffers.
//! - **DATA**: the payload, either an introspected struct, a binary KeyValues3 document or a typed
//!   reader (texture, sound, panorama, material, sound event script).
//! - **CTRL**, **MDAT**, **MRPH**, **ANIM**, **ASEQ**, **AGRP**, **PHYS**: further key-value
//!   blocks.
//!
//! ## Additional Information
//!
//! - **File Extension**: the source extension with a `_c` suffix (`.vtex_c`, `.vmat_c`, ...)
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Offsets**: almost every offset is relative to the position of the field holding it
//!

pub mod data;
pub mod error;
pub mod known_keyvalues;
pub mod kv3;
pub mod manifest;
pub mod ntro;
pub mod redi;
pub mod rerl;
pub mod resource;
pub mod stream;
pub mod types;
pub mod value;
pub mod vbib;

#[cfg(feature = "serde")]
mod serde;

#[cfg(test)]
mod test_util;

pub use data::ResourceData;
pub use kv3::BinaryKv3;
pub use resource::{AssetLoader, FileSystemLoader, Resource, ResourceOptions};
pub use types::{BlockType, ResourceType};
pub use value::KeyValueCollection;
