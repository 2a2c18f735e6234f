//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// The file belongs to a different container format
    #[error("file is a {0}, not a compiled resource")]
    #[diagnostic(help("VPK archives and compiled shaders have their own readers"))]
    FormatMismatch(&'static str),

    /// A header carries a version this library does not understand
    #[error("unsupported {kind} version {found} (expected {expected})")]
    UnsupportedVersion {
        /// What was versioned (resource header, texture, sound)
        kind: &'static str,
        /// The version that was read
        found: u32,
        /// The version that is understood
        expected: u32,
    },

    /// A block directory entry has a tag without a reader
    #[error("unsupported block type {0:?}")]
    UnsupportedBlockType(String),

    /// An introspected field has more than one level of indirection
    #[error("field {field} has {depth} indirections, only one is supported")]
    UnsupportedIndirectionDepth {
        /// Name of the offending field
        field: String,
        /// Number of indirection bytes
        depth: usize,
    },

    /// An introspected field is a fixed size array behind an indirection
    #[error("field {0} combines a fixed count with an indirection")]
    IndirectedFixedArray(String),

    /// An introspected field has an indirection byte that is neither a pointer nor an array
    #[error("field {field} has unknown indirection {indirection:#04x}")]
    UnknownIndirection {
        /// Name of the offending field
        field: String,
        /// The indirection byte
        indirection: u8,
    },

    /// An introspected field has a data type without a decoder
    #[error("field {field} has unknown data type {data_type}")]
    UnknownDataType {
        /// Name of the offending field
        field: String,
        /// Raw type code from the manifest
        data_type: i16,
    },

    /// A KeyValues3 block header is malformed
    #[error("invalid KV3 header: {0}")]
    InvalidKvHeader(String),

    /// The encoding GUID of a KeyValues3 block is not known
    #[error("unrecognized KV3 encoding {0:02x?}")]
    UnrecognizedEncoding([u8; 16]),

    /// A version 2 KeyValues3 block names an unknown compression method
    #[error("unknown KV3 compression method {0}")]
    UnknownCompressionMethod(i32),

    /// A KeyValues3 value has a type byte without a decoder
    #[error("unknown KV3 type {kv_type} at byte {offset}")]
    UnknownKvType {
        /// The type byte, flag bit removed
        kv_type: u8,
        /// Position in the decoded buffer
        offset: usize,
    },

    /// A KeyValues3 document does not start with an object
    #[error("KV3 document root is {0}, expected an object")]
    InvalidKvRoot(String),

    /// A compressed stream could not be expanded
    #[error("decompression failed: {0}")]
    DecompressionFailure(String),

    /// The introspection manifest has no struct for the requested id or name
    #[error("introspection struct {0} not found")]
    StructNotFound(String),

    /// A required field is missing from decoded data
    #[error("field {0} not found")]
    FieldNotFound(String),

    /// A read went past the end of a decoded buffer
    #[error("read of {len} bytes at {offset} is outside a buffer of {size} bytes")]
    OutOfBounds {
        /// Requested position
        offset: usize,
        /// Requested length
        len: usize,
        /// Buffer size
        size: usize,
    },

    /// A self-relative offset points before the start of the stream
    #[error("offset {offset} from position {position} is out of range")]
    InvalidOffset {
        /// Position the offset is relative to
        position: u64,
        /// The offset that was read
        offset: i64,
    },

    /// Edit info lists custom dependencies, which have no known layout
    #[error("{0} custom dependencies are not handled")]
    UnhandledCustomDependencies(u32),

    /// A vertex attribute uses a DXGI format without a decoder
    #[error("vertex attribute {name} has unsupported format {format}")]
    UnsupportedVertexFormat {
        /// Attribute name
        name: String,
        /// Raw DXGI format
        format: u32,
    },

    /// Vertex data is still meshoptimizer encoded
    #[error("vertex buffer is compressed")]
    CompressedVertexBuffer,

    /// Bit packed sound info names an unknown container
    #[error("unknown sound type {0}")]
    UnknownSoundType(u32),

    /// Texture extra data has unexpected contents
    #[error("invalid texture data: {0}")]
    InvalidTextureData(String),

    /// A checksum did not match the data it covers
    #[error("checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch {
        /// Checksum stored in the file
        stored: u32,
        /// Checksum of the data that was read
        computed: u32,
    },

    /// The asset loader could not open a referenced resource
    #[error("unable to find asset {0}")]
    AssetNotFound(String),

    /// Loading referenced resources nested deeper than allowed
    #[error("loading {path} would exceed the maximum resource depth of {max_depth}")]
    #[diagnostic(help("raise ResourceOptions::max_depth if the reference chain is legitimate"))]
    RecursionLimit {
        /// Path that was being loaded
        path: String,
        /// Configured limit
        max_depth: usize,
    },

    /// Nested structs or key-value containers go deeper than the decoder allows
    #[error("{kind} nesting exceeds the maximum depth of {max_depth}")]
    NestingTooDeep {
        /// What was being decoded
        kind: &'static str,
        max_depth: usize,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
