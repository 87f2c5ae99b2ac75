//! Error types for the ddpack codec

use std::path::PathBuf;

/// All errors that can occur while compressing or decompressing a block stream
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Field widths or deviation positions do not describe a usable block
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
    /// Input does not hold a single complete block
    #[error("Input too small: need at least {needed} bytes for one block, got {actual}")]
    InputTooSmall {
        /// Bytes required for one block
        needed: usize,
        /// Bytes actually available
        actual: usize,
    },
    /// Opening, reading or writing a file failed
    #[error("IO failure on {}: {source}", path.display())]
    IoFailure {
        /// File the operation was working on
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// Segment header is malformed, inconsistent or truncated
    #[error("Corrupt segment header: {0}")]
    CorruptHeader(String),
    /// The first four bytes are not a known segment magic
    #[error("Unknown segment magic {0:02x?}")]
    UnknownMagic([u8; 4]),
    /// A block id points past the end of the rebuilt dictionary
    #[error("Invalid block id {id} at block {block}: dictionary holds {dict_size} entries")]
    InvalidBlockId {
        /// The offending id
        id: u32,
        /// Position of the block in the id stream
        block: usize,
        /// Number of entries in the dictionary
        dict_size: usize,
    },
    /// Dictionary lookup past the last entry
    #[error("Dictionary index {index} out of range (size {size})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Current dictionary size
        size: usize,
    },
    /// An assigned index does not fit the configured id width
    #[error("Dictionary overflow: index {index} exceeds id capacity {capacity}")]
    DictionaryOverflow {
        /// Index that was assigned
        index: usize,
        /// Largest number of entries the id width can address
        capacity: usize,
    },
    /// A segment count does not fit its 32-bit header field
    #[error("Segment too large: {field} = {value} does not fit in a u32 header field")]
    SegmentTooLarge {
        /// Header field that overflowed
        field: &'static str,
        /// Actual count
        value: usize,
    },
    /// Split produced a deviation buffer of the wrong length
    #[error("Split length mismatch: expected {expected} deviation bytes, got {actual}")]
    SplitLengthMismatch {
        /// Deviation length of the layout
        expected: usize,
        /// Bytes actually produced
        actual: usize,
    },
    /// Merge was handed buffers that do not match the layout
    #[error("Merge length mismatch: expected {expected} bytes, got {actual}")]
    MergeLengthMismatch {
        /// Length the layout requires
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },
}

impl CodecError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CodecError::IoFailure {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used across the codec
pub type Result<T> = std::result::Result<T, CodecError>;
