#![warn(missing_docs)]

//! ddpack codec: deduplicating archive format for fixed-layout sensor sample streams
//!
//! Encode: Block → Split (base / deviation planes) → Dictionary lookup → Id + deviation streams → Segment
//! Decode: Segment → Dictionary rebuild → Id lookup → Merge → Block
//!
//! A segment holds at most as many distinct base blocks as its id width can
//! address (255 for the one-byte `DDP1` format); the encoder rotates to a new
//! segment file (`out`, `out.seg1`, `out.seg2`, ...) when that limit is hit.

pub mod decoder;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod fingerprint;
pub mod format;
pub mod interleave;
pub mod io;
pub mod layout;
pub mod legacy;
pub mod plane;
pub mod segment;

pub use decoder::{decode_any, decode_segment, decompress_file, DecodeStats, DecodedSegment};
pub use dictionary::{Dictionary, LookupStrategy};
pub use encoder::{
    compress, compress_file, CompressOutput, EncodeStats, EncoderConfig, SegmentEncoder,
    MAX_SEGMENT_BLOCKS,
};
pub use error::{CodecError, Result};
pub use fingerprint::BlockFingerprint;
pub use format::{IdWidth, SegmentHeader, SegmentVariant};
pub use interleave::{interleave, Interleaved, SensorStream};
pub use io::{read_binary_file, remove_segments_from, segment_path, write_binary_file};
pub use layout::BlockLayout;
pub use plane::{merge, merge_into, split};
pub use segment::Segment;
