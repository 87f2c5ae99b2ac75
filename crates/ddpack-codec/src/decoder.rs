//! Segment decoder: one segment file in, the original byte stream out.
//!
//! Multi-segment archives are decoded by calling this once per segment file
//! and concatenating the outputs in segment order.

use crate::error::Result;
use crate::format::{SegmentHeader, SegmentVariant};
use crate::io::{read_binary_file, write_binary_file};
use crate::legacy::parse_legacy_multi;
use crate::segment::Segment;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Output of decoding one segment.
#[derive(Debug, Clone)]
pub struct DecodedSegment {
    /// Format the segment was stored in
    pub variant: SegmentVariant,
    /// Header of the segment (synthesised for legacy files)
    pub header: SegmentHeader,
    /// Reconstructed bytes
    pub data: Vec<u8>,
}

/// Counters for one decode call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Format the segment was stored in
    pub variant: SegmentVariant,
    /// Blocks reconstructed
    pub blocks: usize,
    /// Dictionary entries in the segment
    pub dict_size: usize,
    /// Bytes written
    pub output_bytes: usize,
}

impl DecodedSegment {
    /// Counters describing this decode
    pub fn stats(&self) -> DecodeStats {
        DecodeStats {
            variant: self.variant,
            blocks: self.header.num_blocks as usize,
            dict_size: self.header.dict_size as usize,
            output_bytes: self.data.len(),
        }
    }
}

/// Decode one canonical segment (`DDP1`, `DDW2` or `DDW4`).
pub fn decode_segment(bytes: &[u8]) -> Result<DecodedSegment> {
    let segment = Segment::from_bytes(bytes)?;
    finish(SegmentVariant::Canonical(segment.id_width), segment)
}

/// Decode a segment of any supported format, chosen by its magic.
pub fn decode_any(bytes: &[u8]) -> Result<DecodedSegment> {
    match SegmentVariant::detect(bytes)? {
        SegmentVariant::Canonical(_) => decode_segment(bytes),
        SegmentVariant::LegacyMulti => {
            finish(SegmentVariant::LegacyMulti, parse_legacy_multi(bytes)?)
        }
    }
}

/// Decode the segment at `input` and write the reconstructed bytes to `output`.
///
/// Nothing is written if decoding fails.
pub fn decompress_file(input: &Path, output: &Path) -> Result<DecodeStats> {
    let bytes = read_binary_file(input)?;
    let decoded = decode_any(&bytes)?;
    write_binary_file(output, &decoded.data)?;
    let stats = decoded.stats();
    info!(
        input = %input.display(),
        variant = ?stats.variant,
        blocks = stats.blocks,
        dict_size = stats.dict_size,
        output_bytes = stats.output_bytes,
        "Decompressed"
    );
    Ok(stats)
}

fn finish(variant: SegmentVariant, segment: Segment) -> Result<DecodedSegment> {
    let data = segment.reconstruct()?;
    Ok(DecodedSegment {
        variant,
        header: segment.header()?,
        data,
    })
}
