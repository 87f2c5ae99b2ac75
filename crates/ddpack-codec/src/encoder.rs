//! Segment encoder: split, dedupe and rotate segments when the id space fills

use crate::dictionary::{Dictionary, LookupStrategy};
use crate::error::{CodecError, Result};
use crate::format::IdWidth;
use crate::io::{read_binary_file, remove_segments_from, segment_path, write_binary_file};
use crate::layout::BlockLayout;
use crate::plane::split;
use crate::segment::Segment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Encoder settings that do not change the block geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Width of block ids; bounds the dictionary size of each segment
    pub id_width: IdWidth,
    /// Dictionary lookup strategy
    pub lookup: LookupStrategy,
}

/// Counters for one compression run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncodeStats {
    /// Bytes offered to the encoder
    pub input_bytes: usize,
    /// Bytes consumed as whole blocks
    pub used_bytes: usize,
    /// Trailing bytes dropped because they did not fill a block
    pub discarded_bytes: usize,
    /// Blocks encoded
    pub blocks: usize,
    /// Distinct base blocks, summed over all segments
    pub distinct_blocks: usize,
    /// Segments sealed
    pub segments: usize,
    /// Serialized size of all sealed segments
    pub output_bytes: usize,
}

/// Result of compressing an in-memory buffer.
#[derive(Debug)]
pub struct CompressOutput {
    /// Sealed segments in archive order
    pub segments: Vec<Segment>,
    /// Run counters
    pub stats: EncodeStats,
}

/// Most blocks one segment can cover; `num_blocks` is a u32 header field.
pub const MAX_SEGMENT_BLOCKS: usize = u32::MAX as usize;

/// Drives the per-block loop and seals a segment whenever a new distinct
/// base block arrives while the dictionary already holds as many entries as
/// the id width can address, or when the segment already covers
/// [`MAX_SEGMENT_BLOCKS`] blocks.
pub struct SegmentEncoder {
    layout: BlockLayout,
    config: EncoderConfig,
    dictionary: Dictionary,
    ids: Vec<u32>,
    deviations: Vec<u8>,
    scratch: Vec<u8>,
    dev_scratch: Vec<u8>,
    next_index: u32,
    block_limit: usize,
    stats: EncodeStats,
}

impl SegmentEncoder {
    /// Create an encoder with an empty first segment.
    pub fn new(layout: BlockLayout, config: EncoderConfig) -> Self {
        let block_bytes = layout.block_bytes();
        let dev_len = layout.dev_len();
        Self {
            dictionary: Dictionary::with_strategy(block_bytes, config.lookup),
            ids: Vec::new(),
            deviations: Vec::new(),
            scratch: vec![0u8; block_bytes],
            dev_scratch: vec![0u8; dev_len],
            next_index: 0,
            block_limit: MAX_SEGMENT_BLOCKS,
            stats: EncodeStats::default(),
            layout,
            config,
        }
    }

    /// Cap the number of blocks per segment below [`MAX_SEGMENT_BLOCKS`].
    pub fn with_block_limit(mut self, limit: usize) -> Self {
        self.block_limit = limit.clamp(1, MAX_SEGMENT_BLOCKS);
        self
    }

    /// Layout this encoder splits blocks with
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Counters so far
    pub fn stats(&self) -> &EncodeStats {
        &self.stats
    }

    /// Encode one block.
    ///
    /// Returns the previous segment when this block forced a rotation.
    pub fn push_block(&mut self, block: &[u8]) -> Result<Option<Segment>> {
        if block.len() != self.layout.block_bytes() {
            return Err(CodecError::InvalidLayout(format!(
                "expected a {}-byte block, got {} bytes",
                self.layout.block_bytes(),
                block.len()
            )));
        }
        self.scratch.copy_from_slice(block);
        split(
            &mut self.scratch,
            self.layout.dev_positions(),
            &mut self.dev_scratch,
        )?;

        let capacity = self.config.id_width.capacity();
        let mut sealed = None;
        if self.ids.len() >= self.block_limit {
            debug!(
                segment = self.next_index,
                num_blocks = self.ids.len(),
                "Block limit reached, rotating segment"
            );
            sealed = self.seal();
        }
        let index = match self.dictionary.find(&self.scratch) {
            Some(index) => index,
            None => {
                if self.dictionary.size() >= capacity {
                    debug!(
                        segment = self.next_index,
                        dict_size = self.dictionary.size(),
                        "Dictionary full, rotating segment"
                    );
                    sealed = self.seal();
                }
                self.dictionary.add(&self.scratch)?
            }
        };
        if index >= capacity {
            return Err(CodecError::DictionaryOverflow { index, capacity });
        }

        self.ids.push(index as u32);
        self.deviations.extend_from_slice(&self.dev_scratch);
        self.stats.blocks += 1;
        self.stats.used_bytes += block.len();
        Ok(sealed)
    }

    /// Seal whatever is accumulated. Returns `None` if the active segment
    /// covers no blocks.
    pub fn finish(&mut self) -> Option<Segment> {
        self.seal()
    }

    fn seal(&mut self) -> Option<Segment> {
        if self.ids.is_empty() {
            return None;
        }
        let fresh = Dictionary::with_strategy(self.layout.block_bytes(), self.config.lookup);
        let dictionary = std::mem::replace(&mut self.dictionary, fresh);
        let segment = Segment {
            index: self.next_index,
            id_width: self.config.id_width,
            block_bytes: self.layout.block_bytes() as u32,
            field_sizes: self.layout.field_sizes().to_vec(),
            dev_positions: self.layout.dev_positions().to_vec(),
            dictionary,
            ids: std::mem::take(&mut self.ids),
            deviations: std::mem::take(&mut self.deviations),
        };
        self.next_index += 1;

        self.stats.segments += 1;
        self.stats.distinct_blocks += segment.dictionary.size();
        self.stats.output_bytes += segment.encoded_len();

        debug!(
            segment = segment.index,
            dict_size = segment.dictionary.size(),
            num_blocks = segment.num_blocks(),
            "Segment sealed"
        );
        Some(segment)
    }
}

/// Compress an in-memory block stream into one or more segments.
///
/// Trailing bytes that do not fill a whole block are dropped with a warning.
/// Input without a single whole block is [`CodecError::InputTooSmall`].
pub fn compress(input: &[u8], layout: &BlockLayout, config: &EncoderConfig) -> Result<CompressOutput> {
    let block_bytes = layout.block_bytes();
    if input.len() < block_bytes {
        return Err(CodecError::InputTooSmall {
            needed: block_bytes,
            actual: input.len(),
        });
    }

    let mut encoder = SegmentEncoder::new(layout.clone(), *config);
    let mut segments = Vec::new();
    let blocks = input.chunks_exact(block_bytes);
    let remainder = blocks.remainder().len();
    for block in blocks {
        if let Some(segment) = encoder.push_block(block)? {
            segments.push(segment);
        }
    }
    segments.extend(encoder.finish());

    if remainder > 0 {
        warn!(
            discarded_bytes = remainder,
            block_bytes, "Dropping trailing bytes that do not fill a block"
        );
    }

    let mut stats = encoder.stats().clone();
    stats.input_bytes = input.len();
    stats.discarded_bytes = remainder;
    Ok(CompressOutput { segments, stats })
}

/// Compress `input` and write segment `k` to `segment_path(output, k)`.
///
/// Segment files left at the same base by an earlier, longer run are
/// removed so the archive on disk holds exactly this run's segments.
pub fn compress_file(
    input: &Path,
    output: &Path,
    layout: &BlockLayout,
    config: &EncoderConfig,
) -> Result<EncodeStats> {
    let data = read_binary_file(input)?;
    let CompressOutput { segments, stats } = compress(&data, layout, config)?;
    for segment in &segments {
        let path = segment_path(output, segment.index);
        write_binary_file(&path, &segment.to_bytes()?)?;
        debug!(segment = segment.index, path = %path.display(), "Wrote segment");
    }
    let next = segments.last().map_or(0, |s| s.index + 1);
    let removed = remove_segments_from(output, next)?;
    if removed > 0 {
        info!(base = %output.display(), removed, "Removed stale segments of an earlier run");
    }
    info!(
        input = %input.display(),
        used_bytes = stats.used_bytes,
        block_bytes = layout.block_bytes(),
        blocks = stats.blocks,
        distinct_blocks = stats.distinct_blocks,
        segments = stats.segments,
        output_bytes = stats.output_bytes,
        "Compressed"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor_layout() -> BlockLayout {
        BlockLayout::new(vec![2, 2, 2, 4], vec![0, 2, 4]).unwrap()
    }

    /// Block whose base is distinct for every `n` (byte 6 and 7 carry `n`).
    fn distinct_block(n: u16) -> Vec<u8> {
        let mut block = vec![0u8; 10];
        block[6..8].copy_from_slice(&n.to_le_bytes());
        block[0] = n as u8;
        block
    }

    #[test]
    fn repeated_bases_share_an_entry() {
        let mut encoder = SegmentEncoder::new(sensor_layout(), EncoderConfig::default());
        assert!(encoder.push_block(&[1, 0, 2, 0, 3, 0, 4, 0, 0, 0]).unwrap().is_none());
        assert!(encoder.push_block(&[9, 0, 8, 0, 7, 0, 4, 0, 0, 0]).unwrap().is_none());
        let segment = encoder.finish().unwrap();
        assert_eq!(segment.dictionary.size(), 1);
        assert_eq!(segment.ids, vec![0, 0]);
        assert_eq!(segment.deviations, vec![1, 2, 3, 9, 8, 7]);
    }

    #[test]
    fn rotation_happens_before_insert() {
        let mut encoder = SegmentEncoder::new(sensor_layout(), EncoderConfig::default());
        for n in 0..255 {
            assert!(encoder.push_block(&distinct_block(n)).unwrap().is_none());
        }
        // a repeat does not rotate even though the dictionary is full
        assert!(encoder.push_block(&distinct_block(3)).unwrap().is_none());

        let sealed = encoder.push_block(&distinct_block(255)).unwrap().unwrap();
        assert_eq!(sealed.index, 0);
        assert_eq!(sealed.dictionary.size(), 255);
        assert_eq!(sealed.num_blocks(), 256);

        let last = encoder.finish().unwrap();
        assert_eq!(last.index, 1);
        assert_eq!(last.ids, vec![0]);
        assert_eq!(last.dictionary.size(), 1);
    }

    #[test]
    fn block_limit_rotates_low_cardinality_input() {
        let mut encoder =
            SegmentEncoder::new(sensor_layout(), EncoderConfig::default()).with_block_limit(3);
        let block = distinct_block(1);
        let mut sealed = Vec::new();
        for _ in 0..7 {
            sealed.extend(encoder.push_block(&block).unwrap());
        }
        sealed.extend(encoder.finish());

        let counts: Vec<usize> = sealed.iter().map(Segment::num_blocks).collect();
        assert_eq!(counts, vec![3, 3, 1]);
        for (k, segment) in sealed.iter().enumerate() {
            assert_eq!(segment.index as usize, k);
            assert_eq!(segment.dictionary.size(), 1);
            assert_eq!(segment.header().unwrap().num_blocks as usize, segment.num_blocks());
        }
        let restored: Vec<u8> = sealed
            .iter()
            .flat_map(|s| s.reconstruct().unwrap())
            .collect();
        assert_eq!(restored, block.repeat(7));
    }

    #[test]
    fn block_limit_is_clamped_to_header_range() {
        let encoder =
            SegmentEncoder::new(sensor_layout(), EncoderConfig::default()).with_block_limit(usize::MAX);
        assert_eq!(encoder.block_limit, MAX_SEGMENT_BLOCKS);
    }

    #[test]
    fn finish_on_empty_encoder_is_none() {
        let mut encoder = SegmentEncoder::new(sensor_layout(), EncoderConfig::default());
        assert!(encoder.finish().is_none());
    }

    #[test]
    fn wrong_block_width_is_rejected() {
        let mut encoder = SegmentEncoder::new(sensor_layout(), EncoderConfig::default());
        assert!(matches!(
            encoder.push_block(&[0u8; 9]),
            Err(CodecError::InvalidLayout(_))
        ));
    }

    #[test]
    fn two_byte_ids_hold_more_than_255_entries() {
        let config = EncoderConfig {
            id_width: IdWidth::Two,
            ..Default::default()
        };
        let input: Vec<u8> = (0..300).flat_map(distinct_block).collect();
        let out = compress(&input, &sensor_layout(), &config).unwrap();
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].dictionary.size(), 300);
    }

    #[test]
    fn too_small_input() {
        assert!(matches!(
            compress(&[0u8; 9], &sensor_layout(), &EncoderConfig::default()),
            Err(CodecError::InputTooSmall { needed: 10, actual: 9 })
        ));
    }

    #[test]
    fn stats_account_for_every_byte() {
        let mut input: Vec<u8> = (0..4).flat_map(distinct_block).collect();
        input.extend_from_slice(&[1, 2, 3]);
        let out = compress(&input, &sensor_layout(), &EncoderConfig::default()).unwrap();
        assert_eq!(out.stats.input_bytes, 43);
        assert_eq!(out.stats.used_bytes, 40);
        assert_eq!(out.stats.discarded_bytes, 3);
        assert_eq!(out.stats.blocks, 4);
        assert_eq!(out.stats.distinct_blocks, 4);
        assert_eq!(out.stats.segments, 1);
        assert_eq!(out.stats.output_bytes, out.segments[0].to_bytes().unwrap().len());
    }
}
