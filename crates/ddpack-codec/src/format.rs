//! Segment wire format: magic, id width and the little-endian header
//!
//! ```text
//! offset  size  field
//! 0       4     magic ("DDP1", "DDW2" or "DDW4")
//! 4       4     u32 block_bytes
//! 8       4     u32 num_fields
//! 12      4     u32 dict_size
//! 16      4     u32 num_blocks
//! 20      4     u32 dev_pos_count
//! 24      4     u32 dev_len_per_block (== dev_pos_count)
//! 28      4*F   u32[num_fields] field_sizes
//! ...     4*P   u32[dev_pos_count] dev_positions
//! ...           dictionary, ids, deviation bytes
//! ```

use crate::error::{CodecError, Result};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Magic of the canonical format with one-byte block ids.
pub const MAGIC_ID8: [u8; 4] = *b"DDP1";
/// Magic of the two-byte id variant.
pub const MAGIC_ID16: [u8; 4] = *b"DDW2";
/// Magic of the four-byte id variant.
pub const MAGIC_ID32: [u8; 4] = *b"DDW4";
/// Magic of the older multi-field format (four-byte ids, no position list).
pub const MAGIC_LEGACY_MULTI: [u8; 4] = *b"DDP2";

/// Size of the fixed part of a canonical header.
pub const FIXED_HEADER_LEN: usize = 28;

/// Width of one block id in the id stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdWidth {
    /// One byte per id, up to 255 dictionary entries per segment
    #[default]
    One,
    /// Two bytes per id, up to 65535 entries per segment
    Two,
    /// Four bytes per id, up to 4294967295 entries per segment
    Four,
}

impl IdWidth {
    /// Map a byte count (1, 2 or 4) to an id width.
    pub fn from_bytes(n: u8) -> Option<Self> {
        match n {
            1 => Some(IdWidth::One),
            2 => Some(IdWidth::Two),
            4 => Some(IdWidth::Four),
            _ => None,
        }
    }

    /// Bytes per id on disk
    pub fn bytes(self) -> usize {
        match self {
            IdWidth::One => 1,
            IdWidth::Two => 2,
            IdWidth::Four => 4,
        }
    }

    /// Maximum number of dictionary entries one segment may hold.
    pub fn capacity(self) -> usize {
        match self {
            IdWidth::One => u8::MAX as usize,
            IdWidth::Two => u16::MAX as usize,
            IdWidth::Four => u32::MAX as usize,
        }
    }

    /// Magic written for this id width
    pub fn magic(self) -> [u8; 4] {
        match self {
            IdWidth::One => MAGIC_ID8,
            IdWidth::Two => MAGIC_ID16,
            IdWidth::Four => MAGIC_ID32,
        }
    }

    pub(crate) fn put_id(self, buf: &mut Vec<u8>, id: u32) {
        match self {
            IdWidth::One => buf.put_u8(id as u8),
            IdWidth::Two => buf.put_u16_le(id as u16),
            IdWidth::Four => buf.put_u32_le(id),
        }
    }

    pub(crate) fn get_id(self, buf: &mut &[u8]) -> u32 {
        match self {
            IdWidth::One => u32::from(buf.get_u8()),
            IdWidth::Two => u32::from(buf.get_u16_le()),
            IdWidth::Four => buf.get_u32_le(),
        }
    }
}

/// Segment flavour recognised from the magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentVariant {
    /// Position-based segmented format with the given id width
    Canonical(IdWidth),
    /// Older multi-field format without a position list or dictionary cap
    LegacyMulti,
}

impl SegmentVariant {
    /// Identify a segment by its first four bytes.
    pub fn detect(bytes: &[u8]) -> Result<Self> {
        let magic: [u8; 4] = bytes
            .get(..4)
            .and_then(|m| m.try_into().ok())
            .ok_or_else(|| {
                CodecError::CorruptHeader(format!("{} bytes is too short for a magic", bytes.len()))
            })?;
        match magic {
            MAGIC_ID8 => Ok(SegmentVariant::Canonical(IdWidth::One)),
            MAGIC_ID16 => Ok(SegmentVariant::Canonical(IdWidth::Two)),
            MAGIC_ID32 => Ok(SegmentVariant::Canonical(IdWidth::Four)),
            MAGIC_LEGACY_MULTI => Ok(SegmentVariant::LegacyMulti),
            other => Err(CodecError::UnknownMagic(other)),
        }
    }
}

/// Parsed header of a canonical segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentHeader {
    /// Width of the block ids that follow the dictionary
    pub id_width: IdWidth,
    /// Width of one block
    pub block_bytes: u32,
    /// Number of dictionary entries
    pub dict_size: u32,
    /// Number of blocks covered by this segment
    pub num_blocks: u32,
    /// Deviation bytes per block
    pub dev_len_per_block: u32,
    /// Field widths in block order
    pub field_sizes: Vec<u32>,
    /// Deviation positions in stream order
    pub dev_positions: Vec<u32>,
}

impl SegmentHeader {
    /// Encoded size of this header
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN + 4 * (self.field_sizes.len() + self.dev_positions.len())
    }

    /// Bytes the dictionary, id stream and deviation stream must occupy.
    pub fn payload_len(&self) -> u64 {
        let blocks = u64::from(self.num_blocks);
        u64::from(self.dict_size) * u64::from(self.block_bytes)
            + blocks * self.id_width.bytes() as u64
            + blocks * u64::from(self.dev_len_per_block)
    }

    /// Append the encoded header to `buf`.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.put_slice(&self.id_width.magic());
        buf.put_u32_le(self.block_bytes);
        buf.put_u32_le(self.field_sizes.len() as u32);
        buf.put_u32_le(self.dict_size);
        buf.put_u32_le(self.num_blocks);
        buf.put_u32_le(self.dev_positions.len() as u32);
        buf.put_u32_le(self.dev_len_per_block);
        for &size in &self.field_sizes {
            buf.put_u32_le(size);
        }
        for &pos in &self.dev_positions {
            buf.put_u32_le(pos);
        }
    }

    /// Parse a canonical header from the front of `buf`, advancing it past the header.
    pub fn parse(buf: &mut &[u8]) -> Result<Self> {
        let id_width = match SegmentVariant::detect(*buf)? {
            SegmentVariant::Canonical(width) => width,
            SegmentVariant::LegacyMulti => {
                return Err(CodecError::CorruptHeader(
                    "legacy DDP2 segment is not a canonical segment".into(),
                ))
            }
        };
        ensure_remaining(*buf, FIXED_HEADER_LEN as u64, "fixed header")?;
        buf.advance(4);
        let block_bytes = buf.get_u32_le();
        let num_fields = buf.get_u32_le();
        let dict_size = buf.get_u32_le();
        let num_blocks = buf.get_u32_le();
        let dev_pos_count = buf.get_u32_le();
        let dev_len_per_block = buf.get_u32_le();

        if block_bytes == 0 {
            return Err(CodecError::CorruptHeader("block_bytes is zero".into()));
        }
        if dev_len_per_block != dev_pos_count {
            return Err(CodecError::CorruptHeader(format!(
                "dev_len_per_block {} differs from dev_pos_count {}",
                dev_len_per_block, dev_pos_count
            )));
        }
        if dict_size as usize > id_width.capacity() {
            return Err(CodecError::CorruptHeader(format!(
                "dict_size {} exceeds the {}-byte id capacity {}",
                dict_size,
                id_width.bytes(),
                id_width.capacity()
            )));
        }

        let field_sizes = read_u32_list(buf, num_fields, "field sizes")?;
        check_field_sum(&field_sizes, block_bytes);

        let dev_positions = read_u32_list(buf, dev_pos_count, "deviation positions")?;
        if let Some(&pos) = dev_positions.iter().find(|&&p| p >= block_bytes) {
            return Err(CodecError::CorruptHeader(format!(
                "deviation position {} outside block of {} bytes",
                pos, block_bytes
            )));
        }

        Ok(Self {
            id_width,
            block_bytes,
            dict_size,
            num_blocks,
            dev_len_per_block,
            field_sizes,
            dev_positions,
        })
    }
}

pub(crate) fn ensure_remaining(buf: &[u8], needed: u64, what: &str) -> Result<()> {
    if (buf.len() as u64) < needed {
        return Err(CodecError::CorruptHeader(format!(
            "truncated {}: need {} bytes, {} left",
            what,
            needed,
            buf.len()
        )));
    }
    Ok(())
}

pub(crate) fn read_u32_list(buf: &mut &[u8], count: u32, what: &str) -> Result<Vec<u32>> {
    ensure_remaining(*buf, 4 * u64::from(count), what)?;
    Ok((0..count).map(|_| buf.get_u32_le()).collect())
}

/// A field list that disagrees with block_bytes is tolerated; older encoders
/// wrote slightly inconsistent headers.
pub(crate) fn check_field_sum(field_sizes: &[u32], block_bytes: u32) {
    let sum: u64 = field_sizes.iter().map(|&s| u64::from(s)).sum();
    if sum != u64::from(block_bytes) {
        warn!(
            field_sum = sum,
            block_bytes, "Field sizes do not add up to block_bytes"
        );
    }
}
