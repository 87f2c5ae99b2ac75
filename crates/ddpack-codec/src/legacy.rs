//! Read-only support for the older `DDP2` multi-field format.
//!
//! `DDP2` segments carry no position list: deviation bytes follow the
//! low-half rule of [`BlockLayout::low_half`]. Ids are four bytes wide and the
//! dictionary is never capped, so such an archive is always one file.
//!
//! ```text
//! magic "DDP2" | u32 block_bytes | u32 num_fields | u32 dict_size | u32 num_blocks
//! u32[num_fields] field_sizes | dictionary | u32[num_blocks] ids | deviation bytes
//! ```

use crate::dictionary::Dictionary;
use crate::error::{CodecError, Result};
use crate::format::{check_field_sum, ensure_remaining, read_u32_list, IdWidth, MAGIC_LEGACY_MULTI};
use crate::layout::BlockLayout;
use crate::segment::Segment;
use bytes::Buf;
use tracing::{debug, warn};

const LEGACY_FIXED_HEADER_LEN: u64 = 20;

/// Parse a `DDP2` file into a [`Segment`] with four-byte ids.
pub fn parse_legacy_multi(bytes: &[u8]) -> Result<Segment> {
    let mut buf = bytes;
    ensure_remaining(buf, LEGACY_FIXED_HEADER_LEN, "legacy header")?;
    if buf[..4] != MAGIC_LEGACY_MULTI {
        return Err(CodecError::CorruptHeader("not a DDP2 segment".into()));
    }
    buf.advance(4);
    let block_bytes = buf.get_u32_le();
    let num_fields = buf.get_u32_le();
    let dict_size = buf.get_u32_le();
    let num_blocks = buf.get_u32_le();

    if block_bytes == 0 || num_fields == 0 {
        return Err(CodecError::CorruptHeader(format!(
            "legacy header with block_bytes {} and {} fields",
            block_bytes, num_fields
        )));
    }

    let field_sizes = read_u32_list(&mut buf, num_fields, "legacy field sizes")?;
    check_field_sum(&field_sizes, block_bytes);

    let layout = BlockLayout::low_half(field_sizes)
        .map_err(|e| CodecError::CorruptHeader(format!("legacy field sizes: {}", e)))?;
    if let Some(&pos) = layout.dev_positions().iter().find(|&&p| p >= block_bytes) {
        return Err(CodecError::CorruptHeader(format!(
            "derived deviation position {} outside block of {} bytes",
            pos, block_bytes
        )));
    }
    let dev_len = layout.dev_len() as u64;

    let blocks = u64::from(num_blocks);
    let payload = u64::from(dict_size) * u64::from(block_bytes) + blocks * 4 + blocks * dev_len;
    ensure_remaining(buf, payload, "legacy payload")?;

    let block_bytes_usize = block_bytes as usize;
    let mut dictionary = Dictionary::new(block_bytes_usize);
    for _ in 0..dict_size {
        dictionary.add(&buf[..block_bytes_usize])?;
        buf.advance(block_bytes_usize);
    }
    let ids: Vec<u32> = (0..num_blocks).map(|_| buf.get_u32_le()).collect();
    let dev_total = (blocks * dev_len) as usize;
    let deviations = buf[..dev_total].to_vec();
    buf.advance(dev_total);

    if !buf.is_empty() {
        warn!(trailing = buf.len(), "Ignoring bytes after the legacy deviation stream");
    }
    debug!(block_bytes, dict_size, num_blocks, "Parsed legacy DDP2 segment");

    Ok(Segment {
        index: 0,
        id_width: IdWidth::Four,
        block_bytes,
        field_sizes: layout.field_sizes().to_vec(),
        dev_positions: layout.dev_positions().to_vec(),
        dictionary,
        ids,
        deviations,
    })
}
