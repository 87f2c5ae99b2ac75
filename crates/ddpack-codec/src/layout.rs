//! Block geometry: field widths, deviation positions and the derived sizes

use crate::error::{CodecError, Result};
use serde::Serialize;

/// Sample widths accepted by [`BlockLayout::uniform`].
pub const UNIFORM_WIDTHS: [u32; 4] = [1, 2, 4, 8];

/// Validated block layout.
///
/// A block is the concatenation of one sample from every field, in field
/// order. Deviation positions name the bytes of every block that are moved
/// into the deviation stream and zeroed in the base block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockLayout {
    field_sizes: Vec<u32>,
    dev_positions: Vec<u32>,
    block_bytes: usize,
}

impl BlockLayout {
    /// Build a layout from explicit field widths and deviation positions.
    ///
    /// Fails with [`CodecError::InvalidLayout`] if the field list is empty,
    /// any width is zero, a position is outside `[0, block_bytes)` or a
    /// position appears twice.
    pub fn new(field_sizes: Vec<u32>, dev_positions: Vec<u32>) -> Result<Self> {
        let block_bytes = block_bytes_of(&field_sizes)?;

        let mut seen = vec![false; block_bytes];
        for &pos in &dev_positions {
            let slot = seen.get_mut(pos as usize).ok_or_else(|| {
                CodecError::InvalidLayout(format!(
                    "deviation position {} outside block of {} bytes",
                    pos, block_bytes
                ))
            })?;
            if *slot {
                return Err(CodecError::InvalidLayout(format!(
                    "deviation position {} listed twice",
                    pos
                )));
            }
            *slot = true;
        }

        Ok(Self {
            field_sizes,
            dev_positions,
            block_bytes,
        })
    }

    /// Layout whose deviation bytes are the low-order half of every field.
    ///
    /// A field of width `w` contributes its first `w / 2` bytes (samples are
    /// little-endian). An odd-width last field contributes one extra byte.
    pub fn low_half(field_sizes: Vec<u32>) -> Result<Self> {
        block_bytes_of(&field_sizes)?;
        let positions = low_half_positions(&field_sizes);
        Self::new(field_sizes, positions)
    }

    /// Simple layout: `samples` consecutive samples of one sensor, each
    /// `width` bytes wide, split by the low-half rule.
    pub fn uniform(width: u32, samples: u32) -> Result<Self> {
        if !UNIFORM_WIDTHS.contains(&width) {
            return Err(CodecError::InvalidLayout(format!(
                "uniform sample width must be one of {:?}, got {}",
                UNIFORM_WIDTHS, width
            )));
        }
        if samples == 0 {
            return Err(CodecError::InvalidLayout(
                "uniform layout needs at least one sample per block".into(),
            ));
        }
        Self::low_half(vec![width; samples as usize])
    }

    /// Field widths in block order.
    pub fn field_sizes(&self) -> &[u32] {
        &self.field_sizes
    }

    /// Deviation positions in stream order.
    pub fn dev_positions(&self) -> &[u32] {
        &self.dev_positions
    }

    /// Total width of one block.
    pub fn block_bytes(&self) -> usize {
        self.block_bytes
    }

    /// Deviation bytes produced per block.
    pub fn dev_len(&self) -> usize {
        self.dev_positions.len()
    }
}

fn block_bytes_of(field_sizes: &[u32]) -> Result<usize> {
    if field_sizes.is_empty() {
        return Err(CodecError::InvalidLayout("field list is empty".into()));
    }
    if let Some(i) = field_sizes.iter().position(|&w| w == 0) {
        return Err(CodecError::InvalidLayout(format!(
            "field {} has zero width",
            i
        )));
    }
    let total: u64 = field_sizes.iter().map(|&w| u64::from(w)).sum();
    u32::try_from(total)
        .map(|t| t as usize)
        .map_err(|_| CodecError::InvalidLayout(format!("block of {} bytes is too large", total)))
}

fn low_half_positions(field_sizes: &[u32]) -> Vec<u32> {
    let last = field_sizes.len() - 1;
    let mut positions = Vec::new();
    let mut offset = 0u32;
    for (i, &width) in field_sizes.iter().enumerate() {
        let mut take = width / 2;
        if width % 2 == 1 && i == last {
            take += 1;
        }
        positions.extend(offset..offset + take);
        offset += width;
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_from_field_list() {
        let layout = BlockLayout::new(vec![2, 2, 2, 4], vec![0, 2, 4]).unwrap();
        assert_eq!(layout.block_bytes(), 10);
        assert_eq!(layout.dev_len(), 3);
    }

    #[test]
    fn empty_position_list_is_valid() {
        let layout = BlockLayout::new(vec![4], vec![]).unwrap();
        assert_eq!(layout.dev_len(), 0);
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(matches!(
            BlockLayout::new(vec![], vec![]),
            Err(CodecError::InvalidLayout(_))
        ));
    }

    #[test]
    fn rejects_zero_width() {
        assert!(matches!(
            BlockLayout::new(vec![2, 0, 2], vec![]),
            Err(CodecError::InvalidLayout(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_position() {
        assert!(matches!(
            BlockLayout::new(vec![2, 2], vec![4]),
            Err(CodecError::InvalidLayout(_))
        ));
    }

    #[test]
    fn rejects_duplicate_position() {
        assert!(matches!(
            BlockLayout::new(vec![2, 2], vec![1, 1]),
            Err(CodecError::InvalidLayout(_))
        ));
    }

    #[test]
    fn low_half_of_sensor_block() {
        // T(2) RH(2) lux(2) P(4) lux(2) P(4)
        let layout = BlockLayout::low_half(vec![2, 2, 2, 4, 2, 4]).unwrap();
        assert_eq!(layout.block_bytes(), 16);
        assert_eq!(layout.dev_positions(), &[0, 2, 4, 6, 7, 10, 12, 13]);
    }

    #[test]
    fn low_half_odd_last_field_takes_extra_byte() {
        let layout = BlockLayout::low_half(vec![3, 3]).unwrap();
        assert_eq!(layout.dev_positions(), &[0, 3, 4]);
    }

    #[test]
    fn uniform_layout() {
        let layout = BlockLayout::uniform(2, 4).unwrap();
        assert_eq!(layout.block_bytes(), 8);
        assert_eq!(layout.dev_positions(), &[0, 2, 4, 6]);

        let single_byte = BlockLayout::uniform(1, 3).unwrap();
        assert_eq!(single_byte.dev_positions(), &[2]);
    }

    #[test]
    fn uniform_rejects_odd_widths() {
        assert!(BlockLayout::uniform(3, 4).is_err());
        assert!(BlockLayout::uniform(2, 0).is_err());
    }
}
