//! Base/deviation byte-plane split and its inverse merge

use crate::error::{CodecError, Result};

/// Move the bytes at `positions` out of `block` into `deviation` and zero
/// them in place, leaving the base block behind.
///
/// `deviation[i]` receives `block[positions[i]]`. Returns the number of
/// bytes copied, which always equals `positions.len()` on success.
pub fn split(block: &mut [u8], positions: &[u32], deviation: &mut [u8]) -> Result<usize> {
    if deviation.len() != positions.len() {
        return Err(CodecError::SplitLengthMismatch {
            expected: positions.len(),
            actual: deviation.len(),
        });
    }
    let mut copied = 0;
    for (out, &pos) in deviation.iter_mut().zip(positions) {
        let Some(byte) = block.get_mut(pos as usize) else {
            break;
        };
        *out = *byte;
        *byte = 0;
        copied += 1;
    }
    if copied != positions.len() {
        return Err(CodecError::SplitLengthMismatch {
            expected: positions.len(),
            actual: copied,
        });
    }
    Ok(copied)
}

/// Rebuild an original block into `out` from its base block and deviation bytes.
///
/// `out` must be exactly as long as `base`, `deviation` exactly as long as
/// `positions`. Returns the number of deviation bytes written back.
pub fn merge_into(base: &[u8], positions: &[u32], deviation: &[u8], out: &mut [u8]) -> Result<usize> {
    if out.len() != base.len() {
        return Err(CodecError::MergeLengthMismatch {
            expected: base.len(),
            actual: out.len(),
        });
    }
    if deviation.len() != positions.len() {
        return Err(CodecError::MergeLengthMismatch {
            expected: positions.len(),
            actual: deviation.len(),
        });
    }
    out.copy_from_slice(base);
    for (i, (&pos, &byte)) in positions.iter().zip(deviation).enumerate() {
        let slot = out
            .get_mut(pos as usize)
            .ok_or(CodecError::MergeLengthMismatch {
                expected: positions.len(),
                actual: i,
            })?;
        *slot = byte;
    }
    Ok(positions.len())
}

/// Owned variant of [`merge_into`].
pub fn merge(base: &[u8], positions: &[u32], deviation: &[u8]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; base.len()];
    merge_into(base, positions, deviation, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn split_zeroes_positions() {
        let mut block = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00, 0x00, 0x00];
        let mut dev = [0u8; 3];
        let n = split(&mut block, &[0, 2, 4], &mut dev).unwrap();
        assert_eq!(n, 3);
        assert_eq!(dev, [0x01, 0x02, 0x03]);
        assert_eq!(block, [0, 0, 0, 0, 0, 0, 0x04, 0, 0, 0]);
    }

    #[test]
    fn split_follows_position_order() {
        let mut block = [10, 20, 30, 40];
        let mut dev = [0u8; 2];
        split(&mut block, &[3, 1], &mut dev).unwrap();
        assert_eq!(dev, [40, 20]);
        assert_eq!(block, [10, 0, 30, 0]);
    }

    #[test]
    fn split_rejects_wrong_deviation_buffer() {
        let mut block = [1, 2, 3];
        let mut dev = [0u8; 1];
        assert!(matches!(
            split(&mut block, &[0, 1], &mut dev),
            Err(CodecError::SplitLengthMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn split_rejects_position_past_block() {
        let mut block = [1, 2];
        let mut dev = [0u8; 2];
        assert!(matches!(
            split(&mut block, &[0, 5], &mut dev),
            Err(CodecError::SplitLengthMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn merge_restores_block() {
        let base = [0, 0, 0, 0, 0, 0, 0x04, 0, 0, 0];
        let out = merge(&base, &[0, 2, 4], &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(out, [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn merge_rejects_short_deviation() {
        assert!(matches!(
            merge(&[0, 0], &[0, 1], &[9]),
            Err(CodecError::MergeLengthMismatch { .. })
        ));
    }

    fn block_and_positions() -> impl Strategy<Value = (Vec<u8>, Vec<u32>)> {
        prop::collection::vec(any::<u8>(), 1..64).prop_flat_map(|block| {
            let len = block.len();
            let positions = prop::sample::subsequence((0..len as u32).collect::<Vec<_>>(), 0..=len)
                .prop_shuffle();
            (Just(block), positions)
        })
    }

    proptest! {
        #[test]
        fn prop_merge_inverts_split((original, positions) in block_and_positions()) {
            let mut block = original.clone();
            let mut dev = vec![0u8; positions.len()];
            split(&mut block, &positions, &mut dev).unwrap();
            for &p in &positions {
                prop_assert_eq!(block[p as usize], 0);
            }
            let restored = merge(&block, &positions, &dev).unwrap();
            prop_assert_eq!(restored, original);
        }
    }
}
