//! Packing of single-sensor raw streams into one interleaved block stream

use crate::error::{CodecError, Result};
use serde::Serialize;
use tracing::{debug, info};

/// One raw sensor stream: back-to-back samples of a fixed width.
#[derive(Debug, Clone)]
pub struct SensorStream {
    /// Bytes per sample
    pub sample_width: u32,
    /// Raw samples
    pub data: Vec<u8>,
}

/// Result of interleaving streams into blocks.
#[derive(Debug, Clone, Serialize)]
pub struct Interleaved {
    /// Whole blocks, back to back
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Number of blocks in `data`
    pub blocks: usize,
    /// Block layout matching `data`, one field per slot
    pub field_sizes: Vec<u32>,
}

/// Interleave `streams` into blocks.
///
/// Each block takes one sample per entry of `slots`, in slot order, from the
/// stream that entry names; a stream may appear in several slots (e.g. a
/// 1 s sensor sampled twice per 2 s block). Packing stops at the first block
/// that cannot be filled completely and the remaining samples are dropped.
pub fn interleave(streams: &[SensorStream], slots: &[usize]) -> Result<Interleaved> {
    if slots.is_empty() {
        return Err(CodecError::InvalidLayout("slot list is empty".into()));
    }
    for (i, stream) in streams.iter().enumerate() {
        if stream.sample_width == 0 {
            return Err(CodecError::InvalidLayout(format!(
                "stream {} has zero sample width",
                i
            )));
        }
    }
    let field_sizes = slots
        .iter()
        .map(|&s| {
            streams.get(s).map(|st| st.sample_width).ok_or_else(|| {
                CodecError::InvalidLayout(format!(
                    "slot refers to stream {} but only {} streams were given",
                    s,
                    streams.len()
                ))
            })
        })
        .collect::<Result<Vec<u32>>>()?;

    // samples of each stream consumed per block
    let mut per_block = vec![0usize; streams.len()];
    for &s in slots {
        per_block[s] += 1;
    }
    let blocks = per_block
        .iter()
        .enumerate()
        .filter(|&(_, &n)| n > 0)
        .map(|(s, &n)| streams[s].data.len() / (streams[s].sample_width as usize * n))
        .min()
        .unwrap_or(0);

    let block_bytes: usize = field_sizes.iter().map(|&w| w as usize).sum();
    let mut data = Vec::with_capacity(blocks * block_bytes);
    let mut cursors = vec![0usize; streams.len()];
    for _ in 0..blocks {
        for &s in slots {
            let width = streams[s].sample_width as usize;
            let start = cursors[s];
            data.extend_from_slice(&streams[s].data[start..start + width]);
            cursors[s] = start + width;
        }
    }

    for (i, (stream, &used)) in streams.iter().zip(&cursors).enumerate() {
        let left = stream.data.len() - used;
        if left > 0 {
            debug!(stream = i, dropped_bytes = left, "Unused samples left in stream");
        }
    }
    info!(blocks, block_bytes, "Packed sensor streams");

    Ok(Interleaved {
        data,
        blocks,
        field_sizes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(width: u32, samples: &[u8]) -> SensorStream {
        SensorStream {
            sample_width: width,
            data: samples.to_vec(),
        }
    }

    #[test]
    fn packs_sensor_block_order() {
        // T(2), lux(2) twice per block, P(4)
        let t = stream(2, &[0x10, 0x11, 0x12, 0x13]);
        let lux = stream(2, &[0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27]);
        let p = stream(4, &[0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37]);
        let out = interleave(&[t, lux, p], &[0, 1, 2, 1]).unwrap();
        assert_eq!(out.blocks, 1);
        assert_eq!(out.field_sizes, vec![2, 2, 4, 2]);
        assert_eq!(
            out.data,
            vec![0x10, 0x11, 0x20, 0x21, 0x30, 0x31, 0x32, 0x33, 0x22, 0x23]
        );
    }

    #[test]
    fn stops_at_shortest_stream() {
        let a = stream(1, &[1, 2, 3, 4, 5]);
        let b = stream(1, &[9, 8]);
        let out = interleave(&[a, b], &[0, 1]).unwrap();
        assert_eq!(out.blocks, 2);
        assert_eq!(out.data, vec![1, 9, 2, 8]);
    }

    #[test]
    fn partial_sample_does_not_count() {
        let a = stream(2, &[1, 2, 3]);
        let out = interleave(&[a], &[0]).unwrap();
        assert_eq!(out.blocks, 1);
        assert_eq!(out.data, vec![1, 2]);
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(interleave(&[stream(2, &[0, 0])], &[]).is_err());
        assert!(interleave(&[stream(2, &[0, 0])], &[1]).is_err());
        assert!(interleave(&[stream(0, &[0, 0])], &[0]).is_err());
    }
}
