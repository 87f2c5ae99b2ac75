//! One self-contained segment: header, dictionary, id stream, deviation stream

use crate::dictionary::Dictionary;
use crate::error::{CodecError, Result};
use crate::format::{ensure_remaining, IdWidth, SegmentHeader, FIXED_HEADER_LEN};
use crate::plane::merge_into;
use bytes::{Buf, BufMut};
use tracing::{debug, warn};

/// A sealed segment, either produced by the encoder or parsed from a file.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Position in the archive; 0 for a segment parsed from a standalone file.
    pub index: u32,
    /// Width of the ids in `ids`
    pub id_width: IdWidth,
    /// Width of one block
    pub block_bytes: u32,
    /// Field widths recorded in the header
    pub field_sizes: Vec<u32>,
    /// Deviation positions recorded in the header
    pub dev_positions: Vec<u32>,
    /// Distinct base blocks referenced by `ids`
    pub dictionary: Dictionary,
    /// One dictionary index per block, in block order
    pub ids: Vec<u32>,
    /// Deviation bytes, block-major then position order
    pub deviations: Vec<u8>,
}

impl Segment {
    /// Number of blocks covered by this segment
    pub fn num_blocks(&self) -> usize {
        self.ids.len()
    }

    /// Header describing this segment.
    ///
    /// Fails with [`CodecError::SegmentTooLarge`] when a count does not fit
    /// the 32-bit header fields.
    pub fn header(&self) -> Result<SegmentHeader> {
        Ok(SegmentHeader {
            id_width: self.id_width,
            block_bytes: self.block_bytes,
            dict_size: header_count("dict_size", self.dictionary.size())?,
            num_blocks: header_count("num_blocks", self.ids.len())?,
            dev_len_per_block: header_count("dev_len_per_block", self.dev_positions.len())?,
            field_sizes: self.field_sizes.clone(),
            dev_positions: self.dev_positions.clone(),
        })
    }

    /// Size of the serialized segment
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN
            + 4 * (self.field_sizes.len() + self.dev_positions.len())
            + self.dictionary.as_bytes().len()
            + self.ids.len() * self.id_width.bytes()
            + self.deviations.len()
    }

    /// Serialize the segment to its on-disk form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = self.header()?;
        let mut buf = Vec::with_capacity(self.encoded_len());
        header.write(&mut buf);
        buf.put_slice(self.dictionary.as_bytes());
        for &id in &self.ids {
            self.id_width.put_id(&mut buf, id);
        }
        buf.put_slice(&self.deviations);
        Ok(buf)
    }

    /// Parse a canonical segment.
    ///
    /// The header is validated, the dictionary rebuilt in file order and the
    /// id and deviation streams read. Block ids are checked when the segment
    /// is reconstructed, not here.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        let header = SegmentHeader::parse(&mut buf)?;
        ensure_remaining(buf, header.payload_len(), "segment payload")?;

        let block_bytes = header.block_bytes as usize;
        let mut dictionary = Dictionary::new(block_bytes);
        for _ in 0..header.dict_size {
            dictionary.add(&buf[..block_bytes])?;
            buf.advance(block_bytes);
        }

        let ids: Vec<u32> = (0..header.num_blocks)
            .map(|_| header.id_width.get_id(&mut buf))
            .collect();

        let dev_total = header.num_blocks as usize * header.dev_len_per_block as usize;
        let deviations = buf[..dev_total].to_vec();
        buf.advance(dev_total);

        if !buf.is_empty() {
            warn!(trailing = buf.len(), "Ignoring bytes after the deviation stream");
        }

        debug!(
            block_bytes,
            dict_size = header.dict_size,
            num_blocks = header.num_blocks,
            "Parsed segment"
        );

        Ok(Self {
            index: 0,
            id_width: header.id_width,
            block_bytes: header.block_bytes,
            field_sizes: header.field_sizes,
            dev_positions: header.dev_positions,
            dictionary,
            ids,
            deviations,
        })
    }

    /// Rebuild the original byte stream covered by this segment.
    pub fn reconstruct(&self) -> Result<Vec<u8>> {
        let block_bytes = self.block_bytes as usize;
        let dev_len = self.dev_positions.len();
        let expected_dev = self.ids.len() * dev_len;
        if self.deviations.len() != expected_dev {
            return Err(CodecError::MergeLengthMismatch {
                expected: expected_dev,
                actual: self.deviations.len(),
            });
        }

        let mut out = vec![0u8; self.ids.len() * block_bytes];
        for (block, (&id, dest)) in self
            .ids
            .iter()
            .zip(out.chunks_exact_mut(block_bytes))
            .enumerate()
        {
            let base = self
                .dictionary
                .get(id as usize)
                .map_err(|_| CodecError::InvalidBlockId {
                    id,
                    block,
                    dict_size: self.dictionary.size(),
                })?;
            let deviation = &self.deviations[block * dev_len..(block + 1) * dev_len];
            merge_into(base, &self.dev_positions, deviation, dest)?;
        }
        Ok(out)
    }
}

fn header_count(field: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| CodecError::SegmentTooLarge { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_segment() -> Segment {
        let mut dictionary = Dictionary::new(10);
        dictionary.add(&[0, 0, 0, 0, 0, 0, 0x04, 0, 0, 0]).unwrap();
        Segment {
            index: 0,
            id_width: IdWidth::One,
            block_bytes: 10,
            field_sizes: vec![2, 2, 2, 4],
            dev_positions: vec![0, 2, 4],
            dictionary,
            ids: vec![0],
            deviations: vec![0x01, 0x02, 0x03],
        }
    }

    #[test]
    fn serialized_layout() {
        let bytes = scenario_segment().to_bytes().unwrap();
        // 28 fixed + 16 field sizes + 12 positions + 10 dict + 1 id + 3 dev
        assert_eq!(bytes.len(), 70);
        assert_eq!(bytes.len(), scenario_segment().encoded_len());
        assert_eq!(&bytes[56..66], &[0, 0, 0, 0, 0, 0, 0x04, 0, 0, 0]);
        assert_eq!(bytes[66], 0);
        assert_eq!(&bytes[67..70], &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn parse_and_reconstruct() {
        let bytes = scenario_segment().to_bytes().unwrap();
        let segment = Segment::from_bytes(&bytes).unwrap();
        assert_eq!(segment.dictionary.size(), 1);
        assert_eq!(
            segment.reconstruct().unwrap(),
            vec![0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn id_past_dictionary_is_rejected() {
        let mut segment = scenario_segment();
        segment.ids = vec![0, 1];
        segment.deviations = vec![1, 2, 3, 4, 5, 6];
        assert!(matches!(
            segment.reconstruct(),
            Err(CodecError::InvalidBlockId { id: 1, block: 1, dict_size: 1 })
        ));
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let bytes = scenario_segment().to_bytes().unwrap();
        assert!(matches!(
            Segment::from_bytes(&bytes[..bytes.len() - 1]),
            Err(CodecError::CorruptHeader(_))
        ));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = scenario_segment().to_bytes().unwrap();
        bytes.extend_from_slice(&[0xFF; 4]);
        let segment = Segment::from_bytes(&bytes).unwrap();
        assert_eq!(segment.reconstruct().unwrap().len(), 10);
    }

    #[test]
    fn wide_ids_round_trip() {
        let mut segment = scenario_segment();
        segment.id_width = IdWidth::Two;
        let bytes = segment.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"DDW2");
        assert_eq!(bytes.len(), 71);
        let parsed = Segment::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.id_width, IdWidth::Two);
        assert_eq!(parsed.ids, vec![0]);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn counts_past_u32_are_rejected() {
        assert_eq!(header_count("num_blocks", u32::MAX as usize).unwrap(), u32::MAX);
        assert!(matches!(
            header_count("num_blocks", u32::MAX as usize + 1),
            Err(CodecError::SegmentTooLarge { field: "num_blocks", .. })
        ));
    }

    #[test]
    fn no_deviation_positions() {
        let mut dictionary = Dictionary::new(2);
        dictionary.add(&[7, 8]).unwrap();
        let segment = Segment {
            index: 0,
            id_width: IdWidth::One,
            block_bytes: 2,
            field_sizes: vec![2],
            dev_positions: vec![],
            dictionary,
            ids: vec![0, 0, 0],
            deviations: vec![],
        };
        let parsed = Segment::from_bytes(&segment.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.reconstruct().unwrap(), vec![7, 8, 7, 8, 7, 8]);
    }
}
