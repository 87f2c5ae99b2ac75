//! Multi-segment archive handling: the codec decodes single segments, this
//! module walks `out`, `out.seg1`, `out.seg2`, ... and stitches the results.

use anyhow::{Context, Result};
use ddpack_codec::legacy::parse_legacy_multi;
use ddpack_codec::{
    decode_any, read_binary_file, segment_path, write_binary_file, SegmentHeader, SegmentVariant,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Header summary of one segment file.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    pub path: PathBuf,
    pub variant: SegmentVariant,
    pub file_bytes: usize,
    pub header: SegmentHeader,
}

/// Counters for a whole-archive decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    pub segments: usize,
    pub blocks: usize,
    pub output_bytes: usize,
}

/// Existing segment files of the archive rooted at `base`, in segment order.
pub fn list_segments(base: &Path) -> Vec<PathBuf> {
    (0u32..)
        .map(|k| segment_path(base, k))
        .take_while(|p| p.exists())
        .collect()
}

/// Decode every segment of the archive and write the concatenation to `output`.
pub fn decompress_archive(base: &Path, output: &Path) -> Result<ArchiveStats> {
    let paths = list_segments(base);
    if paths.is_empty() {
        anyhow::bail!("No segment found at {}", base.display());
    }

    let mut stats = ArchiveStats::default();
    let mut data = Vec::new();
    for path in &paths {
        let bytes = read_binary_file(path)?;
        let decoded =
            decode_any(&bytes).with_context(|| format!("decoding segment {}", path.display()))?;
        debug!(path = %path.display(), blocks = decoded.header.num_blocks, "Decoded segment");
        stats.segments += 1;
        stats.blocks += decoded.header.num_blocks as usize;
        data.extend_from_slice(&decoded.data);
    }
    write_binary_file(output, &data)?;
    stats.output_bytes = data.len();

    info!(
        base = %base.display(),
        segments = stats.segments,
        blocks = stats.blocks,
        output_bytes = stats.output_bytes,
        "Decompressed archive"
    );
    Ok(stats)
}

/// Read the header of every segment in the archive without reconstructing data.
pub fn inspect(base: &Path) -> Result<Vec<SegmentSummary>> {
    let paths = list_segments(base);
    if paths.is_empty() {
        anyhow::bail!("No segment found at {}", base.display());
    }
    paths
        .into_iter()
        .map(|path| {
            let bytes = read_binary_file(&path)?;
            let variant = SegmentVariant::detect(&bytes)?;
            let header = match variant {
                SegmentVariant::Canonical(_) => SegmentHeader::parse(&mut &bytes[..])?,
                SegmentVariant::LegacyMulti => parse_legacy_multi(&bytes)?.header()?,
            };
            Ok(SegmentSummary {
                path,
                variant,
                file_bytes: bytes.len(),
                header,
            })
        })
        .collect()
}
