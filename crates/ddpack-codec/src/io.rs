//! Whole-file byte-buffer I/O and segment file naming

use crate::error::{CodecError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read an entire file into memory.
pub fn read_binary_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| CodecError::io(path, e))
}

/// Create or truncate `path` and write `data` to it.
pub fn write_binary_file(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data).map_err(|e| CodecError::io(path, e))
}

/// Path of segment `index` for an archive rooted at `base`.
///
/// Segment 0 is `base` itself; segment `k >= 1` appends `.seg{k}` to the
/// full file name, so `out.ddp` is followed by `out.ddp.seg1`.
pub fn segment_path(base: &Path, index: u32) -> PathBuf {
    if index == 0 {
        return base.to_path_buf();
    }
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(format!(".seg{}", index));
    PathBuf::from(name)
}

/// Delete `segment_path(base, k)` for `k = first, first + 1, ...` until a
/// path is missing. Returns the number of files removed.
pub fn remove_segments_from(base: &Path, first: u32) -> Result<usize> {
    let mut removed = 0;
    for index in first.. {
        let path = segment_path(base, index);
        if !path.exists() {
            break;
        }
        std::fs::remove_file(&path).map_err(|e| CodecError::io(&path, e))?;
        debug!(path = %path.display(), "Removed segment file");
        removed += 1;
    }
    Ok(removed)
}
