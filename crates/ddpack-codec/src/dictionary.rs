//! Insertion-ordered dictionary of distinct base blocks

use crate::error::{CodecError, Result};
use crate::fingerprint::{fingerprint, BlockFingerprint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How [`Dictionary::find`] locates a matching entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LookupStrategy {
    /// Compare against every entry in insertion order
    #[default]
    Linear,
    /// Look up a BLAKE3 fingerprint first, then confirm byte equality
    Fingerprint,
}

/// Dense, append-only collection of base blocks.
///
/// Entries are stored back to back in one buffer; entry `i` occupies
/// `i * block_bytes .. (i + 1) * block_bytes`. Indices start at 0 and follow
/// insertion order. Entries are never changed or removed. The dictionary
/// itself has no capacity ceiling and does not reject duplicates; callers
/// call [`Dictionary::find`] before [`Dictionary::add`].
#[derive(Debug, Clone)]
pub struct Dictionary {
    block_bytes: usize,
    entries: Vec<u8>,
    len: usize,
    strategy: LookupStrategy,
    index: HashMap<BlockFingerprint, usize>,
}

impl Dictionary {
    /// Create an empty dictionary for blocks of `block_bytes` bytes
    pub fn new(block_bytes: usize) -> Self {
        Self::with_strategy(block_bytes, LookupStrategy::Linear)
    }

    /// Create an empty dictionary with the given lookup strategy
    pub fn with_strategy(block_bytes: usize, strategy: LookupStrategy) -> Self {
        Self {
            block_bytes,
            entries: Vec::new(),
            len: 0,
            strategy,
            index: HashMap::new(),
        }
    }

    /// Index of the entry equal to `block`, if any.
    pub fn find(&self, block: &[u8]) -> Option<usize> {
        if block.len() != self.block_bytes {
            return None;
        }
        match self.strategy {
            LookupStrategy::Linear => self.scan(block),
            LookupStrategy::Fingerprint => match self.index.get(&fingerprint(block)) {
                Some(&i) if self.entry(i) == block => Some(i),
                Some(_) => self.scan(block),
                None => None,
            },
        }
    }

    /// Append an owned copy of `block` and return its index.
    pub fn add(&mut self, block: &[u8]) -> Result<usize> {
        if block.len() != self.block_bytes {
            return Err(CodecError::InvalidLayout(format!(
                "dictionary holds {}-byte blocks, got {} bytes",
                self.block_bytes,
                block.len()
            )));
        }
        let idx = self.len;
        self.entries.extend_from_slice(block);
        self.len += 1;
        if self.strategy == LookupStrategy::Fingerprint {
            self.index.entry(fingerprint(block)).or_insert(idx);
        }
        Ok(idx)
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Result<&[u8]> {
        if index >= self.len {
            return Err(CodecError::IndexOutOfRange {
                index,
                size: self.len,
            });
        }
        Ok(self.entry(index))
    }

    /// Number of entries
    pub fn size(&self) -> usize {
        self.len
    }

    /// Is the dictionary empty?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width of one entry
    pub fn block_bytes(&self) -> usize {
        self.block_bytes
    }

    /// All entries concatenated in index order, as they are written to a segment.
    pub fn as_bytes(&self) -> &[u8] {
        &self.entries
    }

    /// Iterate entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        // chunks_exact panics on a zero chunk size
        self.entries.chunks_exact(self.block_bytes.max(1))
    }

    fn entry(&self, index: usize) -> &[u8] {
        let start = index * self.block_bytes;
        &self.entries[start..start + self.block_bytes]
    }

    fn scan(&self, block: &[u8]) -> Option<usize> {
        (0..self.len).find(|&i| self.entry(i) == block)
    }
}
