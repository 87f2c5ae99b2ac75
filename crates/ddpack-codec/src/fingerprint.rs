//! BLAKE3 fingerprints of base blocks, used by the hashed dictionary lookup

/// A 32-byte BLAKE3 hash of a base block's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockFingerprint(pub [u8; 32]);

/// Compute the BLAKE3 fingerprint of a block
pub fn fingerprint(block: &[u8]) -> BlockFingerprint {
    BlockFingerprint(*blake3::hash(block).as_bytes())
}
