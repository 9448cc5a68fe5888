use std::fs::File;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Leaf hash of a file: SHA-256 over the path string followed by the
/// content, truncated to the first 8 bytes read as little-endian.
///
/// The path is part of the input, so equal content at two different
/// paths yields two different hashes.
pub fn file_hash(path: &Path) -> std::io::Result<u64> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    std::io::copy(&mut file, &mut hasher)?;
    Ok(truncate64(&hasher.finalize()))
}

fn truncate64(digest: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
