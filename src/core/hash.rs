// Hashing utilities

use sha1::{Digest, Sha1};
use crate::core::BlockHash;

/// SHA-1 digest of `data`
pub fn sha1_digest(data: &[u8]) -> BlockHash {
    let digest = Sha1::digest(data);
    let mut result = [0u8; 20];
    result.copy_from_slice(&digest);
    BlockHash::new(result)
}
