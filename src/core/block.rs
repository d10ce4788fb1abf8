// Block data structures

use crate::core::{BlockHash, sha1_digest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use super::serialize::write_var_bytes;

/// Current time in milliseconds since the UNIX epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Role of a block in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Genesis,
    Normal,
    /// Pruned block kept around only for display
    Orphan,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockKind::Genesis => write!(f, "genesis"),
            BlockKind::Normal => write!(f, "normal"),
            BlockKind::Orphan => write!(f, "orphan"),
        }
    }
}

/// Candidate block contents before a nonce is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    /// Hash of the block being extended
    pub prev_hash: BlockHash,
    /// Creation time (ms since epoch)
    pub timestamp: u64,
    /// Free-form payload
    pub body: String,
}

impl BlockTemplate {
    pub fn new(prev_hash: BlockHash, timestamp: u64, body: impl Into<String>) -> Self {
        Self {
            prev_hash,
            timestamp,
            body: body.into(),
        }
    }

    /// Canonical serialization of the hashed fields:
    /// prev_hash (20 bytes) | timestamp (u64 LE) | nonce (u64 LE) | varint len | body
    pub fn header_bytes(&self, nonce: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20 + 8 + 8 + 1 + self.body.len());
        buf.extend_from_slice(self.prev_hash.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&nonce.to_le_bytes());
        // Writing into a Vec cannot fail
        let _ = write_var_bytes(&mut buf, self.body.as_bytes());
        buf
    }

    /// Hash of this template sealed with `nonce`
    pub fn hash_with_nonce(&self, nonce: u64) -> BlockHash {
        sha1_digest(&self.header_bytes(nonce))
    }
}

/// Output of a successful proof-of-work search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedSeal {
    pub hash: BlockHash,
    pub nonce: u64,
    pub timestamp: u64,
}

/// One immutable chain entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    kind: BlockKind,
    prev_hash: BlockHash,
    timestamp: u64,
    nonce: u64,
    body: String,
    hash: BlockHash,
}

impl Block {
    /// Create the genesis block: zero prev_hash, nonce 0, empty body, not mined
    pub fn genesis(timestamp: u64) -> Self {
        let template = BlockTemplate::new(BlockHash::zero(), timestamp, "");
        let hash = template.hash_with_nonce(0);

        Self {
            kind: BlockKind::Genesis,
            prev_hash: template.prev_hash,
            timestamp,
            nonce: 0,
            body: template.body,
            hash,
        }
    }

    /// Build a normal block from a mining result
    pub fn mined(prev_hash: BlockHash, body: impl Into<String>, seal: MinedSeal) -> Self {
        Self {
            kind: BlockKind::Normal,
            prev_hash,
            timestamp: seal.timestamp,
            nonce: seal.nonce,
            body: body.into(),
            hash: seal.hash,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn prev_hash(&self) -> &BlockHash {
        &self.prev_hash
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The block's own hash, which is also its identity
    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.kind == BlockKind::Genesis
    }

    /// Template describing this block's hashed fields
    pub fn template(&self) -> BlockTemplate {
        BlockTemplate::new(self.prev_hash, self.timestamp, self.body.clone())
    }

    /// Recompute the hash from the block's fields
    pub fn compute_hash(&self) -> BlockHash {
        self.template().hash_with_nonce(self.nonce)
    }

    /// Check that the stored hash matches the block contents
    pub fn verify_hash(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Check the stored hash against a leading-zero-bit target
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.hash.leading_zero_bits() >= difficulty
    }

    /// Copy of this block labelled as orphaned, for display
    pub fn relabel_orphan(&self) -> Self {
        Self {
            kind: BlockKind::Orphan,
            ..self.clone()
        }
    }
}
