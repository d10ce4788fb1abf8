use crate::core::BlockHash;
use thiserror::Error;

/// Chain construction and append failures.
///
/// These all indicate a caller handing the chain blocks it did not build
/// from the chain's own records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain has no blocks")]
    Empty,

    #[error("first block {0} is not a genesis block")]
    MissingGenesis(BlockHash),

    #[error("block {0} is a second genesis block")]
    UnexpectedGenesis(BlockHash),

    #[error("block {0} is labelled orphan and cannot be part of a chain")]
    OrphanInChain(BlockHash),

    #[error("block {block} extends unknown parent {prev_hash}")]
    InvalidParent { block: BlockHash, prev_hash: BlockHash },

    #[error("block {0} is already in the chain")]
    DuplicateBlock(BlockHash),

    #[error("block {0} does not hash to its stored hash")]
    HashMismatch(BlockHash),
}
