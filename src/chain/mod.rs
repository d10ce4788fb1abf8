// Chain management: construction, append, and orphan pruning

mod blockchain;
mod error;

pub use blockchain::Chain;
pub use error::ChainError;

use crate::consensus::{Difficulty, Miner, MiningError};
use crate::core::{Block, BlockHash, BlockTemplate, MinedSeal, now_millis};

/// Genesis-only chain
pub fn create_chain() -> Chain {
    Chain::new()
}

/// Mine a block body on top of `parent_hash` with the default miner,
/// stamped with the current time. Does not touch any chain.
pub fn mine(
    parent_hash: BlockHash,
    difficulty: Difficulty,
    body: &str,
) -> Result<MinedSeal, MiningError> {
    mine_with(&Miner::default(), parent_hash, difficulty, body)
}

/// Same as [`mine`] with a caller-chosen attempt bound
pub fn mine_with(
    miner: &Miner,
    parent_hash: BlockHash,
    difficulty: Difficulty,
    body: &str,
) -> Result<MinedSeal, MiningError> {
    let template = BlockTemplate::new(parent_hash, now_millis(), body);
    miner.mine(&template, difficulty).map(|r| r.seal())
}

/// Mine two competing siblings on `parent_hash`.
///
/// Two calls to [`mine`] in the same millisecond return the same seal, so
/// forks must be mined together; the pair always has distinct hashes.
pub fn mine_fork(
    parent_hash: BlockHash,
    difficulty: Difficulty,
    body: &str,
) -> Result<(MinedSeal, MinedSeal), MiningError> {
    mine_fork_with(&Miner::default(), parent_hash, difficulty, body)
}

pub fn mine_fork_with(
    miner: &Miner,
    parent_hash: BlockHash,
    difficulty: Difficulty,
    body: &str,
) -> Result<(MinedSeal, MinedSeal), MiningError> {
    let template = BlockTemplate::new(parent_hash, now_millis(), body);
    let (first, second) = miner.mine_pair(&template, difficulty, false)?;
    Ok((first.seal(), second.seal()))
}

pub fn append_blocks(chain: &Chain, new_blocks: Vec<Block>) -> Result<Chain, ChainError> {
    chain.append(new_blocks)
}

pub fn orphan(chain: &Chain, target: &BlockHash) -> Chain {
    chain.orphan(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_round_trip() {
        let chain = create_chain();
        assert_eq!(chain.len(), 1);

        let parent = *chain.tip().hash();
        let seal = mine(parent, Difficulty::new(3).unwrap(), "tx1").unwrap();
        assert!(seal.hash.leading_zero_bits() >= 3);

        let block = Block::mined(parent, "tx1", seal);
        let chain = append_blocks(&chain, vec![block.clone()]).unwrap();
        assert_eq!(chain.len(), 2);

        let chain = orphan(&chain, block.hash());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_mined_seal_builds_verifiable_block() {
        let chain = create_chain();
        let parent = *chain.genesis().hash();
        let seal = mine(parent, Difficulty::new(0).unwrap(), "").unwrap();

        assert_eq!(seal.nonce, 0);
        assert!(Block::mined(parent, "", seal).verify_hash());
    }

    #[test]
    fn test_fork_then_orphan_through_engine_api() {
        let d = Difficulty::new(1).unwrap();
        let chain = create_chain();
        let g = *chain.genesis().hash();

        let a = Block::mined(g, "tx1", mine(g, d, "tx1").unwrap());
        let chain = append_blocks(&chain, vec![a.clone()]).unwrap();
        assert_eq!(chain.len(), 2);

        let (s1, s2) = mine_fork(*a.hash(), d, "tx2").unwrap();
        let b1 = Block::mined(*a.hash(), "tx2", s1);
        let b2 = Block::mined(*a.hash(), "tx2", s2);
        assert_ne!(b1.hash(), b2.hash());

        let chain = append_blocks(&chain, vec![b1.clone(), b2.clone()]).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(b1.prev_hash(), a.hash());
        assert_eq!(b2.prev_hash(), a.hash());

        let chain = orphan(&chain, b1.hash());
        let remaining: Vec<BlockHash> = chain.blocks().iter().map(|b| *b.hash()).collect();
        assert_eq!(remaining, vec![g, *a.hash(), *b2.hash()]);
    }

    #[test]
    fn test_mine_with_attempt_bound_times_out() {
        let chain = create_chain();
        let parent = *chain.genesis().hash();
        let d = Difficulty::new(160).unwrap();
        let miner = Miner::new(5);

        assert_eq!(
            mine_with(&miner, parent, d, "x"),
            Err(MiningError::Timeout {
                difficulty: d,
                attempts: 5
            })
        );
        assert!(matches!(
            mine_fork_with(&miner, parent, d, "x"),
            Err(MiningError::Timeout { .. })
        ));
    }
}
