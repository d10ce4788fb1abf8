// Immutable chain of blocks with fork and orphan handling

use crate::chain::ChainError;
use crate::core::{Block, BlockHash, BlockKind, now_millis};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Ordered, immutable sequence of blocks.
///
/// Insertion order is construction order: every block appears after its
/// parent, and siblings (forks) may sit next to each other. Every operation
/// returns a new `Chain` and leaves `self` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Block>", into = "Vec<Block>")]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// Genesis-only chain stamped with the current time
    pub fn new() -> Self {
        Self::with_genesis(now_millis())
    }

    /// Genesis-only chain with a fixed genesis timestamp
    pub fn with_genesis(timestamp: u64) -> Self {
        Self {
            blocks: vec![Block::genesis(timestamp)],
        }
    }

    /// Build a chain from an existing block sequence, checking every invariant
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        let (genesis, rest) = blocks.split_first().ok_or(ChainError::Empty)?;

        if !genesis.is_genesis() {
            return Err(ChainError::MissingGenesis(*genesis.hash()));
        }
        if !genesis.verify_hash() {
            return Err(ChainError::HashMismatch(*genesis.hash()));
        }

        let mut known = HashSet::with_capacity(blocks.len());
        known.insert(*genesis.hash());
        for block in rest {
            Self::check_extension(&known, block)?;
            known.insert(*block.hash());
        }

        Ok(Self { blocks })
    }

    /// Check that `block` may be appended on top of the `known` hashes
    fn check_extension(known: &HashSet<BlockHash>, block: &Block) -> Result<(), ChainError> {
        match block.kind() {
            BlockKind::Genesis => return Err(ChainError::UnexpectedGenesis(*block.hash())),
            BlockKind::Orphan => return Err(ChainError::OrphanInChain(*block.hash())),
            BlockKind::Normal => {}
        }

        if known.contains(block.hash()) {
            return Err(ChainError::DuplicateBlock(*block.hash()));
        }
        if !block.verify_hash() {
            return Err(ChainError::HashMismatch(*block.hash()));
        }
        if !known.contains(block.prev_hash()) {
            return Err(ChainError::InvalidParent {
                block: *block.hash(),
                prev_hash: *block.prev_hash(),
            });
        }

        Ok(())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain holds at least its genesis block
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    /// Most recently added block
    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn get(&self, hash: &BlockHash) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash() == hash)
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.get(hash).is_some()
    }

    /// Blocks whose hex hash starts with `prefix`
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<&Block> {
        let prefix = prefix.trim().to_ascii_lowercase();
        self.blocks
            .iter()
            .filter(|b| b.hash().to_hex().starts_with(&prefix))
            .collect()
    }

    /// Direct children of `hash`
    pub fn children(&self, hash: &BlockHash) -> Vec<&Block> {
        self.blocks.iter().filter(|b| b.prev_hash() == hash && !b.is_genesis()).collect()
    }

    /// Branch tips: blocks nothing extends yet
    pub fn heads(&self) -> Vec<&Block> {
        let parents: HashSet<&BlockHash> = self
            .blocks
            .iter()
            .filter(|b| !b.is_genesis())
            .map(|b| b.prev_hash())
            .collect();

        self.blocks.iter().filter(|b| !parents.contains(b.hash())).collect()
    }

    /// Number of competing branches beyond the first
    pub fn branch_count(&self) -> usize {
        self.heads().len().saturating_sub(1)
    }

    /// Length in blocks of the longest path from genesis
    pub fn height(&self) -> usize {
        let mut depth: HashMap<&BlockHash, usize> = HashMap::with_capacity(self.blocks.len());
        let mut max = 0;

        for block in &self.blocks {
            let d = if block.is_genesis() {
                1
            } else {
                depth.get(block.prev_hash()).copied().unwrap_or(0) + 1
            };
            depth.insert(block.hash(), d);
            max = max.max(d);
        }

        max
    }

    /// Re-check every invariant of the current sequence
    pub fn validate(&self) -> Result<(), ChainError> {
        Self::from_blocks(self.blocks.clone()).map(|_| ())
    }

    /// New chain with `new_blocks` appended in order.
    ///
    /// Each block must extend a block already in the chain or one earlier in
    /// the same batch, so a fork (two siblings on one parent) is published
    /// in a single transition. On error nothing is appended.
    pub fn append(&self, new_blocks: Vec<Block>) -> Result<Chain, ChainError> {
        let mut known: HashSet<BlockHash> = self.blocks.iter().map(|b| *b.hash()).collect();

        for block in &new_blocks {
            Self::check_extension(&known, block)?;
            known.insert(*block.hash());
        }

        let mut blocks = Vec::with_capacity(self.blocks.len() + new_blocks.len());
        blocks.extend_from_slice(&self.blocks);
        blocks.extend(new_blocks);

        log::info!(
            "Appended {} block(s), chain length {} -> {}",
            blocks.len() - self.blocks.len(),
            self.blocks.len(),
            blocks.len()
        );

        Ok(Chain { blocks })
    }

    /// Hashes of `target` and all of its descendants, or `None` when the
    /// target is unknown or is the genesis block
    fn pruned_set(&self, target: &BlockHash) -> Option<HashSet<BlockHash>> {
        let block = self.get(target)?;
        if block.is_genesis() {
            return None;
        }

        let mut removed = HashSet::new();
        removed.insert(*target);

        // Parents always precede children, so one forward pass is enough
        for block in &self.blocks {
            if !block.is_genesis() && removed.contains(block.prev_hash()) {
                removed.insert(*block.hash());
            }
        }

        Some(removed)
    }

    /// New chain without `target` and everything descending from it.
    ///
    /// Unknown targets and the genesis block are ignored and an identical
    /// chain is returned.
    pub fn orphan(&self, target: &BlockHash) -> Chain {
        let Some(removed) = self.pruned_set(target) else {
            if self.genesis().hash() == target {
                log::warn!("Refusing to orphan the genesis block {}", target);
            } else {
                log::debug!("Orphan target {} not in chain, nothing to prune", target);
            }
            return self.clone();
        };

        let blocks: Vec<Block> = self
            .blocks
            .iter()
            .filter(|b| !removed.contains(b.hash()))
            .cloned()
            .collect();

        log::info!(
            "Orphaned {} block(s) starting at {}, chain length {} -> {}",
            removed.len(),
            target.short(),
            self.blocks.len(),
            blocks.len()
        );

        Chain { blocks }
    }

    /// Every block, with the ones `orphan(target)` would remove relabelled
    /// as `BlockKind::Orphan`. For display only; the result is not a chain.
    pub fn orphan_view(&self, target: &BlockHash) -> Vec<Block> {
        let removed = self.pruned_set(target).unwrap_or_default();
        self.blocks
            .iter()
            .map(|b| {
                if removed.contains(b.hash()) {
                    b.relabel_orphan()
                } else {
                    b.clone()
                }
            })
            .collect()
    }
}

impl TryFrom<Vec<Block>> for Chain {
    type Error = ChainError;

    fn try_from(blocks: Vec<Block>) -> Result<Self, Self::Error> {
        Self::from_blocks(blocks)
    }
}

impl From<Chain> for Vec<Block> {
    fn from(chain: Chain) -> Self {
        chain.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{Difficulty, Miner};
    use crate::core::{BlockTemplate, MinedSeal};

    fn mine_on(parent: &Block, body: &str, timestamp: u64) -> Block {
        let template = BlockTemplate::new(*parent.hash(), timestamp, body);
        let result = Miner::default()
            .mine(&template, Difficulty::new(2).unwrap())
            .unwrap();
        Block::mined(*parent.hash(), body, result.seal())
    }

    /// [G, A(prev=G), B(prev=A), C(prev=A)]
    fn forked_chain() -> (Chain, Block, Block, Block) {
        let chain = Chain::with_genesis(1_000);
        let a = mine_on(chain.genesis(), "a", 2_000);
        let b = mine_on(&a, "b", 3_000);
        let c = mine_on(&a, "c", 3_001);
        let chain = chain.append(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        (chain, a, b, c)
    }

    fn hashes(chain: &Chain) -> Vec<BlockHash> {
        chain.blocks().iter().map(|b| *b.hash()).collect()
    }

    #[test]
    fn test_new_chain_is_genesis_only() {
        let chain = Chain::new();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.genesis().kind(), BlockKind::Genesis);
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.branch_count(), 0);
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn test_append_single_block() {
        let chain = Chain::with_genesis(1_000);
        let a = mine_on(chain.genesis(), "tx1", 2_000);
        let next = chain.append(vec![a.clone()]).unwrap();

        assert_eq!(next.len(), chain.len() + 1);
        assert_eq!(next.tip(), &a);
        // Original value is untouched
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_append_fork_adds_two_siblings() {
        let chain = Chain::with_genesis(1_000);
        let a = mine_on(chain.genesis(), "tx", 2_000);
        let b = mine_on(chain.genesis(), "tx", 2_001);
        let next = chain.append(vec![a.clone(), b.clone()]).unwrap();

        assert_eq!(next.len(), 3);
        assert_eq!(a.prev_hash(), b.prev_hash());
        assert_eq!(next.branch_count(), 1);
        assert_eq!(next.children(chain.genesis().hash()).len(), 2);
        assert_eq!(next.height(), 2);
    }

    #[test]
    fn test_append_rejects_unknown_parent() {
        let chain = Chain::with_genesis(1_000);
        let other = Chain::with_genesis(9_999);
        let stray = mine_on(other.genesis(), "stray", 2_000);

        let err = chain.append(vec![stray.clone()]).unwrap_err();
        assert_eq!(
            err,
            ChainError::InvalidParent {
                block: *stray.hash(),
                prev_hash: *other.genesis().hash(),
            }
        );
    }

    #[test]
    fn test_append_is_all_or_nothing() {
        let chain = Chain::with_genesis(1_000);
        let a = mine_on(chain.genesis(), "ok", 2_000);
        let stray = mine_on(&Block::genesis(5), "bad", 2_000);

        assert!(chain.append(vec![a, stray]).is_err());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_append_rejects_duplicates_and_genesis() {
        let chain = Chain::with_genesis(1_000);
        let a = mine_on(chain.genesis(), "a", 2_000);

        assert_eq!(
            chain.append(vec![a.clone(), a.clone()]),
            Err(ChainError::DuplicateBlock(*a.hash()))
        );

        let g = Block::genesis(7);
        assert_eq!(
            chain.append(vec![g.clone()]),
            Err(ChainError::UnexpectedGenesis(*g.hash()))
        );
    }

    #[test]
    fn test_append_rejects_tampered_block() {
        let chain = Chain::with_genesis(1_000);
        let seal = MinedSeal {
            hash: BlockHash::new([0; 20]),
            nonce: 1,
            timestamp: 2_000,
        };
        let forged = Block::mined(*chain.genesis().hash(), "forged", seal);

        assert_eq!(
            chain.append(vec![forged]),
            Err(ChainError::HashMismatch(BlockHash::zero()))
        );
    }

    #[test]
    fn test_append_accepts_parent_from_same_batch() {
        let chain = Chain::with_genesis(1_000);
        let a = mine_on(chain.genesis(), "a", 2_000);
        let b = mine_on(&a, "b", 3_000);
        let next = chain.append(vec![a, b]).unwrap();
        assert_eq!(next.height(), 3);
    }

    #[test]
    fn test_orphan_removes_descendants() {
        let (chain, a, _, _) = forked_chain();
        let pruned = chain.orphan(a.hash());
        assert_eq!(hashes(&pruned), vec![*chain.genesis().hash()]);
    }

    #[test]
    fn test_orphan_leaf_keeps_sibling() {
        let (chain, a, b, c) = forked_chain();
        let pruned = chain.orphan(c.hash());
        assert_eq!(
            hashes(&pruned),
            vec![*chain.genesis().hash(), *a.hash(), *b.hash()]
        );
        assert!(pruned.validate().is_ok());
    }

    #[test]
    fn test_orphan_deep_descendants() {
        let (chain, a, b, c) = forked_chain();
        let d = mine_on(&b, "d", 4_000);
        let e = mine_on(&d, "e", 5_000);
        let chain = chain.append(vec![d, e]).unwrap();

        let pruned = chain.orphan(b.hash());
        assert_eq!(
            hashes(&pruned),
            vec![*chain.genesis().hash(), *a.hash(), *c.hash()]
        );
    }

    #[test]
    fn test_orphan_unknown_is_noop() {
        let (chain, _, _, _) = forked_chain();
        let pruned = chain.orphan(&BlockHash::new([0xee; 20]));
        assert_eq!(pruned, chain);
    }

    #[test]
    fn test_orphan_genesis_is_noop() {
        let (chain, _, _, _) = forked_chain();
        let pruned = chain.orphan(chain.genesis().hash());
        assert_eq!(pruned, chain);
    }

    #[test]
    fn test_orphan_is_idempotent() {
        let (chain, _, b, _) = forked_chain();
        let once = chain.orphan(b.hash());
        let twice = once.orphan(b.hash());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_orphan_view_relabels_without_removing() {
        let (chain, a, _, _) = forked_chain();
        let view = chain.orphan_view(a.hash());

        assert_eq!(view.len(), chain.len());
        assert_eq!(view[0].kind(), BlockKind::Genesis);
        assert!(view[1..].iter().all(|b| b.kind() == BlockKind::Orphan));
    }

    #[test]
    fn test_heads_and_height() {
        let (chain, _, b, c) = forked_chain();
        let heads: Vec<BlockHash> = chain.heads().iter().map(|h| *h.hash()).collect();
        assert_eq!(heads, vec![*b.hash(), *c.hash()]);
        assert_eq!(chain.height(), 3);
        assert_eq!(chain.branch_count(), 1);
    }

    #[test]
    fn test_find_by_prefix() {
        let (chain, a, _, _) = forked_chain();
        let hex = a.hash().to_hex();
        let found = chain.find_by_prefix(&hex[..12].to_uppercase());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0], &a);
        assert_eq!(chain.find_by_prefix("").len(), chain.len());
    }

    #[test]
    fn test_from_blocks_validation() {
        let (chain, a, b, _) = forked_chain();

        assert_eq!(Chain::from_blocks(vec![]), Err(ChainError::Empty));
        assert_eq!(
            Chain::from_blocks(vec![a.clone()]),
            Err(ChainError::MissingGenesis(*a.hash()))
        );
        assert!(matches!(
            Chain::from_blocks(vec![chain.genesis().clone(), b.clone()]),
            Err(ChainError::InvalidParent { .. })
        ));
        assert_eq!(
            Chain::from_blocks(vec![chain.genesis().clone(), a.relabel_orphan()]),
            Err(ChainError::OrphanInChain(*a.hash()))
        );
        assert_eq!(Chain::from_blocks(chain.blocks().to_vec()).unwrap(), chain);
    }

    #[test]
    fn test_json_roundtrip_validates() {
        let (chain, _, _, _) = forked_chain();
        let json = serde_json::to_string(&chain).unwrap();
        let back: Chain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);

        // Dropping the middle block leaves dangling children
        let mut blocks: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        blocks.remove(1);
        let broken = serde_json::to_string(&blocks).unwrap();
        assert!(serde_json::from_str::<Chain>(&broken).is_err());
    }
}
