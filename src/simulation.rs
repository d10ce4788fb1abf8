// Interactive simulation state: current chain, difficulty, fork policy, orphan mode

use crate::chain::Chain;
use crate::config::{SimConfig, check_fork_probability};
use crate::consensus::{Difficulty, Miner};
use crate::core::{Block, BlockHash, BlockTemplate, now_millis};
use crate::error::SimError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Blocks produced by one mining round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub mined: Vec<BlockHash>,
    pub forked: bool,
}

/// Single-writer owner of the published chain.
///
/// Mines on the most recently added block, occasionally producing two
/// sibling blocks at once, and prunes branches only after orphan mode has
/// been armed.
pub struct Simulator {
    chain: Chain,
    difficulty: Difficulty,
    fork_probability: f64,
    orphan_mode: bool,
    parallel: bool,
    miner: Miner,
    rng: StdRng,
}

impl Simulator {
    pub fn new(config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            chain: Chain::new(),
            difficulty: config.difficulty()?,
            fork_probability: config.fork_probability,
            orphan_mode: false,
            parallel: config.parallel_mining,
            miner: Miner::new(config.max_attempts),
            rng,
        })
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        log::info!("Difficulty {} -> {}", self.difficulty, difficulty);
        self.difficulty = difficulty;
    }

    pub fn fork_probability(&self) -> f64 {
        self.fork_probability
    }

    pub fn set_fork_probability(&mut self, p: f64) -> Result<(), SimError> {
        self.fork_probability = check_fork_probability(p)?;
        Ok(())
    }

    pub fn orphan_mode(&self) -> bool {
        self.orphan_mode
    }

    /// Allow the next `orphan` call to prune
    pub fn arm_orphan_mode(&mut self) {
        self.orphan_mode = true;
    }

    /// Cancel an armed orphan mode without pruning
    pub fn disarm_orphan_mode(&mut self) {
        self.orphan_mode = false;
    }

    /// Mine on the tip, forking with the configured probability
    pub fn add_block(&mut self, body: &str) -> Result<AddOutcome, SimError> {
        let fork = self.rng.gen_bool(self.fork_probability);
        self.add_block_with(body, fork)
    }

    /// Mine on the tip with an explicit fork decision.
    ///
    /// The chain is only replaced once every search has succeeded.
    pub fn add_block_with(&mut self, body: &str, fork: bool) -> Result<AddOutcome, SimError> {
        let parent = *self.chain.tip().hash();
        let template = BlockTemplate::new(parent, now_millis(), body);

        let blocks = if fork {
            let (first, second) = self.miner.mine_pair(&template, self.difficulty, self.parallel)?;
            log::info!(
                "Fork on {}: mined {} and {}",
                parent.short(),
                first.hash.short(),
                second.hash.short()
            );
            vec![
                Block::mined(parent, body, first.seal()),
                Block::mined(parent, body, second.seal()),
            ]
        } else {
            let result = self.miner.mine(&template, self.difficulty)?;
            log::info!(
                "Mined {} on {} in {} attempts ({:?})",
                result.hash.short(),
                parent.short(),
                result.attempts,
                result.duration
            );
            vec![Block::mined(parent, body, result.seal())]
        };

        let mined = blocks.iter().map(|b| *b.hash()).collect();
        self.chain = self.chain.append(blocks)?;

        Ok(AddOutcome { mined, forked: fork })
    }

    /// Prune `target` and its descendants if orphan mode is armed.
    ///
    /// Orphan mode is disarmed by every call. Returns whether the chain changed.
    pub fn orphan(&mut self, target: &BlockHash) -> bool {
        if !self.orphan_mode {
            log::debug!("Ignoring orphan request for {}: orphan mode not armed", target.short());
            return false;
        }
        self.orphan_mode = false;

        let next = self.chain.orphan(target);
        let changed = next.len() != self.chain.len();
        self.chain = next;
        changed
    }
}
