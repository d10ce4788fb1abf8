// Educational proof-of-work and fork simulator

pub mod core;
pub mod consensus;
pub mod chain;
pub mod config;
pub mod error;
pub mod simulation;
pub mod view;
pub mod cli;

// Re-exports for convenience
pub use crate::core::{Block, BlockHash, BlockKind, BlockTemplate, MinedSeal};
pub use crate::consensus::{Difficulty, Miner, MiningError, MiningResult};
pub use crate::chain::{
    Chain, ChainError, append_blocks, create_chain, mine, mine_fork, mine_fork_with, mine_with, orphan,
};
pub use crate::config::SimConfig;
pub use crate::error::SimError;
pub use crate::simulation::{AddOutcome, Simulator};
pub use crate::cli::{Cli, CliHandler};
