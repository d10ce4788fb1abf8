// Crate-level error type

use crate::chain::ChainError;
use crate::config::ConfigError;
use crate::consensus::{DifficultyError, MiningError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("mining failed: {0}")]
    Mining(#[from] MiningError),

    #[error("chain rejected blocks: {0}")]
    Chain(#[from] ChainError),

    #[error("invalid difficulty: {0}")]
    Difficulty(#[from] DifficultyError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
