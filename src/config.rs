// Simulator configuration

use crate::consensus::{DEFAULT_MAX_ATTEMPTS, Difficulty, DifficultyError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Difficulty(#[from] DifficultyError),

    #[error("fork probability must be within [0, 1], got {0}")]
    ForkProbability(f64),
}

/// Simulator settings. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Leading zero bits required for new blocks
    pub difficulty: u32,
    /// Chance that a mining round produces two sibling blocks
    pub fork_probability: f64,
    /// Safety bound on nonce attempts per search
    pub max_attempts: u64,
    /// Mine fork siblings on two threads
    pub parallel_mining: bool,
    /// Seed for the fork decision; random when absent
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            fork_probability: 0.1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            parallel_mining: false,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Load and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("Loading config from {}", path.display());
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.difficulty()?;
        check_fork_probability(self.fork_probability)?;
        Ok(())
    }

    pub fn difficulty(&self) -> Result<Difficulty, ConfigError> {
        Ok(Difficulty::new(self.difficulty)?)
    }
}

pub fn check_fork_probability(p: f64) -> Result<f64, ConfigError> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(ConfigError::ForkProbability(p))
    }
}
