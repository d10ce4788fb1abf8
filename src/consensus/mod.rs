// Consensus logic

pub mod pow;

pub use pow::{
    DEFAULT_MAX_ATTEMPTS, Difficulty, DifficultyError, MAX_DIFFICULTY, Miner, MiningError,
    MiningResult,
};
