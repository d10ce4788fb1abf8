// Proof of Work implementation

use crate::core::{Block, BlockHash, BlockTemplate, HASH_LEN, MinedSeal};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default safety bound on nonce attempts for a single search
pub const DEFAULT_MAX_ATTEMPTS: u64 = 10_000_000;

/// Largest meaningful difficulty: every bit of the digest is zero
pub const MAX_DIFFICULTY: u32 = (HASH_LEN * 8) as u32;

/// Invalid difficulty input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DifficultyError {
    #[error("difficulty must be a non-negative integer, got {0:?}")]
    NotAnInteger(String),

    #[error("difficulty {0} exceeds the 160-bit digest width")]
    OutOfRange(u64),
}

/// Proof-of-work search failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("no nonce found for difficulty {difficulty} after {attempts} attempts")]
    Timeout { difficulty: Difficulty, attempts: u64 },
}

/// Required number of leading zero bits in a block hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Difficulty(u32);

impl Difficulty {
    pub fn new(bits: u32) -> Result<Self, DifficultyError> {
        if bits > MAX_DIFFICULTY {
            return Err(DifficultyError::OutOfRange(bits as u64));
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Check if a hash meets this difficulty
    #[inline]
    pub fn is_met_by(&self, hash: &BlockHash) -> bool {
        hash.leading_zero_bits() >= self.0
    }

    /// Expected number of attempts to find a valid nonce
    pub fn expected_attempts(&self) -> f64 {
        2f64.powi(self.0 as i32)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Difficulty {
    type Err = DifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value: u64 = trimmed
            .parse()
            .map_err(|_| DifficultyError::NotAnInteger(trimmed.to_string()))?;

        if value > MAX_DIFFICULTY as u64 {
            return Err(DifficultyError::OutOfRange(value));
        }
        Ok(Self(value as u32))
    }
}

/// Mining result
#[derive(Debug, Clone)]
pub struct MiningResult {
    /// The nonce that was found
    pub nonce: u64,
    /// The resulting hash
    pub hash: BlockHash,
    /// Timestamp of the template that was sealed
    pub timestamp: u64,
    /// Number of attempts
    pub attempts: u64,
    /// Time taken
    pub duration: Duration,
}

impl MiningResult {
    /// Calculate hash rate (hashes per second)
    pub fn hash_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            return self.attempts as f64;
        }
        self.attempts as f64 / secs
    }

    pub fn seal(&self) -> MinedSeal {
        MinedSeal {
            hash: self.hash,
            nonce: self.nonce,
            timestamp: self.timestamp,
        }
    }
}

/// Proof of Work miner
#[derive(Debug, Clone, Copy)]
pub struct Miner {
    /// Safety bound on attempts per search
    pub max_attempts: u64,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl Miner {
    pub fn new(max_attempts: u64) -> Self {
        Self { max_attempts }
    }

    /// Mine a template by trying nonces 0, 1, 2, ...
    pub fn mine(
        &self,
        template: &BlockTemplate,
        difficulty: Difficulty,
    ) -> Result<MiningResult, MiningError> {
        self.search(template, difficulty, 0, 1)
    }

    /// Try nonces `start, start + step, start + 2*step, ...` until one
    /// satisfies `difficulty` or `max_attempts` is exhausted
    pub fn search(
        &self,
        template: &BlockTemplate,
        difficulty: Difficulty,
        start: u64,
        step: u64,
    ) -> Result<MiningResult, MiningError> {
        let start_time = Instant::now();
        let step = step.max(1);
        let mut nonce = start;
        let mut attempts = 0u64;

        log::debug!(
            "Searching nonces from {} step {} at difficulty {} (~{:.0} attempts expected)",
            start,
            step,
            difficulty,
            difficulty.expected_attempts()
        );

        while attempts < self.max_attempts {
            let hash = template.hash_with_nonce(nonce);
            attempts += 1;

            if difficulty.is_met_by(&hash) {
                log::debug!(
                    "Found nonce {} for difficulty {} after {} attempts",
                    nonce,
                    difficulty,
                    attempts
                );
                return Ok(MiningResult {
                    nonce,
                    hash,
                    timestamp: template.timestamp,
                    attempts,
                    duration: start_time.elapsed(),
                });
            }

            // Progress indicator every 100k attempts
            if attempts % 100_000 == 0 {
                let elapsed = start_time.elapsed();
                log::debug!(
                    "Mining attempts: {} ({:.1} KH/s)",
                    attempts,
                    attempts as f64 / elapsed.as_secs_f64() / 1000.0
                );
            }

            nonce = match nonce.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }

        log::warn!(
            "Mining gave up at difficulty {} after {} attempts",
            difficulty,
            attempts
        );
        Err(MiningError::Timeout {
            difficulty,
            attempts,
        })
    }

    /// Mine two sibling solutions for the same template.
    ///
    /// The searches run over disjoint nonce lanes (even and odd nonces), so
    /// the two hashes always differ and the outcome does not depend on
    /// whether the lanes run on separate threads. Both siblings carry the
    /// template's timestamp; they differ in nonce and hash only.
    pub fn mine_pair(
        &self,
        template: &BlockTemplate,
        difficulty: Difficulty,
        parallel: bool,
    ) -> Result<(MiningResult, MiningResult), MiningError> {
        if !parallel {
            let first = self.search(template, difficulty, 0, 2)?;
            let second = self.search(template, difficulty, 1, 2)?;
            return Ok((first, second));
        }

        let (first, second) = std::thread::scope(|scope| {
            let even = scope.spawn(|| self.search(template, difficulty, 0, 2));
            let odd = self.search(template, difficulty, 1, 2);
            let even = match even.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            (even, odd)
        });

        Ok((first?, second?))
    }

    /// Verify that a block carries a correct hash meeting `difficulty`
    pub fn verify(&self, block: &Block, difficulty: Difficulty) -> bool {
        block.verify_hash() && difficulty.is_met_by(block.hash())
    }
}
