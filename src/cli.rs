// CLI commands

use crate::consensus::{Difficulty, Miner};
use crate::core::{BlockHash, BlockTemplate, now_millis};
use crate::{SimConfig, Simulator, view};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fork-sim")]
#[command(about = "Proof-of-work and fork simulator", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct GlobalOptions {
    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Required leading zero bits
    #[arg(short, long, global = true)]
    pub difficulty: Option<Difficulty>,

    /// Chance of mining two sibling blocks per round
    #[arg(long, global = true)]
    pub fork_probability: Option<f64>,

    /// Give up a nonce search after this many attempts
    #[arg(long, global = true)]
    pub max_attempts: Option<u64>,

    /// Seed for fork decisions
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Mine fork siblings on two threads
    #[arg(long, global = true)]
    pub parallel: bool,
}

impl GlobalOptions {
    /// Config file (or defaults) with command-line overrides applied
    pub fn resolve(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };

        if let Some(d) = self.difficulty {
            config.difficulty = d.bits();
        }
        if let Some(p) = self.fork_probability {
            config.fork_probability = p;
        }
        if let Some(n) = self.max_attempts {
            config.max_attempts = n;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.parallel {
            config.parallel_mining = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mine one block body on top of a parent hash and print the seal
    Mine {
        /// Parent block hash (40 hex chars)
        #[arg(long)]
        parent: BlockHash,
        /// Block body
        #[arg(long, default_value = "")]
        body: String,
        /// Fixed timestamp in ms (defaults to now)
        #[arg(long)]
        timestamp: Option<u64>,
    },

    /// Mine a number of rounds and print the resulting chain
    Simulate {
        /// Mining rounds
        #[arg(short = 'n', long, default_value = "10")]
        blocks: usize,
        /// Print the chain as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive session reading commands from stdin
    Repl,
}

#[derive(Serialize)]
struct MineReport {
    hash: BlockHash,
    nonce: u64,
    timestamp: u64,
    attempts: u64,
}

/// One line of REPL input
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Add(String),
    Difficulty(Difficulty),
    ForkProbability(f64),
    OrphanMode,
    Orphan(String),
    Show,
    Json,
    Validate,
    Help,
    Quit,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };

        let command = match word {
            "add" => ReplCommand::Add(rest.to_string()),
            "difficulty" => ReplCommand::Difficulty(rest.parse()?),
            "fork" => ReplCommand::ForkProbability(
                rest.parse().map_err(|_| anyhow!("expected a probability, got {:?}", rest))?,
            ),
            "orphan-mode" => ReplCommand::OrphanMode,
            "orphan" if rest.is_empty() => bail!("usage: orphan <hash or prefix>"),
            "orphan" => ReplCommand::Orphan(rest.to_string()),
            "show" => ReplCommand::Show,
            "json" => ReplCommand::Json,
            "validate" => ReplCommand::Validate,
            "help" => ReplCommand::Help,
            "quit" | "exit" => ReplCommand::Quit,
            other => bail!("unknown command {:?}, try 'help'", other),
        };

        Ok(Some(command))
    }
}

const REPL_HELP: &str = "\
commands:
  add <body>           mine a block on the tip (may fork)
  difficulty <n>       set required leading zero bits
  fork <p>             set fork probability
  orphan-mode          arm orphan mode for the next 'orphan'
  orphan <hash>        prune a block (hash or unique prefix) and its descendants
  show                 print the chain
  json                 print the chain as JSON
  validate             re-check chain invariants
  quit";

/// CLI handler
pub struct CliHandler {
    config: SimConfig,
}

impl CliHandler {
    pub fn new(options: &GlobalOptions) -> Result<Self> {
        Ok(Self {
            config: options.resolve()?,
        })
    }

    /// Handle CLI command
    pub fn handle(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Mine {
                parent,
                body,
                timestamp,
            } => self.mine(parent, &body, timestamp),
            Commands::Simulate { blocks, json } => self.simulate(blocks, json),
            Commands::Repl => {
                let stdin = std::io::stdin();
                self.repl(stdin.lock(), std::io::stdout())
            }
        }
    }

    fn mine(&self, parent: BlockHash, body: &str, timestamp: Option<u64>) -> Result<()> {
        let difficulty = self.config.difficulty()?;
        let template = BlockTemplate::new(parent, timestamp.unwrap_or_else(now_millis), body);
        let result = Miner::new(self.config.max_attempts).mine(&template, difficulty)?;

        let report = MineReport {
            hash: result.hash,
            nonce: result.nonce,
            timestamp: result.timestamp,
            attempts: result.attempts,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    fn simulate(&self, rounds: usize, json: bool) -> Result<()> {
        let mut sim = Simulator::new(&self.config)?;

        for i in 1..=rounds {
            sim.add_block(&format!("block {}", i))
                .with_context(|| format!("round {} failed", i))?;
        }

        if json {
            println!("{}", serde_json::to_string_pretty(sim.chain())?);
        } else {
            print!("{}", view::render_chain(sim.chain()));
        }
        Ok(())
    }

    /// Run the interactive loop until EOF or `quit`
    pub fn repl<R: BufRead, W: Write>(&self, input: R, mut out: W) -> Result<()> {
        let mut sim = Simulator::new(&self.config)?;
        writeln!(out, "difficulty {}, type 'help' for commands", sim.difficulty())?;

        for line in input.lines() {
            let line = line?;
            let command = match ReplCommand::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    writeln!(out, "error: {}", e)?;
                    continue;
                }
            };

            if command == ReplCommand::Quit {
                break;
            }
            if let Err(e) = Self::apply(&mut sim, command, &mut out) {
                writeln!(out, "error: {}", e)?;
            }
        }

        Ok(())
    }

    fn apply<W: Write>(sim: &mut Simulator, command: ReplCommand, out: &mut W) -> Result<()> {
        match command {
            ReplCommand::Add(body) => {
                let outcome = sim.add_block(&body)?;
                let mined: Vec<String> = outcome.mined.iter().map(|h| h.short()).collect();
                if outcome.forked {
                    writeln!(out, "fork! mined {}", mined.join(" and "))?;
                } else {
                    writeln!(out, "mined {}", mined.join(""))?;
                }
            }
            ReplCommand::Difficulty(d) => {
                sim.set_difficulty(d);
                writeln!(out, "difficulty {}", d)?;
            }
            ReplCommand::ForkProbability(p) => {
                sim.set_fork_probability(p)?;
                writeln!(out, "fork probability {}", p)?;
            }
            ReplCommand::OrphanMode => {
                sim.arm_orphan_mode();
                writeln!(out, "orphan mode armed")?;
            }
            ReplCommand::Orphan(prefix) => {
                if !sim.orphan_mode() {
                    bail!("orphan mode is not armed, run 'orphan-mode' first");
                }

                let target = {
                    let matches = sim.chain().find_by_prefix(&prefix);
                    let found = match matches.as_slice() {
                        [block] => Ok(*block.hash()),
                        [] => Err(anyhow!("no block matches {:?}", prefix)),
                        _ => Err(anyhow!("{:?} matches {} blocks", prefix, matches.len())),
                    };
                    found
                };
                let target = match target {
                    Ok(target) => target,
                    Err(e) => {
                        // A miss still consumes the armed mode
                        sim.disarm_orphan_mode();
                        return Err(e);
                    }
                };

                let before = sim.chain().len();
                if sim.orphan(&target) {
                    writeln!(out, "orphaned {} block(s)", before - sim.chain().len())?;
                } else {
                    writeln!(out, "nothing orphaned")?;
                }
            }
            ReplCommand::Show => write!(out, "{}", view::render_chain(sim.chain()))?,
            ReplCommand::Json => writeln!(out, "{}", serde_json::to_string_pretty(sim.chain())?)?,
            ReplCommand::Validate => {
                sim.chain().validate()?;
                writeln!(out, "chain ok")?;
            }
            ReplCommand::Help => writeln!(out, "{}", REPL_HELP)?,
            ReplCommand::Quit => {}
        }
        Ok(())
    }
}
