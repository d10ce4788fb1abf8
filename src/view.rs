// Text rendering of a block sequence

use crate::chain::Chain;
use crate::core::{Block, BlockKind};
use std::fmt::Write;

const FORK_INDENT: &str = "    \\_ ";

/// One line per block. A block that shares its predecessor's parent is a
/// sibling and is drawn indented in the fork lane.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut previous_parent = None;

    for (i, block) in blocks.iter().enumerate() {
        let sibling = !block.is_genesis() && previous_parent == Some(block.prev_hash());
        previous_parent = Some(block.prev_hash());

        let lane = if sibling { FORK_INDENT } else { "" };
        let prev = if block.is_genesis() {
            "-".repeat(8)
        } else {
            block.prev_hash().short()
        };
        let marker = match block.kind() {
            BlockKind::Genesis => "G",
            BlockKind::Normal => "#",
            BlockKind::Orphan => "x",
        };

        let _ = writeln!(
            out,
            "{lane}{marker} {i:>3} {hash} prev={prev} ts={ts} nonce={nonce} {body:?}",
            hash = block.hash().short(),
            ts = block.timestamp(),
            nonce = block.nonce(),
            body = block.body(),
        );
    }

    out
}

/// Chain summary followed by its blocks
pub fn render_chain(chain: &Chain) -> String {
    format!(
        "blocks={} height={} branches={}\n{}",
        chain.len(),
        chain.height(),
        chain.branch_count(),
        render_blocks(chain.blocks())
    )
}
