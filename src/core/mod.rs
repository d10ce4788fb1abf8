// Core chain data structures

mod types;
mod block;
mod serialize;
mod hash;

pub use types::*;
pub use block::*;
pub use serialize::*;
pub use hash::*;
