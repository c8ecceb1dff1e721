//! Game mechanics: condition evaluation and state deltas.

mod condition;
mod delta;

pub use condition::*;
pub use delta::*;
