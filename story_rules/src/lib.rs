//! # Story Rules
//!
//! The "Story Bible" crate - the player state and every pure rule that reads or
//! writes it: condition evaluation, state deltas, ending routes and the drink
//! profile builder used by order scenes.
//!
//! Nothing in here performs I/O. Scene content, persistence and orchestration
//! live in `narrative_core`.

pub mod drinks;
pub mod mechanics;
pub mod routes;
pub mod state;

pub use drinks::*;
pub use mechanics::*;
pub use routes::*;
pub use state::*;
