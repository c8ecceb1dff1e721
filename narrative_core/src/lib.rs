//! # Narrative Core
//!
//! The runtime half of the Neon Tape engine. This crate loads the declarative
//! story content, drives a play session over it, persists the player state and
//! checks the content offline before it ships.
//!
//! ## Core Components
//!
//! - **content**: TOML authoring format, fragment loader and compiler
//! - **scene_graph**: the compiled, immutable graph of scenes and choices
//! - **order**: order scenes - drink profile predicates and outcome rules
//! - **session**: the play loop that owns and mutates the player state
//! - **persistence**: versioned snapshots, migration and save slots
//! - **validator**: the static graph validator behind `validate_story`
//! - **balance**: choice-effect aggregates behind `balance_report`
//! - **events**: what each player action caused
//!
//! ## Design Philosophy
//!
//! - **Data-Driven**: the graph is authored content; the engine never hardcodes scenes
//! - **Validated Offline**: authoring errors are caught by the validator, not at play time
//! - **Forgiving at Runtime**: a bad save or a missing scene degrades to the title screen

pub mod balance;
pub mod config;
pub mod content;
pub mod events;
pub mod order;
pub mod persistence;
pub mod scene_graph;
pub mod session;
pub mod validator;

pub use balance::BalanceReport;
pub use config::*;
pub use content::*;
pub use events::*;
pub use order::*;
pub use persistence::*;
pub use scene_graph::*;
pub use session::*;
pub use validator::{validate, validate_path, Report, ValidatorOptions};
