//! Story content: the TOML authoring format, the fragment loader and the
//! compiler that turns it into a [`Story`].
//!
//! The runtime, the validator and the balance report all read content
//! through [`load_content`], so what is validated is exactly what ships.

mod compile;
mod diagnostics;
mod loader;
pub mod raw;

pub use compile::*;
pub use diagnostics::*;
pub use loader::*;

use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use story_rules::{DrinkCatalog, PlayerState, RouteTable};

use crate::config::EngineConfig;
use crate::scene_graph::SceneGraph;

/// The closed sets of legal flag, item and relationship names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    pub flags: BTreeSet<String>,
    pub items: BTreeSet<String>,
    pub relations: BTreeSet<String>,
}

impl Whitelist {
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.items.contains(name)
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains(name)
    }
}

/// Errors loading a story for play.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Files could not be read or parsed, or includes form a cycle.
    #[error("story content could not be read: {}", first_line(.0))]
    Unreadable(Vec<Diagnostic>),

    /// Files parsed but do not describe a well-formed story.
    #[error("story content has {} authoring error(s), first: {}", .0.len(), first_line(.0))]
    Invalid(Vec<Diagnostic>),
}

impl ContentError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ContentError::Unreadable(diagnostics) | ContentError::Invalid(diagnostics) => {
                diagnostics
            }
        }
    }
}

fn first_line(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// A compiled story, immutable for the lifetime of a session.
#[derive(Debug, Clone, Default)]
pub struct Story {
    pub graph: SceneGraph,
    pub routes: RouteTable,
    pub drinks: DrinkCatalog,
    pub whitelist: Whitelist,
    pub config: EngineConfig,
}

impl Story {
    /// Load and compile the story rooted at `manifest`.
    ///
    /// Schema problems fail the load. Semantic checks (dangling transitions,
    /// whitelists, routes) are the validator's job.
    pub fn load(manifest: impl AsRef<Path>) -> Result<Self, ContentError> {
        let content = load_content(manifest.as_ref());
        if content.has_problems() {
            return Err(ContentError::Unreadable(content.problems));
        }
        let compiled = compile(&content);
        if !compiled.diagnostics.is_empty() {
            return Err(ContentError::Invalid(compiled.diagnostics));
        }

        let story = compiled.story;
        info!(
            scenes = story.graph.len(),
            routes = story.routes.len(),
            drinks = story.drinks.drinks.len(),
            "story loaded"
        );
        Ok(story)
    }

    /// A blank state on the title screen with every whitelisted relationship at zero.
    pub fn initial_state(&self) -> PlayerState {
        PlayerState::with_relations(self.whitelist.relations.iter().cloned())
    }

    /// Make sure every whitelisted relationship has a score.
    pub fn seed_relations(&self, state: &mut PlayerState) {
        for name in &self.whitelist.relations {
            state.relations.entry(name.clone()).or_insert(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_rejects_unreadable_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = Story::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ContentError::Unreadable(_)));
        assert_eq!(err.diagnostics()[0].code, DiagnosticCode::ReadFile);
    }

    #[test]
    fn test_load_rejects_schema_errors() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("story.toml");
        fs::write(&manifest, "[scenes.s00]\ntype = \"dialogue\"\n").unwrap();
        let err = Story::load(&manifest).unwrap_err();
        assert!(matches!(err, ContentError::Invalid(_)));
        assert!(err.to_string().starts_with("story content has "));
    }

    #[test]
    fn test_initial_state_seeds_relations() {
        let mut story = Story::default();
        story.whitelist.relations.insert("hacker".into());
        story.whitelist.relations.insert("liaison".into());
        let mut state = story.initial_state();
        assert_eq!(state.relations.len(), 2);
        assert_eq!(state.relation("hacker"), 0);

        state.relations.remove("liaison");
        story.seed_relations(&mut state);
        assert!(state.relations.contains_key("liaison"));
    }
}
