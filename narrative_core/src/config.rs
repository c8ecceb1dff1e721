//! Engine configuration, overridable from the `[engine]` table of the story manifest.

use serde::{Deserialize, Serialize};
use story_rules::MAX_MODIFIERS;

/// Tunables for a play session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Scene a new game starts at.
    pub start_scene: String,

    /// Maximum number of play log entries kept; oldest are dropped.
    pub log_capacity: usize,

    /// Maximum number of dialogue history entries kept.
    pub dialogue_capacity: usize,

    /// How many recent choices the ending summary lists.
    pub recent_choices_in_summary: usize,

    /// Modifiers allowed per order.
    pub max_modifiers: usize,

    /// Save to the `auto` slot after every transition.
    pub autosave: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_scene: "s00".to_string(),
            log_capacity: 140,
            dialogue_capacity: 200,
            recent_choices_in_summary: 8,
            max_modifiers: MAX_MODIFIERS,
            autosave: true,
        }
    }
}
