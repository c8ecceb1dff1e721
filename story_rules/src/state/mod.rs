//! Player state - the single mutable aggregate of a play session.

mod tendencies;

pub use tendencies::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::drinks::OrderDraft;

/// Sentinel scene id for the title screen.
pub const TITLE_SCENE: &str = "__TITLE__";

/// Sentinel scene id for "the story is over, resolve an ending".
pub const END_SCENE: &str = "END";

/// Where the player currently is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SceneCursor {
    #[default]
    Title,
    Scene(String),
    End,
}

impl SceneCursor {
    /// Parse a raw id, mapping the two sentinels.
    pub fn from_id(id: &str) -> Self {
        match id {
            TITLE_SCENE => SceneCursor::Title,
            END_SCENE => SceneCursor::End,
            other => SceneCursor::Scene(other.to_string()),
        }
    }

    pub fn as_id(&self) -> &str {
        match self {
            SceneCursor::Title => TITLE_SCENE,
            SceneCursor::End => END_SCENE,
            SceneCursor::Scene(id) => id,
        }
    }

    pub fn scene_id(&self) -> Option<&str> {
        match self {
            SceneCursor::Scene(id) => Some(id),
            _ => None,
        }
    }
}

impl std::fmt::Display for SceneCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_id())
    }
}

impl Serialize for SceneCursor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_id())
    }
}

impl<'de> Deserialize<'de> for SceneCursor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SceneCursor::from_id(&raw))
    }
}

/// Unique identifier for a completed playthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A choice the player made, as shown in history panels and ending summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRecord {
    /// Scene title at the time of the choice.
    pub scene: String,
    pub choice: String,
}

/// A drink served during an order scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub npc: String,
    pub drink: String,
    #[serde(default)]
    pub extras: Vec<String>,
}

/// A rendered line of narration kept for the dialogue history panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub scene: String,
    pub speaker: String,
    pub text: String,
}

/// Record of one finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedRun {
    pub run_id: RunId,
    pub route: String,
    pub choices: usize,
    pub scenes_visited: usize,
}

/// Audio/UI preferences. Carried through saves, never read by game logic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub bgm_enabled: bool,
    /// Volume from 0.0 to 1.0.
    pub bgm_volume: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            bgm_enabled: false,
            bgm_volume: 0.5,
        }
    }
}

/// The complete state of one play session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub current: SceneCursor,

    pub tendencies: Tendencies,

    /// Names of flags that are currently set. An absent flag is false.
    pub flags: BTreeSet<String>,

    pub inventory: BTreeSet<String>,

    /// NPC key -> relationship score. Unclamped.
    pub relations: BTreeMap<String, i32>,

    /// Frozen ending route, once locked.
    pub route_lock: Option<String>,

    pub log: Vec<String>,
    pub choice_history: Vec<ChoiceRecord>,
    pub order_history: Vec<OrderRecord>,
    /// Half-composed orders keyed by order scene id.
    pub order_drafts: BTreeMap<String, OrderDraft>,
    pub path_history: Vec<String>,
    pub dialogue_history: Vec<DialogueLine>,
    pub cleared_runs: Vec<ClearedRun>,
    pub unlocked_endings: Vec<String>,

    pub preferences: Preferences,
}

impl PlayerState {
    /// Create a blank state on the title screen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state with every known relationship seeded at zero.
    pub fn with_relations<I, S>(relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = Self::new();
        for name in relations {
            state.relations.insert(name.into(), 0);
        }
        state
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.inventory.contains(item)
    }

    /// Relationship score, zero when the NPC was never adjusted.
    pub fn relation(&self, name: &str) -> i32 {
        self.relations.get(name).copied().unwrap_or(0)
    }

    /// Append to the play log, dropping the oldest entries beyond `capacity`.
    pub fn push_log(&mut self, line: impl Into<String>, capacity: usize) {
        self.log.push(line.into());
        if self.log.len() > capacity {
            let overflow = self.log.len() - capacity;
            self.log.drain(..overflow);
        }
    }

    /// Append to the dialogue history, dropping the oldest entries beyond `capacity`.
    pub fn push_dialogue(&mut self, line: DialogueLine, capacity: usize) {
        self.dialogue_history.push(line);
        if self.dialogue_history.len() > capacity {
            let overflow = self.dialogue_history.len() - capacity;
            self.dialogue_history.drain(..overflow);
        }
    }

    /// Record an unlocked ending once.
    pub fn unlock_ending(&mut self, route: &str) {
        if !self.unlocked_endings.iter().any(|r| r == route) {
            self.unlocked_endings.push(route.to_string());
        }
    }

    /// Reset everything a new game resets, keeping cross-run progress
    /// (unlocked endings, cleared runs) and preferences.
    pub fn reset_for_new_game(&mut self, start: SceneCursor) {
        let relation_names: Vec<String> = self.relations.keys().cloned().collect();
        let kept_endings = std::mem::take(&mut self.unlocked_endings);
        let kept_runs = std::mem::take(&mut self.cleared_runs);
        let preferences = self.preferences;

        *self = Self::with_relations(relation_names);
        self.current = start;
        self.unlocked_endings = kept_endings;
        self.cleared_runs = kept_runs;
        self.preferences = preferences;
    }
}
