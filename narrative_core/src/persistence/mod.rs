//! Persistence - versioned snapshots of the player state.
//!
//! Snapshots are camelCase JSON. Reading never trusts the shape of the data:
//! every field is normalized on its own (see [`normalize`]), so old saves
//! load with defaults for what they lack and newer saves load best-effort.
//! Only text that is not a JSON object at all is rejected.

mod migrate;
mod store;

pub use migrate::*;
pub use store::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use story_rules::{
    ChoiceRecord, ClearedRun, DialogueLine, OrderDraft, OrderRecord, PlayerState, Preferences,
    RouteTable, SceneCursor, Tendencies,
};

/// Version written by this build.
pub const SCHEMA_VERSION: u32 = 4;

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Not even structured data; surfaced to the player as "save unreadable".
    #[error("save data is unreadable: {0}")]
    Unreadable(String),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("save store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The persisted form of a [`PlayerState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    pub scene_id: SceneCursor,
    pub tendencies: Tendencies,
    pub flags: Vec<String>,
    pub inventory: Vec<String>,
    pub relations: BTreeMap<String, i32>,
    pub log: Vec<String>,
    pub unlocked_endings: Vec<String>,
    pub route_lock: Option<String>,
    pub choice_history: Vec<ChoiceRecord>,
    pub order_history: Vec<OrderRecord>,
    pub order_drafts: BTreeMap<String, OrderDraft>,
    pub path_history: Vec<String>,
    pub dialogue_history: Vec<DialogueLine>,
    pub cleared_runs: Vec<ClearedRun>,
    pub bgm_enabled: bool,
    pub bgm_volume: f64,
}

impl Snapshot {
    /// Capture `state` at the current schema version, stamped with the current time.
    pub fn capture(state: &PlayerState) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            saved_at: Some(Utc::now()),
            scene_id: state.current.clone(),
            tendencies: state.tendencies,
            flags: state.flags.iter().cloned().collect(),
            inventory: state.inventory.iter().cloned().collect(),
            relations: state.relations.clone(),
            log: state.log.clone(),
            unlocked_endings: state.unlocked_endings.clone(),
            route_lock: state.route_lock.clone(),
            choice_history: state.choice_history.clone(),
            order_history: state.order_history.clone(),
            order_drafts: state.order_drafts.clone(),
            path_history: state.path_history.clone(),
            dialogue_history: state.dialogue_history.clone(),
            cleared_runs: state.cleared_runs.clone(),
            bgm_enabled: state.preferences.bgm_enabled,
            bgm_volume: state.preferences.bgm_volume,
        }
    }

    pub fn into_state(self) -> PlayerState {
        PlayerState {
            current: self.scene_id,
            tendencies: self.tendencies.clamped(),
            flags: self.flags.into_iter().collect(),
            inventory: self.inventory.into_iter().collect(),
            relations: self.relations,
            route_lock: self.route_lock,
            log: self.log,
            choice_history: self.choice_history,
            order_history: self.order_history,
            order_drafts: self.order_drafts,
            path_history: self.path_history,
            dialogue_history: self.dialogue_history,
            cleared_runs: self.cleared_runs,
            unlocked_endings: self.unlocked_endings,
            preferences: Preferences {
                bgm_enabled: self.bgm_enabled,
                bgm_volume: self.bgm_volume,
            },
        }
    }
}

/// Serialize `state` as a current-version snapshot.
pub fn encode(state: &PlayerState) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(&Snapshot::capture(state))?)
}

/// A decoded save.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    pub state: PlayerState,
    /// Schema version the data was written with.
    pub from_version: u32,
    pub saved_at: Option<DateTime<Utc>>,
}

/// Parse and normalize save text. `routes` decides which route ids are kept.
pub fn decode(text: &str, routes: &RouteTable) -> Result<Restored, PersistenceError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|err| PersistenceError::Unreadable(err.to_string()))?;
    if !value.is_object() {
        return Err(PersistenceError::Unreadable(
            "expected a JSON object".to_string(),
        ));
    }

    let migrated = normalize(&value, routes);
    Ok(Restored {
        from_version: migrated.from_version,
        saved_at: migrated.snapshot.saved_at,
        state: migrated.snapshot.into_state(),
    })
}

/// Normalize arbitrary save text and re-encode it at the current version.
pub fn rewrite(text: &str, routes: &RouteTable) -> Result<String, PersistenceError> {
    let restored = decode(text, routes)?;
    encode(&restored.state)
}
