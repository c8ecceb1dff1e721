//! Field-by-field normalization of save data from any schema version.
//!
//! History of the format:
//! - v1: `current`, `score` over the six sub-axes, `flags` as an object of booleans.
//! - v2: `tendency` over the three axes.
//! - v3: `sceneId`, `tendencies`, `bgmOn`.
//! - v4: `bgmEnabled`, `savedAt`, `orderDrafts`, `dialogueHistory`, `clearedRuns`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use story_rules::{
    clamp_tendency, Axis, OrderDraft, RouteTable, SceneCursor, SubAxis, Tendencies,
};

use super::{Snapshot, SCHEMA_VERSION};

/// Result of normalizing raw save data.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    /// Always at [`SCHEMA_VERSION`].
    pub snapshot: Snapshot,
    pub from_version: u32,
}

/// Normalize a decoded JSON value into a current snapshot.
///
/// Missing or malformed fields take their new-game defaults; unknown fields
/// are ignored. Route ids the story does not define are dropped.
pub fn normalize(value: &Value, routes: &RouteTable) -> Migrated {
    let empty = Map::new();
    let data = value.as_object().unwrap_or(&empty);

    let from_version = data
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(1);
    if from_version > SCHEMA_VERSION {
        warn!(
            from_version,
            current = SCHEMA_VERSION,
            "save written by a newer version, reading best-effort"
        );
    }

    let scene_id = data
        .get("sceneId")
        .or_else(|| data.get("current"))
        .and_then(Value::as_str)
        .map(SceneCursor::from_id)
        .unwrap_or_default();

    let route_lock = data
        .get("routeLock")
        .and_then(Value::as_str)
        .filter(|id| routes.contains(id))
        .map(str::to_string);

    let mut unlocked_endings: Vec<String> = Vec::new();
    for id in strings(data.get("unlockedEndings")) {
        if routes.contains(&id) && !unlocked_endings.contains(&id) {
            unlocked_endings.push(id);
        }
    }

    let snapshot = Snapshot {
        schema_version: SCHEMA_VERSION,
        saved_at: data
            .get("savedAt")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        scene_id,
        tendencies: tendencies(data),
        flags: flags(data.get("flags")),
        inventory: dedup(strings(data.get("inventory"))),
        relations: relations(data.get("relations")),
        log: strings(data.get("log")),
        unlocked_endings,
        route_lock,
        choice_history: records(data.get("choiceHistory")),
        order_history: records(data.get("orderHistory")),
        order_drafts: drafts(data.get("orderDrafts")),
        path_history: strings(data.get("pathHistory")),
        dialogue_history: records(data.get("dialogueHistory")),
        cleared_runs: records(data.get("clearedRuns")),
        bgm_enabled: data
            .get("bgmEnabled")
            .or_else(|| data.get("bgmOn"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        bgm_volume: volume(data.get("bgmVolume")),
    };

    Migrated {
        snapshot,
        from_version,
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Entries that fail to deserialize are dropped individually.
fn records<T: DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Flags are a list of set names; v1 stored an object of booleans.
fn flags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, set)| set.as_bool() == Some(true))
            .map(|(name, _)| name.clone())
            .collect(),
        other => dedup(strings(other)),
    }
}

fn int(value: Option<&Value>) -> i64 {
    value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .unwrap_or(0)
}

fn tendencies(data: &Map<String, Value>) -> Tendencies {
    if let Some(axes) = data
        .get("tendencies")
        .or_else(|| data.get("tendency"))
        .and_then(Value::as_object)
    {
        return Tendencies::new(
            clamp_tendency(int(axes.get("rational"))),
            clamp_tendency(int(axes.get("cooperate"))),
            clamp_tendency(int(axes.get("explore"))),
        );
    }

    // v1 kept the six sub-axes separately.
    if let Some(score) = data.get("score").and_then(Value::as_object) {
        let mut raw = [0i64; 3];
        for sub in SubAxis::ALL {
            let slot = match sub.axis() {
                Axis::Rational => 0,
                Axis::Cooperate => 1,
                Axis::Explore => 2,
            };
            raw[slot] += i64::from(sub.sign()) * int(score.get(sub.key()));
        }
        return Tendencies::new(
            clamp_tendency(raw[0]),
            clamp_tendency(raw[1]),
            clamp_tendency(raw[2]),
        );
    }

    Tendencies::default()
}

fn relations(value: Option<&Value>) -> BTreeMap<String, i32> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(name, score)| {
                    let score = score.as_i64()?;
                    Some((name.clone(), i32::try_from(score).ok()?))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn drafts(value: Option<&Value>) -> BTreeMap<String, OrderDraft> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(scene, draft)| {
                    let draft: OrderDraft = serde_json::from_value(draft.clone()).ok()?;
                    Some((scene.clone(), draft))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn volume(value: Option<&Value>) -> f64 {
    match value.and_then(Value::as_f64) {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.5,
    }
}
