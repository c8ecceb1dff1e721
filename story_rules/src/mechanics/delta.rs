//! State deltas - the only way choices and order outcomes change the player state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::state::{PlayerState, TendencyEffect};

/// Signed adjustment of one relationship score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelDelta {
    pub name: String,
    pub value: i32,
}

/// A declarative bundle of state changes.
///
/// Sub-deltas apply in a fixed order: set flags, clear flags, add items,
/// remove items, relationship, tendencies. A flag that is both set and cleared
/// in one delta therefore ends up cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDelta {
    #[serde(default)]
    pub set_flags: Vec<String>,
    #[serde(default)]
    pub clear_flags: Vec<String>,
    #[serde(default)]
    pub add_items: Vec<String>,
    #[serde(default)]
    pub remove_items: Vec<String>,
    #[serde(default)]
    pub rel: Option<RelDelta>,
    #[serde(default)]
    pub effect: TendencyEffect,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a delta from order-rule flag writes: `true` sets, `false` clears.
    pub fn from_flag_writes(writes: &BTreeMap<String, bool>) -> Self {
        let mut delta = Self::new();
        for (flag, value) in writes {
            if *value {
                delta.set_flags.push(flag.clone());
            } else {
                delta.clear_flags.push(flag.clone());
            }
        }
        delta
    }

    pub fn with_effect(mut self, effect: TendencyEffect) -> Self {
        self.effect = effect;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set_flags.is_empty()
            && self.clear_flags.is_empty()
            && self.add_items.is_empty()
            && self.remove_items.is_empty()
            && self.rel.is_none()
            && self.effect.is_empty()
    }

    /// Apply in place. No step can fail, so a caller never sees a half-applied delta.
    pub fn apply_to(&self, state: &mut PlayerState) {
        for flag in &self.set_flags {
            state.flags.insert(flag.clone());
        }
        for flag in &self.clear_flags {
            state.flags.remove(flag);
        }
        for item in &self.add_items {
            state.inventory.insert(item.clone());
        }
        for item in &self.remove_items {
            state.inventory.remove(item);
        }
        if let Some(rel) = &self.rel {
            let score = state.relations.entry(rel.name.clone()).or_insert(0);
            *score = score.saturating_add(rel.value);
        }
        state.tendencies.apply_effect(&self.effect);

        debug!(
            set = ?self.set_flags,
            cleared = ?self.clear_flags,
            tendencies = %state.tendencies,
            "applied state delta"
        );
    }

    /// Return a new state with the delta applied, leaving `state` untouched.
    pub fn applied(&self, state: &PlayerState) -> PlayerState {
        let mut next = state.clone();
        self.apply_to(&mut next);
        next
    }
}

/// Apply a delta to the state in place.
pub fn apply(state: &mut PlayerState, delta: &StateDelta) {
    delta.apply_to(state);
}
