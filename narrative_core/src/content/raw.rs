//! Authoring format as written in the TOML content files.
//!
//! These structs are deliberately loose: conditions, predicates and effect
//! tables stay as raw TOML so that the compiler can report every unknown key
//! instead of failing on the first one.

use serde::Deserialize;
use std::collections::BTreeMap;
use story_rules::{BaseDrink, Route};

use crate::config::EngineConfig;

/// One content file: the manifest or a fragment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    /// Further fragments, relative to this file.
    #[serde(default)]
    pub fragments: Vec<String>,
    #[serde(default)]
    pub whitelist: Option<RawWhitelist>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub engine: Option<EngineConfig>,
    /// Path of the drink catalog, relative to the manifest.
    #[serde(default)]
    pub drinks: Option<String>,
    #[serde(default)]
    pub scenes: BTreeMap<String, RawScene>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWhitelist {
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub relations: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScene {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub speaker: Option<String>,
    pub bg: Option<String>,
    pub text: Option<RawText>,
    #[serde(default)]
    pub choices: Vec<RawChoice>,
    pub expression: Option<String>,
    pub request: Option<String>,
    pub note: Option<String>,
    pub npc_key: Option<String>,
    pub next: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "if")]
    pub if_: Option<toml::Value>,
    pub requires: Option<toml::Value>,
    #[serde(default)]
    pub effects: Vec<RawEffectRule>,
    pub default: Option<RawEffectRule>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

/// Scene text: a literal string or a list of segments.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawText {
    Plain(String),
    Segments { segments: Vec<RawSegment> },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSegment {
    pub text: Option<String>,
    #[serde(rename = "if")]
    pub if_: Option<toml::Value>,
    pub then: Option<String>,
    #[serde(rename = "else")]
    pub else_: Option<String>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChoice {
    pub text: Option<String>,
    #[serde(rename = "if")]
    pub if_: Option<toml::Value>,
    pub requires: Option<toml::Value>,
    /// Sub-axis steps in authored order.
    #[serde(default)]
    pub effect: toml::Table,
    #[serde(default)]
    pub set_flags: Vec<String>,
    #[serde(default)]
    pub clear_flags: Vec<String>,
    #[serde(default)]
    pub add_item: Vec<String>,
    #[serde(default)]
    pub remove_item: Vec<String>,
    pub rel: Option<RawRel>,
    #[serde(default)]
    pub route_lock: bool,
    pub next: Option<String>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRel {
    pub name: String,
    #[serde(default)]
    pub value: i64,
}

/// One outcome rule of an order scene. Without `when` it is the catch-all.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEffectRule {
    pub id: Option<String>,
    pub when: Option<toml::Value>,
    /// Sub-axis steps in authored order.
    #[serde(default)]
    pub effect: toml::Table,
    /// Flag writes: `true` sets, `false` clears.
    #[serde(default)]
    pub set_flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub reply: String,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

/// The drink catalog file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCatalog {
    #[serde(default)]
    pub drinks: Vec<BaseDrink>,
    #[serde(default)]
    pub extras: Vec<RawExtra>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExtra {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub delta: BTreeMap<String, i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}
