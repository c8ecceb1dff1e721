//! Drink catalog and the order profile builder used by order scenes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default number of modifiers a single order may carry.
pub const MAX_MODIFIERS: usize = 2;

/// The four scalar axes of a drink profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileAxis {
    Alcohol,
    Sweet,
    Bitter,
    Stim,
}

impl ProfileAxis {
    pub const ALL: [ProfileAxis; 4] = [
        ProfileAxis::Alcohol,
        ProfileAxis::Sweet,
        ProfileAxis::Bitter,
        ProfileAxis::Stim,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ProfileAxis::Alcohol => "alcohol",
            ProfileAxis::Sweet => "sweet",
            ProfileAxis::Bitter => "bitter",
            ProfileAxis::Stim => "stim",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.key() == key)
    }
}

/// Aggregate numeric profile of a composed drink. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub alcohol: u32,
    pub sweet: u32,
    pub bitter: u32,
    pub stim: u32,
}

impl Profile {
    pub fn get(&self, axis: ProfileAxis) -> u32 {
        match axis {
            ProfileAxis::Alcohol => self.alcohol,
            ProfileAxis::Sweet => self.sweet,
            ProfileAxis::Bitter => self.bitter,
            ProfileAxis::Stim => self.stim,
        }
    }

    /// Shift one axis by a signed delta, flooring at zero. No ceiling.
    pub fn shift(&mut self, axis: ProfileAxis, delta: i32) {
        let slot = match axis {
            ProfileAxis::Alcohol => &mut self.alcohol,
            ProfileAxis::Sweet => &mut self.sweet,
            ProfileAxis::Bitter => &mut self.bitter,
            ProfileAxis::Stim => &mut self.stim,
        };
        *slot = (*slot as i64 + delta as i64).clamp(0, u32::MAX as i64) as u32;
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "alcohol {} sweet {} bitter {} stim {}",
            self.alcohol, self.sweet, self.bitter, self.stim
        )
    }
}

/// A base drink on the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseDrink {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub alcohol: u32,
    pub sweet: u32,
    pub bitter: u32,
    pub stim: u32,
    #[serde(default)]
    pub cost: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BaseDrink {
    pub fn profile(&self) -> Profile {
        Profile {
            alcohol: self.alcohol,
            sweet: self.sweet,
            bitter: self.bitter,
            stim: self.stim,
        }
    }
}

/// A modifier ("extra") layered on top of a base drink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extra {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub delta: BTreeMap<ProfileAxis, i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// What the player has composed so far in an order scene.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub drink_id: String,
    #[serde(default)]
    pub extra_ids: Vec<String>,
}

impl OrderDraft {
    pub fn new(drink_id: impl Into<String>) -> Self {
        Self {
            drink_id: drink_id.into(),
            extra_ids: Vec::new(),
        }
    }

    pub fn with_extra(mut self, extra_id: impl Into<String>) -> Self {
        self.extra_ids.push(extra_id.into());
        self
    }
}

/// A resolved order, consumed once by effect matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPayload {
    pub drink: BaseDrink,
    pub extras: Vec<Extra>,
    pub profile: Profile,
    /// Base tags followed by modifier tags. Not deduplicated.
    pub tags: Vec<String>,
}

impl OrderPayload {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// "Drink + Extra / Extra" label used in logs and history.
    pub fn label(&self) -> String {
        if self.extras.is_empty() {
            self.drink.name.clone()
        } else {
            let extras: Vec<&str> = self.extras.iter().map(|e| e.name.as_str()).collect();
            format!("{} + {}", self.drink.name, extras.join(" / "))
        }
    }
}

/// Errors building an order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("drink catalog is empty")]
    EmptyCatalog,
}

/// Combine a base drink with modifiers into a profile and tag list.
pub fn build_profile(base: &BaseDrink, modifiers: &[&Extra]) -> (Profile, Vec<String>) {
    let mut profile = base.profile();
    let mut tags = base.tags.clone();
    for extra in modifiers {
        for (axis, delta) in &extra.delta {
            profile.shift(*axis, *delta);
        }
        tags.extend(extra.tags.iter().cloned());
    }
    (profile, tags)
}

/// The full menu.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrinkCatalog {
    #[serde(default)]
    pub drinks: Vec<BaseDrink>,
    #[serde(default)]
    pub extras: Vec<Extra>,
}

impl DrinkCatalog {
    pub fn drink(&self, id: &str) -> Option<&BaseDrink> {
        self.drinks.iter().find(|d| d.id == id)
    }

    pub fn extra(&self, id: &str) -> Option<&Extra> {
        self.extras.iter().find(|e| e.id == id)
    }

    /// Draft used when an order scene is entered for the first time.
    pub fn default_draft(&self) -> OrderDraft {
        self.drinks
            .first()
            .map(|d| OrderDraft::new(d.id.clone()))
            .unwrap_or_default()
    }

    /// Resolve a draft into a payload.
    ///
    /// An unknown base id falls back to the first drink on the menu. Unknown
    /// and repeated modifier ids are skipped before the first `max_modifiers`
    /// distinct modifiers are taken.
    pub fn build_payload(
        &self,
        draft: &OrderDraft,
        max_modifiers: usize,
    ) -> Result<OrderPayload, OrderError> {
        let drink = self
            .drink(&draft.drink_id)
            .or_else(|| self.drinks.first())
            .ok_or(OrderError::EmptyCatalog)?;

        let mut extras: Vec<&Extra> = Vec::new();
        for extra in draft.extra_ids.iter().filter_map(|id| self.extra(id)) {
            if extras.len() == max_modifiers {
                break;
            }
            if !extras.iter().any(|e| e.id == extra.id) {
                extras.push(extra);
            }
        }

        let (profile, tags) = build_profile(drink, &extras);
        Ok(OrderPayload {
            drink: drink.clone(),
            extras: extras.into_iter().cloned().collect(),
            profile,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> DrinkCatalog {
        DrinkCatalog {
            drinks: vec![
                BaseDrink {
                    id: "sunless-zero".into(),
                    name: "Sunless Zero".into(),
                    desc: String::new(),
                    alcohol: 0,
                    sweet: 1,
                    bitter: 4,
                    stim: 5,
                    cost: 32,
                    tags: vec!["focus".into(), "corp".into(), "dry".into()],
                },
                BaseDrink {
                    id: "warm-shield".into(),
                    name: "Warm Shield".into(),
                    desc: String::new(),
                    alcohol: 1,
                    sweet: 4,
                    bitter: 1,
                    stim: 1,
                    cost: 30,
                    tags: vec!["safe".into(), "comfort".into()],
                },
            ],
            extras: vec![
                Extra {
                    id: "extra-ice".into(),
                    name: "Crushed Ice".into(),
                    desc: String::new(),
                    delta: [(ProfileAxis::Alcohol, -1), (ProfileAxis::Bitter, -1)]
                        .into_iter()
                        .collect(),
                    tags: vec!["safe".into()],
                },
                Extra {
                    id: "extra-citrus".into(),
                    name: "Citrus Peel".into(),
                    desc: String::new(),
                    delta: [(ProfileAxis::Stim, 1), (ProfileAxis::Bitter, 1)]
                        .into_iter()
                        .collect(),
                    tags: vec!["focus".into()],
                },
                Extra {
                    id: "extra-spice".into(),
                    name: "Spice".into(),
                    desc: String::new(),
                    delta: [(ProfileAxis::Stim, 2)].into_iter().collect(),
                    tags: vec!["risk".into()],
                },
            ],
        }
    }

    #[test]
    fn test_modifier_floors_at_zero() {
        let cat = catalog();
        let draft = OrderDraft::new("sunless-zero").with_extra("extra-ice");
        let payload = cat.build_payload(&draft, MAX_MODIFIERS).unwrap();
        assert_eq!(payload.profile.alcohol, 0);
        assert_eq!(payload.profile.bitter, 3);
    }

    #[test]
    fn test_no_ceiling() {
        let cat = catalog();
        let draft = OrderDraft::new("sunless-zero")
            .with_extra("extra-citrus")
            .with_extra("extra-spice");
        let payload = cat.build_payload(&draft, MAX_MODIFIERS).unwrap();
        assert_eq!(payload.profile.stim, 8);
    }

    #[test]
    fn test_tags_are_not_deduplicated() {
        let cat = catalog();
        let draft = OrderDraft::new("sunless-zero").with_extra("extra-citrus");
        let payload = cat.build_payload(&draft, MAX_MODIFIERS).unwrap();
        assert_eq!(payload.tags.iter().filter(|t| *t == "focus").count(), 2);
        assert!(payload.has_tag("corp"));
    }

    #[test]
    fn test_only_first_modifiers_count() {
        let cat = catalog();
        let draft = OrderDraft::new("warm-shield")
            .with_extra("extra-ice")
            .with_extra("extra-citrus")
            .with_extra("extra-spice");
        let payload = cat.build_payload(&draft, MAX_MODIFIERS).unwrap();
        assert_eq!(payload.extras.len(), 2);
        assert!(!payload.has_tag("risk"));
    }

    #[test]
    fn test_repeated_modifier_applies_once() {
        let cat = catalog();
        let draft = OrderDraft::new("warm-shield")
            .with_extra("extra-spice")
            .with_extra("extra-spice");
        let payload = cat.build_payload(&draft, MAX_MODIFIERS).unwrap();
        assert_eq!(payload.profile.stim, 3);
        assert_eq!(payload.extras.len(), 1);
        assert_eq!(payload.tags.iter().filter(|t| *t == "risk").count(), 1);
    }

    #[test]
    fn test_unknown_modifier_does_not_use_a_slot() {
        let cat = catalog();
        let draft = OrderDraft::new("warm-shield")
            .with_extra("extra-nothing")
            .with_extra("extra-ice")
            .with_extra("extra-spice");
        let payload = cat.build_payload(&draft, MAX_MODIFIERS).unwrap();
        let ids: Vec<&str> = payload.extras.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["extra-ice", "extra-spice"]);
        assert!(payload.has_tag("risk"));
    }

    #[test]
    fn test_unknown_ids() {
        let cat = catalog();
        let draft = OrderDraft::new("mystery").with_extra("extra-nothing");
        let payload = cat.build_payload(&draft, MAX_MODIFIERS).unwrap();
        assert_eq!(payload.drink.id, "sunless-zero");
        assert!(payload.extras.is_empty());
        assert_eq!(payload.label(), "Sunless Zero");
    }

    #[test]
    fn test_empty_catalog() {
        let cat = DrinkCatalog::default();
        assert_eq!(
            cat.build_payload(&OrderDraft::default(), MAX_MODIFIERS),
            Err(OrderError::EmptyCatalog)
        );
        assert_eq!(cat.default_draft(), OrderDraft::default());
    }

    #[test]
    fn test_label_lists_extras() {
        let cat = catalog();
        let draft = OrderDraft::new("warm-shield")
            .with_extra("extra-ice")
            .with_extra("extra-spice");
        let payload = cat.build_payload(&draft, MAX_MODIFIERS).unwrap();
        assert_eq!(payload.label(), "Warm Shield + Crushed Ice / Spice");
    }
}
