//! Order scenes - the player composes a drink and the scene's outcome rules
//! pick exactly one result.
//!
//! Rules are tested in authored order and the first match wins. Every order
//! scene carries a mandatory `fallback` outcome, so resolution always yields
//! something even when no rule matches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use story_rules::{Condition, OrderPayload, PlayerState, ProfileAxis, StateDelta, TendencyEffect};

/// Keys an order-rule `when` table may use.
pub const PREDICATE_KEYS: [&str; 5] = ["min", "max", "tagsAny", "tagsAll", "state"];

/// Predicate over `{profile, tags, state}`.
///
/// An empty predicate always matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPredicate {
    /// Inclusive lower bounds per profile axis.
    pub min: BTreeMap<ProfileAxis, u32>,
    /// Inclusive upper bounds per profile axis.
    pub max: BTreeMap<ProfileAxis, u32>,
    /// At least one of these tags must be present (if non-empty).
    pub tags_any: Vec<String>,
    /// All of these tags must be present.
    pub tags_all: Vec<String>,
    pub state: Option<Condition>,
}

impl OrderPredicate {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn is_catch_all(&self) -> bool {
        self.min.is_empty()
            && self.max.is_empty()
            && self.tags_any.is_empty()
            && self.tags_all.is_empty()
            && self.state.as_ref().map_or(true, Condition::is_unconditional)
    }

    pub fn matches(&self, payload: &OrderPayload, state: &PlayerState) -> bool {
        let profile = &payload.profile;
        let min_ok = self
            .min
            .iter()
            .all(|(axis, bound)| profile.get(*axis) >= *bound);
        let max_ok = self
            .max
            .iter()
            .all(|(axis, bound)| profile.get(*axis) <= *bound);
        let any_ok =
            self.tags_any.is_empty() || self.tags_any.iter().any(|tag| payload.has_tag(tag));
        let all_ok = self.tags_all.iter().all(|tag| payload.has_tag(tag));
        let state_ok = story_rules::evaluate(state, self.state.as_ref());

        min_ok && max_ok && any_ok && all_ok && state_ok
    }
}

/// What happens when a rule fires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub id: String,
    pub effect: TendencyEffect,
    /// `true` sets the flag, `false` clears it.
    pub flag_writes: BTreeMap<String, bool>,
    pub reply: String,
}

impl OrderOutcome {
    /// The state delta this outcome applies.
    pub fn delta(&self) -> StateDelta {
        StateDelta::from_flag_writes(&self.flag_writes).with_effect(self.effect.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRule {
    pub when: OrderPredicate,
    pub outcome: OrderOutcome,
}

/// Interaction data of an order scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderScene {
    /// What the customer asks for.
    pub request: String,
    /// Hint shown under the request.
    pub note: Option<String>,
    /// NPC credited in the order history; defaults to the speaker.
    pub npc_key: Option<String>,
    pub rules: Vec<EffectRule>,
    pub fallback: OrderOutcome,
}

/// Result of matching an order against a scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub outcome: &'a OrderOutcome,
    /// Index of the rule that fired; `None` when the fallback was used.
    pub rule_index: Option<usize>,
}

impl Resolution<'_> {
    pub fn used_fallback(&self) -> bool {
        self.rule_index.is_none()
    }
}

/// Pick the first matching rule, or the fallback.
pub fn resolve_outcome<'a>(
    scene: &'a OrderScene,
    payload: &OrderPayload,
    state: &PlayerState,
) -> Resolution<'a> {
    let hit = scene
        .rules
        .iter()
        .position(|rule| rule.when.matches(payload, state));

    let resolution = match hit {
        Some(index) => Resolution {
            outcome: &scene.rules[index].outcome,
            rule_index: Some(index),
        },
        None => Resolution {
            outcome: &scene.fallback,
            rule_index: None,
        },
    };
    debug!(
        outcome = %resolution.outcome.id,
        profile = %payload.profile,
        "resolved order"
    );
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_rules::{BaseDrink, DrinkCatalog, Extra, OrderDraft, SubAxis, MAX_MODIFIERS};

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
                    tags: vec!["focus".into(), "corp".into()],
                },
                BaseDrink {
                    id: "neon-velvet".into(),
                    name: "Neon Velvet".into(),
                    desc: String::new(),
                    alcohol: 3,
                    sweet: 5,
                    bitter: 1,
                    stim: 2,
                    cost: 45,
                    tags: vec!["comfort".into(), "sweet".into()],
                },
            ],
            extras: vec![Extra {
                id: "extra-syrup".into(),
                name: "Double Syrup".into(),
                desc: String::new(),
                delta: [(ProfileAxis::Sweet, 2), (ProfileAxis::Stim, -1)]
                    .into_iter()
                    .collect(),
                tags: vec!["comfort".into()],
            }],
        }
    }

    fn outcome(id: &str, flag: &str, value: bool) -> OrderOutcome {
        OrderOutcome {
            id: id.to_string(),
            effect: TendencyEffect::new().with(SubAxis::Logic, 1),
            flag_writes: [(flag.to_string(), value)].into_iter().collect(),
            reply: format!("reply {id}"),
        }
    }

    fn liaison_scene() -> OrderScene {
        OrderScene {
            request: "Keep me sharp.".into(),
            note: None,
            npc_key: Some("liaison".into()),
            rules: vec![
                EffectRule {
                    when: OrderPredicate {
                        min: [(ProfileAxis::Stim, 4)].into_iter().collect(),
                        max: [(ProfileAxis::Sweet, 2)].into_iter().collect(),
                        tags_any: vec!["focus".into(), "logic".into()],
                        ..Default::default()
                    },
                    outcome: outcome("corp-focus", "corpTrust", true),
                },
                EffectRule {
                    when: OrderPredicate {
                        tags_all: vec!["comfort".into(), "sweet".into()],
                        ..Default::default()
                    },
                    outcome: outcome("corp-soft", "corpSoft", true),
                },
            ],
            fallback: outcome("corp-default", "corpTrust", false),
        }
    }

    #[test]
    fn test_first_specific_rule_wins_over_catch_all() {
        let scene = liaison_scene();
        let payload = catalog()
            .build_payload(&OrderDraft::new("sunless-zero"), MAX_MODIFIERS)
            .unwrap();
        let resolution = resolve_outcome(&scene, &payload, &PlayerState::new());
        assert_eq!(resolution.outcome.id, "corp-focus");
        assert_eq!(resolution.rule_index, Some(0));
        assert!(!resolution.used_fallback());
    }

    #[test]
    fn test_second_rule() {
        let scene = liaison_scene();
        let payload = catalog()
            .build_payload(&OrderDraft::new("neon-velvet"), MAX_MODIFIERS)
            .unwrap();
        let resolution = resolve_outcome(&scene, &payload, &PlayerState::new());
        assert_eq!(resolution.outcome.id, "corp-soft");
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        let scene = liaison_scene();
        // Syrup pushes sweet to 3 and stim to 4: fails the max-sweet bound.
        let draft = OrderDraft::new("sunless-zero").with_extra("extra-syrup");
        let payload = catalog().build_payload(&draft, MAX_MODIFIERS).unwrap();
        assert_eq!(payload.profile.sweet, 3);
        let resolution = resolve_outcome(&scene, &payload, &PlayerState::new());
        assert!(resolution.used_fallback());
        assert_eq!(resolution.outcome.id, "corp-default");
    }

    #[test]
    fn test_state_clause() {
        let mut scene = liaison_scene();
        scene.rules[0].when.state = Some(Condition::new().flags_all(["corpDeal"]));
        let payload = catalog()
            .build_payload(&OrderDraft::new("sunless-zero"), MAX_MODIFIERS)
            .unwrap();

        let mut state = PlayerState::new();
        assert!(resolve_outcome(&scene, &payload, &state).used_fallback());

        state.flags.insert("corpDeal".into());
        assert_eq!(resolve_outcome(&scene, &payload, &state).outcome.id, "corp-focus");
    }

    #[test]
    fn test_outcome_delta_writes_flags_and_effect() {
        let mut state = PlayerState::new();
        state.flags.insert("corpTrust".into());
        outcome("corp-default", "corpTrust", false)
            .delta()
            .apply_to(&mut state);
        assert!(!state.has_flag("corpTrust"));
        assert_eq!(state.tendencies.rational, 1);
    }

    #[test]
    fn test_catch_all_detection() {
        assert!(OrderPredicate::always().is_catch_all());
        let gated = OrderPredicate {
            tags_any: vec!["focus".into()],
            ..Default::default()
        };
        assert!(!gated.is_catch_all());
    }
}
