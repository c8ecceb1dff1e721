//! Declarative visibility gates over the player state.

use serde::{Deserialize, Serialize};

use crate::state::PlayerState;

/// Keys a condition table may use. Anything else is an authoring error.
pub const CONDITION_KEYS: [&str; 4] = ["flagsAll", "flagsAny", "itemAny", "relAtLeast"];

/// Keys of the `relAtLeast` sub-table.
pub const REL_THRESHOLD_KEYS: [&str; 2] = ["name", "val"];

/// Minimum relationship requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelThreshold {
    pub name: String,
    pub val: i32,
}

/// A gate on choices, scenes, text segments and order rules.
///
/// Every clause is optional and all present clauses must hold. Empty
/// `flagsAny`/`itemAny` lists are vacuously true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags_all: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags_any: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_any: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_at_least: Option<RelThreshold>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags_all<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags_all.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn flags_any<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags_any.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn item_any<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.item_any.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn rel_at_least(mut self, name: impl Into<String>, val: i32) -> Self {
        self.rel_at_least = Some(RelThreshold {
            name: name.into(),
            val,
        });
        self
    }

    /// True when no clause constrains anything.
    pub fn is_unconditional(&self) -> bool {
        self.flags_all.is_empty()
            && self.flags_any.is_empty()
            && self.item_any.is_empty()
            && self.rel_at_least.is_none()
    }

    /// Test the condition against a state snapshot. Pure.
    pub fn evaluate(&self, state: &PlayerState) -> bool {
        let flags_all_ok = self.flags_all.iter().all(|flag| state.has_flag(flag));
        let flags_any_ok =
            self.flags_any.is_empty() || self.flags_any.iter().any(|flag| state.has_flag(flag));
        let item_any_ok =
            self.item_any.is_empty() || self.item_any.iter().any(|item| state.has_item(item));
        let rel_ok = self
            .rel_at_least
            .as_ref()
            .map_or(true, |rule| state.relation(&rule.name) >= rule.val);

        flags_all_ok && flags_any_ok && item_any_ok && rel_ok
    }

    /// Every flag name this condition reads.
    pub fn referenced_flags(&self) -> impl Iterator<Item = &str> {
        self.flags_all
            .iter()
            .chain(self.flags_any.iter())
            .map(String::as_str)
    }

    pub fn referenced_items(&self) -> impl Iterator<Item = &str> {
        self.item_any.iter().map(String::as_str)
    }

    pub fn referenced_relation(&self) -> Option<&str> {
        self.rel_at_least.as_ref().map(|rule| rule.name.as_str())
    }
}

/// Evaluate an optional condition; an absent condition always passes.
pub fn evaluate(state: &PlayerState, condition: Option<&Condition>) -> bool {
    condition.map_or(true, |c| c.evaluate(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_condition_passes() {
        let state = PlayerState::new();
        assert!(evaluate(&state, None));
        assert!(evaluate(&state, Some(&Condition::new())));
    }

    #[test]
    fn test_flags_all_hides_until_set() {
        let mut state = PlayerState::new();
        let cond = Condition::new().flags_all(["x"]);
        assert!(!cond.evaluate(&state));

        state.flags.insert("x".to_string());
        assert!(cond.evaluate(&state));
    }

    #[test]
    fn test_flags_any_and_item_any() {
        let mut state = PlayerState::new();
        let cond = Condition::new()
            .flags_any(["barShielded", "corpDeal"])
            .item_any(["memoryTape", "checksumSheet"]);
        assert!(!cond.evaluate(&state));

        state.flags.insert("corpDeal".to_string());
        assert!(!cond.evaluate(&state));

        state.inventory.insert("checksumSheet".to_string());
        assert!(cond.evaluate(&state));
    }

    #[test]
    fn test_rel_at_least_threshold() {
        let mut state = PlayerState::with_relations(["hacker"]);
        let cond = Condition::new().rel_at_least("hacker", 2);

        state.relations.insert("hacker".into(), 1);
        assert!(!cond.evaluate(&state));

        state.relations.insert("hacker".into(), 2);
        assert!(cond.evaluate(&state));

        state.relations.insert("hacker".into(), 7);
        assert!(cond.evaluate(&state));
    }

    #[test]
    fn test_clauses_combine_with_and() {
        let mut state = PlayerState::new();
        let cond = Condition::new()
            .flags_all(["truthLeakDraft"])
            .item_any(["memoryTape"]);

        state.flags.insert("truthLeakDraft".into());
        assert!(!cond.evaluate(&state));
        state.inventory.insert("memoryTape".into());
        assert!(cond.evaluate(&state));
    }

    #[test]
    fn test_unknown_keys_rejected_when_deserializing() {
        let ok: Result<Condition, _> = serde_json::from_str(r#"{"flagsAll": ["a"]}"#);
        assert!(ok.is_ok());
        let bad: Result<Condition, _> = serde_json::from_str(r#"{"flagAll": ["a"]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_referenced_names() {
        let cond = Condition::new()
            .flags_all(["a"])
            .flags_any(["b"])
            .item_any(["tape"])
            .rel_at_least("liaison", 1);
        assert_eq!(cond.referenced_flags().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(cond.referenced_items().collect::<Vec<_>>(), vec!["tape"]);
        assert_eq!(cond.referenced_relation(), Some("liaison"));
    }
}
