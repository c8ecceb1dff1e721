//! Scene Graph - the compiled, load-time-immutable story.
//!
//! Scenes are nodes; choices and order-scene `next` fields are edges. The graph
//! is a directed multigraph: branches may reconverge on a shared scene id, and
//! cycles are allowed.

mod text;

pub use text::*;

use std::collections::HashMap;

use story_rules::{Condition, PlayerState, StateDelta, END_SCENE};

use crate::order::OrderScene;

/// One selectable option of a dialogue scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub text: String,
    /// Visibility gate. `None` means always visible.
    pub condition: Option<Condition>,
    pub delta: StateDelta,
    /// Freeze the nearest route and jump to that route's entry scene.
    pub route_lock: bool,
    /// Target scene id, or `END`.
    pub next: String,
}

impl Choice {
    pub fn is_visible(&self, state: &PlayerState) -> bool {
        story_rules::evaluate(state, self.condition.as_ref())
    }

    pub fn ends_story(&self) -> bool {
        self.next == END_SCENE
    }
}

/// How the player interacts with a scene.
#[derive(Debug, Clone)]
pub enum SceneKind {
    Dialogue { choices: Vec<Choice> },
    Order(OrderScene),
}

/// A node in the story graph.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub kind: SceneKind,
    pub title: String,
    pub speaker: String,
    /// Background key for the presentation layer.
    pub bg: String,
    pub expression: Option<String>,
    pub text: SceneText,
    /// Conditions read by computed text, kept for static checks.
    pub text_conditions: Vec<Condition>,
    /// Default transition; required for order scenes.
    pub next: Option<String>,
    pub tags: Vec<String>,
    /// Entry gate. Choices leading here are hidden while it fails.
    pub gate: Option<Condition>,
}

impl Scene {
    pub fn choices(&self) -> &[Choice] {
        match &self.kind {
            SceneKind::Dialogue { choices } => choices,
            SceneKind::Order(_) => &[],
        }
    }

    pub fn order(&self) -> Option<&OrderScene> {
        match &self.kind {
            SceneKind::Order(order) => Some(order),
            SceneKind::Dialogue { .. } => None,
        }
    }

    pub fn is_order(&self) -> bool {
        self.order().is_some()
    }

    /// Every transition target of this scene, with the choice label when the
    /// edge comes from a choice.
    pub fn transitions(&self) -> Vec<(Option<&str>, &str)> {
        let mut edges: Vec<(Option<&str>, &str)> = self
            .choices()
            .iter()
            .map(|choice| (Some(choice.text.as_str()), choice.next.as_str()))
            .collect();
        if let Some(next) = &self.next {
            edges.push((None, next.as_str()));
        }
        edges
    }
}

/// The merged story graph.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    scenes: HashMap<String, Scene>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a scene, returning the one it replaced (a duplicate id).
    pub fn insert(&mut self, scene: Scene) -> Option<Scene> {
        self.scenes.insert(scene.id.clone(), scene)
    }

    pub fn get(&self, id: &str) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    /// Whether `target` is a legal transition target.
    pub fn resolves(&self, target: &str) -> bool {
        target == END_SCENE || self.contains(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    /// Scene ids in lexical order, for stable reports.
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.scenes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Choices of `scene` the player may pick right now, with their authored index.
    ///
    /// A choice is visible when its own condition holds and the entry gate of
    /// its target scene (if any) holds.
    pub fn visible_choices<'a>(
        &'a self,
        scene: &'a Scene,
        state: &PlayerState,
    ) -> Vec<(usize, &'a Choice)> {
        scene
            .choices()
            .iter()
            .enumerate()
            .filter(|(_, choice)| choice.is_visible(state))
            .filter(|(_, choice)| {
                let gate = self.get(&choice.next).and_then(|target| target.gate.as_ref());
                story_rules::evaluate(state, gate)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialogue(id: &str, choices: Vec<Choice>) -> Scene {
        Scene {
            id: id.to_string(),
            kind: SceneKind::Dialogue { choices },
            title: id.to_uppercase(),
            speaker: "zero".into(),
            bg: "bar".into(),
            expression: None,
            text: SceneText::Literal(format!("Scene {id}")),
            text_conditions: Vec::new(),
            next: None,
            tags: Vec::new(),
            gate: None,
        }
    }

    fn choice(text: &str, next: &str, condition: Option<Condition>) -> Choice {
        Choice {
            text: text.to_string(),
            condition,
            delta: StateDelta::new(),
            route_lock: false,
            next: next.to_string(),
        }
    }

    fn graph() -> SceneGraph {
        let mut graph = SceneGraph::new();
        graph.insert(dialogue(
            "s08",
            vec![
                choice("Go on", "s09", None),
                choice(
                    "Use the corp trust",
                    "s09",
                    Some(Condition::new().flags_all(["corpTrust"])),
                ),
                choice("Follow the ghost", "s11", None),
            ],
        ));
        graph.insert(dialogue("s09", vec![choice("Finish", "END", None)]));
        let mut side = dialogue("s11", Vec::new());
        side.gate = Some(Condition::new().rel_at_least("hacker", 2));
        graph.insert(side);
        graph
    }

    #[test]
    fn test_lookup_and_resolution() {
        let graph = graph();
        assert!(graph.get("s08").is_some());
        assert!(graph.get("s99").is_none());
        assert!(graph.resolves("END"));
        assert!(!graph.resolves("s99"));
        assert_eq!(graph.sorted_ids(), vec!["s08", "s09", "s11"]);
    }

    #[test]
    fn test_flags_all_visibility() {
        let graph = graph();
        let scene = graph.get("s08").unwrap();
        let mut state = PlayerState::new();

        let labels = |state: &PlayerState| -> Vec<String> {
            graph
                .visible_choices(scene, state)
                .into_iter()
                .map(|(_, c)| c.text.clone())
                .collect()
        };
        assert_eq!(labels(&state), vec!["Go on"]);

        state.flags.insert("corpTrust".into());
        assert_eq!(labels(&state), vec!["Go on", "Use the corp trust"]);
    }

    #[test]
    fn test_target_gate_hides_choice() {
        let graph = graph();
        let scene = graph.get("s08").unwrap();
        let mut state = PlayerState::new();
        state.relations.insert("hacker".into(), 2);

        let visible = graph.visible_choices(scene, &state);
        assert_eq!(visible.last().map(|(i, _)| *i), Some(2));

        state.relations.insert("hacker".into(), 1);
        let visible = graph.visible_choices(scene, &state);
        assert!(visible.iter().all(|(_, c)| c.next != "s11"));
    }

    #[test]
    fn test_transitions() {
        let graph = graph();
        let edges = graph.get("s09").unwrap().transitions();
        assert_eq!(edges, vec![(Some("Finish"), "END")]);
        assert!(graph.get("s09").unwrap().choices()[0].ends_story());
    }

    #[test]
    fn test_duplicate_insert_returns_previous() {
        let mut graph = graph();
        let replaced = graph.insert(dialogue("s09", Vec::new()));
        assert!(replaced.is_some());
        assert_eq!(graph.len(), 3);
    }
}
