//! Read-only views of a session, shaped for a presentation layer.

use story_rules::{ChoiceRecord, OrderDraft, OrderPayload, Tendencies};

/// What the player is looking at.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Title(TitleView),
    Scene(SceneView),
    Ending(EndingSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleView {
    pub unlocked_endings: Vec<String>,
    pub cleared_runs: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneView {
    pub id: String,
    pub title: String,
    pub speaker: String,
    pub bg: String,
    pub expression: Option<String>,
    /// Narration rendered for the current state.
    pub text: String,
    pub interaction: Interaction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Choices(Vec<ChoiceView>),
    Order(OrderView),
}

/// A visible choice. `index` is what [`Session::choose`](super::Session::choose) takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceView {
    pub index: usize,
    pub text: String,
    pub route_lock: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
    pub request: String,
    pub note: Option<String>,
    pub npc: String,
    pub draft: OrderDraft,
    /// Profile and tags of the current draft, `None` with an empty menu.
    pub preview: Option<OrderPayload>,
}

/// The ending screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndingSummary {
    /// `None` only when the story declares no routes.
    pub route: Option<String>,
    pub title: String,
    pub text: String,
    /// Whether the route came from the lock rather than a nearest-route fallback.
    pub locked: bool,
    pub tendencies: Tendencies,
    /// The last few choices, oldest first.
    pub recent_choices: Vec<ChoiceRecord>,
    pub unlocked_endings: Vec<String>,
}

/// Live route hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forecast {
    pub route: String,
    pub name: String,
    pub hint: String,
    pub locked: bool,
}
