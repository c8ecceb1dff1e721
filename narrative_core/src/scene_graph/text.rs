//! Scene text: literal, or a pure function of the player state.

use std::fmt;
use std::sync::Arc;

use story_rules::{Condition, PlayerState};

/// A side-effect-free text producer.
pub type TextFn = Arc<dyn Fn(&PlayerState) -> String + Send + Sync>;

/// A piece of computed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSegment {
    /// Always emitted.
    Fixed(String),
    /// Emits `then` when the condition holds, otherwise `otherwise` (if any).
    Branch {
        condition: Condition,
        then: String,
        otherwise: Option<String>,
    },
}

impl TextSegment {
    fn render(&self, state: &PlayerState) -> Option<String> {
        match self {
            TextSegment::Fixed(text) => Some(interpolate(text, state)),
            TextSegment::Branch {
                condition,
                then,
                otherwise,
            } => {
                if condition.evaluate(state) {
                    Some(interpolate(then, state))
                } else {
                    otherwise.as_ref().map(|text| interpolate(text, state))
                }
            }
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            TextSegment::Fixed(_) => None,
            TextSegment::Branch { condition, .. } => Some(condition),
        }
    }
}

/// Replace `{rational}`, `{cooperate}` and `{explore}` with the current values.
fn interpolate(template: &str, state: &PlayerState) -> String {
    let t = &state.tendencies;
    template
        .replace("{rational}", &t.rational.to_string())
        .replace("{cooperate}", &t.cooperate.to_string())
        .replace("{explore}", &t.explore.to_string())
}

/// Scene narration.
#[derive(Clone)]
pub enum SceneText {
    Literal(String),
    Computed(TextFn),
}

impl SceneText {
    /// Wrap an arbitrary pure function.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&PlayerState) -> String + Send + Sync + 'static,
    {
        SceneText::Computed(Arc::new(f))
    }

    /// Build computed text from authored segments, concatenated in order.
    pub fn from_segments(segments: Vec<TextSegment>) -> Self {
        SceneText::computed(move |state| {
            segments
                .iter()
                .filter_map(|segment| segment.render(state))
                .collect::<String>()
        })
    }

    /// Produce the text for `state`. Calling this repeatedly gives the same result.
    pub fn render(&self, state: &PlayerState) -> String {
        match self {
            SceneText::Literal(text) => text.clone(),
            SceneText::Computed(f) => f(state),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, SceneText::Computed(_))
    }
}

impl Default for SceneText {
    fn default() -> Self {
        SceneText::Literal(String::new())
    }
}

impl fmt::Debug for SceneText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneText::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            SceneText::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}
