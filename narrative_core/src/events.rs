//! Story events - what a player action caused, for the presentation layer.

use serde::{Deserialize, Serialize};

use story_rules::Tendencies;

/// Something that happened while handling one player action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoryEvent {
    /// A new game was started.
    NewGame,

    /// The player entered a scene.
    SceneEntered { scene: String },

    /// A dialogue choice was taken.
    ChoiceMade { scene: String, choice: String },

    /// An order was served and resolved.
    OrderServed {
        scene: String,
        drink: String,
        /// Id of the rule that fired.
        outcome: String,
        reply: String,
    },

    /// The ending route was frozen.
    RouteLocked { route: String, tendencies: Tendencies },

    /// The story reached its end.
    EndingReached { route: String },

    /// The target scene does not exist; the session went back to the title.
    FellBackToTitle { missing: String },

    /// The player returned to the title screen.
    ReturnedToTitle,
}

impl StoryEvent {
    /// Whether this event ends the current run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StoryEvent::EndingReached { .. }
                | StoryEvent::FellBackToTitle { .. }
                | StoryEvent::ReturnedToTitle
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_type_tag() {
        let event = StoryEvent::EndingReached { route: "C".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"ending_reached","route":"C"}"#);
        assert!(event.is_terminal());
        assert!(!StoryEvent::SceneEntered { scene: "s00".into() }.is_terminal());
    }
}
