//! Full runs over the shipped story content.

use std::sync::Arc;

use narrative_core::{
    DirStore, Interaction, MemoryStore, SaveStore, Session, Story, StoryEvent, View, AUTO_SLOT,
    ENDING_SLOT,
};
use story_rules::{OrderDraft, SceneCursor, Tendencies};

const MANIFEST: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../content/story.toml");

#[derive(Debug, Clone, Copy)]
enum Step {
    /// Visible choice index, and how many choices should be visible.
    Choose(usize, usize),
    Serve(&'static str),
}

use Step::{Choose, Serve};

fn story() -> Arc<Story> {
    Arc::new(Story::load(MANIFEST).unwrap())
}

fn play<S: SaveStore>(session: &mut Session<S>, steps: &[Step]) -> Vec<StoryEvent> {
    let mut events = Vec::new();
    for (n, step) in steps.iter().enumerate() {
        let at = session.state().current.to_string();
        match *step {
            Choose(index, visible) => {
                assert_eq!(
                    session.visible_choices().len(),
                    visible,
                    "step {n} at {at}: visible choices"
                );
                events.extend(session.choose(index).unwrap());
            }
            Serve(drink) => {
                events.extend(session.serve_order(OrderDraft::new(drink)).unwrap());
            }
        }
    }
    events
}

const ROUTE_A: &[Step] = &[
    Choose(0, 2),
    Serve("sunless-zero"),
    Choose(0, 2),
    Serve("mirror-protocol"),
    Choose(0, 1),
    Serve("sunless-zero"),
    Choose(0, 2),
    Choose(0, 2),
    Choose(0, 2),
    Choose(0, 2),
];

const ROUTE_B: &[Step] = &[
    Choose(1, 2),
    Serve("neon-velvet"),
    Choose(1, 2),
    Serve("proxy-smoke"),
    Choose(0, 2),
    Serve("proxy-smoke"),
    Choose(0, 1),
    Choose(1, 2),
    Choose(1, 2),
    Choose(0, 3),
];

const ROUTE_C: &[Step] = &[
    Choose(1, 2),
    Serve("warm-shield"),
    Choose(1, 2),
    Serve("mirror-protocol"),
    Choose(0, 1),
    Serve("mirror-protocol"),
    Choose(0, 2),
    Choose(1, 2),
    Choose(1, 2),
    Choose(0, 1),
];

const GRAY_BOX: &[Step] = &[
    Choose(1, 2),
    Serve("sunless-zero"),
    Choose(0, 2),
    Serve("deep-trace"),
    Choose(0, 2),
    Serve("mirror-protocol"),
    Choose(0, 2),
    Choose(0, 2),
    Choose(2, 3),
    Choose(0, 2),
    Choose(0, 2),
    Choose(0, 2),
    Choose(0, 1),
    Choose(0, 1),
    Choose(1, 3),
];

fn locked_route(events: &[StoryEvent]) -> Option<&str> {
    events.iter().find_map(|event| match event {
        StoryEvent::RouteLocked { route, .. } => Some(route.as_str()),
        _ => None,
    })
}

#[test]
fn test_route_a_ceasefire() {
    let mut session = Session::new(story(), MemoryStore::new());
    session.new_game();
    let events = play(&mut session, ROUTE_A);

    assert_eq!(locked_route(&events), Some("A"));
    assert_eq!(session.state().tendencies, Tendencies::new(5, 5, -4));
    assert_eq!(session.state().current.to_string(), "s10A");
    assert!(session.state().has_item("corpMemo"));
    assert!(!session.state().has_flag("policeWarrant"));

    let events = session.choose(0).unwrap();
    assert!(events.contains(&StoryEvent::EndingReached { route: "A".into() }));
    assert_eq!(session.state().current, SceneCursor::End);
    match session.view() {
        View::Ending(summary) => {
            assert_eq!(summary.route.as_deref(), Some("A"));
            assert_eq!(summary.title, "Ending A: Glass Ceasefire");
            assert!(summary.locked);
            assert_eq!(summary.recent_choices.len(), 8);
        }
        other => panic!("expected the ending, got {other:?}"),
    }
}

#[test]
fn test_route_b_burn() {
    let mut session = Session::new(story(), MemoryStore::new());
    session.new_game();
    let events = play(&mut session, ROUTE_B);

    assert_eq!(locked_route(&events), Some("B"));
    assert_eq!(session.state().tendencies, Tendencies::new(0, -5, 5));
    assert!(session.state().has_flag("policeWarrant"));
    assert!(session.state().has_item("memoryTape"));
    assert_eq!(session.state().relation("detective"), -2);

    match session.view() {
        View::Scene(scene) => {
            assert_eq!(scene.id, "s10B");
            assert!(scene.text.contains("complete memory tape"));
            assert!(!scene.text.contains("[Gray Box note]"));
        }
        other => panic!("expected s10B, got {other:?}"),
    }

    let events = session.choose(0).unwrap();
    assert!(events.contains(&StoryEvent::EndingReached { route: "B".into() }));
    assert_eq!(session.state().unlocked_endings, vec!["B".to_string()]);
}

#[test]
fn test_route_c_constellation() {
    let mut session = Session::new(story(), MemoryStore::new());
    session.new_game();
    let events = play(&mut session, ROUTE_C);

    assert_eq!(session.state().tendencies, Tendencies::new(-1, 1, 2));
    assert_eq!(locked_route(&events), Some("C"));
    assert_eq!(session.state().current.to_string(), "s10C");

    let events = session.choose(0).unwrap();
    assert!(events.contains(&StoryEvent::EndingReached { route: "C".into() }));
    assert_eq!(session.state().cleared_runs.len(), 1);
    assert_eq!(session.state().cleared_runs[0].route, "C");
}

#[test]
fn test_gray_box_side_path() {
    let mut session = Session::new(story(), MemoryStore::new());
    session.new_game();
    let events = play(&mut session, GRAY_BOX);

    assert!(session.state().has_flag("ghostHandshake"));
    assert_eq!(session.state().tendencies, Tendencies::new(5, 5, 3));
    assert_eq!(locked_route(&events), Some("A"));
    for scene in ["s11", "s12", "s13", "s14", "s15"] {
        assert!(session.state().path_history.iter().any(|s| s == scene));
    }

    match session.view() {
        View::Scene(scene) => {
            assert_eq!(scene.id, "s10A");
            assert!(scene.text.contains("[Gray Box note]"));
            assert!(scene.text.contains("for the first time all three sides"));
        }
        other => panic!("expected s10A, got {other:?}"),
    }
}

#[test]
fn test_order_scene_logs_service_and_reply() {
    let mut session = Session::new(story(), MemoryStore::new());
    session.new_game();
    session.choose(0).unwrap();

    match session.view() {
        View::Scene(scene) => match scene.interaction {
            Interaction::Order(order) => {
                assert_eq!(order.npc, "liaison");
                assert!(order.request.contains("Ayase Kirine"));
            }
            other => panic!("expected an order, got {other:?}"),
        },
        other => panic!("expected s01, got {other:?}"),
    }

    let draft = OrderDraft::new("rain-loop").with_extra("extra-syrup");
    let events = session.serve_order(draft).unwrap();
    assert!(matches!(
        &events[0],
        StoryEvent::OrderServed { outcome, .. } if outcome == "corp-default"
    ));
    assert!(!session.state().has_flag("corpTrust"));

    let log = &session.state().log;
    let served = log
        .iter()
        .position(|line| line == "Served liaison: Rain Loop + Double Syrup")
        .unwrap();
    assert!(log[served + 1].starts_with("liaison: Kirine takes the drink"));
    assert_eq!(session.state().order_history.len(), 1);
}

#[test]
fn test_route_lock_is_immutable() {
    let mut session = Session::new(story(), MemoryStore::new());
    session.new_game();
    play(&mut session, ROUTE_C);
    assert_eq!(session.state().route_lock.as_deref(), Some("C"));

    let forecast = session.forecast().unwrap();
    assert!(forecast.locked);
    assert_eq!(forecast.route, "C");

    // Drag the vector onto route A's target; the lock still decides the ending.
    let mut snapshot: serde_json::Value =
        serde_json::from_str(&session.export().unwrap()).unwrap();
    snapshot["tendencies"] = serde_json::json!({ "rational": 4, "cooperate": 4, "explore": -3 });
    session.import(&snapshot.to_string()).unwrap();
    assert_eq!(session.state().tendencies, Tendencies::new(4, 4, -3));
    assert_eq!(session.forecast().unwrap().route, "C");

    let events = session.choose(0).unwrap();
    assert!(events.contains(&StoryEvent::EndingReached { route: "C".into() }));
    assert_eq!(session.state().route_lock.as_deref(), Some("C"));

    session.return_to_title();
    assert_eq!(session.state().route_lock, None);
    assert_eq!(session.state().unlocked_endings, vec!["C".to_string()]);
}

#[test]
fn test_ending_autosaves_both_slots() {
    let mut session = Session::new(story(), MemoryStore::new());
    session.new_game();
    play(&mut session, ROUTE_A);
    session.choose(0).unwrap();

    let store = session.into_store();
    let auto = store.read(AUTO_SLOT).unwrap().unwrap();
    let ending = store.read(ENDING_SLOT).unwrap().unwrap();
    assert_eq!(auto, ending);
    assert!(auto.contains("\"END\""));
}

#[test]
fn test_save_round_trip_through_dir_store() {
    let dir = tempfile::tempdir().unwrap();
    let story = story();

    let mut session = Session::new(Arc::clone(&story), DirStore::new(dir.path()));
    session.new_game();
    play(&mut session, &ROUTE_B[..5]);
    session.save("slot1").unwrap();
    let saved = session.state().clone();

    play(&mut session, &ROUTE_B[5..7]);
    assert_ne!(session.state().current, saved.current);

    assert!(session.load("slot1").unwrap());
    assert_eq!(session.state().current, saved.current);
    assert_eq!(session.state().tendencies, saved.tendencies);
    assert_eq!(session.state().flags, saved.flags);
    assert_eq!(session.state().inventory, saved.inventory);
    assert_eq!(session.state().relations, saved.relations);
    assert_eq!(session.state().choice_history, saved.choice_history);

    // A fresh session over the same directory resumes from the autosave.
    let resumed = Session::restore_autosave(story, DirStore::new(dir.path()));
    assert_eq!(resumed.state().current, saved.current);
    assert_eq!(resumed.state().tendencies, saved.tendencies);
}

#[test]
fn test_export_import_keeps_progress() {
    let story = story();
    let mut session = Session::new(Arc::clone(&story), MemoryStore::new());
    session.new_game();
    play(&mut session, &GRAY_BOX[..9]);
    let text = session.export().unwrap();

    let mut other = Session::new(story, MemoryStore::new());
    other.import(&text).unwrap();
    assert_eq!(other.state().current.to_string(), "s11");
    assert_eq!(other.state().tendencies, session.state().tendencies);
    assert!(other.store().read(AUTO_SLOT).unwrap().is_some());
}
