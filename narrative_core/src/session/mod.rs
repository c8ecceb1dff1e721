//! Session - one player's run through a loaded story.
//!
//! The session owns the [`PlayerState`] and is the only place it is mutated
//! at runtime. Every public action runs to completion before returning,
//! returns the [`StoryEvent`]s it caused, and (with autosave on) leaves the
//! `auto` slot in sync with the new state.

mod view;

pub use view::*;

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use story_rules::{
    ChoiceRecord, ClearedRun, DialogueLine, OrderDraft, OrderError, OrderPayload, OrderRecord,
    PlayerState, Preferences, RunId, SceneCursor, END_SCENE,
};

use crate::content::Story;
use crate::events::StoryEvent;
use crate::order::resolve_outcome;
use crate::persistence::{decode, encode, PersistenceError, SaveStore, AUTO_SLOT, ENDING_SLOT};
use crate::scene_graph::Scene;

/// Errors from player actions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no scene is active (at {0})")]
    NoActiveScene(String),

    #[error("scene `{0}` has no choices")]
    NotDialogue(String),

    #[error("scene `{0}` is not an order scene")]
    NotOrder(String),

    #[error("choice {index} is not available ({visible} visible)")]
    ChoiceOutOfRange { index: usize, visible: usize },

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// A play session over a shared, immutable story.
pub struct Session<S: SaveStore> {
    story: Arc<Story>,
    state: PlayerState,
    store: S,
}

impl<S: SaveStore> Session<S> {
    /// Start on the title screen with a blank state.
    pub fn new(story: Arc<Story>, store: S) -> Self {
        let state = story.initial_state();
        Self {
            story,
            state,
            store,
        }
    }

    /// Start from the `auto` slot if it holds a readable save.
    ///
    /// An unreadable autosave is logged and ignored.
    pub fn restore_autosave(story: Arc<Story>, store: S) -> Self {
        let mut session = Self::new(story, store);
        match session.load(AUTO_SLOT) {
            Ok(true) => info!(scene = %session.state.current, "autosave restored"),
            Ok(false) => {}
            Err(err) => warn!(%err, "autosave unreadable, starting fresh"),
        }
        session
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Reset the run and enter the start scene.
    ///
    /// Unlocked endings, cleared runs and preferences survive.
    pub fn new_game(&mut self) -> Vec<StoryEvent> {
        let story = Arc::clone(&self.story);
        let mut events = vec![StoryEvent::NewGame];

        self.state.reset_for_new_game(SceneCursor::Title);
        story.seed_relations(&mut self.state);
        self.state
            .push_log("[system] A new tape starts rolling.", story.config.log_capacity);
        info!(start = %story.config.start_scene, "new game");

        self.enter(&story.config.start_scene, &mut events);
        events
    }

    /// Take the `index`-th visible choice of the current dialogue scene.
    pub fn choose(&mut self, index: usize) -> Result<Vec<StoryEvent>, SessionError> {
        let story = Arc::clone(&self.story);
        let scene = self.active_scene(&story)?;
        if scene.is_order() {
            return Err(SessionError::NotDialogue(scene.id.clone()));
        }

        let visible = story.graph.visible_choices(scene, &self.state);
        let (_, choice) =
            visible
                .get(index)
                .copied()
                .ok_or(SessionError::ChoiceOutOfRange {
                    index,
                    visible: visible.len(),
                })?;

        let cap = story.config.log_capacity;
        let mut events = Vec::new();

        choice.delta.apply_to(&mut self.state);
        self.state.choice_history.push(ChoiceRecord {
            scene: scene.title.clone(),
            choice: choice.text.clone(),
        });
        self.state.push_log(format!("> {}", choice.text), cap);
        debug!(scene = %scene.id, choice = %choice.text, "choice made");
        events.push(StoryEvent::ChoiceMade {
            scene: scene.id.clone(),
            choice: choice.text.clone(),
        });

        let target = if choice.route_lock {
            self.lock_route(&mut events)
                .unwrap_or_else(|| choice.next.clone())
        } else {
            choice.next.clone()
        };
        self.enter(&target, &mut events);
        Ok(events)
    }

    /// Choices of the current scene the player may pick.
    pub fn visible_choices(&self) -> Vec<ChoiceView> {
        let Some(scene) = self.scene_at_cursor() else {
            return Vec::new();
        };
        self.story
            .graph
            .visible_choices(scene, &self.state)
            .into_iter()
            .enumerate()
            .map(|(index, (_, choice))| ChoiceView {
                index,
                text: choice.text.clone(),
                route_lock: choice.route_lock,
            })
            .collect()
    }

    /// The draft of the current order scene: the saved one, or the menu default.
    pub fn current_draft(&self) -> Option<OrderDraft> {
        let scene = self.scene_at_cursor()?;
        scene.order()?;
        Some(
            self.state
                .order_drafts
                .get(&scene.id)
                .cloned()
                .unwrap_or_else(|| self.story.drinks.default_draft()),
        )
    }

    /// Store a new draft for the current order scene and preview it.
    pub fn update_order_draft(&mut self, draft: OrderDraft) -> Result<OrderPayload, SessionError> {
        let story = Arc::clone(&self.story);
        let scene = self.active_scene(&story)?;
        if !scene.is_order() {
            return Err(SessionError::NotOrder(scene.id.clone()));
        }

        let payload = story.drinks.build_payload(&draft, story.config.max_modifiers)?;
        self.state.order_drafts.insert(scene.id.clone(), draft);
        self.autosave(false);
        Ok(payload)
    }

    /// Serve `draft` in the current order scene and move on.
    pub fn serve_order(&mut self, draft: OrderDraft) -> Result<Vec<StoryEvent>, SessionError> {
        let story = Arc::clone(&self.story);
        let scene = self.active_scene(&story)?;
        let order = scene
            .order()
            .ok_or_else(|| SessionError::NotOrder(scene.id.clone()))?;

        let payload = story.drinks.build_payload(&draft, story.config.max_modifiers)?;
        let resolution = resolve_outcome(order, &payload, &self.state);
        let outcome = resolution.outcome;
        outcome.delta().apply_to(&mut self.state);

        let npc = order
            .npc_key
            .clone()
            .unwrap_or_else(|| scene.speaker.clone());
        let label = payload.label();
        let cap = story.config.log_capacity;

        self.state.order_drafts.insert(scene.id.clone(), draft);
        self.state.order_history.push(OrderRecord {
            npc: npc.clone(),
            drink: payload.drink.name.clone(),
            extras: payload.extras.iter().map(|e| e.name.clone()).collect(),
        });
        self.state.choice_history.push(ChoiceRecord {
            scene: scene.title.clone(),
            choice: label.clone(),
        });
        self.state.push_log(format!("Served {npc}: {label}"), cap);
        if !outcome.reply.is_empty() {
            self.state
                .push_log(format!("{}: {}", scene.speaker, outcome.reply), cap);
        }
        info!(
            scene = %scene.id,
            drink = %payload.drink.id,
            outcome = %outcome.id,
            fallback = resolution.used_fallback(),
            "order served"
        );

        let mut events = vec![StoryEvent::OrderServed {
            scene: scene.id.clone(),
            drink: payload.drink.id.clone(),
            outcome: outcome.id.clone(),
            reply: outcome.reply.clone(),
        }];
        match &scene.next {
            Some(next) => self.enter(next, &mut events),
            None => self.fall_back_to_title(&scene.id, &mut events),
        }
        Ok(events)
    }

    /// The route the player is heading for, or the locked one.
    pub fn forecast(&self) -> Option<Forecast> {
        let routes = &self.story.routes;
        let locked = self
            .state
            .route_lock
            .as_deref()
            .and_then(|id| routes.get(id));
        let (route, is_locked) = match locked {
            Some(route) => (route, true),
            None => (routes.nearest(&self.state.tendencies)?, false),
        };
        Some(Forecast {
            route: route.id.clone(),
            name: route.name.clone(),
            hint: route.hint.clone(),
            locked: is_locked,
        })
    }

    /// Leave the run for the title screen. Clears the route lock.
    pub fn return_to_title(&mut self) -> Vec<StoryEvent> {
        self.state.current = SceneCursor::Title;
        self.state.route_lock = None;
        info!("returned to title");
        self.autosave(false);
        vec![StoryEvent::ReturnedToTitle]
    }

    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.state.preferences = Preferences {
            bgm_enabled: preferences.bgm_enabled,
            bgm_volume: if preferences.bgm_volume.is_finite() {
                preferences.bgm_volume.clamp(0.0, 1.0)
            } else {
                Preferences::default().bgm_volume
            },
        };
        self.autosave(false);
    }

    /// What the player sees right now.
    pub fn view(&self) -> View {
        match &self.state.current {
            SceneCursor::End => View::Ending(self.ending_summary()),
            SceneCursor::Scene(_) => match self.scene_at_cursor() {
                Some(scene) => View::Scene(self.scene_view(scene)),
                None => View::Title(self.title_view()),
            },
            SceneCursor::Title => View::Title(self.title_view()),
        }
    }

    /// Summary of the run as it would end now.
    pub fn ending_summary(&self) -> EndingSummary {
        let routes = &self.story.routes;
        let lock = self.state.route_lock.as_deref();
        let route = routes.resolve_ending(lock, &self.state.tendencies);
        let locked = lock.map_or(false, |id| routes.contains(id));

        let keep = self.story.config.recent_choices_in_summary;
        let history = &self.state.choice_history;
        let recent_choices = history[history.len().saturating_sub(keep)..].to_vec();

        EndingSummary {
            route: route.map(|r| r.id.clone()),
            title: route.map_or_else(|| "The End".to_string(), |r| r.ending_title.clone()),
            text: route.map(|r| r.ending_text.clone()).unwrap_or_default(),
            locked,
            tendencies: self.state.tendencies,
            recent_choices,
            unlocked_endings: self.state.unlocked_endings.clone(),
        }
    }

    /// Write the current state to `slot`.
    pub fn save(&mut self, slot: &str) -> Result<(), SessionError> {
        let text = encode(&self.state)?;
        self.store.write(slot, &text)?;
        info!(slot, "saved");
        Ok(())
    }

    /// Replace the state with the one in `slot`. `Ok(false)` when the slot is empty.
    pub fn load(&mut self, slot: &str) -> Result<bool, SessionError> {
        let Some(text) = self.store.read(slot)? else {
            return Ok(false);
        };
        let restored = decode(&text, &self.story.routes)?;
        info!(slot, from_version = restored.from_version, "loaded");
        self.adopt(restored.state);
        if slot != AUTO_SLOT {
            self.autosave(false);
        }
        Ok(true)
    }

    /// The current state as save text.
    pub fn export(&self) -> Result<String, SessionError> {
        Ok(encode(&self.state)?)
    }

    /// Replace the state with imported save text.
    pub fn import(&mut self, text: &str) -> Result<(), SessionError> {
        let restored = decode(text, &self.story.routes)?;
        info!(from_version = restored.from_version, "imported save");
        self.adopt(restored.state);
        self.autosave(false);
        Ok(())
    }

    fn adopt(&mut self, mut state: PlayerState) {
        self.story.seed_relations(&mut state);
        if let Some(id) = state.current.scene_id() {
            if !self.story.graph.contains(id) {
                warn!(scene = id, "saved scene no longer exists, returning to title");
                state.current = SceneCursor::Title;
            }
        }
        self.state = state;
    }

    fn scene_at_cursor(&self) -> Option<&Scene> {
        self.state
            .current
            .scene_id()
            .and_then(|id| self.story.graph.get(id))
    }

    fn active_scene<'a>(&self, story: &'a Story) -> Result<&'a Scene, SessionError> {
        self.state
            .current
            .scene_id()
            .and_then(|id| story.graph.get(id))
            .ok_or_else(|| SessionError::NoActiveScene(self.state.current.to_string()))
    }

    /// Freeze the ending route if none is locked yet; returns its entry scene.
    fn lock_route(&mut self, events: &mut Vec<StoryEvent>) -> Option<String> {
        let story = Arc::clone(&self.story);
        if let Some(route) = self
            .state
            .route_lock
            .as_deref()
            .and_then(|id| story.routes.get(id))
        {
            debug!(route = %route.id, "route already locked");
            return Some(route.scene.clone());
        }

        let Some(route) = story.routes.nearest(&self.state.tendencies) else {
            warn!("route lock requested but the story has no routes");
            return None;
        };
        self.state.route_lock = Some(route.id.clone());
        self.state.push_log(
            format!("[system] Final route locked: {}", route.name),
            story.config.log_capacity,
        );
        info!(route = %route.id, tendencies = %self.state.tendencies, "route locked");
        events.push(StoryEvent::RouteLocked {
            route: route.id.clone(),
            tendencies: self.state.tendencies,
        });
        Some(route.scene.clone())
    }

    fn enter(&mut self, target: &str, events: &mut Vec<StoryEvent>) {
        if target == END_SCENE {
            self.finish_run(events);
            return;
        }

        let story = Arc::clone(&self.story);
        let Some(scene) = story.graph.get(target) else {
            self.fall_back_to_title(target, events);
            return;
        };

        let text = scene.text.render(&self.state);
        self.state.current = SceneCursor::Scene(scene.id.clone());
        self.state.path_history.push(scene.id.clone());
        self.state.push_log(
            format!("[{}]\n{}", scene.title, text),
            story.config.log_capacity,
        );
        self.state.push_dialogue(
            DialogueLine {
                scene: scene.id.clone(),
                speaker: scene.speaker.clone(),
                text,
            },
            story.config.dialogue_capacity,
        );
        debug!(scene = %scene.id, "entered scene");
        events.push(StoryEvent::SceneEntered {
            scene: scene.id.clone(),
        });
        self.autosave(false);
    }

    fn fall_back_to_title(&mut self, missing: &str, events: &mut Vec<StoryEvent>) {
        warn!(missing, "transition target not found, returning to title");
        self.state.current = SceneCursor::Title;
        events.push(StoryEvent::FellBackToTitle {
            missing: missing.to_string(),
        });
        self.autosave(false);
    }

    fn finish_run(&mut self, events: &mut Vec<StoryEvent>) {
        let story = Arc::clone(&self.story);
        if self.state.route_lock.is_none() {
            warn!("reached the end without a route lock, using the nearest route");
        }
        self.state.current = SceneCursor::End;

        let route = story
            .routes
            .resolve_ending(self.state.route_lock.as_deref(), &self.state.tendencies);
        match route {
            Some(route) => {
                self.state.unlock_ending(&route.id);
                self.state.cleared_runs.push(ClearedRun {
                    run_id: RunId::new(),
                    route: route.id.clone(),
                    choices: self.state.choice_history.len(),
                    scenes_visited: self.state.path_history.len(),
                });
                self.state.push_log(
                    format!("[ending] {}", route.ending_title),
                    story.config.log_capacity,
                );
                info!(route = %route.id, tendencies = %self.state.tendencies, "ending reached");
                events.push(StoryEvent::EndingReached {
                    route: route.id.clone(),
                });
            }
            None => warn!("story has no routes, ending without a route"),
        }
        self.autosave(true);
    }

    fn autosave(&mut self, ending: bool) {
        if !self.story.config.autosave {
            return;
        }
        let text = match encode(&self.state) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "autosave failed");
                return;
            }
        };
        let slots: &[&str] = if ending {
            &[AUTO_SLOT, ENDING_SLOT]
        } else {
            &[AUTO_SLOT]
        };
        for slot in slots {
            if let Err(err) = self.store.write(slot, &text) {
                warn!(slot, %err, "autosave failed");
            }
        }
    }

    fn title_view(&self) -> TitleView {
        TitleView {
            unlocked_endings: self.state.unlocked_endings.clone(),
            cleared_runs: self.state.cleared_runs.len(),
        }
    }

    fn scene_view(&self, scene: &Scene) -> SceneView {
        let interaction = match scene.order() {
            Some(order) => {
                let draft = self
                    .current_draft()
                    .unwrap_or_else(|| self.story.drinks.default_draft());
                let preview = self
                    .story
                    .drinks
                    .build_payload(&draft, self.story.config.max_modifiers)
                    .ok();
                Interaction::Order(OrderView {
                    request: order.request.clone(),
                    note: order.note.clone(),
                    npc: order
                        .npc_key
                        .clone()
                        .unwrap_or_else(|| scene.speaker.clone()),
                    draft,
                    preview,
                })
            }
            None => Interaction::Choices(self.visible_choices()),
        };
        SceneView {
            id: scene.id.clone(),
            title: scene.title.clone(),
            speaker: scene.speaker.clone(),
            bg: scene.bg.clone(),
            expression: scene.expression.clone(),
            text: scene.text.render(&self.state),
            interaction,
        }
    }
}
