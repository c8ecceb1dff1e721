//! Turn raw documents into a typed [`Story`], collecting every schema problem.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use story_rules::{
    BaseDrink, Condition, DrinkCatalog, Extra, ProfileAxis, RelDelta, RelThreshold, Route,
    RouteTable, StateDelta, SubAxis, TendencyEffect,
};

use super::diagnostics::{Diagnostic, DiagnosticCode, SourceLocation};
use super::loader::{Fragment, LoadedContent};
use super::raw::{RawCatalog, RawChoice, RawEffectRule, RawScene, RawText};
use super::{Story, Whitelist};
use crate::config::EngineConfig;
use crate::order::{EffectRule, OrderOutcome, OrderPredicate, OrderScene, PREDICATE_KEYS};
use crate::scene_graph::{Choice, Scene, SceneGraph, SceneKind, SceneText, TextSegment};

/// Maps scene ids back to the file that defined them.
#[derive(Debug, Clone)]
pub struct SourceIndex<'a> {
    content: &'a LoadedContent,
    origins: HashMap<String, usize>,
}

impl<'a> SourceIndex<'a> {
    pub fn fragment(&self, scene: &str) -> Option<&'a Fragment> {
        self.origins
            .get(scene)
            .and_then(|idx| self.content.fragments.get(*idx))
    }

    pub fn scene(&self, scene: &str) -> Option<SourceLocation> {
        let fragment = self.fragment(scene)?;
        fragment.scene_line(scene).map(|line| fragment.location(line))
    }

    /// Location of the `index`-th choice, falling back to the scene header.
    pub fn choice(&self, scene: &str, index: usize) -> Option<SourceLocation> {
        self.entry(scene, "choices", index)
    }

    /// Location of the `index`-th order rule, falling back to the scene header.
    pub fn effect(&self, scene: &str, index: usize) -> Option<SourceLocation> {
        self.entry(scene, "effects", index)
    }

    pub fn key(&self, scene: &str, key: &str) -> Option<SourceLocation> {
        let fragment = self.fragment(scene)?;
        match fragment.key_line(scene, key) {
            Some(line) => Some(fragment.location(line)),
            None => self.scene(scene),
        }
    }

    fn entry(&self, scene: &str, section: &str, index: usize) -> Option<SourceLocation> {
        let fragment = self.fragment(scene)?;
        match fragment.nth_entry_line(scene, section, index) {
            Some(line) => Some(fragment.location(line)),
            None => self.key(scene, section),
        }
    }
}

/// Output of [`compile`].
#[derive(Debug)]
pub struct Compiled<'a> {
    pub story: Story,
    pub diagnostics: Vec<Diagnostic>,
    pub sources: SourceIndex<'a>,
}

/// Compile loaded content into a story.
///
/// Always produces a story; fields that failed to compile are left at their
/// defaults and reported in `diagnostics`.
pub fn compile(content: &LoadedContent) -> Compiled<'_> {
    let mut compiler = Compiler {
        diagnostics: Vec::new(),
    };

    let mut whitelist = Whitelist::default();
    let mut routes: Vec<Route> = Vec::new();
    let mut config: Option<EngineConfig> = None;
    let mut graph = SceneGraph::new();
    let mut origins: HashMap<String, usize> = HashMap::new();

    for (index, fragment) in content.fragments.iter().enumerate() {
        let Some(doc) = &fragment.document else {
            continue;
        };
        if let Some(list) = &doc.whitelist {
            whitelist.flags.extend(list.flags.iter().cloned());
            whitelist.items.extend(list.items.iter().cloned());
            whitelist.relations.extend(list.relations.iter().cloned());
        }
        routes.extend(doc.routes.iter().cloned());
        if config.is_none() {
            config = doc.engine.clone();
        }

        for (id, raw) in &doc.scenes {
            if let Some(first) = origins.get(id).and_then(|i| content.fragments.get(*i)) {
                let first_site = first
                    .scene_line(id)
                    .map(|line| first.location(line).to_string())
                    .unwrap_or_else(|| first.display.display().to_string());
                let here = fragment.scene_line(id).map(|line| fragment.location(line));
                compiler.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::DuplicateScene,
                        format!("duplicate scene id `{id}` (first defined at {first_site})"),
                    )
                    .in_scene(id.as_str())
                    .at(here),
                );
                continue;
            }
            origins.insert(id.clone(), index);
            let site = SceneSite { fragment, id };
            let scene = compiler.scene(&site, raw);
            graph.insert(scene);
        }
    }

    let drinks = match &content.catalog {
        Some(source) => match &source.catalog {
            Some(raw) => compiler.catalog(raw, &source.display),
            None => DrinkCatalog::default(),
        },
        None => DrinkCatalog::default(),
    };
    if drinks.drinks.is_empty() && graph.iter().any(Scene::is_order) {
        compiler.diagnostics.push(Diagnostic::new(
            DiagnosticCode::InvalidValue,
            "order scenes need a drink catalog (`drinks = \"...\"` in the manifest)",
        ));
    }

    let story = Story {
        graph,
        routes: RouteTable::new(routes),
        drinks,
        whitelist,
        config: config.unwrap_or_default(),
    };
    Compiled {
        story,
        diagnostics: compiler.diagnostics,
        sources: SourceIndex { content, origins },
    }
}

struct SceneSite<'a> {
    fragment: &'a Fragment,
    id: &'a str,
}

impl SceneSite<'_> {
    fn scene(&self) -> Option<SourceLocation> {
        self.fragment
            .scene_line(self.id)
            .map(|line| self.fragment.location(line))
    }

    fn key(&self, key: &str) -> Option<SourceLocation> {
        self.fragment
            .key_line(self.id, key)
            .map(|line| self.fragment.location(line))
            .or_else(|| self.scene())
    }

    fn entry(&self, section: &str, index: usize) -> Option<SourceLocation> {
        self.fragment
            .nth_entry_line(self.id, section, index)
            .map(|line| self.fragment.location(line))
            .or_else(|| self.key(section))
    }
}

struct Compiler {
    diagnostics: Vec<Diagnostic>,
}

impl Compiler {
    fn report(
        &mut self,
        code: DiagnosticCode,
        site: &SceneSite<'_>,
        at: Option<SourceLocation>,
        message: String,
    ) {
        self.diagnostics
            .push(Diagnostic::new(code, message).in_scene(site.id).at(at));
    }

    fn required(
        &mut self,
        site: &SceneSite<'_>,
        value: &Option<String>,
        field: &str,
    ) -> String {
        match value {
            Some(value) => value.clone(),
            None => {
                self.report(
                    DiagnosticCode::MissingField,
                    site,
                    site.scene(),
                    format!("missing required field `{field}`"),
                );
                String::new()
            }
        }
    }

    fn unknown_fields<'v>(
        &mut self,
        site: &SceneSite<'_>,
        at: Option<SourceLocation>,
        what: &str,
        keys: impl Iterator<Item = &'v String>,
    ) {
        for key in keys {
            self.report(
                DiagnosticCode::UnknownField,
                site,
                at.clone(),
                format!("unknown {what} field `{key}`"),
            );
        }
    }

    fn scene(&mut self, site: &SceneSite<'_>, raw: &RawScene) -> Scene {
        self.unknown_fields(site, site.scene(), "scene", raw.unknown.keys());

        let title = self.required(site, &raw.title, "title");
        let speaker = self.required(site, &raw.speaker, "speaker");
        let bg = self.required(site, &raw.bg, "bg");
        let gate = self.gate(site, &raw.if_, &raw.requires, site.key("if"));
        let (text, text_conditions) = self.text(site, raw);

        let kind = match raw.kind.as_deref() {
            Some("dialogue") => self.dialogue(site, raw),
            Some("order") => self.order(site, raw),
            Some(other) => {
                self.report(
                    DiagnosticCode::InvalidValue,
                    site,
                    site.key("type"),
                    format!("unknown scene type `{other}` (expected `dialogue` or `order`)"),
                );
                SceneKind::Dialogue {
                    choices: Vec::new(),
                }
            }
            None => {
                self.report(
                    DiagnosticCode::MissingField,
                    site,
                    site.scene(),
                    "missing required field `type`".to_string(),
                );
                SceneKind::Dialogue {
                    choices: Vec::new(),
                }
            }
        };

        if matches!(kind, SceneKind::Order(_)) && raw.next.is_none() {
            self.report(
                DiagnosticCode::MissingField,
                site,
                site.scene(),
                "order scene is missing `next`".to_string(),
            );
        }

        Scene {
            id: site.id.to_string(),
            kind,
            title,
            speaker,
            bg,
            expression: raw.expression.clone(),
            text,
            text_conditions,
            next: raw.next.clone(),
            tags: raw.tags.clone(),
            gate,
        }
    }

    fn dialogue(&mut self, site: &SceneSite<'_>, raw: &RawScene) -> SceneKind {
        if raw.text.is_none() {
            self.report(
                DiagnosticCode::MissingField,
                site,
                site.scene(),
                "missing required field `text`".to_string(),
            );
        }
        if raw.choices.is_empty() {
            self.report(
                DiagnosticCode::MissingField,
                site,
                site.scene(),
                "dialogue scene has no choices".to_string(),
            );
        }
        for field in order_only_fields(raw) {
            self.report(
                DiagnosticCode::InvalidValue,
                site,
                site.key(field),
                format!("`{field}` only applies to order scenes"),
            );
        }

        let choices = raw
            .choices
            .iter()
            .enumerate()
            .map(|(index, choice)| self.choice(site, index, choice))
            .collect();
        SceneKind::Dialogue { choices }
    }

    fn choice(&mut self, site: &SceneSite<'_>, index: usize, raw: &RawChoice) -> Choice {
        let at = site.entry("choices", index);
        self.unknown_fields(site, at.clone(), "choice", raw.unknown.keys());

        let text = match &raw.text {
            Some(text) => text.clone(),
            None => {
                self.report(
                    DiagnosticCode::MissingField,
                    site,
                    at.clone(),
                    format!("choice #{} is missing `text`", index + 1),
                );
                String::new()
            }
        };
        let next = match &raw.next {
            Some(next) => next.clone(),
            None => {
                self.report(
                    DiagnosticCode::MissingField,
                    site,
                    at.clone(),
                    format!("choice \"{text}\" is missing `next`"),
                );
                String::new()
            }
        };

        let condition = self.gate(site, &raw.if_, &raw.requires, at.clone());
        let effect = self.effect(site, at.clone(), &raw.effect);
        let rel = raw.rel.as_ref().map(|rel| RelDelta {
            name: rel.name.clone(),
            value: self.int(site, at.clone(), "rel.value", rel.value),
        });

        Choice {
            text,
            condition,
            delta: StateDelta {
                set_flags: raw.set_flags.clone(),
                clear_flags: raw.clear_flags.clone(),
                add_items: raw.add_item.clone(),
                remove_items: raw.remove_item.clone(),
                rel,
                effect,
            },
            route_lock: raw.route_lock,
            next,
        }
    }

    fn order(&mut self, site: &SceneSite<'_>, raw: &RawScene) -> SceneKind {
        let request = self.required(site, &raw.request, "request");
        if !raw.choices.is_empty() {
            self.report(
                DiagnosticCode::InvalidValue,
                site,
                site.key("choices"),
                "order scenes take `effects`, not `choices`".to_string(),
            );
        }

        let mut rules = Vec::new();
        let mut fallback: Option<(OrderOutcome, String)> = None;
        for (index, rule) in raw.effects.iter().enumerate() {
            let at = site.entry("effects", index);
            let outcome = self.outcome(site, at.clone(), rule, format!("{}#{}", site.id, index + 1));
            let reported = self.diagnostics.len();
            let when = rule
                .when
                .as_ref()
                .map(|value| self.predicate(site, at.clone(), value))
                .unwrap_or_default();
            // A `when` that failed to compile is never promoted to the catch-all.
            let catch_all = self.diagnostics.len() == reported && when.is_catch_all();

            if let Some((_, catch_all)) = &fallback {
                let message = format!(
                    "order rule `{}` is unreachable: it follows catch-all rule `{catch_all}`",
                    outcome.id
                );
                self.report(DiagnosticCode::UnreachableRule, site, at, message);
                continue;
            }
            if catch_all {
                let id = outcome.id.clone();
                fallback = Some((outcome, id));
            } else {
                rules.push(EffectRule { when, outcome });
            }
        }

        if let Some(default) = &raw.default {
            let at = site.key("default");
            if default.when.is_some() {
                self.report(
                    DiagnosticCode::InvalidValue,
                    site,
                    at.clone(),
                    "`default` rule takes no `when`".to_string(),
                );
            }
            let outcome = self.outcome(site, at.clone(), default, format!("{}#default", site.id));
            let catch_all_id = fallback.as_ref().map(|(_, id)| id.clone());
            match catch_all_id {
                Some(catch_all) => {
                    let message = format!(
                        "`default` is unreachable: catch-all rule `{catch_all}` already matches every order"
                    );
                    self.report(DiagnosticCode::UnreachableRule, site, at, message);
                }
                None => fallback = Some((outcome, String::new())),
            }
        }

        let fallback = match fallback {
            Some((outcome, _)) => outcome,
            None => {
                self.report(
                    DiagnosticCode::MissingCatchAll,
                    site,
                    site.scene(),
                    "order scene has no catch-all rule (end `effects` with a rule without `when`, or add a `default` table)"
                        .to_string(),
                );
                OrderOutcome::default()
            }
        };

        SceneKind::Order(OrderScene {
            request,
            note: raw.note.clone(),
            npc_key: raw.npc_key.clone(),
            rules,
            fallback,
        })
    }

    fn outcome(
        &mut self,
        site: &SceneSite<'_>,
        at: Option<SourceLocation>,
        raw: &RawEffectRule,
        fallback_id: String,
    ) -> OrderOutcome {
        self.unknown_fields(site, at.clone(), "order rule", raw.unknown.keys());
        OrderOutcome {
            id: raw.id.clone().unwrap_or(fallback_id),
            effect: self.effect(site, at, &raw.effect),
            flag_writes: raw.set_flags.clone(),
            reply: raw.reply.clone(),
        }
    }

    fn predicate(
        &mut self,
        site: &SceneSite<'_>,
        at: Option<SourceLocation>,
        value: &toml::Value,
    ) -> OrderPredicate {
        let mut predicate = OrderPredicate::always();
        let Some(table) = value.as_table() else {
            self.report(
                DiagnosticCode::InvalidValue,
                site,
                at,
                "order rule `when` must be a table".to_string(),
            );
            return predicate;
        };

        for (key, value) in table {
            match key.as_str() {
                "min" => predicate.min = self.bounds(site, at.clone(), key, value),
                "max" => predicate.max = self.bounds(site, at.clone(), key, value),
                "tagsAny" => predicate.tags_any = self.strings(site, at.clone(), key, value),
                "tagsAll" => predicate.tags_all = self.strings(site, at.clone(), key, value),
                "state" => predicate.state = Some(self.condition(site, at.clone(), value)),
                other => self.report(
                    DiagnosticCode::UnknownPredicateKey,
                    site,
                    at.clone(),
                    format!(
                        "unknown order-rule key `{other}` (expected {})",
                        PREDICATE_KEYS.join(", ")
                    ),
                ),
            }
        }
        predicate
    }

    fn bounds(
        &mut self,
        site: &SceneSite<'_>,
        at: Option<SourceLocation>,
        key: &str,
        value: &toml::Value,
    ) -> BTreeMap<ProfileAxis, u32> {
        let mut bounds = BTreeMap::new();
        let Some(table) = value.as_table() else {
            self.report(
                DiagnosticCode::InvalidValue,
                site,
                at,
                format!("`{key}` must be a table of profile axes"),
            );
            return bounds;
        };
        for (name, bound) in table {
            let Some(axis) = ProfileAxis::from_key(name) else {
                self.report(
                    DiagnosticCode::UnknownProfileAxis,
                    site,
                    at.clone(),
                    format!("unknown profile axis `{name}` (expected alcohol, sweet, bitter, stim)"),
                );
                continue;
            };
            match bound.as_integer().and_then(|b| u32::try_from(b).ok()) {
                Some(bound) => {
                    bounds.insert(axis, bound);
                }
                None => self.report(
                    DiagnosticCode::InvalidValue,
                    site,
                    at.clone(),
                    format!("`{key}.{name}` must be a non-negative integer"),
                ),
            }
        }
        bounds
    }

    fn gate(
        &mut self,
        site: &SceneSite<'_>,
        if_: &Option<toml::Value>,
        requires: &Option<toml::Value>,
        at: Option<SourceLocation>,
    ) -> Option<Condition> {
        match (if_, requires) {
            (Some(value), None) | (None, Some(value)) => Some(self.condition(site, at, value)),
            (Some(value), Some(_)) => {
                self.report(
                    DiagnosticCode::InvalidValue,
                    site,
                    at.clone(),
                    "both `if` and `requires` given; use one".to_string(),
                );
                Some(self.condition(site, at, value))
            }
            (None, None) => None,
        }
    }

    /// Convert a condition table, reporting every key outside the recognized set.
    fn condition(
        &mut self,
        site: &SceneSite<'_>,
        at: Option<SourceLocation>,
        value: &toml::Value,
    ) -> Condition {
        let mut condition = Condition::new();
        let Some(table) = value.as_table() else {
            self.report(
                DiagnosticCode::InvalidValue,
                site,
                at,
                "condition must be a table".to_string(),
            );
            return condition;
        };

        for (key, value) in table {
            match key.as_str() {
                "flagsAll" => condition.flags_all = self.strings(site, at.clone(), key, value),
                "flagsAny" => condition.flags_any = self.strings(site, at.clone(), key, value),
                "itemAny" => condition.item_any = self.strings(site, at.clone(), key, value),
                "relAtLeast" => condition.rel_at_least = self.threshold(site, at.clone(), value),
                other => self.report(
                    DiagnosticCode::UnknownConditionKey,
                    site,
                    at.clone(),
                    format!("unknown condition key `{other}`"),
                ),
            }
        }
        condition
    }

    fn threshold(
        &mut self,
        site: &SceneSite<'_>,
        at: Option<SourceLocation>,
        value: &toml::Value,
    ) -> Option<RelThreshold> {
        let Some(table) = value.as_table() else {
            self.report(
                DiagnosticCode::InvalidValue,
                site,
                at,
                "`relAtLeast` must be a table `{ name, val }`".to_string(),
            );
            return None;
        };
        for key in table.keys().filter(|k| k.as_str() != "name" && k.as_str() != "val") {
            self.report(
                DiagnosticCode::UnknownConditionKey,
                site,
                at.clone(),
                format!("unknown condition key `relAtLeast.{key}`"),
            );
        }

        let name = table.get("name").and_then(toml::Value::as_str);
        let val = table
            .get("val")
            .and_then(toml::Value::as_integer)
            .and_then(|v| i32::try_from(v).ok());
        match (name, val) {
            (Some(name), Some(val)) => Some(RelThreshold {
                name: name.to_string(),
                val,
            }),
            _ => {
                self.report(
                    DiagnosticCode::InvalidValue,
                    site,
                    at,
                    "`relAtLeast` needs a string `name` and an integer `val`".to_string(),
                );
                None
            }
        }
    }

    fn strings(
        &mut self,
        site: &SceneSite<'_>,
        at: Option<SourceLocation>,
        key: &str,
        value: &toml::Value,
    ) -> Vec<String> {
        let list: Option<Vec<String>> = value.as_array().and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect()
        });
        match list {
            Some(list) => list,
            None => {
                self.report(
                    DiagnosticCode::InvalidValue,
                    site,
                    at,
                    format!("`{key}` must be a list of strings"),
                );
                Vec::new()
            }
        }
    }

    fn effect(
        &mut self,
        site: &SceneSite<'_>,
        at: Option<SourceLocation>,
        raw: &toml::Table,
    ) -> TendencyEffect {
        let mut effect = TendencyEffect::new();
        for (key, value) in raw {
            match SubAxis::from_key(key) {
                Some(sub) => match value.as_integer() {
                    Some(delta) => {
                        let delta = self.int(site, at.clone(), key, delta);
                        effect = effect.with(sub, delta);
                    }
                    None => self.report(
                        DiagnosticCode::InvalidValue,
                        site,
                        at.clone(),
                        format!("`{key}` must be an integer"),
                    ),
                },
                None => self.report(
                    DiagnosticCode::UnknownSubAxis,
                    site,
                    at.clone(),
                    format!(
                        "unknown effect axis `{key}` (expected logic, emotion, coop, oppose, explore, preserve)"
                    ),
                ),
            }
        }
        effect
    }

    fn int(&mut self, site: &SceneSite<'_>, at: Option<SourceLocation>, key: &str, value: i64) -> i32 {
        match i32::try_from(value) {
            Ok(value) => value,
            Err(_) => {
                self.report(
                    DiagnosticCode::InvalidValue,
                    site,
                    at,
                    format!("`{key}` is out of range: {value}"),
                );
                0
            }
        }
    }

    fn text(&mut self, site: &SceneSite<'_>, raw: &RawScene) -> (SceneText, Vec<Condition>) {
        let segments = match &raw.text {
            None => return (SceneText::default(), Vec::new()),
            Some(RawText::Plain(text)) => return (SceneText::Literal(text.clone()), Vec::new()),
            Some(RawText::Segments { segments }) => segments,
        };

        let at = site.key("text");
        let mut compiled = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            self.unknown_fields(site, at.clone(), "text segment", segment.unknown.keys());
            match &segment.if_ {
                Some(value) => {
                    let condition = self.condition(site, at.clone(), value);
                    let then = segment.then.clone().or_else(|| segment.text.clone());
                    let Some(then) = then else {
                        self.report(
                            DiagnosticCode::MissingField,
                            site,
                            at.clone(),
                            format!("text segment #{} has `if` but no `then`", index + 1),
                        );
                        continue;
                    };
                    compiled.push(TextSegment::Branch {
                        condition,
                        then,
                        otherwise: segment.else_.clone(),
                    });
                }
                None => {
                    if segment.then.is_some() || segment.else_.is_some() {
                        self.report(
                            DiagnosticCode::InvalidValue,
                            site,
                            at.clone(),
                            format!("text segment #{} has `then`/`else` without `if`", index + 1),
                        );
                    }
                    match &segment.text {
                        Some(text) => compiled.push(TextSegment::Fixed(text.clone())),
                        None => self.report(
                            DiagnosticCode::MissingField,
                            site,
                            at.clone(),
                            format!("text segment #{} has no `text`", index + 1),
                        ),
                    }
                }
            }
        }

        let conditions = compiled
            .iter()
            .filter_map(TextSegment::condition)
            .cloned()
            .collect();
        (SceneText::from_segments(compiled), conditions)
    }

    fn catalog(&mut self, raw: &RawCatalog, file: &Path) -> DrinkCatalog {
        let mut extras = Vec::with_capacity(raw.extras.len());
        for extra in &raw.extras {
            let mut delta = BTreeMap::new();
            for (key, value) in &extra.delta {
                match ProfileAxis::from_key(key) {
                    Some(axis) => {
                        delta.insert(axis, *value);
                    }
                    None => self.diagnostics.push(Diagnostic::new(
                        DiagnosticCode::UnknownProfileAxis,
                        format!(
                            "{}: extra `{}` uses unknown profile axis `{key}`",
                            file.display(),
                            extra.id
                        ),
                    )),
                }
            }
            extras.push(Extra {
                id: extra.id.clone(),
                name: extra.name.clone(),
                desc: extra.desc.clone(),
                delta,
                tags: extra.tags.clone(),
            });
        }
        let drinks: Vec<BaseDrink> = raw.drinks.clone();
        DrinkCatalog { drinks, extras }
    }
}

fn order_only_fields(raw: &RawScene) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if raw.request.is_some() {
        fields.push("request");
    }
    if !raw.effects.is_empty() {
        fields.push("effects");
    }
    if raw.default.is_some() {
        fields.push("default");
    }
    fields
}
