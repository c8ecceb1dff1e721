//! Static Graph Validator - proves a story is well-formed before it ships.
//!
//! Loads content through the same loader the runtime uses, then collects
//! every problem instead of stopping at the first:
//!
//! - read/parse/include problems and duplicate scene ids (both sites)
//! - schema problems found while compiling: unknown condition keys, order-rule
//!   predicate keys, profile axes and sub-axes, missing or misplaced catch-alls
//! - transition targets that are neither `END` nor an existing scene
//! - flag, item and relationship names outside the whitelist, read or written
//! - route entry scenes that do not exist, route locks without routes
//! - condition literals with unknown keys anywhere in the raw text

mod scan;

pub use scan::*;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use story_rules::{Condition, StateDelta};

use crate::content::{
    compile, load_content, Diagnostic, DiagnosticCode, LoadedContent, SourceIndex, SourceLocation,
    Story, Whitelist,
};

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Story manifest to check.
    pub content_path: PathBuf,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            content_path: PathBuf::from(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../content/story.toml"
            )),
        }
    }
}

/// Counts printed when validation passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub scenes: usize,
    pub flags: usize,
    pub items: usize,
    pub relations: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scenes={}, flags={}, items={}, relations={}",
            self.scenes, self.flags, self.items, self.relations
        )
    }
}

/// Outcome of one validation run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    /// Checks that were skipped and why.
    pub notes: Vec<String>,
    pub summary: Option<Summary>,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.summary, self.passed()) {
            (Some(summary), true) => write!(f, "Story validation passed. {summary}"),
            _ => write!(
                f,
                "Story validation failed with {} error(s).",
                self.diagnostics.len()
            ),
        }
    }
}

/// Validate the story at `options.content_path`.
pub fn validate(options: &ValidatorOptions) -> Report {
    validate_path(&options.content_path)
}

pub fn validate_path(manifest: &Path) -> Report {
    let content = load_content(manifest);
    validate_content(&content)
}

/// Validate already loaded content.
pub fn validate_content(content: &LoadedContent) -> Report {
    let mut report = Report::default();
    report.diagnostics.extend(content.problems.iter().cloned());

    let compiled = compile(content);
    report.diagnostics.extend(compiled.diagnostics.iter().cloned());

    let story = &compiled.story;
    let sources = &compiled.sources;
    let mut checker = Checker {
        story,
        sources,
        diagnostics: Vec::new(),
    };

    if content.failed_fragments() == 0 {
        checker.transitions();
    } else {
        report.notes.push(format!(
            "transition check skipped: {} file(s) failed to load",
            content.failed_fragments()
        ));
    }
    checker.whitelist();
    checker.routes();
    report.diagnostics.extend(checker.diagnostics);

    let scanned: Vec<Diagnostic> = content.fragments.iter().flat_map(scan_fragment).collect();
    report.diagnostics.extend(unseen(&report.diagnostics, scanned));

    let whitelist = &story.whitelist;
    report.summary = Some(Summary {
        scenes: story.graph.len(),
        flags: whitelist.flags.len(),
        items: whitelist.items.len(),
        relations: whitelist.relations.len(),
    });

    if report.passed() {
        info!(scenes = story.graph.len(), "story validation passed");
    } else {
        info!(errors = report.diagnostics.len(), "story validation failed");
    }
    report
}

/// Raw-scan findings not already reported by the data walk.
///
/// The two passes locate the same problem at different lines, so they are
/// matched by file and message, occurrence by occurrence.
fn unseen(reported: &[Diagnostic], scanned: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let key = |d: &Diagnostic| {
        (
            d.location.as_ref().map(|loc| loc.file.clone()),
            d.message.clone(),
        )
    };
    let mut budget: HashMap<(Option<PathBuf>, String), usize> = HashMap::new();
    for diagnostic in reported
        .iter()
        .filter(|d| d.code == DiagnosticCode::UnknownConditionKey)
    {
        *budget.entry(key(diagnostic)).or_default() += 1;
    }

    scanned
        .into_iter()
        .filter(|diagnostic| match budget.get_mut(&key(diagnostic)) {
            Some(left) if *left > 0 => {
                *left -= 1;
                false
            }
            _ => {
                debug!(%diagnostic, "found only by the raw scan");
                true
            }
        })
        .collect()
}

struct Checker<'s, 'c> {
    story: &'s Story,
    sources: &'s SourceIndex<'c>,
    diagnostics: Vec<Diagnostic>,
}

impl Checker<'_, '_> {
    fn push(&mut self, code: DiagnosticCode, scene: &str, at: Option<SourceLocation>, message: String) {
        self.diagnostics
            .push(Diagnostic::new(code, message).in_scene(scene).at(at));
    }

    fn transitions(&mut self) {
        let story = self.story;
        let graph = &story.graph;
        let start = &story.config.start_scene;
        if !graph.contains(start) {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticCode::DanglingTransition,
                format!("start scene `{start}` does not exist"),
            ));
        }

        for id in graph.sorted_ids() {
            let Some(scene) = graph.get(id) else {
                continue;
            };
            for (index, choice) in scene.choices().iter().enumerate() {
                if !graph.resolves(&choice.next) {
                    self.push(
                        DiagnosticCode::DanglingTransition,
                        id,
                        self.sources.choice(id, index),
                        format!(
                            "choice \"{}\" points to missing scene `{}`",
                            choice.text, choice.next
                        ),
                    );
                }
            }
            if let Some(next) = &scene.next {
                if !graph.resolves(next) {
                    self.push(
                        DiagnosticCode::DanglingTransition,
                        id,
                        self.sources.key(id, "next"),
                        format!("next points to missing scene `{next}`"),
                    );
                }
            }
        }
    }

    fn whitelist(&mut self) {
        let story = self.story;
        let graph = &story.graph;
        for id in graph.sorted_ids() {
            let Some(scene) = graph.get(id) else {
                continue;
            };

            if let Some(gate) = &scene.gate {
                let at = self.sources.scene(id);
                self.condition(id, at, gate);
            }
            for condition in &scene.text_conditions {
                let at = self.sources.key(id, "text");
                self.condition(id, at, condition);
            }
            for (index, choice) in scene.choices().iter().enumerate() {
                let at = self.sources.choice(id, index);
                if let Some(condition) = &choice.condition {
                    self.condition(id, at.clone(), condition);
                }
                self.delta(id, at, &choice.delta);
            }

            let Some(order) = scene.order() else {
                continue;
            };
            for (index, rule) in order.rules.iter().enumerate() {
                let at = self.sources.effect(id, index);
                if let Some(state) = &rule.when.state {
                    self.condition(id, at.clone(), state);
                }
                self.delta(id, at, &rule.outcome.delta());
            }
            let fallback_at = self
                .sources
                .fragment(id)
                .and_then(|fragment| {
                    fragment
                        .key_line(id, "default")
                        .map(|line| fragment.location(line))
                })
                .or_else(|| self.sources.effect(id, order.rules.len()));
            self.delta(id, fallback_at, &order.fallback.delta());
        }
    }

    fn condition(&mut self, scene: &str, at: Option<SourceLocation>, condition: &Condition) {
        let list: &Whitelist = &self.story.whitelist;
        let mut found = Vec::new();
        for flag in condition.referenced_flags() {
            if !list.has_flag(flag) {
                found.push((
                    DiagnosticCode::UndefinedFlag,
                    format!("condition references undefined flag `{flag}`"),
                ));
            }
        }
        for item in condition.referenced_items() {
            if !list.has_item(item) {
                found.push((
                    DiagnosticCode::UndefinedItem,
                    format!("condition references undefined item `{item}`"),
                ));
            }
        }
        if let Some(name) = condition.referenced_relation() {
            if !list.has_relation(name) {
                found.push((
                    DiagnosticCode::UndefinedRelation,
                    format!("condition references undefined relationship `{name}`"),
                ));
            }
        }
        for (code, message) in found {
            self.push(code, scene, at.clone(), message);
        }
    }

    fn delta(&mut self, scene: &str, at: Option<SourceLocation>, delta: &StateDelta) {
        let list: &Whitelist = &self.story.whitelist;
        let mut found = Vec::new();
        let flag_writes = [("setFlags", &delta.set_flags), ("clearFlags", &delta.clear_flags)];
        for (field, flags) in flag_writes {
            for flag in flags.iter().filter(|f| !list.has_flag(f)) {
                found.push((
                    DiagnosticCode::UndefinedFlag,
                    format!("{field} writes undefined flag `{flag}`"),
                ));
            }
        }
        let item_writes = [("addItem", &delta.add_items), ("removeItem", &delta.remove_items)];
        for (field, items) in item_writes {
            for item in items.iter().filter(|i| !list.has_item(i)) {
                found.push((
                    DiagnosticCode::UndefinedItem,
                    format!("{field} writes undefined item `{item}`"),
                ));
            }
        }
        if let Some(rel) = &delta.rel {
            if !list.has_relation(&rel.name) {
                found.push((
                    DiagnosticCode::UndefinedRelation,
                    format!("rel writes undefined relationship `{}`", rel.name),
                ));
            }
        }
        for (code, message) in found {
            self.push(code, scene, at.clone(), message);
        }
    }

    fn routes(&mut self) {
        let story = self.story;
        for route in story.routes.iter() {
            if !story.graph.contains(&route.scene) {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticCode::UnknownRoute,
                    format!(
                        "route `{}` enters missing scene `{}`",
                        route.id, route.scene
                    ),
                ));
            }
        }

        if !story.routes.is_empty() {
            return;
        }
        for id in story.graph.sorted_ids() {
            let Some(scene) = story.graph.get(id) else {
                continue;
            };
            for (index, choice) in scene.choices().iter().enumerate() {
                if choice.route_lock {
                    self.push(
                        DiagnosticCode::UnknownRoute,
                        id,
                        self.sources.choice(id, index),
                        format!(
                            "choice \"{}\" locks a route but no routes are declared",
                            choice.text
                        ),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn validate_str(body: &str) -> Report {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("story.toml");
        fs::write(&manifest, body).unwrap();
        validate_path(&manifest)
    }

    const HEADER: &str = r#"
[whitelist]
flags = ["corpTrust"]
items = ["memoryTape"]
relations = ["hacker"]

[[routes]]
id = "A"
name = "Glass Ceasefire"
target = { rational = 4, cooperate = 4, explore = -3 }
scene = "s00"
"#;

    #[test]
    fn test_clean_story_passes() {
        let report = validate_str(&format!(
            "{HEADER}{}",
            r#"
[scenes.s00]
type = "dialogue"
title = "Night shift"
speaker = "zero"
bg = "bar"
text = "Rain."

[[scenes.s00.choices]]
text = "Lock it in."
if = { flagsAny = ["corpTrust"], relAtLeast = { name = "hacker", val = 0 } }
addItem = ["memoryTape"]
routeLock = true
next = "END"
"#
        ));
        assert!(report.passed(), "{:?}", report.diagnostics);
        assert_eq!(
            report.to_string(),
            "Story validation passed. scenes=1, flags=1, items=1, relations=1"
        );
    }

    #[test]
    fn test_dangling_and_undefined_names() {
        let report = validate_str(&format!(
            "{HEADER}{}",
            r#"
[scenes.s00]
type = "dialogue"
title = "Night shift"
speaker = "zero"
bg = "bar"
text = "Rain."

[[scenes.s00.choices]]
text = "Follow the courier."
if = { flagsAll = ["corpTrusted"] }
setFlags = ["ghostMode"]
rel = { name = "courier", value = 1 }
next = "s99"
"#
        ));
        assert!(!report.passed());
        assert_eq!(report.count(DiagnosticCode::DanglingTransition), 1);
        assert_eq!(report.count(DiagnosticCode::UndefinedFlag), 2);
        assert_eq!(report.count(DiagnosticCode::UndefinedRelation), 1);

        let dangling = report
            .diagnostics
            .iter()
            .find(|d| d.code == DiagnosticCode::DanglingTransition)
            .unwrap();
        assert_eq!(
            dangling.to_string(),
            "[scene:s00 story.toml:20] choice \"Follow the courier.\" points to missing scene `s99`"
        );
    }

    #[test]
    fn test_route_checks() {
        let report = validate_str(
            r#"
[[routes]]
id = "A"
name = "Glass Ceasefire"
target = { rational = 4, cooperate = 4, explore = -3 }
scene = "s10A"

[scenes.s00]
type = "dialogue"
title = "Night shift"
speaker = "zero"
bg = "bar"
text = "Rain."

[[scenes.s00.choices]]
text = "Go"
next = "END"
"#,
        );
        assert_eq!(report.count(DiagnosticCode::UnknownRoute), 1);

        let report = validate_str(
            r#"
[scenes.s00]
type = "dialogue"
title = "Night shift"
speaker = "zero"
bg = "bar"
text = "Rain."

[[scenes.s00.choices]]
text = "Decide"
routeLock = true
next = "END"
"#,
        );
        assert_eq!(report.count(DiagnosticCode::UnknownRoute), 1);
    }

    #[test]
    fn test_raw_scan_does_not_double_report() {
        let report = validate_str(&format!(
            "{HEADER}{}",
            r#"
[scenes.s00]
type = "dialogue"
title = "Night shift"
speaker = "zero"
bg = "bar"
text = "Rain."

[[scenes.s00.choices]]
text = "Go"
if = { flagsAll = ["corpTrust"], flagz = ["x"] }
next = "END"
"#
        ));
        assert_eq!(report.count(DiagnosticCode::UnknownConditionKey), 1);
    }

    #[test]
    fn test_parse_failure_skips_transition_check() {
        let report = validate_str("[scenes.s00\ntitle = 1");
        assert!(!report.passed());
        assert_eq!(report.count(DiagnosticCode::TomlMalformed), 1);
        assert_eq!(report.notes.len(), 1);
        assert_eq!(report.count(DiagnosticCode::DanglingTransition), 0);
    }
}
