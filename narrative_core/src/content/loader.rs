//! Fragment loading: follow `fragments` includes from the manifest and keep
//! every file's text around for line lookups.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::diagnostics::{Diagnostic, DiagnosticCode, SourceLocation};
use super::raw::{RawCatalog, RawDocument};

/// One table header in a content file, e.g. `[[scenes.s01.effects]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SceneHeader {
    line: usize,
    scene: String,
    /// Dotted path below the scene, empty for `[scenes.<id>]` itself.
    path: Vec<String>,
}

/// A loaded content file.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Path used to read the file.
    pub path: PathBuf,
    /// Path shown in diagnostics, relative to the manifest directory.
    pub display: PathBuf,
    pub source: String,
    /// `None` when the file failed to parse.
    pub document: Option<RawDocument>,
    headers: Vec<SceneHeader>,
}

impl Fragment {
    fn new(path: PathBuf, display: PathBuf, source: String, document: Option<RawDocument>) -> Self {
        let headers = index_headers(&source);
        Self {
            path,
            display,
            source,
            document,
            headers,
        }
    }

    pub fn location(&self, line: usize) -> SourceLocation {
        SourceLocation::new(&self.display, line)
    }

    /// First header line that belongs to the scene.
    pub fn scene_line(&self, scene: &str) -> Option<usize> {
        self.headers
            .iter()
            .find(|h| h.scene == scene)
            .map(|h| h.line)
    }

    /// Lines of every `[scenes.<id>]` header, for duplicate detection.
    pub fn scene_table_lines(&self, scene: &str) -> Vec<usize> {
        self.headers
            .iter()
            .filter(|h| h.scene == scene && h.path.is_empty())
            .map(|h| h.line)
            .collect()
    }

    /// Line of the `n`-th `[[scenes.<id>.<section>]]` header.
    pub fn nth_entry_line(&self, scene: &str, section: &str, n: usize) -> Option<usize> {
        self.headers
            .iter()
            .filter(|h| h.scene == scene && h.path.len() == 1 && h.path[0] == section)
            .nth(n)
            .map(|h| h.line)
    }

    /// Line where `key` is assigned directly in the scene table, or where a
    /// `[scenes.<id>.<key>]` sub-table starts.
    pub fn key_line(&self, scene: &str, key: &str) -> Option<usize> {
        if let Some(header) = self
            .headers
            .iter()
            .find(|h| h.scene == scene && h.path.first().map(String::as_str) == Some(key))
        {
            return Some(header.line);
        }

        let mut in_scene = false;
        for (idx, line) in self.source.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with('[') {
                in_scene = self
                    .headers
                    .iter()
                    .any(|h| h.line == idx + 1 && h.scene == scene && h.path.is_empty());
                continue;
            }
            if in_scene {
                if let Some(rest) = trimmed.strip_prefix(key) {
                    if rest.trim_start().starts_with('=') {
                        return Some(idx + 1);
                    }
                }
            }
        }
        None
    }

    /// Scene whose table encloses `line`, if any.
    pub fn scene_at(&self, line: usize) -> Option<&str> {
        let mut current = None;
        for (idx, raw) in self.source.lines().enumerate() {
            if idx + 1 > line {
                break;
            }
            if raw.trim_start().starts_with('[') {
                current = self
                    .headers
                    .iter()
                    .find(|h| h.line == idx + 1)
                    .map(|h| h.scene.as_str());
            }
        }
        current
    }
}

fn index_headers(source: &str) -> Vec<SceneHeader> {
    let Ok(pattern) =
        Regex::new(r"^\s*\[\[?\s*scenes\.([A-Za-z0-9_-]+)((?:\.[A-Za-z0-9_-]+)*)\s*\]\]?")
    else {
        return Vec::new();
    };

    source
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let caps = pattern.captures(line)?;
            let scene = caps.get(1)?.as_str().to_string();
            let path = caps
                .get(2)
                .map(|m| {
                    m.as_str()
                        .split('.')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(SceneHeader {
                line: idx + 1,
                scene,
                path,
            })
        })
        .collect()
}

/// The drink catalog file named by the manifest.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    pub display: PathBuf,
    pub catalog: Option<RawCatalog>,
}

/// Everything read from disk for one story.
#[derive(Debug, Clone, Default)]
pub struct LoadedContent {
    /// Directory of the manifest; fragment paths are shown relative to it.
    pub root: PathBuf,
    /// Manifest first, then fragments in depth-first include order.
    pub fragments: Vec<Fragment>,
    pub catalog: Option<CatalogSource>,
    /// I/O, parse and include problems.
    pub problems: Vec<Diagnostic>,
}

impl LoadedContent {
    pub fn manifest(&self) -> Option<&Fragment> {
        self.fragments.first()
    }

    /// Number of files that could not be read or parsed.
    pub fn failed_fragments(&self) -> usize {
        self.problems
            .iter()
            .filter(|d| matches!(d.code, DiagnosticCode::ReadFile | DiagnosticCode::TomlMalformed))
            .count()
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }
}

/// Read the manifest and every fragment it transitively includes.
///
/// Never fails: problems are collected so that the validator can report all
/// of them. A file included from two places is loaded once; an include cycle
/// is reported and not followed.
pub fn load_content(manifest: &Path) -> LoadedContent {
    let root = manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut loader = Loader {
        root: root.clone(),
        seen: HashSet::new(),
        stack: Vec::new(),
        content: LoadedContent {
            root,
            ..Default::default()
        },
    };
    loader.visit(manifest.to_path_buf(), None);

    let catalog_path = loader
        .content
        .manifest()
        .and_then(|m| m.document.as_ref())
        .and_then(|doc| doc.drinks.clone());
    if let Some(rel) = catalog_path {
        let path = loader.root.join(&rel);
        loader.content.catalog = Some(loader.read_catalog(path));
    }

    debug!(
        fragments = loader.content.fragments.len(),
        problems = loader.content.problems.len(),
        "loaded story content"
    );
    loader.content
}

struct Loader {
    root: PathBuf,
    seen: HashSet<PathBuf>,
    stack: Vec<PathBuf>,
    content: LoadedContent,
}

impl Loader {
    fn display(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    fn visit(&mut self, path: PathBuf, included_from: Option<SourceLocation>) {
        let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if self.stack.contains(&key) {
            let message = format!(
                "fragment include cycle: {} includes itself",
                self.display(&path).display()
            );
            self.content
                .problems
                .push(Diagnostic::new(DiagnosticCode::FragmentCycle, message).at(included_from));
            return;
        }
        if !self.seen.insert(key.clone()) {
            return;
        }

        let display = self.display(&path);
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) => {
                let message = format!("cannot read {}: {}", display.display(), err);
                self.content
                    .problems
                    .push(Diagnostic::new(DiagnosticCode::ReadFile, message).at(included_from));
                return;
            }
        };

        let document = match toml::from_str::<RawDocument>(&source) {
            Ok(doc) => Some(doc),
            Err(err) => {
                let line = err
                    .span()
                    .map(|span| line_of_offset(&source, span.start))
                    .unwrap_or(1);
                let message = format!("malformed TOML: {}", err.message());
                self.content.problems.push(
                    Diagnostic::new(DiagnosticCode::TomlMalformed, message)
                        .at_line(&display, line),
                );
                None
            }
        };

        let fragment = Fragment::new(path.clone(), display, source, document);
        self.report_same_file_duplicates(&fragment);
        let includes: Vec<(String, usize)> = fragment
            .document
            .as_ref()
            .map(|doc| {
                doc.fragments
                    .iter()
                    .map(|rel| (rel.clone(), include_line(&fragment.source, rel)))
                    .collect()
            })
            .unwrap_or_default();
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let from = fragment.display.clone();
        self.content.fragments.push(fragment);

        self.stack.push(key);
        for (rel, line) in includes {
            self.visit(base.join(rel), Some(SourceLocation::new(&from, line)));
        }
        self.stack.pop();
    }

    /// A scene table defined twice in one file does not even parse, so the
    /// header scan reports both sites.
    fn report_same_file_duplicates(&mut self, fragment: &Fragment) {
        let mut by_scene: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for header in fragment.headers.iter().filter(|h| h.path.is_empty()) {
            by_scene.entry(header.scene.as_str()).or_default().push(header.line);
        }
        for (scene, lines) in by_scene {
            if let [first, rest @ ..] = lines.as_slice() {
                for line in rest {
                    let message = format!(
                        "duplicate scene id `{scene}` (first defined at {})",
                        fragment.location(*first)
                    );
                    self.content.problems.push(
                        Diagnostic::new(DiagnosticCode::DuplicateScene, message)
                            .in_scene(scene)
                            .at(Some(fragment.location(*line))),
                    );
                }
            }
        }
    }

    fn read_catalog(&mut self, path: PathBuf) -> CatalogSource {
        let display = self.display(&path);
        let catalog = match fs::read_to_string(&path) {
            Ok(source) => match toml::from_str::<RawCatalog>(&source) {
                Ok(catalog) => Some(catalog),
                Err(err) => {
                    let line = err
                        .span()
                        .map(|span| line_of_offset(&source, span.start))
                        .unwrap_or(1);
                    let message = format!("malformed drink catalog: {}", err.message());
                    self.content.problems.push(
                        Diagnostic::new(DiagnosticCode::TomlMalformed, message)
                            .at_line(&display, line),
                    );
                    None
                }
            },
            Err(err) => {
                let message = format!("cannot read {}: {}", display.display(), err);
                self.content
                    .problems
                    .push(Diagnostic::new(DiagnosticCode::ReadFile, message));
                None
            }
        };
        CatalogSource { display, catalog }
    }
}

fn line_of_offset(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

fn include_line(source: &str, rel: &str) -> usize {
    source
        .lines()
        .position(|line| line.contains(rel))
        .map(|idx| idx + 1)
        .unwrap_or(1)
}
