//! Authoring diagnostics shared by the content loader and the validator.

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    ReadFile,
    TomlMalformed,
    FragmentCycle,
    DuplicateScene,
    UnknownField,
    MissingField,
    InvalidValue,
    DanglingTransition,
    UnknownConditionKey,
    UnknownPredicateKey,
    UnknownSubAxis,
    UnknownProfileAxis,
    UndefinedFlag,
    UndefinedItem,
    UndefinedRelation,
    MissingCatchAll,
    UnreachableRule,
    UnknownRoute,
}

/// One authoring problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub scene: Option<String>,
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            scene: None,
            location: None,
            message: message.into(),
        }
    }

    pub fn in_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = Some(scene.into());
        self
    }

    pub fn at(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    pub fn at_line(self, file: &Path, line: usize) -> Self {
        self.at(Some(SourceLocation::new(file, line)))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.scene, &self.location) {
            (Some(scene), Some(loc)) => write!(f, "[scene:{} {}] {}", scene, loc, self.message),
            (Some(scene), None) => write!(f, "[scene:{}] {}", scene, self.message),
            (None, Some(loc)) => write!(f, "[{}] {}", loc, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_scene_and_line() {
        let diag = Diagnostic::new(
            DiagnosticCode::DanglingTransition,
            "goto target not found: s99",
        )
        .in_scene("s04")
        .at_line(Path::new("chapters/chapter1.toml"), 88);
        assert_eq!(
            diag.to_string(),
            "[scene:s04 chapters/chapter1.toml:88] goto target not found: s99"
        );
    }

    #[test]
    fn test_display_without_scene() {
        let diag = Diagnostic::new(DiagnosticCode::UnknownConditionKey, "unknown condition key `x`")
            .at_line(Path::new("story.toml"), 3);
        assert_eq!(diag.to_string(), "[story.toml:3] unknown condition key `x`");
        assert_eq!(
            Diagnostic::new(DiagnosticCode::ReadFile, "boom").to_string(),
            "boom"
        );
    }
}
