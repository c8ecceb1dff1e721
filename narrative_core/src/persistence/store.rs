//! Save slots. The transport is pluggable; the engine only needs read/write by slot name.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::PersistenceError;

/// Slot written after every transition.
pub const AUTO_SLOT: &str = "auto";

/// Slot written when an ending is reached.
pub const ENDING_SLOT: &str = "ending";

/// Default file-name prefix of [`DirStore`].
pub const DEFAULT_PREFIX: &str = "neonTape_";

/// Key-value storage for save text. Last write wins; there is no locking.
pub trait SaveStore {
    /// Read a slot; `Ok(None)` when it was never written.
    fn read(&self, slot: &str) -> Result<Option<String>, PersistenceError>;

    fn write(&mut self, slot: &str, text: &str) -> Result<(), PersistenceError>;
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }
}

impl SaveStore for MemoryStore {
    fn read(&self, slot: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.slots.get(slot).cloned())
    }

    fn write(&mut self, slot: &str, text: &str) -> Result<(), PersistenceError> {
        self.slots.insert(slot.to_string(), text.to_string());
        Ok(())
    }
}

/// One JSON file per slot: `<dir>/<prefix><slot>.json`.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
    prefix: String,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_prefix(dir, DEFAULT_PREFIX)
    }

    pub fn with_prefix(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", self.prefix, slot))
    }
}

impl SaveStore for DirStore {
    fn read(&self, slot: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.slot_path(slot);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }

    fn write(&mut self, slot: &str, text: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.slot_path(slot);
        fs::write(&path, text).map_err(|source| PersistenceError::Io { path, source })
    }
}
