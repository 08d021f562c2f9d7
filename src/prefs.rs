//! Persisted UI preferences: string keys mapped to booleans.

use crate::Result;
use log::warn;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Set once the user has dismissed the first-time drawing hint
pub const HINT_DISMISSED: &str = "hint-dismissed";

/// Boolean preferences, optionally backed by a JSON file
#[derive(Debug, Clone, Default)]
pub struct Preferences {
    path: Option<PathBuf>,
    values: BTreeMap<String, bool>,
}

impl Preferences {
    /// Preferences that are never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file starts empty; an unreadable one is
    /// logged and replaced on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("ignoring corrupt preferences at {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            values,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Value for `key`, `false` when unset
    pub fn get(&self, key: &str) -> bool {
        self.values.get(key).copied().unwrap_or(false)
    }

    /// Set `key` and persist when file-backed
    pub fn set(&mut self, key: &str, value: bool) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Whether the first-time hint should still be shown
    pub fn show_hint(&self) -> bool {
        !self.get(HINT_DISMISSED)
    }
}
