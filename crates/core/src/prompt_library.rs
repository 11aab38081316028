//! Reusable prompt snippets grouped by category, persisted as JSON.
//!
//! File shape:
//!
//! ```json
//! {
//!   "categories": ["Landscape"],
//!   "prompts": { "Landscape": [{ "name": "Sunset", "prompt": "..." }] }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A named prompt snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptEntry {
    pub name: String,
    pub prompt: String,
}

/// On-disk prompt catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptLibrary {
    /// Category names in display order.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub prompts: BTreeMap<String, Vec<PromptEntry>>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl PromptLibrary {
    /// Load the library at `path`.
    ///
    /// A missing or unreadable file yields the default library (bound to
    /// `path`, so a later [`save`](Self::save) creates it).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut library = match Self::read(&path) {
            Ok(library) => library,
            Err(CoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Prompt library not found, using defaults");
                Self::with_defaults()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load prompt library, using defaults");
                Self::with_defaults()
            }
        };
        library.path = Some(path);
        library
    }

    /// Strictly read and parse a library file.
    pub fn read(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| CoreError::json(path, e))
    }

    /// The built-in starter library.
    pub fn with_defaults() -> Self {
        let mut library = Self::default();
        for (category, name, prompt) in DEFAULT_PROMPTS {
            library.insert(category, name, prompt);
        }
        library
    }

    /// The file this library was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Add a prompt, creating the category if needed.
    ///
    /// An existing entry with the same name in that category is replaced.
    /// Persists immediately when the library is bound to a file.
    pub fn add_prompt(
        &mut self,
        category: &str,
        name: &str,
        prompt: &str,
    ) -> Result<(), CoreError> {
        if category.trim().is_empty() || name.trim().is_empty() {
            return Err(CoreError::Validation(
                "Prompt category and name must not be empty".to_string(),
            ));
        }
        self.insert(category, name, prompt);
        if self.path.is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Prompts in `category`, empty when the category is unknown.
    pub fn prompts_in(&self, category: &str) -> &[PromptEntry] {
        self.prompts.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a prompt by category and name.
    pub fn find(&self, category: &str, name: &str) -> Option<&PromptEntry> {
        self.prompts_in(category).iter().find(|p| p.name == name)
    }

    /// Write the library to its bound path as pretty JSON.
    pub fn save(&self) -> Result<(), CoreError> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| CoreError::Internal("Prompt library has no backing file".into()))?;
        self.save_to(path)
    }

    /// Write the library to `path` as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| CoreError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| CoreError::io(path, e))
    }

    fn insert(&mut self, category: &str, name: &str, prompt: &str) {
        if !self.categories.iter().any(|c| c == category) {
            self.categories.push(category.to_string());
        }
        let entries = self.prompts.entry(category.to_string()).or_default();
        let entry = PromptEntry {
            name: name.to_string(),
            prompt: prompt.to_string(),
        };
        match entries.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }
}

const DEFAULT_PROMPTS: &[(&str, &str, &str)] = &[
    (
        "Landscape",
        "Sunset beach",
        "A beautiful sunset over the beach with gentle waves.",
    ),
    (
        "Landscape",
        "Snowy mountains",
        "A high mountain range covered in white snow, mist around the peaks.",
    ),
    (
        "Portrait",
        "Artistic portrait",
        "Artistic portrait with natural light and a blurred background.",
    ),
    (
        "Portrait",
        "Fashion portrait",
        "Fashion-style portrait with neutral tones.",
    ),
    (
        "Camera movement",
        "Zoom on subject",
        "[Zoom in] Detailed close-up of the subject.",
    ),
    (
        "Camera movement",
        "Pan the scene",
        "[Pan left] Sweep across the scene from right to left, revealing the whole view.",
    ),
    (
        "Camera movement",
        "Truck and zoom",
        "[Truck right, Zoom in] Move right while zooming in on the subject.",
    ),
];
