//! Provenance record
//!
//! Associates every emitted snippet file with the place its SQL came from.
//! Persisted as `mapping.json` next to the snippets and replaced on each run.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

/// File name of the persisted provenance record
pub const MAPPING_FILE: &str = "mapping.json";

/// Origin of one snippet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    /// Host file the SQL was extracted from
    pub source_file: String,
    /// Best-effort 1-based line in the host file
    pub approx_start_line: u32,
    /// Extraction context (`call`, `@Select`, `<select>`, ...)
    pub context: String,
    /// The normalized SQL written to the snippet
    pub normalized_sql: String,
}

/// Snippet path -> origin, one entry per snippet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvenanceMap {
    entries: BTreeMap<String, ProvenanceEntry>,
}

impl ProvenanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snippet. Returns `false` (and keeps the first entry) when the
    /// path is already present.
    pub fn insert(&mut self, snippet_path: impl Into<String>, entry: ProvenanceEntry) -> bool {
        let key = snippet_path.into();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, entry);
        true
    }

    /// Look up a snippet by its exact path string
    pub fn get(&self, snippet_path: &str) -> Option<&ProvenanceEntry> {
        self.entries.get(snippet_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in snippet path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProvenanceEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Index of absolute snippet path -> key, for resolving paths the
    /// analyzer reports in a different form than they were written.
    pub fn absolute_index(&self, base_dir: &Path) -> HashMap<PathBuf, String> {
        self.entries
            .keys()
            .map(|key| (absolutize(Path::new(key), base_dir), key.clone()))
            .collect()
    }

    /// Persist as pretty-printed JSON, replacing any previous record
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a persisted record
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Absolute form of `path`: joined onto `base_dir` when relative, then
/// canonicalized if it exists, otherwise normalized lexically.
pub fn absolutize(path: &Path, base_dir: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    std::fs::canonicalize(&joined).unwrap_or_else(|_| normalize_lexically(&joined))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
