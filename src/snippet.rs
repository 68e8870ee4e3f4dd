//! Snippet corpus writer
//!
//! Each extracted unit becomes one standalone `.sql` file named by a run-wide
//! sequence number, headed by a comment naming its origin. The writer owns
//! the sequence counter and the provenance map for one run.

use crate::extract::ExtractedUnit;
use crate::provenance::{MAPPING_FILE, ProvenanceEntry, ProvenanceMap};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Prefix shared by every snippet file name
pub const SNIPPET_PREFIX: &str = "extracted_";

/// Extension of snippet files
pub const SNIPPET_EXTENSION: &str = "sql";

/// Writes snippets for one run into an output directory
#[derive(Debug)]
pub struct SnippetWriter {
    output_dir: PathBuf,
    next_id: usize,
    provenance: ProvenanceMap,
}

impl SnippetWriter {
    /// Start a run: create the directory and purge every snippet left by a
    /// previous run.
    pub fn begin(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        let purged = purge_snippets(&output_dir)?;
        if purged > 0 {
            tracing::debug!("Removed {} stale snippet(s) from {}", purged, output_dir.display());
        }
        Ok(Self {
            output_dir,
            next_id: 1,
            provenance: ProvenanceMap::new(),
        })
    }

    /// Directory the snippets are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of snippets written so far
    pub fn snippet_count(&self) -> usize {
        self.next_id - 1
    }

    /// Provenance recorded so far
    pub fn provenance(&self) -> &ProvenanceMap {
        &self.provenance
    }

    /// Write one unit and record its provenance. Returns the snippet path.
    pub fn write(&mut self, unit: &ExtractedUnit) -> Result<PathBuf> {
        let path = self.output_dir.join(snippet_file_name(self.next_id));
        std::fs::write(&path, snippet_body(unit))?;

        let key = path.display().to_string();
        let entry = ProvenanceEntry {
            source_file: unit.source_file().to_string(),
            approx_start_line: unit.approx_line(),
            context: unit.context().to_string(),
            normalized_sql: unit.sql_text().to_string(),
        };
        tracing::debug!("Wrote {} ({}:{})", key, unit.source_file(), unit.approx_line());
        self.provenance.insert(key, entry);
        self.next_id += 1;
        Ok(path)
    }

    /// Finish the run: persist the provenance record and hand it back.
    pub fn finish(self) -> Result<ProvenanceMap> {
        self.provenance.save(&self.output_dir.join(MAPPING_FILE))?;
        Ok(self.provenance)
    }
}

/// File name for the snippet with the given sequence id
pub fn snippet_file_name(id: usize) -> String {
    format!("{}{:05}.{}", SNIPPET_PREFIX, id, SNIPPET_EXTENSION)
}

/// Snippet file contents: origin header then the normalized SQL
pub fn snippet_body(unit: &ExtractedUnit) -> String {
    format!(
        "-- SOURCE: {} | line~{} | ctx={}\n{}\n",
        unit.source_file(),
        unit.approx_line(),
        unit.context(),
        unit.sql_text()
    )
}

/// Delete every snippet file in `dir`; returns how many were removed.
pub fn purge_snippets(dir: &Path) -> Result<usize> {
    let dir_pattern = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/{}*.{}", dir_pattern, SNIPPET_PREFIX, SNIPPET_EXTENSION);
    let paths = glob::glob(&pattern).map_err(|e| Error::Config(format!("bad snippet pattern {}: {}", pattern, e)))?;

    let mut removed = 0;
    for path in paths {
        match path {
            Ok(path) if path.is_file() => {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Cannot inspect {}: {}", e.path().display(), e.error()),
        }
    }
    Ok(removed)
}
