//! Finding remapping
//!
//! Findings reference snippet files. Each one is traced back through the
//! provenance map to the host file it was extracted from. A snippet is one
//! normalized line with no row structure of its own, so a remapped finding
//! spans the unit's approximate line with a fixed column range.

use crate::analyzer::{AnalyzerReport, Finding};
use crate::provenance::{ProvenanceEntry, ProvenanceMap, absolutize};
use crate::Result;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Column range given to every remapped finding
pub const SYNTHETIC_START_COLUMN: u32 = 1;
pub const SYNTHETIC_END_COLUMN: u32 = 120;

/// A finding in the consolidated report.
///
/// Resolved findings carry a rewritten `location` plus `extracted_from`,
/// `context` and `normalized_sql`; unresolved ones are the analyzer's record
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedFinding {
    pub finding: Finding,
    resolved: bool,
}

impl Serialize for ReportedFinding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.finding.serialize(serializer)
    }
}

impl ReportedFinding {
    fn unresolved(finding: Finding) -> Self {
        Self { finding, resolved: false }
    }

    /// Whether the finding was traced back to a host file
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    fn provenance_field(&self, key: &str) -> Option<&str> {
        if !self.resolved {
            return None;
        }
        self.finding.as_value().get(key).and_then(Value::as_str)
    }

    /// Snippet the analyzer reported on
    pub fn extracted_from(&self) -> Option<&str> {
        self.provenance_field("extracted_from")
    }

    pub fn context(&self) -> Option<&str> {
        self.provenance_field("context")
    }

    pub fn normalized_sql(&self) -> Option<&str> {
        self.provenance_field("normalized_sql")
    }
}

/// Facts about the extraction half of the run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub snippet_count: usize,
    pub sources_scanned: usize,
    pub output_dir: String,
    /// Per-file problems that were skipped over
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Terminal artifact of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedReport {
    pub findings: Vec<ReportedFinding>,
    pub summary: Value,
    pub extraction_metadata: ExtractionMetadata,
}

impl ConsolidatedReport {
    /// Number of findings traced back to a host file
    pub fn resolved_count(&self) -> usize {
        self.findings.iter().filter(|f| f.is_resolved()).count()
    }

    /// Persist as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Maps findings on snippets back to host source locations
pub struct FindingRemapper<'a> {
    provenance: &'a ProvenanceMap,
    absolute: HashMap<PathBuf, String>,
    base_dir: PathBuf,
}

impl<'a> FindingRemapper<'a> {
    /// `base_dir` anchors relative paths when comparing absolute forms
    pub fn new(provenance: &'a ProvenanceMap, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            absolute: provenance.absolute_index(&base_dir),
            provenance,
            base_dir,
        }
    }

    fn lookup(&self, reported: &str) -> Option<&'a ProvenanceEntry> {
        if let Some(entry) = self.provenance.get(reported) {
            return Some(entry);
        }
        let absolute = absolutize(Path::new(reported), &self.base_dir);
        let key = self.absolute.get(&absolute)?;
        self.provenance.get(key)
    }

    /// Remap one finding, or pass it through untouched if its file is unknown
    pub fn remap_finding(&self, mut finding: Finding) -> ReportedFinding {
        let Some(reported) = finding.reported_file().map(str::to_string) else {
            return ReportedFinding::unresolved(finding);
        };
        let Some(entry) = self.lookup(&reported) else {
            tracing::debug!("No provenance for {}, keeping finding as reported", reported);
            return ReportedFinding::unresolved(finding);
        };

        let location = json!({
            "file": entry.source_file,
            "start_line": entry.approx_start_line,
            "end_line": entry.approx_start_line,
            "start_column": SYNTHETIC_START_COLUMN,
            "end_column": SYNTHETIC_END_COLUMN,
        });
        let resolved = finding.set("location", location)
            && finding.set("extracted_from", Value::String(reported))
            && finding.set("context", Value::String(entry.context.clone()))
            && finding.set("normalized_sql", Value::String(entry.normalized_sql.clone()));

        ReportedFinding { finding, resolved }
    }

    /// Build the consolidated report; every finding appears exactly once.
    pub fn remap(&self, report: AnalyzerReport, extraction_metadata: ExtractionMetadata) -> ConsolidatedReport {
        let findings: Vec<ReportedFinding> = report
            .findings
            .into_iter()
            .map(|finding| self.remap_finding(finding))
            .collect();

        let resolved = findings.iter().filter(|f| f.is_resolved()).count();
        tracing::info!("Remapped {} of {} finding(s)", resolved, findings.len());

        ConsolidatedReport {
            findings,
            summary: report.summary,
            extraction_metadata,
        }
    }
}
