//! # sqlharvest - Embedded SQL extraction and finding remapping
//!
//! Runs a pattern-based SQL analyzer over SQL that lives inside other files.
//!
//! sqlharvest provides:
//! - Extractors that recover SQL from Java call sites/annotations and MyBatis XML mappers
//! - Canonical normalization of the recovered statements
//! - A snippet corpus with a provenance record for every emitted file
//! - An invoker for the external analyzer that tolerates log-polluted output
//! - Remapping of analyzer findings back to the original source coordinates

pub mod normalize;
pub mod extract;
pub mod snippet;
pub mod provenance;
pub mod analyzer;
pub mod remap;
pub mod pipeline;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use extract::{ExtractedUnit, Extractor, ExtractorRegistry, default_registry};
pub use provenance::{ProvenanceEntry, ProvenanceMap};
pub use snippet::SnippetWriter;
pub use analyzer::{AnalyzerInvoker, AnalyzerReport, Finding};
pub use remap::{ConsolidatedReport, FindingRemapper};
pub use pipeline::{Pipeline, RunOutcome};
pub use config::HarvestConfig;
pub use output::OutputMode;

/// Result type alias for sqlharvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sqlharvest operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot decode {path} as UTF-8")]
    Decode {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start analyzer {program}: {source}")]
    AnalyzerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Analyzer failed with {status}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    AnalyzerFailed {
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to parse analyzer JSON output\nOutput was:\n{stdout}\n--- stderr ---\n{stderr}")]
    MalformedResult { stdout: String, stderr: String },
}
