//! Analyzer result model and extraction from mixed output
//!
//! The analyzer prints one JSON object with a `findings` array, but log lines
//! may surround it on stdout. Extraction tries, in order:
//! 1. the whole stream as JSON
//! 2. a balanced object starting at the `{"findings"` anchor
//! 3. a balanced object at every `{` shortly followed by `"findings"`

use super::scanner::balanced_span;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Literal marking the start of the result object
pub const RESULT_ANCHOR: &str = r#"{"findings""#;

/// Key token looked for near candidate object starts
pub const FINDINGS_TOKEN: &str = r#""findings""#;

/// How far past a `{` the findings token may appear
pub const ANCHOR_WINDOW: usize = 200;

/// One analyzer finding, kept exactly as the analyzer emitted it.
///
/// Only the fields the pipeline reads are interpreted, and only on access, so
/// unexpected types or extra fields never make a result unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Finding {
    record: Value,
}

impl Finding {
    pub fn new(record: Value) -> Self {
        Self { record }
    }

    pub fn as_value(&self) -> &Value {
        &self.record
    }

    pub fn into_value(self) -> Value {
        self.record
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.record.get(key).and_then(Value::as_str)
    }

    pub fn rule_id(&self) -> Option<&str> {
        self.text("rule_id")
    }

    pub fn message(&self) -> Option<&str> {
        self.text("message")
    }

    pub fn severity(&self) -> Option<&str> {
        self.text("severity")
    }

    /// The `location` object, if present
    pub fn location(&self) -> Option<&Map<String, Value>> {
        self.record.get("location").and_then(Value::as_object)
    }

    /// File the analyzer attributed the finding to, if any
    pub fn reported_file(&self) -> Option<&str> {
        self.location()
            .and_then(|loc| loc.get("file"))
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty())
    }

    pub fn start_line(&self) -> Option<u64> {
        self.location()
            .and_then(|loc| loc.get("start_line"))
            .and_then(Value::as_u64)
    }

    /// Set a top-level field. Returns `false` when the finding is not an
    /// object and so cannot carry fields.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        match &mut self.record {
            Value::Object(fields) => {
                fields.insert(key.to_string(), value);
                true
            }
            _ => false,
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// The structured object the analyzer emits
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerReport {
    pub findings: Vec<Finding>,
    pub summary: Value,
}

impl AnalyzerReport {
    /// Interpret an extracted result object. A missing or non-array
    /// `findings` reads as no findings; a missing `summary` as `{}`.
    pub fn from_value(value: &Value) -> Self {
        let findings = match value.get("findings") {
            Some(Value::Array(items)) => items.iter().cloned().map(Finding::new).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                tracing::warn!("Ignoring non-array findings value: {}", other);
                Vec::new()
            }
        };
        let summary = value.get("summary").cloned().unwrap_or_else(empty_object);
        Self { findings, summary }
    }
}

/// Which strategy located the result object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
    WholeStream,
    Anchor,
    CandidateScan,
}

/// Result object found in the analyzer's stdout
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedResult<'a> {
    pub tier: ExtractionTier,
    /// The object's text, exactly as printed
    pub text: &'a str,
    pub value: Value,
}

/// Locate and parse the result object in the analyzer's stdout.
pub fn extract_result(stdout: &str) -> Option<LocatedResult<'_>> {
    let trimmed = stdout.trim();
    if let Some(value) = parse_object(trimmed) {
        return Some(LocatedResult {
            tier: ExtractionTier::WholeStream,
            text: trimmed,
            value,
        });
    }

    if let Some(start) = stdout.find(RESULT_ANCHOR) {
        if let Some((text, value)) = parse_span_at(stdout, start) {
            return Some(LocatedResult {
                tier: ExtractionTier::Anchor,
                text,
                value,
            });
        }
    }

    let bytes = stdout.as_bytes();
    let token = FINDINGS_TOKEN.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b == b'{')
        .filter(|&(i, _)| {
            let window = &bytes[i..(i + ANCHOR_WINDOW).min(bytes.len())];
            window.windows(token.len()).any(|w| w == token)
        })
        .find_map(|(i, _)| parse_span_at(stdout, i))
        .map(|(text, value)| LocatedResult {
            tier: ExtractionTier::CandidateScan,
            text,
            value,
        })
}

// Spans start at `{` and end at `}`, so they always fall on char boundaries.
fn parse_span_at(stdout: &str, start: usize) -> Option<(&str, Value)> {
    let span = balanced_span(stdout.as_bytes(), start)?;
    let text = stdout.get(span)?;
    parse_object(text).map(|value| (text, value))
}

fn parse_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
