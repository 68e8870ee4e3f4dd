//! Core extractor framework
//!
//! Defines the unit every extractor produces, the trait extractors implement,
//! and the registry that routes a file to the extractor owning its extension.

use crate::normalize::normalize_sql;
use crate::{Error, Result};
use serde::Serialize;
use std::path::Path;

/// One recovered SQL statement plus where it came from.
///
/// Only constructible through [`ExtractedUnit::from_raw`], which normalizes
/// the text, so `sql_text` is always non-empty and terminated once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedUnit {
    sql_text: String,
    source_file: String,
    approx_line: u32,
    context: String,
}

impl ExtractedUnit {
    /// Normalize `raw_sql` and wrap it; `None` when nothing is left.
    pub fn from_raw(
        raw_sql: &str,
        source_file: impl Into<String>,
        approx_line: u32,
        context: impl Into<String>,
    ) -> Option<Self> {
        let sql_text = normalize_sql(raw_sql);
        if sql_text.is_empty() {
            return None;
        }
        Some(Self {
            sql_text,
            source_file: source_file.into(),
            approx_line,
            context: context.into(),
        })
    }

    /// Normalized SQL
    pub fn sql_text(&self) -> &str {
        &self.sql_text
    }

    /// Original file the SQL was recovered from
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// Best-effort 1-based line in the original file
    pub fn approx_line(&self) -> u32 {
        self.approx_line
    }

    /// Extraction context (`call`, `@Select`, `<select>`, ...)
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Move a unit to a different line (used by position recovery)
    pub(crate) fn at_line(mut self, line: u32) -> Self {
        self.approx_line = line;
        self
    }
}

/// Trait for SQL extractors
///
/// Each extractor is responsible for:
/// 1. Identifying the host files it understands
/// 2. Locating embedded SQL in them
/// 3. Producing normalized units with a best-effort origin line
pub trait Extractor: Send + Sync {
    /// Get the extractor name (for display)
    fn name(&self) -> &str;

    /// Get file extensions this extractor handles (lowercase, no dot)
    fn file_extensions(&self) -> &[&str];

    /// Check if this extractor can handle a file
    fn can_handle(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_ascii_lowercase();
                self.file_extensions().contains(&ext.as_str())
            }
            None => false,
        }
    }

    /// Extract units from already-loaded source text
    fn extract_source(&self, source_file: &str, content: &str) -> Vec<ExtractedUnit>;

    /// Read a file and extract units from it
    fn extract_file(&self, path: &Path) -> Result<Vec<ExtractedUnit>> {
        let content = read_source(path)?;
        Ok(self.extract_source(&path.display().to_string(), &content))
    }
}

/// Read a source file as UTF-8.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes).map_err(|source| Error::Decode {
        path: path.display().to_string(),
        source,
    })
}

/// Registry of SQL extractors
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor
    pub fn register(&mut self, extractor: impl Extractor + 'static) {
        self.extractors.push(Box::new(extractor));
    }

    /// Find an extractor for a file
    pub fn find_extractor(&self, path: &Path) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.can_handle(path))
            .map(|e| e.as_ref())
    }

    /// Get all registered extractors
    pub fn extractors(&self) -> &[Box<dyn Extractor>] {
        &self.extractors
    }

    /// Extract a file using the appropriate extractor
    pub fn extract_file(&self, path: &Path) -> Result<Option<Vec<ExtractedUnit>>> {
        match self.find_extractor(path) {
            Some(extractor) => Ok(Some(extractor.extract_file(path)?)),
            None => Ok(None),
        }
    }
}

/// Create a default registry with the Java and XML extractors
pub fn default_registry() -> ExtractorRegistry {
    registry_with_sql_methods(super::java::DEFAULT_SQL_METHODS)
}

/// Create the built-in registry with a custom list of SQL-executing Java APIs
pub fn registry_with_sql_methods<S: AsRef<str>>(sql_methods: &[S]) -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(super::java::JavaSqlExtractor::with_methods(sql_methods));
    registry.register(super::xml::XmlSqlExtractor::new());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestExtractor;

    impl Extractor for TestExtractor {
        fn name(&self) -> &str { "test" }
        fn file_extensions(&self) -> &[&str] { &["test"] }
        fn extract_source(&self, source_file: &str, content: &str) -> Vec<ExtractedUnit> {
            ExtractedUnit::from_raw(content, source_file, 1, "test").into_iter().collect()
        }
    }

    #[test]
    fn test_registry() {
        let mut registry = ExtractorRegistry::new();
        registry.register(TestExtractor);

        assert!(registry.find_extractor(Path::new("foo.test")).is_some());
        assert!(registry.find_extractor(Path::new("foo.TEST")).is_some());
        assert!(registry.find_extractor(Path::new("foo.other")).is_none());
        assert!(registry.find_extractor(Path::new("Makefile")).is_none());
    }

    #[test]
    fn test_default_registry_routes_host_files() {
        let registry = default_registry();
        assert_eq!(registry.find_extractor(Path::new("src/Dao.java")).unwrap().name(), "Java");
        assert_eq!(registry.find_extractor(Path::new("mapper/UserMapper.xml")).unwrap().name(), "MyBatis XML");
        assert!(registry.find_extractor(Path::new("schema.sql")).is_none());
    }

    #[test]
    fn test_unit_is_normalized() {
        let unit = ExtractedUnit::from_raw("SELECT *\n  FROM t", "A.java", 3, "call").unwrap();
        assert_eq!(unit.sql_text(), "SELECT * FROM t;");
        assert_eq!(unit.approx_line(), 3);
        assert!(ExtractedUnit::from_raw("   ", "A.java", 3, "call").is_none());
    }

    #[test]
    fn test_undecodable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bad.test");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let err = TestExtractor.extract_file(&path).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
