//! SQL Extractor Framework
//!
//! Each host syntax provides an extractor that finds embedded SQL and turns it
//! into normalized [`ExtractedUnit`]s. The rest of the pipeline never sees
//! host-specific logic.

pub mod framework;
pub mod java;
pub mod xml;

pub use framework::{ExtractedUnit, Extractor, ExtractorRegistry, default_registry, read_source, registry_with_sql_methods};
pub use java::JavaSqlExtractor;
pub use xml::{ParseOutcome, XmlSqlExtractor};
