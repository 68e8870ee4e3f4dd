//! External analyzer integration
//!
//! The rule engine is a separate binary. This module runs it over the snippet
//! directory and turns its (possibly log-polluted) stdout into findings.

pub mod invoker;
pub mod result;
pub mod scanner;

pub use invoker::{AnalyzerInvoker, AnalyzerRun};
pub use result::{AnalyzerReport, ExtractionTier, Finding, LocatedResult, extract_result};
pub use scanner::{BalancedScanner, balanced_span};
