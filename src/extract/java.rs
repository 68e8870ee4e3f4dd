//! Java SQL extractor
//!
//! Recovers SQL from two places in Java source:
//! - Single string-literal MyBatis annotations: `@Select("...")`
//! - Arguments of SQL-executing calls: `conn.prepareStatement("..." + id)`
//!
//! Call arguments are reconstructed by joining the string literals in source
//! order and putting one `?` wherever a non-literal expression sat between
//! them. The argument text ends at the first `)`, so a nested call inside the
//! argument list cuts the reconstruction short.

use super::framework::{ExtractedUnit, Extractor};
use crate::normalize::{line_of_offset, unescape_java_string};
use regex::Regex;
use std::sync::OnceLock;

/// Java APIs whose first argument is treated as SQL
pub const DEFAULT_SQL_METHODS: &[&str] = &[
    "prepareStatement",
    "executeQuery",
    "executeUpdate",
    "createNativeQuery",
];

/// Context tag for call-site units
pub const CALL_CONTEXT: &str = "call";

/// Placeholder inserted for every non-literal gap
const HOLE: &str = " ? ";

fn string_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("valid string literal regex"))
}

fn sql_annotation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"@(?:[\w.]+\.)?(Select|Insert|Update|Delete)\s*\(\s*"((?:[^"\\]|\\.)*)"\s*\)"#)
            .expect("valid annotation regex")
    })
}

/// Java source extractor
pub struct JavaSqlExtractor {
    call_site: Regex,
}

impl Default for JavaSqlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl JavaSqlExtractor {
    /// Create an extractor for the default SQL-executing APIs
    pub fn new() -> Self {
        Self::with_methods(DEFAULT_SQL_METHODS)
    }

    /// Create an extractor for a custom set of SQL-executing method names
    pub fn with_methods<S: AsRef<str>>(methods: &[S]) -> Self {
        let names: Vec<String> = methods
            .iter()
            .map(|m| m.as_ref().trim())
            .filter(|m| !m.is_empty())
            .map(regex::escape)
            .collect();
        let names = if names.is_empty() {
            DEFAULT_SQL_METHODS.iter().map(|m| m.to_string()).collect()
        } else {
            names
        };
        let pattern = format!(r"(?s)\b(?:{})\s*\((.*?)\)", names.join("|"));
        let call_site = Regex::new(&pattern).expect("escaped method names form a valid regex");
        Self { call_site }
    }

    fn annotation_units(&self, source_file: &str, content: &str) -> Vec<ExtractedUnit> {
        sql_annotation()
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let name = caps.get(1)?.as_str();
                let sql = unescape_java_string(caps.get(2)?.as_str());
                let line = line_of_offset(content, whole.start());
                ExtractedUnit::from_raw(&sql, source_file, line, format!("@{}", name))
            })
            .collect()
    }

    fn call_units(&self, source_file: &str, content: &str) -> Vec<ExtractedUnit> {
        let mut units = Vec::new();
        for caps in self.call_site.captures_iter(content) {
            let (Some(whole), Some(args)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let line = line_of_offset(content, whole.start());
            let Some(sql) = reconstruct_arguments(args.as_str()) else {
                tracing::trace!("No string literal in call at {}:{}", source_file, line);
                continue;
            };
            if let Some(unit) = ExtractedUnit::from_raw(&sql, source_file, line, CALL_CONTEXT) {
                units.push(unit);
            }
        }
        units
    }
}

/// Rebuild the SQL text of a call's argument list.
///
/// Returns `None` when the arguments hold no string literal.
pub fn reconstruct_arguments(args: &str) -> Option<String> {
    let mut sql = String::new();
    let mut last_end = 0;
    let mut had_literal = false;

    for m in string_literal().captures_iter(args) {
        let (Some(whole), Some(body)) = (m.get(0), m.get(1)) else {
            continue;
        };
        if is_hole(&args[last_end..whole.start()]) {
            sql.push_str(HOLE);
        }
        sql.push_str(&unescape_java_string(body.as_str()));
        had_literal = true;
        last_end = whole.end();
    }

    if !had_literal {
        return None;
    }
    if is_hole(&args[last_end..]) {
        sql.push_str(HOLE);
    }
    Some(sql)
}

/// A gap is a hole unless it is only whitespace and `+` concatenation.
fn is_hole(gap: &str) -> bool {
    gap.chars().any(|c| !c.is_whitespace() && c != '+')
}

impl Extractor for JavaSqlExtractor {
    fn name(&self) -> &str {
        "Java"
    }

    fn file_extensions(&self) -> &[&str] {
        &["java"]
    }

    fn extract_source(&self, source_file: &str, content: &str) -> Vec<ExtractedUnit> {
        let mut units = self.annotation_units(source_file, content);
        units.extend(self.call_units(source_file, content));
        tracing::debug!("{}: {} SQL statement(s) from Java source", source_file, units.len());
        units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str) -> Vec<ExtractedUnit> {
        JavaSqlExtractor::new().extract_source("Dao.java", content)
    }

    #[test]
    fn test_single_literal_call() {
        let units = extract(r#"PreparedStatement ps = conn.prepareStatement("SELECT * FROM \"users\"");"#);

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sql_text(), r#"SELECT * FROM "users";"#);
        assert_eq!(units[0].context(), "call");
        assert_eq!(units[0].source_file(), "Dao.java");
    }

    #[test]
    fn test_concatenated_variable_becomes_placeholder() {
        let units = extract(r#"stmt.executeQuery("SELECT * FROM users WHERE name = '" + name + "'");"#);

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sql_text(), "SELECT * FROM users WHERE name = ' ? ';");
    }

    #[test]
    fn test_literals_joined_in_source_order() {
        let units = extract(r#"stmt.executeUpdate("UPDATE t SET a = " + a + " WHERE b = " + b);"#);

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sql_text(), "UPDATE t SET a = ? WHERE b = ?;");
    }

    #[test]
    fn test_leading_expression_becomes_placeholder() {
        let units = extract(r#"stmt.executeQuery(base + " WHERE id = 1");"#);
        assert_eq!(units[0].sql_text(), "? WHERE id = 1;");
    }

    #[test]
    fn test_plain_concatenation_joins_literals() {
        let units = extract("stmt.executeQuery(\"SELECT id \"\n    + \"FROM t\");");
        assert_eq!(units[0].sql_text(), "SELECT id FROM t;");
    }

    #[test]
    fn test_call_without_literal_is_skipped() {
        let units = extract("stmt.executeQuery(query);\nstmt.executeUpdate(builder);");
        assert!(units.is_empty());
    }

    #[test]
    fn test_nested_call_truncates_arguments() {
        // Argument text stops at the first ')' so the trailing literal is lost.
        let units = extract(r#"stmt.executeQuery("SELECT * FROM t WHERE id = " + id(x) + " AND a = 1");"#);

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sql_text(), "SELECT * FROM t WHERE id = ?;");
    }

    #[test]
    fn test_annotation_literal() {
        let code = "public interface UserMapper {\n    @Select(\"SELECT * FROM users\\n WHERE id = #{id}\")\n    User find(int id);\n}\n";
        let units = extract(code);

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sql_text(), "SELECT * FROM users WHERE id = #{id};");
        assert_eq!(units[0].context(), "@Select");
        assert_eq!(units[0].approx_line(), 2);
    }

    #[test]
    fn test_qualified_annotation_and_dml_annotations() {
        let code = r#"
@org.apache.ibatis.annotations.Select("SELECT 1")
@Delete("DELETE FROM t WHERE id = 1")
"#;
        let units = extract(code);
        let contexts: Vec<_> = units.iter().map(|u| u.context()).collect();
        assert_eq!(contexts, vec!["@Select", "@Delete"]);
    }

    #[test]
    fn test_annotations_precede_calls() {
        let code = "stmt.executeQuery(\"SELECT 2\");\n@Select(\"SELECT 1\")\n";
        let units = extract(code);
        assert_eq!(units[0].sql_text(), "SELECT 1;");
        assert_eq!(units[1].sql_text(), "SELECT 2;");
    }

    #[test]
    fn test_line_numbers() {
        let code = "class A {\n\n  void run() {\n    conn.prepareStatement(\n      \"SELECT 1\");\n  }\n}\n";
        let units = extract(code);
        assert_eq!(units[0].approx_line(), 4);
    }

    #[test]
    fn test_custom_methods() {
        let extractor = JavaSqlExtractor::with_methods(&["queryForList"]);
        let units = extractor.extract_source("A.java", r#"jdbc.queryForList("SELECT 1"); stmt.executeQuery("SELECT 2");"#);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sql_text(), "SELECT 1;");
    }

    #[test]
    fn test_reconstruct_arguments() {
        assert_eq!(reconstruct_arguments("x"), None);
        assert_eq!(reconstruct_arguments(r#""a", flags"#).as_deref(), Some("a ? "));
    }
}
