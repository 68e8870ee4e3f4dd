//! SQL normalization
//!
//! Every recovered statement goes through [`normalize_sql`] before it is
//! written out, so the analyzer only ever sees single-line, terminated SQL.
//! The placeholder rewrites are applied by extractors whose host syntax has
//! template placeholders (MyBatis `#{}` / `${}`).

use regex::Regex;
use std::sync::OnceLock;

/// Statement terminator appended by [`normalize_sql`]
pub const TERMINATOR: char = ';';

/// Token substituted for bound-value placeholders (`#{id}`)
pub const BOUND_VALUE_TOKEN: &str = "1";

/// Token substituted for interpolated-identifier placeholders (`${table}`)
pub const IDENTIFIER_TOKEN: &str = "T0";

fn bound_value_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\{[^}]+\}").expect("valid bound placeholder regex"))
}

fn identifier_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{[^}]+\}").expect("valid identifier placeholder regex"))
}

/// Collapse every whitespace run (newlines included) to one space and trim.
pub fn collapse_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize raw SQL text.
///
/// Whitespace is collapsed and exactly one terminator is guaranteed at the
/// end. Empty input stays empty so callers can drop it. Idempotent.
pub fn normalize_sql(sql: &str) -> String {
    let mut sql = collapse_whitespace(sql);
    if !sql.is_empty() && !sql.ends_with(TERMINATOR) {
        sql.push(TERMINATOR);
    }
    sql
}

/// Rewrite MyBatis placeholders to analyzer-safe tokens.
///
/// `#{..}` is a bound parameter and becomes a numeric literal. `${..}` is raw
/// text substitution and becomes an identifier-like token, which keeps the
/// two risk classes apart for the rules.
pub fn rewrite_placeholders(sql: &str) -> String {
    let bound = bound_value_placeholder().replace_all(sql, BOUND_VALUE_TOKEN);
    identifier_placeholder()
        .replace_all(&bound, IDENTIFIER_TOKEN)
        .into_owned()
}

/// Strip the trailing terminator, if any.
pub fn without_terminator(sql: &str) -> &str {
    sql.strip_suffix(TERMINATOR).unwrap_or(sql)
}

/// Unescape the body of a Java string literal.
///
/// Unknown escapes are kept as written.
pub fn unescape_java_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('s') => out.push(' '),
            Some('0') => out.push('\0'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('\n') => out.push('\n'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                let decoded = if hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit()) {
                    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
                } else {
                    None
                };
                match decoded {
                    Some(decoded) => {
                        out.push(decoded);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    _ => out.push_str("\\u"),
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// 1-based line number of a byte offset: one plus the newlines before it.
pub fn line_of_offset(text: &str, offset: usize) -> u32 {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() as u32 + 1
}
