//! MyBatis XML mapper extractor
//!
//! One unit per `<select>`, `<insert>`, `<update>`, `<delete>` and `<sql>`
//! element. The mapper is read as an event stream: every open statement
//! element owns a text buffer that collects the text of all its descendants
//! (`<where>`, `<if>`, `<foreach>`, ...) and is dropped as soon as the element
//! closes, so no document tree is ever held in memory.
//!
//! When the event parse fails the whole file is re-read with per-tag regexes
//! instead. Line numbers from the event parse come from searching the raw
//! text for the start of the normalized statement; repeated identical
//! statements in one file can resolve to the first occurrence.

use super::framework::{ExtractedUnit, Extractor};
use crate::normalize::{line_of_offset, rewrite_placeholders, without_terminator};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::sync::OnceLock;

/// Elements whose body is a SQL statement
pub const STATEMENT_TAGS: &[&str] = &["select", "insert", "update", "delete", "sql"];

/// Characters of the normalized statement used to find its line
const LOCATE_PREFIX_CHARS: usize = 40;

/// Result of the event-based parse
#[derive(Debug)]
pub enum ParseOutcome {
    /// The document parsed; these are its statements
    Structured(Vec<ExtractedUnit>),
    /// The document is not well-formed; the regex fallback must run
    Malformed { reason: String },
}

/// A statement element that is still open
struct OpenStatement {
    tag: &'static str,
    depth: usize,
    text: String,
}

fn statement_tag(local_name: &[u8]) -> Option<&'static str> {
    STATEMENT_TAGS
        .iter()
        .copied()
        .find(|tag| tag.as_bytes() == local_name)
}

fn context_for(tag: &str) -> String {
    format!("<{}>", tag)
}

/// Parse a mapper as an event stream.
pub fn parse_structured(source_file: &str, content: &str) -> ParseOutcome {
    let mut reader = Reader::from_reader(content.as_bytes());
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut open: Vec<OpenStatement> = Vec::new();
    let mut units = Vec::new();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                return ParseOutcome::Malformed {
                    reason: format!("{} (near byte {})", e, reader.buffer_position()),
                };
            }
        };

        match event {
            Event::Start(start) => {
                depth += 1;
                if let Some(tag) = statement_tag(start.local_name().as_ref()) {
                    open.push(OpenStatement { tag, depth, text: String::new() });
                }
            }
            Event::End(_) => {
                if open.last().is_some_and(|s| s.depth == depth) {
                    if let Some(statement) = open.pop() {
                        if let Some(unit) = statement_unit(source_file, content, &statement) {
                            units.push(unit);
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(text) => match text.unescape() {
                Ok(text) => append_text(&mut open, &text),
                Err(e) => {
                    return ParseOutcome::Malformed {
                        reason: format!("{} (near byte {})", e, reader.buffer_position()),
                    };
                }
            },
            Event::CData(cdata) => {
                let inner = cdata.into_inner();
                append_text(&mut open, &String::from_utf8_lossy(&inner));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return ParseOutcome::Malformed {
            reason: format!("{} element(s) left open at end of input", depth),
        };
    }

    ParseOutcome::Structured(units)
}

fn append_text(open: &mut [OpenStatement], text: &str) {
    for statement in open.iter_mut() {
        statement.text.push_str(text);
    }
}

fn statement_unit(source_file: &str, content: &str, statement: &OpenStatement) -> Option<ExtractedUnit> {
    let sql = rewrite_placeholders(&statement.text);
    let unit = ExtractedUnit::from_raw(&sql, source_file, 1, context_for(statement.tag))?;
    let line = locate_line(content, unit.sql_text());
    Some(unit.at_line(line))
}

/// Best-effort line of a normalized statement inside the raw file.
///
/// Searches for the first few characters of the statement (terminator
/// excluded); line 1 when they cannot be found.
pub fn locate_line(content: &str, normalized_sql: &str) -> u32 {
    let prefix: String = without_terminator(normalized_sql)
        .chars()
        .take(LOCATE_PREFIX_CHARS)
        .collect();
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return 1;
    }
    content
        .find(prefix)
        .map(|offset| line_of_offset(content, offset))
        .unwrap_or(1)
}

fn fallback_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        STATEMENT_TAGS
            .iter()
            .map(|&tag| {
                let re = Regex::new(&format!(r"(?i)<{tag}\b[^>]*>([\s\S]*?)</{tag}\s*>"))
                    .expect("valid statement element regex");
                (tag, re)
            })
            .collect()
    })
}

fn markup_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"))
}

fn cdata_section() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid CDATA regex"))
}

fn element_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("valid element tag regex"))
}

/// Regex extraction over raw text, for mappers the event parser rejects.
pub fn extract_fallback(source_file: &str, content: &str) -> Vec<ExtractedUnit> {
    let mut found: Vec<(usize, &'static str, &str)> = Vec::new();
    for (tag, re) in fallback_patterns() {
        for caps in re.captures_iter(content) {
            if let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) {
                found.push((whole.start(), *tag, body.as_str()));
            }
        }
    }
    found.sort_by_key(|(start, _, _)| *start);

    found
        .into_iter()
        .filter_map(|(start, tag, body)| {
            let sql = rewrite_placeholders(&clean_fallback_body(body));
            ExtractedUnit::from_raw(&sql, source_file, line_of_offset(content, start), context_for(tag))
        })
        .collect()
}

/// Reduce a raw element body to its text: comments removed, CDATA
/// unwrapped, nested element tags dropped and the predefined entities
/// decoded outside CDATA.
fn clean_fallback_body(body: &str) -> String {
    let body = markup_comment().replace_all(body, " ");
    let mut text = String::with_capacity(body.len());
    let mut last_end = 0;

    for caps in cdata_section().captures_iter(&body) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        text.push_str(&markup_text(&body[last_end..whole.start()]));
        text.push_str(inner.as_str());
        last_end = whole.end();
    }
    text.push_str(&markup_text(&body[last_end..]));
    text
}

fn markup_text(segment: &str) -> String {
    element_tag()
        .replace_all(segment, " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// MyBatis mapper extractor
pub struct XmlSqlExtractor;

impl Default for XmlSqlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlSqlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for XmlSqlExtractor {
    fn name(&self) -> &str {
        "MyBatis XML"
    }

    fn file_extensions(&self) -> &[&str] {
        &["xml"]
    }

    fn extract_source(&self, source_file: &str, content: &str) -> Vec<ExtractedUnit> {
        let units = match parse_structured(source_file, content) {
            ParseOutcome::Structured(units) => units,
            ParseOutcome::Malformed { reason } => {
                tracing::debug!("{}: not well-formed ({}), using regex fallback", source_file, reason);
                extract_fallback(source_file, content)
            }
        };
        tracing::debug!("{}: {} SQL statement(s) from mapper", source_file, units.len());
        units
    }
}
