//! Balanced-span scanner
//!
//! Finds the end of a delimited object (a JSON object by default) that starts
//! at a given offset of a larger byte stream. Delimiters inside double-quoted
//! strings do not count, and a backslash inside a string escapes the next
//! byte.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Outside any string
    Code,
    /// Inside a double-quoted string
    InString,
    /// Just after a backslash inside a string
    Escape,
}

/// Depth-counting scanner for one delimiter pair
#[derive(Debug, Clone, Copy)]
pub struct BalancedScanner {
    open: u8,
    close: u8,
}

impl Default for BalancedScanner {
    fn default() -> Self {
        Self::braces()
    }
}

impl BalancedScanner {
    /// Scanner for an arbitrary delimiter pair
    pub fn new(open: u8, close: u8) -> Self {
        Self { open, close }
    }

    /// Scanner for `{ ... }`
    pub fn braces() -> Self {
        Self::new(b'{', b'}')
    }

    /// Span from `start` to the delimiter that brings the depth back to
    /// zero, inclusive. `None` if the stream ends first or `start` is out of
    /// range.
    pub fn scan(&self, input: &[u8], start: usize) -> Option<Range<usize>> {
        let mut state = ScanState::Code;
        let mut depth = 0usize;

        for (offset, &byte) in input.get(start..)?.iter().enumerate() {
            state = match state {
                ScanState::Escape => ScanState::InString,
                ScanState::InString => match byte {
                    b'\\' => ScanState::Escape,
                    b'"' => ScanState::Code,
                    _ => ScanState::InString,
                },
                ScanState::Code => {
                    if byte == b'"' {
                        ScanState::InString
                    } else if byte == self.open {
                        depth += 1;
                        ScanState::Code
                    } else if byte == self.close {
                        // A close before any open cannot start a balanced span.
                        depth = depth.checked_sub(1)?;
                        if depth == 0 {
                            return Some(start..start + offset + 1);
                        }
                        ScanState::Code
                    } else {
                        ScanState::Code
                    }
                }
            };
        }
        None
    }
}

/// Balanced `{ ... }` span starting at `start`
pub fn balanced_span(input: &[u8], start: usize) -> Option<Range<usize>> {
    BalancedScanner::braces().scan(input, start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_text(input: &str, start: usize) -> Option<&str> {
        balanced_span(input.as_bytes(), start).map(|r| &input[r])
    }

    #[test]
    fn test_simple_object() {
        let input = r#"log {"a": {"b": 1}} trailing"#;
        assert_eq!(span_text(input, 4), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let input = r#"{"msg": "unbalanced } and { here", "n": 2} tail"#;
        assert_eq!(span_text(input, 0), Some(r#"{"msg": "unbalanced } and { here", "n": 2}"#));
    }

    #[test]
    fn test_escaped_quote_keeps_string_open() {
        let input = r#"{"msg": "say \"}\" ok"} after"#;
        assert_eq!(span_text(input, 0), Some(r#"{"msg": "say \"}\" ok"}"#));
    }

    #[test]
    fn test_unterminated_returns_none() {
        assert_eq!(span_text(r#"{"a": {"b": 1}"#, 0), None);
        assert_eq!(span_text("{}", 5), None);
    }

    #[test]
    fn test_close_before_open_returns_none() {
        assert_eq!(span_text("} {}", 0), None);
    }

    #[test]
    fn test_other_delimiters() {
        let scanner = BalancedScanner::new(b'[', b']');
        let input = b"x [1, [2, \"]\"], 3] y";
        assert_eq!(scanner.scan(input, 2), Some(2..18));
    }
}
