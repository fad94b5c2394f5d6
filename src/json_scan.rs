//! Quote-aware brace scanning over quasi-JSON text.
//!
//! Candidates arriving from model output are rarely strict JSON, so the
//! scanners here only track string delimiters (single or double quotes,
//! with backslash escapes) and brace depth. Braces inside string literals
//! never affect the depth counter.

use std::ops::Range;

#[inline]
pub(crate) fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    let len = bytes.len();
    while i < len {
        match bytes[i] {
            b' ' | b'\n' | b'\r' | b'\t' => i += 1,
            _ => break,
        }
    }
    i
}

/// Find the end (exclusive) of the balanced object starting at `start`.
///
/// `bytes[start]` must be `{`. Returns `None` when the object never closes.
pub(crate) fn object_end(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.get(start) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            match b {
                b'\\' => i += 1,
                _ if b == q => quote = None,
                _ => {}
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// All top-level balanced `{...}` spans in `text`, left to right.
///
/// Nested objects are skipped over, never reported separately. An unmatched
/// `{` is stepped past so balanced objects later in the text still report.
pub(crate) fn top_level_objects(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0usize;
    while let Some(rel) = memchr::memchr(b'{', &bytes[i..]) {
        let start = i + rel;
        match object_end(bytes, start) {
            Some(end) => {
                spans.push(start..end);
                i = end;
            }
            None => i = start + 1,
        }
    }
    spans
}

/// Length of the longest prefix of `text` that ends exactly at a balanced
/// closing brace.
///
/// Used for truncation repair: an unterminated object is cut back to the
/// last fully-balanced position instead of speculatively closed. Returns
/// `None` when no prefix is balanced (depth never returns to zero).
pub(crate) fn last_balanced_prefix(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut last = None;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            match b {
                b'\\' => i += 1,
                _ if b == q => quote = None,
                _ => {}
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    if depth == 0 {
                        last = Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    last
}

/// Whether `{` and `}` counts balance outside string literals.
pub(crate) fn is_brace_balanced(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut depth = 0isize;
    let mut quote: Option<u8> = None;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            match b {
                b'\\' => i += 1,
                _ if b == q => quote = None,
                _ => {}
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
        }
        i += 1;
    }
    depth == 0
}

/// Whether `span` mentions `key` as a quoted object key.
///
/// Accepts both `"key"` and `'key'` spellings since candidates are checked
/// before sanitization.
pub(crate) fn mentions_key(span: &str, key: &str) -> bool {
    let bytes = span.as_bytes();
    let needle = key.as_bytes();
    let mut i = 0usize;
    while let Some(rel) = memchr::memmem::find(&bytes[i..], needle) {
        let at = i + rel;
        let before = at.checked_sub(1).map(|p| bytes[p]);
        let after = bytes.get(at + needle.len()).copied();
        let quoted = matches!(before, Some(b'"') | Some(b'\''))
            && matches!(after, Some(b'"') | Some(b'\''));
        if quoted {
            return true;
        }
        i = at + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_end_skips_braces_in_strings() {
        let text = r#"{"answer": "a {b} c"} tail"#;
        let end = object_end(text.as_bytes(), 0).unwrap();
        assert_eq!(&text[..end], r#"{"answer": "a {b} c"}"#);
    }

    #[test]
    fn object_end_handles_nesting() {
        let text = r#"{"a": {"b": {"c": 1}}}"#;
        assert_eq!(object_end(text.as_bytes(), 0), Some(text.len()));
    }

    #[test]
    fn object_end_none_when_unterminated() {
        assert_eq!(object_end(br#"{"a": 1"#, 0), None);
    }

    #[test]
    fn top_level_objects_reports_each_span() {
        let text = r#"x {"a": 1} y {"b": {"c": 2}} z"#;
        let spans = top_level_objects(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].clone()], r#"{"a": 1}"#);
        assert_eq!(&text[spans[1].clone()], r#"{"b": {"c": 2}}"#);
    }

    #[test]
    fn top_level_objects_skips_stray_open_brace() {
        let text = r#"notes { incomplete then {"a": 1} and {"b": 2}"#;
        let spans = top_level_objects(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].clone()], r#"{"a": 1}"#);
        assert_eq!(&text[spans[1].clone()], r#"{"b": 2}"#);
    }

    #[test]
    fn last_balanced_prefix_cuts_unterminated_tail() {
        let text = r#"{"a": 1} {"b":"#;
        assert_eq!(last_balanced_prefix(text), Some(8));
    }

    #[test]
    fn mentions_key_requires_quotes() {
        assert!(mentions_key(r#"{"tool": "x"}"#, "tool"));
        assert!(mentions_key(r#"{'tool': 'x'}"#, "tool"));
        assert!(!mentions_key(r#"{toolbox: 1}"#, "tool"));
    }
}
