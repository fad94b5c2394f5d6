//! Candidate sanitization — deterministic text transforms that turn a
//! quasi-JSON candidate into strict-JSON-parseable text.
//!
//! The transforms never fail: unrepairable input comes back as a
//! best-effort string for the validator to reject. Quote handling is done
//! with a scanner that tracks string state, so apostrophes inside
//! double-quoted values survive single-quote normalization.

use crate::json_scan;

/// Sanitize a candidate substring.
///
/// Applied in sequence: fence/whitespace stripping, comment removal,
/// single-quote to double-quote conversion, whitespace collapsing outside
/// string literals, trailing-comma removal, truncation repair at the last
/// fully-balanced position.
pub(crate) fn sanitize(raw: &str) -> String {
    let stripped = strip_fences(raw.trim());
    let normalized = normalize_syntax(stripped);
    let decommaed = strip_trailing_commas(&normalized);
    repair_truncation(decommaed)
}

/// Drop surrounding markdown fence markers, including a language label on
/// the opening fence.
fn strip_fences(text: &str) -> &str {
    let mut out = text;
    if let Some(rest) = out.strip_prefix("```") {
        out = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            // Opening fence with label but no newline: drop the label too.
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = out.trim_end().strip_suffix("```") {
        out = rest;
    }
    out.trim()
}

/// One pass over the candidate handling comments, quote conversion,
/// whitespace collapsing, and control-character escaping inside strings.
fn normalize_syntax(text: &str) -> String {
    #[derive(PartialEq)]
    enum Mode {
        Out,
        InDouble,
        InSingle,
    }

    let mut out = String::with_capacity(text.len());
    let mut mode = Mode::Out;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match mode {
            Mode::Out => match ch {
                '/' if chars.peek() == Some(&'/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut prev = '\0';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                '\'' => {
                    out.push('"');
                    mode = Mode::InSingle;
                }
                '"' => {
                    out.push('"');
                    mode = Mode::InDouble;
                }
                c if c.is_whitespace() => {
                    while chars.peek().is_some_and(|next| next.is_whitespace()) {
                        chars.next();
                    }
                    if !out.ends_with(' ') && !out.is_empty() {
                        out.push(' ');
                    }
                }
                c => out.push(c),
            },
            Mode::InDouble => match ch {
                '\\' => {
                    out.push('\\');
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '"' => {
                    out.push('"');
                    mode = Mode::Out;
                }
                c => push_string_char(&mut out, c),
            },
            Mode::InSingle => match ch {
                '\\' => match chars.next() {
                    // \' inside a single-quoted string becomes a plain
                    // apostrophe once the delimiters turn into double quotes.
                    Some('\'') => out.push('\''),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push('\\'),
                },
                '"' => out.push_str("\\\""),
                '\'' => {
                    out.push('"');
                    mode = Mode::Out;
                }
                c => push_string_char(&mut out, c),
            },
        }
    }

    out.trim().to_string()
}

/// Raw control characters are invalid inside strict-JSON strings; escape
/// the common ones so multi-line values survive decoding.
fn push_string_char(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c => out.push(c),
    }
}

/// Remove commas that directly precede a closing `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' {
                out.push('\\');
                i += 1;
                if let Some(next) = text[i..].chars().next() {
                    out.push(next);
                    i += next.len_utf8();
                }
                continue;
            }
            if b == b'"' {
                in_string = false;
            }
        } else {
            if b == b'"' {
                in_string = true;
            }
            if b == b',' {
                let next = json_scan::skip_ws(bytes, i + 1);
                if matches!(bytes.get(next), Some(b'}') | Some(b']')) {
                    i += 1;
                    continue;
                }
            }
        }
        // Multi-byte chars only occur inside strings or prose; copy bytes.
        let ch_len = text[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// Cut an unterminated object back to the last fully-balanced position.
///
/// Nothing is appended: when no balanced prefix exists the input is
/// returned unchanged and the decode step rejects it.
fn repair_truncation(text: String) -> String {
    if json_scan::is_brace_balanced(&text) {
        return text;
    }
    match json_scan::last_balanced_prefix(&text) {
        Some(end) => text[..end].to_string(),
        None => text,
    }
}
