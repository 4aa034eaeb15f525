//! Denylist scrubbing of client-supplied filter keys and values.
//!
//! Filter keys end up as column names in compiled statements, so every key
//! (and every string value) is scrubbed of SQL punctuation, comment markers
//! and statement keywords before compilation. Scrubbing repeats until a pass
//! removes nothing, because a removal can join fragments into a new match.

use serde_json::Value;

use super::filter::QUERY_KEY;

/// Keywords removed wherever they appear, case-insensitively.
const KEYWORDS: [&str; 8] = [
    "SELECT", "UPDATE", "INSERT", "DELETE", "LIKE", "WHERE", "ALTER", "UNION",
];

/// Boolean and join words removed from full-text values when wrapped in whitespace.
const WRAPPED_WORDS: [&str; 6] = ["OR", "AND", "JOIN", "LEFT", "RIGHT", "LIKE"];

const PUNCTUATION: [u8; 6] = [b'(', b')', b'\'', b'"', b'=', b'*'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Keys and exact-match values: all whitespace goes too.
    Strict,
    /// Full-text search values: single spaces between words survive.
    Query,
}

/// Sanitizes a filter key and its value.
///
/// The value of the full-text key `q` keeps single inner spaces; every other
/// string value is scrubbed like a key. Non-string values are returned as is.
pub fn sanitize_key_value(key: &str, value: &Value) -> (String, Value) {
    let key = scrub(key, Mode::Strict);
    let value = match value {
        Value::String(s) if key == QUERY_KEY => Value::String(scrub(s, Mode::Query)),
        Value::String(s) => Value::String(scrub(s, Mode::Strict)),
        other => other.clone(),
    };
    (key, value)
}

/// Sanitizes an identifier used outside a filter map, e.g. a sort field.
#[must_use]
pub fn sanitize_identifier(identifier: &str) -> String {
    scrub(identifier, Mode::Strict)
}

fn scrub(input: &str, mode: Mode) -> String {
    let mut current = input.as_bytes().to_vec();
    loop {
        let (next, changed) = scrub_pass(&current, mode);
        if !changed {
            break;
        }
        current = next;
    }
    // Only whole ASCII sequences are removed, so char boundaries survive.
    String::from_utf8_lossy(&current).into_owned()
}

fn scrub_pass(input: &[u8], mode: Mode) -> (Vec<u8>, bool) {
    let mut out = Vec::with_capacity(input.len());
    let mut changed = false;
    let mut i = 0;
    while i < input.len() {
        match match_len(input, i, mode) {
            Some(len) => {
                i += len;
                changed = true;
            }
            None => {
                out.push(input[i]);
                i += 1;
            }
        }
    }
    (out, changed)
}

/// Length of the denylisted token starting at `i`, trying alternatives in
/// priority order.
fn match_len(input: &[u8], i: usize, mode: Mode) -> Option<usize> {
    let rest = &input[i..];
    let first = rest[0];

    if matches!(first, b'\t' | b'\r' | b'\n') {
        return Some(1);
    }
    if rest.starts_with(b"--") {
        return Some(2);
    }

    match mode {
        Mode::Strict => {
            let run = whitespace_run(rest);
            if run > 0 {
                return Some(run);
            }
            if first == b'%' {
                return Some(1);
            }
        }
        Mode::Query => {
            if first == b'%' {
                return Some(1);
            }
            let run = whitespace_run(rest);
            if run >= 2 {
                return Some(run);
            }
            if let Some(len) = wrapped_word(rest) {
                return Some(len);
            }
        }
    }

    if PUNCTUATION.contains(&first) {
        return Some(1);
    }

    KEYWORDS
        .iter()
        .find(|kw| starts_with_ignore_case(rest, kw.as_bytes()))
        .map(|kw| kw.len())
}

/// Matches `\s(OR|AND|JOIN|LEFT|RIGHT|LIKE)\s`.
fn wrapped_word(rest: &[u8]) -> Option<usize> {
    if !is_space(rest[0]) {
        return None;
    }
    let after = &rest[1..];
    WRAPPED_WORDS.iter().find_map(|word| {
        let word = word.as_bytes();
        let closed = after.get(word.len()).copied().is_some_and(is_space);
        (closed && starts_with_ignore_case(after, word)).then_some(word.len() + 2)
    })
}

fn whitespace_run(rest: &[u8]) -> usize {
    rest.iter().take_while(|b| is_space(**b)).count()
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0c)
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}
