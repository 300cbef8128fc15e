//! Strict parser for `(subject, predicate, object)` lines.
//!
//! LLM output is treated as untrusted text: only lines that are exactly a
//! parenthesised three-field tuple are accepted. Fields are either bare
//! (no commas, parentheses or quotes) or single/double-quoted with
//! backslash escapes.

use regex::Regex;
use std::sync::LazyLock;

use crate::schema::Triple;

const FIELD: &str = r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[^,()"']+"#;

static TRIPLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"^\(\s*({FIELD})\s*,\s*({FIELD})\s*,\s*({FIELD})\s*\)$");
    Regex::new(&pattern).expect("triple line pattern is valid")
});

/// Parse one line; `None` unless it is a well-formed triple
pub fn parse_triple_line(line: &str) -> Option<Triple> {
    let captures = TRIPLE_LINE.captures(line.trim())?;
    let field = |i: usize| unquote(captures.get(i).map_or("", |m| m.as_str()));

    Triple::new(field(1), field(2), field(3)).cleaned()
}

/// Parse every well-formed triple line in a free-text response
pub fn parse_triples(response: &str) -> Vec<Triple> {
    let mut triples = Vec::new();
    let mut skipped = 0usize;

    for line in response.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match parse_triple_line(line) {
            Some(triple) => triples.push(triple),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(parsed = triples.len(), skipped, "Skipped non-triple lines");
    }
    triples
}

fn unquote(field: &str) -> String {
    let field = field.trim();
    let quoted = field.len() >= 2
        && ((field.starts_with('"') && field.ends_with('"'))
            || (field.starts_with('\'') && field.ends_with('\'')));

    if !quoted {
        return field.to_string();
    }

    let mut out = String::with_capacity(field.len());
    let mut chars = field[1..field.len() - 1].chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
