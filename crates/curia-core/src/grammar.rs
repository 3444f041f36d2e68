//! Line grammar of coded documents.
//!
//! ```text
//! <marker-line>  ::= "holding section" <ws> <int>
//! <answer-line>  ::= <code> ":" <ws>* <value>
//! <code>         ::= "A" <digits> | "B" <digits>
//! <value>        ::= rest-of-line, trimmed
//! ```
//!
//! Marker lines may carry a markdown heading prefix (`## Holding section 2`)
//! and are matched case-insensitively. Answer lines tolerate list bullets and
//! markdown bold around the code (`- **A3:** GRAND_CHAMBER`). Everything else
//! is inert context.

use std::sync::LazyLock;

use regex::Regex;

use crate::schema::Scope;

static HOLDING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#{1,6}\s*)?holding\s+section\s+([1-9][0-9]{0,8})\s*$")
        .expect("holding marker pattern compiles")
});

static ANSWER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:[-*+]\s+)?(?:\*\*)?(?P<code>[AB][0-9]{1,3})(?:\*\*)?\s*:(?:\*\*)?\s*(?P<value>.*?)\s*$",
    )
    .expect("answer line pattern compiles")
});

/// If `line` is a holding marker, return its index.
pub fn holding_marker(line: &str) -> Option<u32> {
    HOLDING_MARKER
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
}

/// If `line` is an answer line, return `(code, value)` with the value trimmed.
pub fn answer_line(line: &str) -> Option<(&str, &str)> {
    let caps = ANSWER_LINE.captures(line)?;
    let code = caps.name("code")?.as_str();
    let value = caps.name("value").map_or("", |m| m.as_str());
    Some((code, value))
}

/// Scope of the lexical family a code belongs to.
pub fn code_scope(code: &str) -> Option<Scope> {
    let mut chars = code.chars();
    let scope = match chars.next()? {
        'A' => Scope::Case,
        'B' => Scope::Holding,
        _ => return None,
    };
    let digits = chars.as_str();
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(scope)
}
