//! Answer-line extraction from one block.

use std::collections::HashMap;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::grammar;
use crate::sections::{BlockId, Section};

/// A `code: value` line lifted from a block, before any schema check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPair {
    pub code: String,
    pub value: String,
    /// 1-based source line.
    pub line: usize,
}

/// Raw pairs of one block in line order, duplicates resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBlock {
    pub pairs: Vec<RawPair>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Extract answer lines from a section.
pub fn parse_section(section: &Section<'_>) -> ParsedBlock {
    parse_block(section.text, section.id, section.first_line)
}

/// Extract answer lines from `text`.
///
/// Lines that are not answer lines are skipped. When a code repeats, the
/// later value replaces the earlier one in place and a duplicate-key warning
/// is recorded.
pub fn parse_block(text: &str, block: BlockId, first_line: usize) -> ParsedBlock {
    let mut parsed = ParsedBlock::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (i, line) in text.lines().enumerate() {
        let Some((code, value)) = grammar::answer_line(line) else {
            continue;
        };
        let line_no = first_line + i;
        match seen.get(code) {
            Some(&at) => {
                let earlier = &mut parsed.pairs[at];
                parsed.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::DuplicateKey,
                    format!(
                        "{block}: {code} answered again at line {line_no} (\"{value}\" replaces \"{}\" from line {})",
                        earlier.value, earlier.line
                    ),
                ));
                earlier.value = value.to_string();
                earlier.line = line_no;
            }
            None => {
                seen.insert(code.to_string(), parsed.pairs.len());
                parsed.pairs.push(RawPair {
                    code: code.to_string(),
                    value: value.to_string(),
                    line: line_no,
                });
            }
        }
    }
    parsed
}
