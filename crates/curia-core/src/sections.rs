//! Section splitting: case block plus ordered holding blocks.
//!
//! Everything above the first `holding section N` marker is the case block.
//! The text between marker N and the next marker (or end of file) is holding
//! block N. Marker indices must strictly increase; gaps are tolerated and
//! reported.

use std::fmt;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::DocumentError;
use crate::grammar;

/// Gaps wider than this are reported as one range instead of per index.
const MAX_LISTED_GAP: u32 = 10;

/// Identifies a block within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockId {
    Case,
    Holding(u32),
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Case => f.write_str("case block"),
            BlockId::Holding(n) => write!(f, "holding {n}"),
        }
    }
}

/// Raw text of one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub id: BlockId,
    pub text: &'a str,
    /// 1-based source line of the first line of `text`.
    pub first_line: usize,
}

impl Section<'_> {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A document split into blocks, plus structural warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDocument<'a> {
    pub case: Section<'a>,
    pub holdings: Vec<Section<'a>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> SplitDocument<'a> {
    /// Look up a block's raw text.
    pub fn block(&self, id: BlockId) -> Option<&'a str> {
        match id {
            BlockId::Case => Some(self.case.text),
            BlockId::Holding(_) => self.holdings.iter().find(|s| s.id == id).map(|s| s.text),
        }
    }

    /// Case block first, then holdings in source order.
    pub fn sections(&self) -> impl Iterator<Item = &Section<'a>> {
        std::iter::once(&self.case).chain(self.holdings.iter())
    }
}

struct Marker {
    index: u32,
    line: usize,
    /// Byte offset where the marker line starts.
    start: usize,
    /// Byte offset just past the marker line (including its newline).
    end: usize,
}

/// Split a coded document into its case block and holding blocks.
///
/// Fails when the layout cannot be recovered: a marker index that does not
/// increase, or a final marker with no content after it.
pub fn split_sections(text: &str) -> Result<SplitDocument<'_>, DocumentError> {
    let mut markers: Vec<Marker> = Vec::new();
    let mut diagnostics = Vec::new();
    let mut offset = 0;

    for (i, raw_line) in text.split_inclusive('\n').enumerate() {
        let line_no = i + 1;
        if let Some(index) = grammar::holding_marker(raw_line) {
            let previous = markers.last().map_or(0, |m| m.index);
            if index <= previous {
                return Err(DocumentError::OutOfOrder {
                    index,
                    previous,
                    line: line_no,
                });
            }
            let skipped = index - previous - 1;
            if skipped > MAX_LISTED_GAP {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MissingHoldingIndex,
                    format!(
                        "missing holding indices {}..={} ({skipped} indices; line {line_no} jumps to {index})",
                        previous + 1,
                        index - 1
                    ),
                ));
            } else {
                for missing in previous + 1..index {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MissingHoldingIndex,
                        format!("missing holding index {missing} (line {line_no} jumps to {index})"),
                    ));
                }
            }
            markers.push(Marker {
                index,
                line: line_no,
                start: offset,
                end: offset + raw_line.len(),
            });
        }
        offset += raw_line.len();
    }

    let case_end = markers.first().map_or(text.len(), |m| m.start);
    let case = Section {
        id: BlockId::Case,
        text: &text[..case_end],
        first_line: 1,
    };

    if markers.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::NoHoldings,
            "no holding sections found",
        ));
    }

    let mut holdings = Vec::with_capacity(markers.len());
    for (i, marker) in markers.iter().enumerate() {
        let end = markers.get(i + 1).map_or(text.len(), |next| next.start);
        let section = Section {
            id: BlockId::Holding(marker.index),
            text: &text[marker.end..end],
            first_line: marker.line + 1,
        };
        if i + 1 == markers.len() && section.is_blank() {
            return Err(DocumentError::Truncated {
                index: marker.index,
                line: marker.line,
            });
        }
        holdings.push(section);
    }

    Ok(SplitDocument {
        case,
        holdings,
        diagnostics,
    })
}
