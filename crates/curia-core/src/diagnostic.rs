//! Parse diagnostics.
//!
//! Every problem found while reading a coded document becomes a
//! [`Diagnostic`]: a kind plus a message carrying enough context (block,
//! code, observed value, line) to find the annotation that caused it.
//! Diagnostics render and serialise as `"[kind] message"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RecordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    // Recoverable, per field.
    UnrecognizedField,
    InvalidEnum,
    InvalidBoolean,
    InvalidInteger,
    DuplicateKey,
    MissingRequired,
    // Structural warnings.
    MissingHoldingIndex,
    NoHoldings,
    EmptyHolding,
    IrregularCaseId,
    // Fatal, per document.
    Io,
    TruncatedHolding,
    HoldingOutOfOrder,
    DuplicateCase,
}

impl DiagnosticKind {
    pub const ALL: &[DiagnosticKind] = &[
        DiagnosticKind::UnrecognizedField,
        DiagnosticKind::InvalidEnum,
        DiagnosticKind::InvalidBoolean,
        DiagnosticKind::InvalidInteger,
        DiagnosticKind::DuplicateKey,
        DiagnosticKind::MissingRequired,
        DiagnosticKind::MissingHoldingIndex,
        DiagnosticKind::NoHoldings,
        DiagnosticKind::EmptyHolding,
        DiagnosticKind::IrregularCaseId,
        DiagnosticKind::Io,
        DiagnosticKind::TruncatedHolding,
        DiagnosticKind::HoldingOutOfOrder,
        DiagnosticKind::DuplicateCase,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            DiagnosticKind::UnrecognizedField => "unrecognized-field",
            DiagnosticKind::InvalidEnum => "invalid-enum",
            DiagnosticKind::InvalidBoolean => "invalid-boolean",
            DiagnosticKind::InvalidInteger => "invalid-integer",
            DiagnosticKind::DuplicateKey => "duplicate-key",
            DiagnosticKind::MissingRequired => "missing-required",
            DiagnosticKind::MissingHoldingIndex => "missing-holding-index",
            DiagnosticKind::NoHoldings => "no-holdings",
            DiagnosticKind::EmptyHolding => "empty-holding",
            DiagnosticKind::IrregularCaseId => "irregular-case-id",
            DiagnosticKind::Io => "io",
            DiagnosticKind::TruncatedHolding => "truncated-holding",
            DiagnosticKind::HoldingOutOfOrder => "holding-out-of-order",
            DiagnosticKind::DuplicateCase => "duplicate-case",
        }
    }

    /// Fatal kinds exclude the whole document from the corpus.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::Io
                | DiagnosticKind::TruncatedHolding
                | DiagnosticKind::HoldingOutOfOrder
                | DiagnosticKind::DuplicateCase
        )
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for DiagnosticKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.tag() == s)
            .ok_or_else(|| RecordError::Diagnostic(format!("unknown kind {s:?}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl FromStr for Diagnostic {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('[')
            .ok_or_else(|| RecordError::Diagnostic(s.to_string()))?;
        let (tag, message) = rest
            .split_once("] ")
            .ok_or_else(|| RecordError::Diagnostic(s.to_string()))?;
        Ok(Self::new(tag.parse()?, message))
    }
}

impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Diagnostic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
