use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::schema::Scope;

/// The registry violates one of its invariants.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("code {0} declared twice in the same scope")]
    DuplicateCode(String),

    #[error("enumerated code {0} has no allowed values")]
    EmptyDomain(String),

    #[error("enumerated code {0} lists a reserved token as an allowed value")]
    ReservedValue(String),

    #[error("code {code} does not belong to the {scope} code family")]
    WrongFamily { code: String, scope: Scope },
}

/// A document that cannot be turned into a case record at all.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("holding section {index} (line {line}) has no content and no following section")]
    Truncated { index: u32, line: usize },

    #[error("holding section {index} (line {line}) does not follow holding section {previous}")]
    OutOfOrder { index: u32, previous: u32, line: usize },

    #[error("case {case_id} was already parsed from {first_file}")]
    DuplicateCase { case_id: String, first_file: String },
}

impl DocumentError {
    /// The report entry recorded for a failed document.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let kind = match self {
            DocumentError::Read { .. } => DiagnosticKind::Io,
            DocumentError::Truncated { .. } => DiagnosticKind::TruncatedHolding,
            DocumentError::OutOfOrder { .. } => DiagnosticKind::HoldingOutOfOrder,
            DocumentError::DuplicateCase { .. } => DiagnosticKind::DuplicateCase,
        };
        Diagnostic::new(kind, self.to_string())
    }
}

/// The input directory itself could not be listed.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("cannot list input directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// A persisted corpus document does not match the registry.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{scope} field {code} is not in the registry")]
    UnknownField { scope: Scope, code: String },

    #[error("{scope} field {code} is absent")]
    MissingField { scope: Scope, code: String },

    #[error("field {code} holds a value that is not a coerced {expected} value")]
    KindMismatch { code: String, expected: &'static str },

    #[error("malformed record: {0}")]
    Shape(String),

    #[error("malformed diagnostic: {0}")]
    Diagnostic(String),
}
