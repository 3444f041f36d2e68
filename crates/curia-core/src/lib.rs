//! Coded-judgment parsing for the CJEU GDPR study.
//!
//! Pipeline: [`sections`] splits a coded document into blocks, [`answers`]
//! lifts `code: value` lines, [`builder`] validates them against the
//! [`schema`] registry, and [`corpus`] runs the whole thing over a directory.

pub mod answers;
pub mod builder;
pub mod case_id;
pub mod corpus;
pub mod diagnostic;
pub mod error;
pub mod grammar;
pub mod record;
pub mod schema;
pub mod sections;
pub mod table;

pub use builder::{parse_document, read_document};
pub use case_id::normalize_case_id;
pub use corpus::{Aggregator, CODED_SUFFIX, Corpus, FileOutcome, FileStatus, RunReport};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{CorpusError, DocumentError, RecordError, SchemaError};
pub use record::{CaseRecord, FieldMap, FieldValue, HoldingRecord};
pub use schema::{SchemaEntry, SchemaRegistry, Scope, ValueKind};
pub use sections::BlockId;
