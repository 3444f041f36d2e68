//! JSON artifacts: the corpus document and the run report.
//!
//! Output is pretty-printed with a trailing newline and written through a
//! temporary file in the target directory, so a re-run over an unchanged
//! corpus leaves byte-identical files and a crash never leaves half a file.

use std::io::Write;
use std::path::Path;

use curia_core::{CaseRecord, RunReport, SchemaRegistry};
use serde::Serialize;
use tracing::info;

use crate::StoreError;

/// Render the corpus document.
///
/// Every case is checked against the registry first; a value that was not
/// coerced to its declared kind is an error, never stringified.
pub fn corpus_to_string(cases: &[CaseRecord], registry: &SchemaRegistry) -> Result<String, StoreError> {
    for case in cases {
        case.check(registry)?;
    }
    to_pretty(&cases)
}

/// Write the corpus document to `path`.
pub fn write_corpus(path: &Path, cases: &[CaseRecord], registry: &SchemaRegistry) -> Result<(), StoreError> {
    let text = corpus_to_string(cases, registry)?;
    write_atomic(path, text.as_bytes())?;
    info!(path = %path.display(), cases = cases.len(), "wrote corpus JSON");
    Ok(())
}

/// Parse a corpus document, rebuilding every value through the registry.
pub fn corpus_from_str(text: &str, registry: &SchemaRegistry) -> Result<Vec<CaseRecord>, StoreError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let cases = value
        .as_array()
        .ok_or_else(|| StoreError::Other("corpus document is not a JSON array".into()))?;
    cases
        .iter()
        .map(|case| CaseRecord::from_json(case, registry).map_err(StoreError::from))
        .collect()
}

/// Read a corpus document written by [`write_corpus`].
pub fn read_corpus(path: &Path, registry: &SchemaRegistry) -> Result<Vec<CaseRecord>, StoreError> {
    let text = std::fs::read_to_string(path)?;
    corpus_from_str(&text, registry)
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<(), StoreError> {
    write_atomic(path, to_pretty(report)?.as_bytes())?;
    info!(path = %path.display(), "wrote run report");
    Ok(())
}

pub fn read_report(path: &Path) -> Result<RunReport, StoreError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn to_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

/// Replace `path` with `bytes` via a sibling temporary file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
