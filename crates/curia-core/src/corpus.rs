//! Multi-document aggregation.
//!
//! Every `*_coded.md` file in a directory is parsed independently (in
//! parallel unless disabled), then merged in file-name order. A failing file
//! only affects its own entry in the run report.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::builder;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::{CorpusError, DocumentError};
use crate::record::CaseRecord;
use crate::schema::SchemaRegistry;

/// File-name suffix identifying coded documents.
pub const CODED_SUFFIX: &str = "_coded.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Parsed,
    ParsedWithWarnings,
    Failed,
}

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub file_name: String,
    pub status: FileStatus,
    /// Canonical id when the document produced a record.
    pub case_id: Option<String>,
    /// Whether the record entered the analytic corpus.
    pub in_corpus: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Successfully parsed cases plus the per-file side collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    pub cases: Vec<CaseRecord>,
    pub files: Vec<FileOutcome>,
}

/// Run-level summary written next to the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub total_files: usize,
    /// Documents that produced a record, with or without warnings.
    pub successful: usize,
    pub successful_with_warnings: usize,
    pub failed: usize,
    /// Only files with at least one diagnostic appear here.
    pub diagnostics_by_file: BTreeMap<String, Vec<Diagnostic>>,
}

impl RunReport {
    /// Number of diagnostics of `kind` across every file.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics_by_file
            .values()
            .flatten()
            .filter(|d| d.kind == kind)
            .count()
    }
}

impl Corpus {
    pub fn report(&self) -> RunReport {
        let mut report = RunReport {
            total_files: self.files.len(),
            ..Default::default()
        };
        for file in &self.files {
            match file.status {
                FileStatus::Parsed => report.successful += 1,
                FileStatus::ParsedWithWarnings => {
                    report.successful += 1;
                    report.successful_with_warnings += 1;
                }
                FileStatus::Failed => report.failed += 1,
            }
            if !file.diagnostics.is_empty() {
                report
                    .diagnostics_by_file
                    .insert(file.file_name.clone(), file.diagnostics.clone());
            }
        }
        report
    }

    pub fn case(&self, case_id: &str) -> Option<&CaseRecord> {
        self.cases.iter().find(|c| c.case_id == case_id)
    }

    /// Total holdings across the corpus.
    pub fn holding_count(&self) -> usize {
        self.cases.iter().map(|c| c.holdings.len()).sum()
    }
}

/// Runs the parser over a directory of coded files.
pub struct Aggregator<'r> {
    registry: &'r SchemaRegistry,
    suffix: String,
    parallel: bool,
}

impl<'r> Aggregator<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            suffix: CODED_SUFFIX.to_string(),
            parallel: true,
        }
    }

    /// Match source files by a different suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Parse files one after another instead of on the rayon pool.
    pub fn serial(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Coded files directly inside `dir`, sorted by file name.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, CorpusError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| CorpusError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?;
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&self.suffix));
            if matches && !entry.file_type().is_dir() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Parse every coded file in `dir` and merge the results.
    pub fn run(&self, dir: &Path) -> Result<Corpus, CorpusError> {
        let files = self.discover(dir)?;
        info!(dir = %dir.display(), files = files.len(), "discovered coded documents");
        Ok(self.run_files(&files))
    }

    /// Parse the given files; the merge follows the order of `files`.
    pub fn run_files(&self, files: &[PathBuf]) -> Corpus {
        let parsed: Vec<(String, Result<CaseRecord, DocumentError>)> = if self.parallel {
            files.par_iter().map(|path| self.parse_one(path)).collect()
        } else {
            files.iter().map(|path| self.parse_one(path)).collect()
        };

        let mut corpus = Corpus::default();
        let mut first_file: HashMap<String, String> = HashMap::new();

        for (file_name, result) in parsed {
            let outcome = match result {
                Ok(case) => match first_file.get(&case.case_id) {
                    Some(first) => {
                        let err = DocumentError::DuplicateCase {
                            case_id: case.case_id.clone(),
                            first_file: first.clone(),
                        };
                        warn!(file = %file_name, error = %err, "document failed");
                        let mut diagnostics = case.diagnostics;
                        diagnostics.push(err.to_diagnostic());
                        FileOutcome {
                            file_name,
                            status: FileStatus::Failed,
                            case_id: Some(case.case_id),
                            in_corpus: false,
                            diagnostics,
                        }
                    }
                    None => {
                        let status = if case.diagnostics.is_empty() {
                            FileStatus::Parsed
                        } else {
                            FileStatus::ParsedWithWarnings
                        };
                        let in_corpus = !case.holdings.is_empty();
                        let outcome = FileOutcome {
                            file_name: file_name.clone(),
                            status,
                            case_id: Some(case.case_id.clone()),
                            in_corpus,
                            diagnostics: case.diagnostics.clone(),
                        };
                        // Only a corpus case claims its id.
                        if in_corpus {
                            first_file.insert(case.case_id.clone(), file_name);
                            corpus.cases.push(case);
                        } else {
                            warn!(file = %outcome.file_name, "no holdings; excluded from corpus");
                        }
                        outcome
                    }
                },
                Err(err) => {
                    warn!(file = %file_name, error = %err, "document failed");
                    FileOutcome {
                        file_name,
                        status: FileStatus::Failed,
                        case_id: None,
                        in_corpus: false,
                        diagnostics: vec![err.to_diagnostic()],
                    }
                }
            };
            corpus.files.push(outcome);
        }

        let report = corpus.report();
        info!(
            total = report.total_files,
            successful = report.successful,
            with_warnings = report.successful_with_warnings,
            failed = report.failed,
            cases = corpus.cases.len(),
            holdings = corpus.holding_count(),
            "aggregation complete"
        );
        corpus
    }

    fn parse_one(&self, path: &Path) -> (String, Result<CaseRecord, DocumentError>) {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        (
            file_name,
            builder::read_document(path, &self.suffix, self.registry),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn coded(direction: &str) -> String {
        format!(
            "A1: {direction}\nA2: 2022-01-01\nA3: FIRST_CHAMBER\nA8: Art 6\n\n\
             holding section 1\nB1: text\nB2: Art 6(1)(f)\nB3: SEMANTIC\nB6: {direction}\n"
        )
    }

    fn write(dir: &Path, name: &str, content: &[u8]) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn discovers_only_suffixed_files_in_name_order() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "C-20-21_coded.md", coded("MIXED").as_bytes());
        write(tmp.path(), "C-10-21_coded.md", coded("MIXED").as_bytes());
        write(tmp.path(), "notes.md", b"ignored");
        fs::create_dir(tmp.path().join("nested")).unwrap();
        write(&tmp.path().join("nested"), "C-1-21_coded.md", coded("MIXED").as_bytes());

        let registry = SchemaRegistry::gdpr();
        let files = Aggregator::new(&registry).discover(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["C-10-21_coded.md", "C-20-21_coded.md"]);
    }

    #[test]
    fn unreadable_files_are_isolated() {
        let tmp = TempDir::new().unwrap();
        for i in 1..=8 {
            write(tmp.path(), &format!("C-{i}-22_coded.md"), coded("PRO_CONTROLLER").as_bytes());
        }
        write(tmp.path(), "C-90-22_coded.md", &[0xff, 0xfe, 0xfd]);
        write(tmp.path(), "C-91-22_coded.md", &[0xc3, 0x28]);

        let registry = SchemaRegistry::gdpr();
        let corpus = Aggregator::new(&registry).run(tmp.path()).unwrap();
        let report = corpus.report();
        assert_eq!(report.total_files, 10);
        assert_eq!(report.failed, 2);
        assert_eq!(report.successful, 8);
        assert_eq!(report.successful_with_warnings, 0);
        assert_eq!(report.diagnostics_by_file.len(), 2);
        for diagnostics in report.diagnostics_by_file.values() {
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].kind, DiagnosticKind::Io);
        }
        assert_eq!(corpus.cases.len(), 8);
    }

    #[test]
    fn one_truncated_document_leaves_the_rest() {
        let tmp = TempDir::new().unwrap();
        for i in 1..=5 {
            write(tmp.path(), &format!("C-{i}-23_coded.md"), coded("MIXED").as_bytes());
        }
        let truncated = format!("{}\nholding section 2\n", coded("MIXED"));
        write(tmp.path(), "C-3-23_coded.md", truncated.as_bytes());

        let registry = SchemaRegistry::gdpr();
        let corpus = Aggregator::new(&registry).run(tmp.path()).unwrap();
        let report = corpus.report();
        assert_eq!(report.successful, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.count(DiagnosticKind::TruncatedHolding), 1);
        assert!(corpus.case("C-3/23").is_none());
        assert!(corpus.case("C-4/23").is_some());
    }

    #[test]
    fn merge_order_is_file_name_order() {
        let tmp = TempDir::new().unwrap();
        for name in ["C-9-20", "C-10-20", "C-1-21", "C-100-19"] {
            write(tmp.path(), &format!("{name}_coded.md"), coded("NEUTRAL").as_bytes());
        }
        let registry = SchemaRegistry::gdpr();
        let parallel = Aggregator::new(&registry).run(tmp.path()).unwrap();
        let serial = Aggregator::new(&registry).serial().run(tmp.path()).unwrap();
        let ids: Vec<&str> = parallel.cases.iter().map(|c| c.case_id.as_str()).collect();
        assert_eq!(ids, ["C-1/21", "C-10/20", "C-100/19", "C-9/20"]);
        assert_eq!(parallel, serial);
    }

    #[test]
    fn zero_holding_document_is_reported_but_not_in_corpus() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "C-5-20_coded.md", b"A1: MIXED\n");
        write(tmp.path(), "C-6-20_coded.md", coded("MIXED").as_bytes());

        let registry = SchemaRegistry::gdpr();
        let corpus = Aggregator::new(&registry).run(tmp.path()).unwrap();
        let report = corpus.report();
        assert_eq!(report.successful, 2);
        assert_eq!(report.successful_with_warnings, 1);
        assert_eq!(corpus.cases.len(), 1);
        assert_eq!(report.count(DiagnosticKind::NoHoldings), 1);
        assert!(!corpus.files[0].in_corpus);
    }

    #[test]
    fn duplicate_case_id_fails_the_later_file() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "C-7-20_coded.md", coded("MIXED").as_bytes());
        write(tmp.path(), "c-7-20_coded.md", coded("MIXED").as_bytes());

        let registry = SchemaRegistry::gdpr();
        let corpus = Aggregator::new(&registry).run(tmp.path()).unwrap();
        let report = corpus.report();
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.count(DiagnosticKind::DuplicateCase), 1);
    }

    #[test]
    fn duplicate_case_keeps_its_own_warnings() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "C-7-20_coded.md", coded("MIXED").as_bytes());
        let noisy = format!("{}B7: maybe\nB8: lots\n", coded("MIXED"));
        write(tmp.path(), "c-7-20_coded.md", noisy.as_bytes());

        let registry = SchemaRegistry::gdpr();
        let report = Aggregator::new(&registry).run(tmp.path()).unwrap().report();
        let kinds: Vec<DiagnosticKind> = report.diagnostics_by_file["c-7-20_coded.md"]
            .iter()
            .map(|d| d.kind)
            .collect();
        assert_eq!(
            kinds,
            [
                DiagnosticKind::InvalidBoolean,
                DiagnosticKind::InvalidInteger,
                DiagnosticKind::DuplicateCase,
            ]
        );
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn zero_holding_document_does_not_claim_its_case_id() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "C-7-20_coded.md", b"A1: MIXED\n");
        write(tmp.path(), "c-7-20_coded.md", coded("MIXED").as_bytes());

        let registry = SchemaRegistry::gdpr();
        let corpus = Aggregator::new(&registry).run(tmp.path()).unwrap();
        let report = corpus.report();
        assert_eq!(report.failed, 0);
        assert_eq!(report.count(DiagnosticKind::DuplicateCase), 0);
        assert_eq!(corpus.cases.len(), 1);
        assert!(corpus.case("C-7/20").is_some());
        assert!(corpus.files[1].in_corpus);
    }

    #[test]
    fn every_file_failing_still_reports() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "C-1-20_coded.md", &[0xff]);
        let registry = SchemaRegistry::gdpr();
        let corpus = Aggregator::new(&registry).run(tmp.path()).unwrap();
        let report = corpus.report();
        assert_eq!((report.total_files, report.failed), (1, 1));
        assert!(corpus.cases.is_empty());
    }

    #[test]
    fn missing_directory_is_a_run_error() {
        let registry = SchemaRegistry::gdpr();
        let result = Aggregator::new(&registry).run(Path::new("/nonexistent/coded"));
        assert!(matches!(result, Err(CorpusError::ReadDir { .. })));
    }

    #[test]
    fn custom_suffix() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "C-1-20.coded.txt", coded("MIXED").as_bytes());
        let registry = SchemaRegistry::gdpr();
        let corpus = Aggregator::new(&registry)
            .with_suffix(".coded.txt")
            .run(tmp.path())
            .unwrap();
        assert_eq!(corpus.cases[0].case_id, "C-1/20");
    }

    #[test]
    fn report_json_shape() {
        let mut report = RunReport {
            total_files: 2,
            successful: 1,
            successful_with_warnings: 1,
            failed: 1,
            ..Default::default()
        };
        report.diagnostics_by_file.insert(
            "C-1-20_coded.md".into(),
            vec![Diagnostic::new(DiagnosticKind::Io, "cannot read")],
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "total_files": 2,
                "successful": 1,
                "successful_with_warnings": 1,
                "failed": 1,
                "diagnostics_by_file": { "C-1-20_coded.md": ["[io] cannot read"] }
            })
        );
    }
}
