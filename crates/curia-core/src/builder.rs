//! Record building and validation.
//!
//! Raw pairs are mapped onto the registry and coerced to their declared
//! kinds. Content problems never fail a document: they become diagnostics
//! and the offending value is dropped, replaced by a sentinel, or left
//! missing. Only unreadable input or an unrecoverable section layout fails.

use std::path::Path;

use tracing::debug;

use crate::answers::{self, RawPair};
use crate::case_id;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::DocumentError;
use crate::record::{CaseRecord, FieldMap, FieldValue, HoldingRecord};
use crate::schema::{
    ABSENCE_MARKER, FALSE_TOKENS, LIST_DELIMITER, SchemaEntry, SchemaRegistry, Scope,
    TRUE_TOKENS, UNKNOWN_CATEGORY, ValueKind,
};
use crate::sections::{self, BlockId};

/// Outcome of coercing one raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coerced {
    pub value: FieldValue,
    pub problem: Option<DiagnosticKind>,
}

impl Coerced {
    fn ok(value: FieldValue) -> Self {
        Self {
            value,
            problem: None,
        }
    }

    fn flagged(value: FieldValue, problem: DiagnosticKind) -> Self {
        Self {
            value,
            problem: Some(problem),
        }
    }
}

/// Coerce a raw answer to the kind declared by `entry`.
pub fn coerce(entry: &SchemaEntry, raw: &str) -> Coerced {
    let raw = raw.trim();
    if raw == ABSENCE_MARKER {
        return Coerced::ok(FieldValue::Missing);
    }
    match entry.kind {
        ValueKind::Text => {
            if raw.is_empty() {
                Coerced::ok(FieldValue::Missing)
            } else {
                Coerced::ok(FieldValue::Text(raw.to_string()))
            }
        }
        ValueKind::Enumerated(allowed) => {
            if allowed.contains(&raw) {
                Coerced::ok(FieldValue::Category(raw.to_string()))
            } else {
                Coerced::flagged(
                    FieldValue::Category(UNKNOWN_CATEGORY.to_string()),
                    DiagnosticKind::InvalidEnum,
                )
            }
        }
        ValueKind::Integer => match raw.parse::<i64>() {
            Ok(n) => Coerced::ok(FieldValue::Integer(n)),
            Err(_) => Coerced::flagged(FieldValue::Missing, DiagnosticKind::InvalidInteger),
        },
        ValueKind::Boolean => {
            if TRUE_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(raw)) {
                Coerced::ok(FieldValue::Boolean(true))
            } else if FALSE_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(raw)) {
                Coerced::ok(FieldValue::Boolean(false))
            } else {
                Coerced::flagged(FieldValue::Boolean(false), DiagnosticKind::InvalidBoolean)
            }
        }
        ValueKind::List => Coerced::ok(FieldValue::List(
            raw.split(LIST_DELIMITER)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        )),
    }
}

fn problem_message(entry: &SchemaEntry, block: BlockId, pair: &RawPair, kind: DiagnosticKind) -> String {
    let prefix = format!(
        "{block}: {} = \"{}\" (line {})",
        pair.code, pair.value, pair.line
    );
    match (kind, entry.kind) {
        (DiagnosticKind::InvalidEnum, ValueKind::Enumerated(allowed)) => format!(
            "{prefix} is not one of {}; recorded as {UNKNOWN_CATEGORY}",
            allowed.join(", ")
        ),
        (DiagnosticKind::InvalidBoolean, _) => {
            format!("{prefix} is not a recognised yes/no answer; recorded as false")
        }
        (DiagnosticKind::InvalidInteger, _) => {
            format!("{prefix} is not an integer; left missing")
        }
        _ => prefix,
    }
}

/// Map one block's raw pairs onto the registry entries of `scope`.
///
/// The returned map has one slot per registry entry in declaration order.
pub fn build_fields(
    scope: Scope,
    block: BlockId,
    pairs: &[RawPair],
    registry: &SchemaRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) -> FieldMap {
    for pair in pairs {
        if registry.lookup(scope, &pair.code).is_none() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnrecognizedField,
                format!(
                    "{block}: {} = \"{}\" (line {}) is not a {scope} question; dropped",
                    pair.code, pair.value, pair.line
                ),
            ));
        }
    }

    let slots = registry
        .entries(scope)
        .map(|entry| {
            let value = match pairs.iter().find(|p| p.code == entry.code) {
                Some(pair) => {
                    let coerced = coerce(entry, &pair.value);
                    if let Some(kind) = coerced.problem {
                        diagnostics.push(Diagnostic::new(
                            kind,
                            problem_message(entry, block, pair, kind),
                        ));
                    }
                    coerced.value
                }
                None => {
                    if entry.required {
                        diagnostics.push(Diagnostic::new(
                            DiagnosticKind::MissingRequired,
                            format!("{block}: required {} ({}) not answered", entry.code, entry.label),
                        ));
                    }
                    FieldValue::Missing
                }
            };
            (entry.code.to_string(), value)
        })
        .collect();

    FieldMap::from_slots(scope, slots)
}

/// Parse one coded document.
///
/// `slug` is the hyphenated case slug taken from the file name. Zero-holding
/// documents still produce a record (with a `no-holdings` warning); the
/// aggregator decides whether it enters the corpus.
pub fn parse_document(
    slug: &str,
    text: &str,
    registry: &SchemaRegistry,
) -> Result<CaseRecord, DocumentError> {
    let split = sections::split_sections(text)?;
    let mut diagnostics = Vec::new();

    let case_id = match case_id::normalize_case_id(slug) {
        Some(id) => id,
        None => {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::IrregularCaseId,
                format!("file slug {slug:?} is not of the form C-<number>-<year>; used verbatim"),
            ));
            slug.to_string()
        }
    };
    diagnostics.extend(split.diagnostics.iter().cloned());

    let case_block = answers::parse_section(&split.case);
    diagnostics.extend(case_block.diagnostics);
    let fields = build_fields(
        Scope::Case,
        BlockId::Case,
        &case_block.pairs,
        registry,
        &mut diagnostics,
    );

    let mut holdings = Vec::with_capacity(split.holdings.len());
    for section in &split.holdings {
        let BlockId::Holding(holding_index) = section.id else {
            continue;
        };
        let parsed = answers::parse_section(section);
        diagnostics.extend(parsed.diagnostics);
        let fields = build_fields(
            Scope::Holding,
            section.id,
            &parsed.pairs,
            registry,
            &mut diagnostics,
        );
        // Explicit N/A answers still count as coding the holding.
        let recognised = parsed
            .pairs
            .iter()
            .any(|p| registry.lookup(Scope::Holding, &p.code).is_some());
        if !recognised {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::EmptyHolding,
                format!("{}: no recognised answers; kept as an empty holding", section.id),
            ));
        }
        holdings.push(HoldingRecord {
            holding_index,
            fields,
        });
    }

    debug!(
        case_id = %case_id,
        holdings = holdings.len(),
        diagnostics = diagnostics.len(),
        "parsed coded document"
    );

    Ok(CaseRecord {
        case_id,
        fields,
        holdings,
        diagnostics,
    })
}

/// Read and parse a coded file. The case slug comes from the file name.
pub fn read_document(
    path: &Path,
    suffix: &str,
    registry: &SchemaRegistry,
) -> Result<CaseRecord, DocumentError> {
    let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_document(case_id::case_slug(&file_name, suffix), &text, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Scope::{Case, Holding};

    fn entry(kind: ValueKind) -> SchemaEntry {
        SchemaEntry::new("B99", "test", "test", Holding, kind, false)
    }

    fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
        diagnostics.iter().map(|d| d.kind).collect()
    }

    const DOC: &str = "\
Coded by: annotator 2
A1: PRO_DATA_SUBJECT
A2: 2020-07-16
A3: GRAND_CHAMBER
A4: von Danwitz
A6: yes
A8: Art 45; Art 46 ;; Art 58(2)(f)
A9: 2

holding section 1
B1: The Privacy Shield decision is invalid
B2: Art 45(1)
B3: TELEOLOGICAL
B5: FUNDAMENTAL_RIGHTS
B6: PRO_DATA_SUBJECT
B8: 4

holding section 2
B1: SCCs remain valid subject to supervisory oversight
B2: Art 46(2)(c); Art 58(2)(f)
B3: SYSTEMATIC
B6: MIXED
B7: no
";

    #[test]
    fn enumerated_match_is_case_sensitive() {
        let e = entry(ValueKind::Enumerated(&["MIXED", "NEUTRAL"]));
        assert_eq!(coerce(&e, "MIXED").value, FieldValue::Category("MIXED".into()));
        let bad = coerce(&e, "mixed");
        assert_eq!(bad.value, FieldValue::Category(UNKNOWN_CATEGORY.into()));
        assert_eq!(bad.problem, Some(DiagnosticKind::InvalidEnum));
    }

    #[test]
    fn absence_marker_is_missing_for_every_kind() {
        for kind in [
            ValueKind::Text,
            ValueKind::Enumerated(&["X"]),
            ValueKind::Integer,
            ValueKind::Boolean,
            ValueKind::List,
        ] {
            assert_eq!(coerce(&entry(kind), "N/A"), Coerced::ok(FieldValue::Missing));
        }
    }

    #[test]
    fn boolean_tokens() {
        let e = entry(ValueKind::Boolean);
        assert_eq!(coerce(&e, "Yes").value, FieldValue::Boolean(true));
        assert_eq!(coerce(&e, "TRUE").value, FieldValue::Boolean(true));
        assert_eq!(coerce(&e, "n").value, FieldValue::Boolean(false));
        assert_eq!(coerce(&e, "0").value, FieldValue::Boolean(false));
        let bad = coerce(&e, "maybe");
        assert_eq!(bad.value, FieldValue::Boolean(false));
        assert_eq!(bad.problem, Some(DiagnosticKind::InvalidBoolean));
    }

    #[test]
    fn integer_failure_leaves_missing() {
        let e = entry(ValueKind::Integer);
        assert_eq!(coerce(&e, "-3").value, FieldValue::Integer(-3));
        let bad = coerce(&e, "three");
        assert_eq!(bad.value, FieldValue::Missing);
        assert_eq!(bad.problem, Some(DiagnosticKind::InvalidInteger));
    }

    #[test]
    fn list_splitting() {
        let e = entry(ValueKind::List);
        assert_eq!(
            coerce(&e, " a ; b;; c ;").value,
            FieldValue::List(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(coerce(&e, "").value, FieldValue::List(vec![]));
    }

    #[test]
    fn empty_text_is_missing() {
        assert_eq!(coerce(&entry(ValueKind::Text), "  ").value, FieldValue::Missing);
    }

    #[test]
    fn full_document() {
        let registry = SchemaRegistry::gdpr();
        let case = parse_document("C-311-18", DOC, &registry).unwrap();
        assert_eq!(case.case_id, "C-311/18");
        assert_eq!(
            case.fields.get("A3"),
            Some(&FieldValue::Category("GRAND_CHAMBER".into()))
        );
        assert_eq!(case.fields.get("A6"), Some(&FieldValue::Boolean(true)));
        assert_eq!(
            case.fields.get("A8"),
            Some(&FieldValue::List(vec![
                "Art 45".into(),
                "Art 46".into(),
                "Art 58(2)(f)".into()
            ]))
        );
        assert_eq!(case.fields.get("A5"), Some(&FieldValue::Missing));
        assert_eq!(case.holdings.len(), 2);
        assert_eq!(case.holdings[0].fields.get("B8"), Some(&FieldValue::Integer(4)));
        assert_eq!(
            case.holdings[1].fields.get("B7"),
            Some(&FieldValue::Boolean(false))
        );
        assert!(case.diagnostics.is_empty(), "{:?}", case.diagnostics);
        case.check(&registry).unwrap();
    }

    #[test]
    fn every_registry_code_has_a_slot() {
        let registry = SchemaRegistry::gdpr();
        let case = parse_document("C-311-18", DOC, &registry).unwrap();
        assert_eq!(case.fields.len(), registry.entries(Case).count());
        for holding in &case.holdings {
            assert_eq!(holding.fields.len(), registry.entries(Holding).count());
        }
    }

    #[test]
    fn missing_holding_index_scenario() {
        let registry = SchemaRegistry::gdpr();
        let text = DOC.replace("holding section 2", "holding section 3");
        let case = parse_document("C-311-18", &text, &registry).unwrap();
        let indices: Vec<u32> = case.holdings.iter().map(|h| h.holding_index).collect();
        assert_eq!(indices, [1, 3]);
        assert_eq!(kinds(&case.diagnostics), [DiagnosticKind::MissingHoldingIndex]);
        assert!(case.diagnostics[0].message.contains("missing holding index 2"));
    }

    #[test]
    fn invalid_boolean_scenario() {
        let registry = SchemaRegistry::gdpr();
        let text = DOC.replace("B7: no", "B7: maybe");
        let case = parse_document("C-311-18", &text, &registry).unwrap();
        assert_eq!(
            case.holding(2).unwrap().fields.get("B7"),
            Some(&FieldValue::Boolean(false))
        );
        assert_eq!(kinds(&case.diagnostics), [DiagnosticKind::InvalidBoolean]);
        assert!(case.diagnostics[0].message.contains("\"maybe\""));
    }

    #[test]
    fn out_of_domain_enum_never_survives() {
        let registry = SchemaRegistry::gdpr();
        let text = DOC.replace("B3: SYSTEMATIC", "B3: LITERAL");
        let case = parse_document("C-311-18", &text, &registry).unwrap();
        let json = serde_json::to_string(&case.holdings[1].fields).unwrap();
        assert!(!json.contains("LITERAL"));
        assert_eq!(
            case.holding(2).unwrap().fields.get("B3"),
            Some(&FieldValue::Category(UNKNOWN_CATEGORY.into()))
        );
        assert_eq!(kinds(&case.diagnostics), [DiagnosticKind::InvalidEnum]);
    }

    #[test]
    fn unrecognized_and_missing_required() {
        let registry = SchemaRegistry::gdpr();
        let text = DOC.replace("A2: 2020-07-16", "A42: something").replace("B3: TELEOLOGICAL", "");
        let case = parse_document("C-311-18", &text, &registry).unwrap();
        assert_eq!(
            kinds(&case.diagnostics),
            [
                DiagnosticKind::UnrecognizedField,
                DiagnosticKind::MissingRequired,
                DiagnosticKind::MissingRequired,
            ]
        );
        assert!(case.diagnostics[0].message.contains("A42"));
        assert_eq!(case.fields.get("A42"), None);
        assert_eq!(case.fields.get("A2"), Some(&FieldValue::Missing));
    }

    #[test]
    fn holding_code_in_case_block_is_unrecognized() {
        let registry = SchemaRegistry::gdpr();
        let text = DOC.replace("A9: 2", "B1: misplaced");
        let case = parse_document("C-311-18", &text, &registry).unwrap();
        assert_eq!(kinds(&case.diagnostics), [DiagnosticKind::UnrecognizedField]);
    }

    #[test]
    fn empty_holding_is_kept_with_warning() {
        let registry = SchemaRegistry::gdpr();
        let text = "A1: MIXED\nholding section 1\nOnly commentary here.\nholding section 2\nB1: x\n";
        let case = parse_document("C-1-20", text, &registry).unwrap();
        assert_eq!(case.holdings.len(), 2);
        assert_eq!(case.holdings[0].fields.answered(), 0);
        assert!(kinds(&case.diagnostics).contains(&DiagnosticKind::EmptyHolding));
    }

    #[test]
    fn explicit_not_applicable_holding_is_not_empty() {
        let registry = SchemaRegistry::gdpr();
        let text = "A1: MIXED\nholding section 1\nB1: N/A\nholding section 2\nB1: x\n";
        let case = parse_document("C-1-20", text, &registry).unwrap();
        assert_eq!(case.holdings.len(), 2);
        assert_eq!(case.holdings[0].fields.answered(), 0);
        assert!(!kinds(&case.diagnostics).contains(&DiagnosticKind::EmptyHolding));
    }

    #[test]
    fn huge_holding_marker_yields_one_gap_warning() {
        let registry = SchemaRegistry::gdpr();
        let text = "A1: MIXED\nholding section 2000000\nB1: x\n";
        let case = parse_document("C-1-20", text, &registry).unwrap();
        assert_eq!(case.holdings[0].holding_index, 2_000_000);
        let gaps = kinds(&case.diagnostics)
            .into_iter()
            .filter(|k| *k == DiagnosticKind::MissingHoldingIndex)
            .count();
        assert_eq!(gaps, 1);
    }

    #[test]
    fn zero_holdings_still_produces_record() {
        let registry = SchemaRegistry::gdpr();
        let case = parse_document("C-1-20", "A1: MIXED\n", &registry).unwrap();
        assert!(case.holdings.is_empty());
        assert!(kinds(&case.diagnostics).contains(&DiagnosticKind::NoHoldings));
    }

    #[test]
    fn irregular_slug_used_verbatim() {
        let registry = SchemaRegistry::gdpr();
        let case = parse_document("joined-cases", DOC, &registry).unwrap();
        assert_eq!(case.case_id, "joined-cases");
        assert_eq!(kinds(&case.diagnostics), [DiagnosticKind::IrregularCaseId]);
    }

    #[test]
    fn truncated_document_fails() {
        let registry = SchemaRegistry::gdpr();
        let text = format!("{DOC}\nholding section 3\n\n");
        assert!(matches!(
            parse_document("C-311-18", &text, &registry),
            Err(DocumentError::Truncated { index: 3, .. })
        ));
    }

    #[test]
    fn parsing_is_idempotent() {
        let registry = SchemaRegistry::gdpr();
        let text = DOC.replace("B7: no", "B7: maybe");
        let a = parse_document("C-311-18", &text, &registry).unwrap();
        let b = parse_document("C-311-18", &text, &registry).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn read_document_derives_case_id_from_file_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("C-817-19_coded.md");
        std::fs::write(&path, DOC).unwrap();
        let case = read_document(&path, "_coded.md", &SchemaRegistry::gdpr()).unwrap();
        assert_eq!(case.case_id, "C-817/19");
    }

    #[test]
    fn unreadable_file_is_a_read_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("C-1-20_coded.md");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        assert!(matches!(
            read_document(&path, "_coded.md", &SchemaRegistry::gdpr()),
            Err(DocumentError::Read { .. })
        ));
    }
}
