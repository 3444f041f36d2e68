//! Schema registry for the CJEU GDPR coding scheme.
//!
//! Each coded judgment answers a fixed set of questions. Case-level questions
//! carry `A`-family codes (`A1`, `A2`, ...); holding-level questions carry
//! `B`-family codes. The registry declares every code, its value domain and
//! whether the annotator must answer it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::grammar;

/// Token an annotator writes to mark a question as deliberately unanswered.
pub const ABSENCE_MARKER: &str = "N/A";

/// Category substituted for an enumerated answer outside its allowed set.
pub const UNKNOWN_CATEGORY: &str = "UNKNOWN";

/// Delimiter between elements of a list-kind answer.
pub const LIST_DELIMITER: char = ';';

/// Accepted truthy tokens (compared ASCII case-insensitively).
pub const TRUE_TOKENS: &[&str] = &["yes", "y", "true", "1"];

/// Accepted falsy tokens (compared ASCII case-insensitively).
pub const FALSE_TOKENS: &[&str] = &["no", "n", "false", "0"];

/// Which part of a coded document a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Case,
    Holding,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Case => "CASE",
            Scope::Holding => "HOLDING",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value domain of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Enumerated(&'static [&'static str]),
    Integer,
    Boolean,
    List,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Enumerated(_) => "enumerated",
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::List => "list",
        }
    }
}

/// One recognised question code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub code: &'static str,
    /// snake_case column description, e.g. `chamber`.
    pub label: &'static str,
    pub question: &'static str,
    pub scope: Scope,
    pub kind: ValueKind,
    pub required: bool,
}

impl SchemaEntry {
    pub const fn new(
        code: &'static str,
        label: &'static str,
        question: &'static str,
        scope: Scope,
        kind: ValueKind,
        required: bool,
    ) -> Self {
        Self {
            code,
            label,
            question,
            scope,
            kind,
            required,
        }
    }
}

// ── Value domains ──

pub const DIRECTIONS: &[&str] = &["PRO_DATA_SUBJECT", "PRO_CONTROLLER", "MIXED", "NEUTRAL"];

pub const CHAMBERS: &[&str] = &[
    "FULL_COURT",
    "GRAND_CHAMBER",
    "FIRST_CHAMBER",
    "SECOND_CHAMBER",
    "THIRD_CHAMBER",
    "FOURTH_CHAMBER",
    "FIFTH_CHAMBER",
    "SIXTH_CHAMBER",
    "SEVENTH_CHAMBER",
    "EIGHTH_CHAMBER",
    "NINTH_CHAMBER",
    "TENTH_CHAMBER",
];

pub const METHODS: &[&str] = &[
    "SEMANTIC",
    "SYSTEMATIC",
    "TELEOLOGICAL",
    "HISTORICAL",
    "PRINCIPLE_BASED",
    "CASE_LAW",
];

pub const PURPOSES: &[&str] = &[
    "HIGH_LEVEL_OF_PROTECTION",
    "FUNDAMENTAL_RIGHTS",
    "FREE_FLOW_OF_DATA",
    "EFFECTIVENESS",
    "LEGAL_CERTAINTY",
    "NONE",
];

use Scope::{Case, Holding};
use ValueKind::{Boolean, Enumerated, Integer, List, Text};

const GDPR_ENTRIES: &[SchemaEntry] = &[
    SchemaEntry::new("A1", "outcome", "Overall direction of the judgment", Case, Enumerated(DIRECTIONS), true),
    SchemaEntry::new("A2", "judgment_date", "Date of judgment (YYYY-MM-DD)", Case, Text, true),
    SchemaEntry::new("A3", "chamber", "Formation of the Court", Case, Enumerated(CHAMBERS), true),
    SchemaEntry::new("A4", "judge_rapporteur", "Judge-Rapporteur", Case, Text, false),
    SchemaEntry::new("A5", "advocate_general", "Advocate General", Case, Text, false),
    SchemaEntry::new("A6", "ag_opinion", "Was an Advocate General opinion delivered?", Case, Boolean, false),
    SchemaEntry::new("A7", "referring_state", "Member State of the referring court", Case, Text, false),
    SchemaEntry::new("A8", "gdpr_articles", "GDPR articles interpreted", Case, List, true),
    SchemaEntry::new("A9", "holding_count", "Number of holdings identified", Case, Integer, false),
    SchemaEntry::new("A10", "subject_keywords", "Subject-matter keywords", Case, List, false),
    SchemaEntry::new("B1", "holding_text", "Core holding in one sentence", Holding, Text, true),
    SchemaEntry::new("B2", "provisions", "Provisions interpreted", Holding, List, true),
    SchemaEntry::new("B3", "primary_method", "Dominant interpretive method", Holding, Enumerated(METHODS), true),
    SchemaEntry::new("B4", "secondary_methods", "Other interpretive methods used", Holding, List, false),
    SchemaEntry::new("B5", "teleological_purpose", "Purpose invoked in teleological reasoning", Holding, Enumerated(PURPOSES), false),
    SchemaEntry::new("B6", "direction", "Direction of the holding", Holding, Enumerated(DIRECTIONS), true),
    SchemaEntry::new("B7", "balancing", "Does the Court balance competing rights?", Holding, Boolean, false),
    SchemaEntry::new("B8", "precedents_cited", "Number of prior CJEU judgments cited", Holding, Integer, false),
    SchemaEntry::new("B9", "charter_cited", "Does the holding cite the Charter?", Holding, Boolean, false),
    SchemaEntry::new("B10", "key_passage", "Key reasoning passage (paragraph reference)", Holding, Text, false),
];

/// Lookup table of recognised question codes.
///
/// Entries keep their declaration order; that order is the field order of
/// every record and every persisted artifact.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entries: Vec<SchemaEntry>,
    index: HashMap<Scope, HashMap<&'static str, usize>>,
}

impl SchemaRegistry {
    /// Build a registry, checking its invariants.
    ///
    /// Codes must be unique within a scope and belong to the lexical family
    /// of that scope; enumerated entries need a non-empty allowed set that
    /// does not already contain the unknown sentinel.
    pub fn new(entries: Vec<SchemaEntry>) -> Result<Self, SchemaError> {
        for entry in &entries {
            if grammar::code_scope(entry.code) != Some(entry.scope) {
                return Err(SchemaError::WrongFamily {
                    code: entry.code.to_string(),
                    scope: entry.scope,
                });
            }
            if let ValueKind::Enumerated(allowed) = entry.kind {
                if allowed.is_empty() {
                    return Err(SchemaError::EmptyDomain(entry.code.to_string()));
                }
                if allowed.contains(&UNKNOWN_CATEGORY) || allowed.contains(&ABSENCE_MARKER) {
                    return Err(SchemaError::ReservedValue(entry.code.to_string()));
                }
            }
        }
        let registry = Self::from_entries_unchecked(entries);
        let indexed: usize = registry.index.values().map(HashMap::len).sum();
        if indexed != registry.entries.len() {
            let mut seen = std::collections::HashSet::new();
            let dup = registry
                .entries
                .iter()
                .find(|e| !seen.insert((e.scope, e.code)))
                .map(|e| e.code.to_string())
                .unwrap_or_default();
            return Err(SchemaError::DuplicateCode(dup));
        }
        Ok(registry)
    }

    /// The coding scheme used for the CJEU GDPR corpus.
    pub fn gdpr() -> Self {
        Self::from_entries_unchecked(GDPR_ENTRIES.to_vec())
    }

    fn from_entries_unchecked(entries: Vec<SchemaEntry>) -> Self {
        let mut index: HashMap<Scope, HashMap<&'static str, usize>> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            index.entry(entry.scope).or_default().entry(entry.code).or_insert(i);
        }
        Self { entries, index }
    }

    /// Find the entry for `code` within `scope`.
    pub fn lookup(&self, scope: Scope, code: &str) -> Option<&SchemaEntry> {
        self.index
            .get(&scope)
            .and_then(|codes| codes.get(code))
            .map(|&i| &self.entries[i])
    }

    /// Entries of one scope, in declaration order.
    pub fn entries(&self, scope: Scope) -> impl Iterator<Item = &SchemaEntry> {
        self.entries.iter().filter(move |e| e.scope == scope)
    }

    /// Every entry, case scope first, in declaration order.
    pub fn all(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::gdpr()
    }
}
