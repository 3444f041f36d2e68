//! DuckDB relational store for the coded corpus.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use curia_core::{CaseRecord, FieldMap, FieldValue, RunReport, SchemaEntry, SchemaRegistry, Scope, ValueKind};
use duckdb::types::Value;
use duckdb::{Connection, params_from_iter};
use tracing::{debug, info};

use crate::StoreError;

/// DuckDB store for cases, holdings and their list answers.
///
/// Layout, rebuilt from scratch on every [`write_corpus`](Self::write_corpus):
///
/// - `cases`: one row per case, one column per non-list case field.
/// - `holdings`: one row per holding keyed by `(case_id, holding_index)`,
///   one column per non-list holding field.
/// - `case_<code>` / `holding_<code>`: one junction table per list field,
///   one row per element with its 1-based `position`.
/// - `diagnostics`: every report diagnostic, keyed by file and sequence.
/// - `holdings_flat`: view with one row per holding, case fields repeated
///   and list fields joined with `"; "`.
///
/// Field columns are named by lowercased code (`a1`, `b3`).
pub struct DuckStore {
    conn: Connection,
}

fn column(code: &str) -> String {
    code.to_ascii_lowercase()
}

fn sql_type(kind: &ValueKind) -> &'static str {
    match kind {
        ValueKind::Integer => "BIGINT",
        ValueKind::Boolean => "BOOLEAN",
        ValueKind::Text | ValueKind::Enumerated(_) | ValueKind::List => "VARCHAR",
    }
}

fn sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Missing | FieldValue::List(_) => Value::Null,
        FieldValue::Text(s) | FieldValue::Category(s) => Value::Text(s.clone()),
        FieldValue::Integer(i) => Value::BigInt(*i),
        FieldValue::Boolean(b) => Value::Boolean(*b),
    }
}

fn is_list(entry: &SchemaEntry) -> bool {
    matches!(entry.kind, ValueKind::List)
}

fn junction_table(scope: Scope, code: &str) -> String {
    match scope {
        Scope::Case => format!("case_{}", column(code)),
        Scope::Holding => format!("holding_{}", column(code)),
    }
}

fn list_items<'a>(fields: &'a FieldMap, code: &str) -> &'a [String] {
    match fields.get(code) {
        Some(FieldValue::List(items)) => items,
        _ => &[],
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// DDL for the whole layout, in creation order.
fn create_sql(registry: &SchemaRegistry) -> String {
    let scalar_columns = |scope| {
        registry
            .entries(scope)
            .filter(|e| !is_list(e))
            .map(|e| format!(",\n    {} {}", column(e.code), sql_type(&e.kind)))
            .collect::<String>()
    };

    let mut sql = format!(
        "CREATE TABLE cases (\n    case_id VARCHAR PRIMARY KEY{}\n);\n\
         CREATE TABLE holdings (\n    case_id VARCHAR NOT NULL REFERENCES cases (case_id),\n    \
         holding_index INTEGER NOT NULL{},\n    PRIMARY KEY (case_id, holding_index)\n);\n",
        scalar_columns(Scope::Case),
        scalar_columns(Scope::Holding),
    );

    for entry in registry.entries(Scope::Case).filter(|e| is_list(e)) {
        sql.push_str(&format!(
            "CREATE TABLE {} (\n    case_id VARCHAR NOT NULL REFERENCES cases (case_id),\n    \
             position INTEGER NOT NULL,\n    value VARCHAR NOT NULL,\n    \
             PRIMARY KEY (case_id, position)\n);\n",
            junction_table(Scope::Case, entry.code)
        ));
    }
    for entry in registry.entries(Scope::Holding).filter(|e| is_list(e)) {
        sql.push_str(&format!(
            "CREATE TABLE {} (\n    case_id VARCHAR NOT NULL,\n    holding_index INTEGER NOT NULL,\n    \
             position INTEGER NOT NULL,\n    value VARCHAR NOT NULL,\n    \
             PRIMARY KEY (case_id, holding_index, position),\n    \
             FOREIGN KEY (case_id, holding_index) REFERENCES holdings (case_id, holding_index)\n);\n",
            junction_table(Scope::Holding, entry.code)
        ));
    }

    sql.push_str(
        "CREATE TABLE diagnostics (\n    file_name VARCHAR NOT NULL,\n    seq INTEGER NOT NULL,\n    \
         kind VARCHAR NOT NULL,\n    message VARCHAR NOT NULL,\n    PRIMARY KEY (file_name, seq)\n);\n",
    );
    sql.push_str(&flat_view_sql(registry));
    sql
}

fn flat_view_sql(registry: &SchemaRegistry) -> String {
    let mut select = vec!["h.case_id".to_string(), "h.holding_index".to_string()];
    for entry in registry.entries(Scope::Case) {
        let col = column(entry.code);
        if is_list(entry) {
            select.push(format!(
                "(SELECT string_agg(j.value, '; ' ORDER BY j.position) FROM {} j \
                 WHERE j.case_id = h.case_id) AS {col}",
                junction_table(Scope::Case, entry.code)
            ));
        } else {
            select.push(format!("c.{col}"));
        }
    }
    for entry in registry.entries(Scope::Holding) {
        let col = column(entry.code);
        if is_list(entry) {
            select.push(format!(
                "(SELECT string_agg(j.value, '; ' ORDER BY j.position) FROM {} j \
                 WHERE j.case_id = h.case_id AND j.holding_index = h.holding_index) AS {col}",
                junction_table(Scope::Holding, entry.code)
            ));
        } else {
            select.push(format!("h.{col}"));
        }
    }
    format!(
        "CREATE VIEW holdings_flat AS\nSELECT\n    {}\nFROM holdings h\nJOIN cases c ON c.case_id = h.case_id;\n",
        select.join(",\n    ")
    )
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open or create a persistent DuckDB database at the given path.
    ///
    /// Use [`has_tables`](Self::has_tables) to check whether a corpus has
    /// been written to it before.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Check whether the `cases` and `holdings` tables exist.
    pub fn has_tables(&self) -> bool {
        self.case_count().is_ok() && self.holding_count().is_ok()
    }

    /// Replace the whole store with `cases` and the diagnostics of `report`.
    ///
    /// Every case is checked against the registry before anything is
    /// touched. Drop, recreate and insert all run in one transaction, so a
    /// failure leaves the previous contents in place.
    pub fn write_corpus(
        &mut self,
        cases: &[CaseRecord],
        report: &RunReport,
        registry: &SchemaRegistry,
    ) -> Result<(), StoreError> {
        for case in cases {
            case.check(registry)?;
        }

        let stale = self.stale_objects()?;
        let tx = self.conn.transaction()?;
        for (name, is_view) in &stale {
            let kind = if *is_view { "VIEW" } else { "TABLE" };
            debug!(name = %name, kind, "dropping");
            tx.execute_batch(&format!("DROP {kind} IF EXISTS {name};"))?;
        }
        tx.execute_batch(&create_sql(registry))?;

        let case_scalars: Vec<&SchemaEntry> = registry.entries(Scope::Case).filter(|e| !is_list(e)).collect();
        let case_lists: Vec<&SchemaEntry> = registry.entries(Scope::Case).filter(|e| is_list(e)).collect();
        let holding_scalars: Vec<&SchemaEntry> =
            registry.entries(Scope::Holding).filter(|e| !is_list(e)).collect();
        let holding_lists: Vec<&SchemaEntry> = registry.entries(Scope::Holding).filter(|e| is_list(e)).collect();

        {
            let mut insert_case = tx.prepare(&format!(
                "INSERT INTO cases VALUES ({})",
                placeholders(1 + case_scalars.len())
            ))?;
            let mut insert_holding = tx.prepare(&format!(
                "INSERT INTO holdings VALUES ({})",
                placeholders(2 + holding_scalars.len())
            ))?;
            let mut insert_case_lists = case_lists
                .iter()
                .map(|e| tx.prepare(&format!("INSERT INTO {} VALUES (?, ?, ?)", junction_table(Scope::Case, e.code))))
                .collect::<Result<Vec<_>, _>>()?;
            let mut insert_holding_lists = holding_lists
                .iter()
                .map(|e| {
                    tx.prepare(&format!(
                        "INSERT INTO {} VALUES (?, ?, ?, ?)",
                        junction_table(Scope::Holding, e.code)
                    ))
                })
                .collect::<Result<Vec<_>, _>>()?;

            for case in cases {
                let mut row = vec![Value::Text(case.case_id.clone())];
                row.extend(case_scalars.iter().map(|e| {
                    case.fields.get(e.code).map(sql_value).unwrap_or(Value::Null)
                }));
                insert_case.execute(params_from_iter(row))?;

                for (entry, stmt) in case_lists.iter().zip(insert_case_lists.iter_mut()) {
                    for (position, item) in list_items(&case.fields, entry.code).iter().enumerate() {
                        stmt.execute(params_from_iter([
                            Value::Text(case.case_id.clone()),
                            Value::BigInt(position as i64 + 1),
                            Value::Text(item.clone()),
                        ]))?;
                    }
                }

                for holding in &case.holdings {
                    let index = Value::BigInt(i64::from(holding.holding_index));
                    let mut row = vec![Value::Text(case.case_id.clone()), index.clone()];
                    row.extend(holding_scalars.iter().map(|e| {
                        holding.fields.get(e.code).map(sql_value).unwrap_or(Value::Null)
                    }));
                    insert_holding.execute(params_from_iter(row))?;

                    for (entry, stmt) in holding_lists.iter().zip(insert_holding_lists.iter_mut()) {
                        for (position, item) in list_items(&holding.fields, entry.code).iter().enumerate() {
                            stmt.execute(params_from_iter([
                                Value::Text(case.case_id.clone()),
                                index.clone(),
                                Value::BigInt(position as i64 + 1),
                                Value::Text(item.clone()),
                            ]))?;
                        }
                    }
                }
            }

            let mut insert_diagnostic = tx.prepare("INSERT INTO diagnostics VALUES (?, ?, ?, ?)")?;
            for (file_name, diagnostics) in &report.diagnostics_by_file {
                for (seq, diagnostic) in diagnostics.iter().enumerate() {
                    insert_diagnostic.execute(params_from_iter([
                        Value::Text(file_name.clone()),
                        Value::BigInt(seq as i64 + 1),
                        Value::Text(diagnostic.kind.tag().to_string()),
                        Value::Text(diagnostic.message.clone()),
                    ]))?;
                }
            }
        }
        tx.commit()?;

        info!(
            cases = self.case_count()?,
            holdings = self.holding_count()?,
            diagnostics = self.diagnostic_count()?,
            "wrote relational store"
        );
        Ok(())
    }

    /// Tables and views owned by the store, in drop order (dependents first).
    ///
    /// Junction tables are found by name prefix so that tables left by an
    /// earlier registry are dropped too.
    fn stale_objects(&self) -> Result<Vec<(String, bool)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name, table_type = 'VIEW' FROM information_schema.tables \
             WHERE table_schema = 'main' ORDER BY table_name",
        )?;
        let existing = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let rank = |name: &str| match name {
            "holdings_flat" => Some(0),
            n if n.starts_with("case_") || n.starts_with("holding_") => Some(1),
            "holdings" => Some(2),
            "cases" => Some(3),
            "diagnostics" => Some(4),
            _ => None,
        };
        let mut owned: Vec<(u8, String, bool)> = existing
            .into_iter()
            .filter_map(|(name, is_view)| rank(&name).map(|r| (r, name, is_view)))
            .collect();
        owned.sort();
        Ok(owned.into_iter().map(|(_, name, is_view)| (name, is_view)).collect())
    }

    // ── Counts ──

    /// Number of rows in the `cases` table.
    pub fn case_count(&self) -> Result<usize, StoreError> {
        self.count_table("cases")
    }

    /// Number of rows in the `holdings` table.
    pub fn holding_count(&self) -> Result<usize, StoreError> {
        self.count_table("holdings")
    }

    /// Number of rows in the `diagnostics` table.
    pub fn diagnostic_count(&self) -> Result<usize, StoreError> {
        self.count_table("diagnostics")
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let mut stmt = self.conn.prepare(&sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    // ── Lookups ──

    /// Elements of a list field in stored order.
    ///
    /// `holding_index` selects a holding-level field; `None` a case-level one.
    pub fn list_values(
        &self,
        case_id: &str,
        holding_index: Option<u32>,
        code: &str,
        registry: &SchemaRegistry,
    ) -> Result<Vec<String>, StoreError> {
        let scope = if holding_index.is_some() { Scope::Holding } else { Scope::Case };
        let entry = registry
            .lookup(scope, code)
            .filter(|e| is_list(e))
            .ok_or_else(|| StoreError::Other(format!("{code} is not a {scope} list field")))?;
        let table = junction_table(scope, entry.code);
        let values = match holding_index {
            Some(index) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT value FROM {table} WHERE case_id = ? AND holding_index = ? ORDER BY position"
                ))?;
                stmt.query_map(
                    params_from_iter([Value::Text(case_id.to_string()), Value::BigInt(i64::from(index))]),
                    |row| row.get::<_, String>(0),
                )?
                .collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("SELECT value FROM {table} WHERE case_id = ? ORDER BY position"))?;
                stmt.query_map([case_id], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(values)
    }

    // ── Escape hatch ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, BooleanArray, Int64Array, StringArray};
    use curia_core::{Diagnostic, DiagnosticKind, parse_document};
    use tempfile::TempDir;

    const SCHREMS: &str = "\
A1: PRO_DATA_SUBJECT
A2: 2020-07-16
A3: GRAND_CHAMBER
A6: yes
A8: Art 45; Art 46; Art 58(2)(f)
holding section 1
B1: The Privacy Shield decision is invalid
B2: Art 45(1)
B3: TELEOLOGICAL
B6: PRO_DATA_SUBJECT
B8: 4
holding section 2
B1: SCCs remain valid subject to supervisory oversight
B2: Art 46(2)(c); Art 58(2)(f)
B3: SYSTEMATIC
B6: MIXED
B7: maybe
";

    const PLANET49: &str = "\
A1: PRO_DATA_SUBJECT
A2: 2019-10-01
A3: GRAND_CHAMBER
A8: Art 4(11); Art 6(1)(a)
holding section 1
B1: Pre-ticked boxes are not valid consent
B2: Art 4(11)
B3: SEMANTIC
B6: PRO_DATA_SUBJECT
";

    fn corpus() -> (Vec<CaseRecord>, RunReport) {
        let registry = SchemaRegistry::gdpr();
        let cases = vec![
            parse_document("C-311-18", SCHREMS, &registry).unwrap(),
            parse_document("C-673-17", PLANET49, &registry).unwrap(),
        ];
        let mut report = RunReport {
            total_files: 2,
            successful: 1,
            successful_with_warnings: 1,
            ..Default::default()
        };
        report
            .diagnostics_by_file
            .insert("C-311-18_coded.md".into(), cases[0].diagnostics.clone());
        (cases, report)
    }

    fn loaded() -> DuckStore {
        let (cases, report) = corpus();
        let mut store = DuckStore::open().unwrap();
        store.write_corpus(&cases, &report, &SchemaRegistry::gdpr()).unwrap();
        store
    }

    #[test]
    fn open_in_memory() {
        let store = DuckStore::open().unwrap();
        let batches = store.query_arrow("SELECT 1 AS x").unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 1);
        assert!(!store.has_tables());
    }

    #[test]
    fn counts_after_write() {
        let store = loaded();
        assert!(store.has_tables());
        assert_eq!(store.case_count().unwrap(), 2);
        assert_eq!(store.holding_count().unwrap(), 3);
        assert_eq!(store.diagnostic_count().unwrap(), 1);
    }

    #[test]
    fn scalar_columns_are_typed() {
        let store = loaded();
        let batches = store
            .query_arrow("SELECT a6, b7, b8 FROM holdings JOIN cases USING (case_id) WHERE case_id = 'C-311/18' ORDER BY holding_index")
            .unwrap();
        let batch = &batches[0];
        let a6 = batch.column(0).as_any().downcast_ref::<BooleanArray>().unwrap();
        assert!(a6.value(0));
        let b7 = batch.column(1).as_any().downcast_ref::<BooleanArray>().unwrap();
        assert!(b7.is_null(0));
        assert!(!b7.value(1));
        let b8 = batch.column(2).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(b8.value(0), 4);
        assert!(b8.is_null(1));
    }

    #[test]
    fn list_fields_go_to_junction_tables() {
        let store = loaded();
        let registry = SchemaRegistry::gdpr();
        assert_eq!(
            store.list_values("C-311/18", None, "A8", &registry).unwrap(),
            ["Art 45", "Art 46", "Art 58(2)(f)"]
        );
        assert_eq!(
            store.list_values("C-311/18", Some(2), "B2", &registry).unwrap(),
            ["Art 46(2)(c)", "Art 58(2)(f)"]
        );
        assert!(store.list_values("C-311/18", None, "A1", &registry).is_err());

        let batches = store
            .query_arrow("SELECT count(*)::BIGINT FROM holding_b2")
            .unwrap();
        let n = batches[0].column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(n.value(0), 4);
    }

    #[test]
    fn flat_view_repeats_case_fields_and_joins_lists() {
        let store = loaded();
        let batches = store
            .query_arrow(
                "SELECT case_id, holding_index, a3, a8, b2 FROM holdings_flat \
                 WHERE case_id = 'C-311/18' ORDER BY holding_index",
            )
            .unwrap();
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);
        let a3 = batch.column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(a3.value(0), "GRAND_CHAMBER");
        assert_eq!(a3.value(1), "GRAND_CHAMBER");
        let a8 = batch.column(3).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(a8.value(1), "Art 45; Art 46; Art 58(2)(f)");
        let b2 = batch.column(4).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(b2.value(1), "Art 46(2)(c); Art 58(2)(f)");
    }

    #[test]
    fn diagnostics_table_keeps_kind_and_message() {
        let store = loaded();
        let batches = store
            .query_arrow("SELECT file_name, kind, message FROM diagnostics ORDER BY seq")
            .unwrap();
        let kind = batches[0].column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(kind.value(0), "invalid-boolean");
        let message = batches[0].column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert!(message.value(0).contains("maybe"));
    }

    #[test]
    fn rewrite_replaces_everything() {
        let registry = SchemaRegistry::gdpr();
        let (cases, report) = corpus();
        let mut store = DuckStore::open().unwrap();
        store.write_corpus(&cases, &report, &registry).unwrap();
        store.write_corpus(&cases, &report, &registry).unwrap();
        assert_eq!(store.case_count().unwrap(), 2);
        assert_eq!(store.holding_count().unwrap(), 3);

        store.write_corpus(&cases[1..], &RunReport::default(), &registry).unwrap();
        assert_eq!(store.case_count().unwrap(), 1);
        assert_eq!(store.holding_count().unwrap(), 1);
        assert_eq!(store.diagnostic_count().unwrap(), 0);
    }

    #[test]
    fn mismatched_record_is_rejected_and_store_untouched() {
        let registry = SchemaRegistry::gdpr();
        let (mut cases, report) = corpus();
        let mut store = DuckStore::open().unwrap();
        store.write_corpus(&cases, &report, &registry).unwrap();

        cases[0].holdings[0].fields = cases[0].fields.clone();
        let result = store.write_corpus(&cases, &report, &registry);
        assert!(matches!(result, Err(StoreError::Record(_))));
        assert_eq!(store.case_count().unwrap(), 2);
    }

    #[test]
    fn persistent_store_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("curia.duckdb");
        let (cases, report) = corpus();
        {
            let mut store = DuckStore::open_persistent(&path).unwrap();
            assert!(!store.has_tables());
            store.write_corpus(&cases, &report, &SchemaRegistry::gdpr()).unwrap();
        }
        let store = DuckStore::open_persistent(&path).unwrap();
        assert!(store.has_tables());
        assert_eq!(store.holding_count().unwrap(), 3);
    }

    #[test]
    fn diagnostics_from_report_not_from_cases() {
        let registry = SchemaRegistry::gdpr();
        let (cases, _) = corpus();
        let mut report = RunReport::default();
        report.diagnostics_by_file.insert(
            "C-9-21_coded.md".into(),
            vec![
                Diagnostic::new(DiagnosticKind::Io, "cannot read C-9-21_coded.md"),
                Diagnostic::new(DiagnosticKind::NoHoldings, "no holding sections found"),
            ],
        );
        let mut store = DuckStore::open().unwrap();
        store.write_corpus(&cases, &report, &registry).unwrap();
        assert_eq!(store.diagnostic_count().unwrap(), 2);
    }
}
