//! Arrow form of the flattened holdings table.
//!
//! One row per holding: `case_id`, `holding_index`, every case-level field
//! (repeated on each of the case's holdings), then every holding-level field.
//! Columns are named by code. Integer fields are `Int64`, boolean fields
//! `Boolean`, everything else `Utf8` with lists joined by `"; "`.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Int64Builder, StringBuilder, UInt32Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::record::{CaseRecord, FieldMap, FieldValue};
use crate::schema::{SchemaEntry, SchemaRegistry, Scope, ValueKind};

fn column_type(kind: &ValueKind) -> DataType {
    match kind {
        ValueKind::Integer => DataType::Int64,
        ValueKind::Boolean => DataType::Boolean,
        ValueKind::Text | ValueKind::Enumerated(_) | ValueKind::List => DataType::Utf8,
    }
}

/// Schema of the flattened holdings table.
pub fn holdings_table_schema(registry: &SchemaRegistry) -> Schema {
    let mut fields = vec![
        Field::new("case_id", DataType::Utf8, false),
        Field::new("holding_index", DataType::UInt32, false),
    ];
    fields.extend(
        registry
            .entries(Scope::Case)
            .chain(registry.entries(Scope::Holding))
            .map(|e| Field::new(e.code, column_type(&e.kind), true)),
    );
    Schema::new(fields)
}

enum ColumnBuilder {
    Utf8(StringBuilder),
    Int64(Int64Builder),
    Boolean(BooleanBuilder),
}

impl ColumnBuilder {
    fn for_kind(kind: &ValueKind) -> Self {
        match column_type(kind) {
            DataType::Int64 => ColumnBuilder::Int64(Int64Builder::new()),
            DataType::Boolean => ColumnBuilder::Boolean(BooleanBuilder::new()),
            _ => ColumnBuilder::Utf8(StringBuilder::new()),
        }
    }

    fn append(&mut self, entry: &SchemaEntry, value: Option<&FieldValue>) -> Result<(), ArrowError> {
        let missing = FieldValue::Missing;
        let value = value.unwrap_or(&missing);
        if !value.fits(&entry.kind) {
            return Err(ArrowError::InvalidArgumentError(format!(
                "field {} holds a value that is not a coerced {} value",
                entry.code,
                entry.kind.name()
            )));
        }
        match (self, value) {
            (ColumnBuilder::Int64(b), FieldValue::Integer(i)) => b.append_value(*i),
            (ColumnBuilder::Int64(b), _) => b.append_null(),
            (ColumnBuilder::Boolean(b), FieldValue::Boolean(v)) => b.append_value(*v),
            (ColumnBuilder::Boolean(b), _) => b.append_null(),
            (ColumnBuilder::Utf8(b), v) => b.append_option(v.to_cell()),
        }
        Ok(())
    }

    fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::Utf8(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Boolean(mut b) => Arc::new(b.finish()),
        }
    }
}

fn append_fields(
    builders: &mut [ColumnBuilder],
    entries: &[&SchemaEntry],
    fields: &FieldMap,
) -> Result<(), ArrowError> {
    for (builder, entry) in builders.iter_mut().zip(entries) {
        builder.append(entry, fields.get(entry.code))?;
    }
    Ok(())
}

/// Flatten cases into one record batch, one row per holding.
///
/// Fails if any value does not fit its registry kind.
pub fn holdings_batch(cases: &[CaseRecord], registry: &SchemaRegistry) -> Result<RecordBatch, ArrowError> {
    let case_entries: Vec<&SchemaEntry> = registry.entries(Scope::Case).collect();
    let holding_entries: Vec<&SchemaEntry> = registry.entries(Scope::Holding).collect();

    let mut case_ids = StringBuilder::new();
    let mut indices = UInt32Builder::new();
    let mut case_cols: Vec<ColumnBuilder> = case_entries
        .iter()
        .map(|e| ColumnBuilder::for_kind(&e.kind))
        .collect();
    let mut holding_cols: Vec<ColumnBuilder> = holding_entries
        .iter()
        .map(|e| ColumnBuilder::for_kind(&e.kind))
        .collect();

    for case in cases {
        for holding in &case.holdings {
            case_ids.append_value(&case.case_id);
            indices.append_value(holding.holding_index);
            append_fields(&mut case_cols, &case_entries, &case.fields)?;
            append_fields(&mut holding_cols, &holding_entries, &holding.fields)?;
        }
    }

    let mut columns: Vec<ArrayRef> = vec![Arc::new(case_ids.finish()), Arc::new(indices.finish())];
    columns.extend(case_cols.into_iter().map(ColumnBuilder::finish));
    columns.extend(holding_cols.into_iter().map(ColumnBuilder::finish));

    RecordBatch::try_new(Arc::new(holdings_table_schema(registry)), columns)
}
