//! Flat holdings exports (CSV, Parquet).
//!
//! Both files carry the same table: one row per holding, case-level fields
//! repeated on every holding row. See [`curia_core::table`].

use std::fs::File;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use curia_core::table::holdings_batch;
use curia_core::{CaseRecord, SchemaRegistry};
use tracing::info;

use crate::StoreError;

/// Write the flat holdings table as CSV with a header row.
///
/// Missing values are empty cells; list fields are joined with `"; "`.
pub fn write_holdings_csv(path: &Path, cases: &[CaseRecord], registry: &SchemaRegistry) -> Result<usize, StoreError> {
    let batch = holdings_batch(cases, registry)?;
    let mut buf = Vec::new();
    {
        let mut writer = arrow::csv::WriterBuilder::new()
            .with_header(true)
            .build(&mut buf);
        writer.write(&batch)?;
    }
    crate::json::write_atomic(path, &buf)?;
    let rows = batch.num_rows();
    info!(path = %path.display(), rows, "wrote holdings CSV");
    Ok(rows)
}

/// Write the flat holdings table as Parquet.
#[cfg(feature = "parquet")]
pub fn write_holdings_parquet(path: &Path, cases: &[CaseRecord], registry: &SchemaRegistry) -> Result<usize, StoreError> {
    use parquet::arrow::ArrowWriter;

    let batch = holdings_batch(cases, registry)?;
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    crate::json::write_atomic(path, &buf)?;
    let rows = batch.num_rows();
    info!(path = %path.display(), rows, "wrote holdings Parquet");
    Ok(rows)
}

/// Read a Parquet file into Arrow RecordBatches.
#[cfg(feature = "parquet")]
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(batches)
}

/// Read a CSV file written by [`write_holdings_csv`] back into Arrow, typed
/// by the registry's holdings schema.
pub fn read_holdings_csv(path: &Path, registry: &SchemaRegistry) -> Result<Vec<RecordBatch>, StoreError> {
    let schema = std::sync::Arc::new(curia_core::table::holdings_table_schema(registry));
    let file = File::open(path)?;
    let reader = arrow::csv::ReaderBuilder::new(schema)
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(batches)
}
