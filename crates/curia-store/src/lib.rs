//! Storage layer: JSON corpus and report, flat CSV/Parquet exports, DuckDB (relational).

mod error;
pub use error::StoreError;

pub mod export;
pub mod json;

pub use export::{read_holdings_csv, write_holdings_csv};
#[cfg(feature = "parquet")]
pub use export::{read_parquet, write_holdings_parquet};
pub use json::{corpus_from_str, corpus_to_string, read_corpus, read_report, write_corpus, write_report};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
