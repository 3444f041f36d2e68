mod display;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use curia_core::{Aggregator, CODED_SUFFIX, SchemaRegistry, read_document};
use curia_store::DuckStore;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "curia")]
#[command(about = "Parse coded CJEU GDPR judgments into a validated corpus")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse every coded file in a directory and write all corpus artifacts
    Build {
        /// Directory holding the coded files
        #[arg(env = "CURIA_INPUT_DIR")]
        input: PathBuf,

        /// Directory for corpus.json, report.json and the holdings exports
        #[arg(short, long, env = "CURIA_OUTPUT_DIR", default_value = "out")]
        out: PathBuf,

        /// DuckDB file (default: <out>/curia.duckdb)
        #[arg(long, env = "CURIA_DB")]
        db: Option<PathBuf>,

        /// File name suffix that marks a coded file
        #[arg(long, env = "CURIA_SUFFIX", default_value = CODED_SUFFIX)]
        suffix: String,

        /// Parse files one at a time instead of in parallel
        #[arg(long)]
        serial: bool,
    },

    /// Parse a single coded file and print the record
    Check {
        file: PathBuf,

        /// File name suffix stripped to obtain the case slug
        #[arg(long, env = "CURIA_SUFFIX", default_value = CODED_SUFFIX)]
        suffix: String,

        /// Print the record as corpus JSON instead of a card
        #[arg(long)]
        json: bool,
    },

    /// List the registered questions by scope
    Schema,

    /// Run SQL against the relational store
    Query {
        /// DuckDB file written by `curia build`
        #[arg(long, env = "CURIA_DB")]
        db: PathBuf,

        sql: String,
    },
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let registry = SchemaRegistry::gdpr();

    match cli.command {
        Command::Build {
            input,
            out,
            db,
            suffix,
            serial,
        } => {
            let db = db.unwrap_or_else(|| out.join("curia.duckdb"));
            build(&registry, &input, &out, &db, &suffix, serial)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { file, suffix, json } => check(&registry, &file, &suffix, json),
        Command::Schema => {
            display::print_schema(&registry);
            Ok(ExitCode::SUCCESS)
        }
        Command::Query { db, sql } => {
            let store = DuckStore::open_persistent(&db)
                .with_context(|| format!("opening {}", db.display()))?;
            if !store.has_tables() {
                bail!("{} holds no corpus; run `curia build` first", db.display());
            }
            let batches = store.query_arrow(&sql).context("running query")?;
            arrow::util::pretty::print_batches(&batches)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build(
    registry: &SchemaRegistry,
    input: &Path,
    out: &Path,
    db: &Path,
    suffix: &str,
    serial: bool,
) -> anyhow::Result<()> {
    info!("curia v{}", env!("CARGO_PKG_VERSION"));

    let mut aggregator = Aggregator::new(registry).with_suffix(suffix);
    if serial {
        aggregator = aggregator.serial();
    }
    let corpus = aggregator
        .run(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let report = corpus.report();

    curia_store::write_corpus(&out.join("corpus.json"), &corpus.cases, registry)
        .context("writing corpus.json")?;
    curia_store::write_report(&out.join("report.json"), &report).context("writing report.json")?;
    curia_store::write_holdings_csv(&out.join("holdings.csv"), &corpus.cases, registry)
        .context("writing holdings.csv")?;
    curia_store::write_holdings_parquet(&out.join("holdings.parquet"), &corpus.cases, registry)
        .context("writing holdings.parquet")?;

    if let Some(parent) = db.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut store =
        DuckStore::open_persistent(db).with_context(|| format!("opening {}", db.display()))?;
    store
        .write_corpus(&corpus.cases, &report, registry)
        .context("writing relational store")?;

    display::print_report(&report, corpus.cases.len(), corpus.holding_count());
    Ok(())
}

fn check(registry: &SchemaRegistry, file: &Path, suffix: &str, json: bool) -> anyhow::Result<ExitCode> {
    match read_document(file, suffix, registry) {
        Ok(case) => {
            if json {
                let text = curia_store::corpus_to_string(std::slice::from_ref(&case), registry)?;
                print!("{text}");
            } else {
                display::print_case_card(&case, registry);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(file = %file.display(), "document failed");
            println!("{}", e.to_diagnostic());
            Ok(ExitCode::FAILURE)
        }
    }
}
