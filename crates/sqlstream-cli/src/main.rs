//! sqlstream command line
//!
//! Compiles JSON query documents to SQL for a configured dialect and runs
//! them against DuckDB.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::json;
use sqlstream_duck::DuckSource;
use sqlstream_engine::{QueryContext, RawRow, RawRowMapper, Table};
use tracing::{debug, info};

mod config;
mod document;
mod logging;

use config::Config;
use document::QueryDocument;

#[derive(Debug, Parser)]
#[command(name = "sqlstream", version, about = "Compile and run stream pipelines as SQL")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short, long, env = "SQLSTREAM_CONFIG", default_value = "sqlstream.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the statements a query document compiles to
    Explain {
        query: PathBuf,
        /// Dialect to compile for, overriding the configuration
        #[arg(long)]
        dialect: Option<String>,
    },
    /// Execute a query document and print rows as JSON lines
    Run { query: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init(&config.logging)?;

    match cli.command {
        Command::Explain { query, dialect } => {
            if let Some(dialect) = dialect {
                config.engine.dialect = dialect;
            }
            explain(&config, &QueryDocument::from_path(&query)?)
        }
        Command::Run { query } => run(&config, &QueryDocument::from_path(&query)?).await,
    }
}

fn open_source(config: &Config) -> Result<Arc<DuckSource>> {
    let source = match &config.database.path {
        Some(path) => DuckSource::open(path)
            .with_context(|| format!("opening {}", path.display()))?,
        None => DuckSource::open_in_memory()?,
    };
    if let Some(script) = &config.database.init_script {
        let sql = std::fs::read_to_string(script)
            .with_context(|| format!("reading {}", script.display()))?;
        source.execute_batch(&sql)?;
        debug!(script = %script.display(), "Ran init script");
    }
    Ok(Arc::new(source))
}

fn table(config: &Config, doc: &QueryDocument) -> Result<Table<RawRow>> {
    let dialect = Arc::new(config.engine.dialect()?);
    let source = open_source(config)?;
    let schema = match doc.inline_schema()? {
        Some(schema) => schema,
        None => source
            .table_schema(&doc.table)
            .with_context(|| format!("resolving columns of {}", doc.table))?,
    };

    let context = QueryContext::for_table(schema, dialect);
    Ok(Table::new(source, context, RawRowMapper).with_config(config.engine.optimizer))
}

fn explain(config: &Config, doc: &QueryDocument) -> Result<()> {
    let table = table(config, doc)?;
    let plan = doc.apply(table.query()).explain()?;
    let output = json!({
        "dialect": table.context().dialect().name(),
        "fingerprint": plan.statement.fingerprint(),
        "plan": plan,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(config: &Config, doc: &QueryDocument) -> Result<()> {
    let table = table(config, doc)?;
    let query = doc.apply(table.query());

    if doc.count {
        let count = query.count()?;
        println!("{}", json!({ "count": count }));
        return Ok(());
    }

    let mut rows = query.stream()?;
    let mut delivered = 0u64;
    while let Some(row) = StreamExt::next(&mut rows).await {
        println!("{}", serde_json::to_string(&row?)?);
        delivered += 1;
    }
    info!(rows = delivered, table = %doc.table, "Query finished");
    Ok(())
}
