//! sqlm - query and edit DuckDB-backed models from the command line
//!
//! Models are declared in `sqlm.yaml`; every command prints JSON on stdout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlm_duck::{DataAccessEngine, EngineError};
use sqlm_ir::QueryOptions;

mod commands;
mod config;
mod logging;

use commands::{Catalog, CommandError};
use config::{Config, ConfigError};

const DEFAULT_CONFIG: &str = "sqlm.yaml";

#[derive(Parser)]
#[command(name = "sqlm")]
#[command(author, version, about = "Query and edit DuckDB-backed models", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./sqlm.yaml when present)
    #[arg(long, short, global = true, env = "SQLM_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides the configured store)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables for every configured model
    Init,

    /// Show one record by primary key
    Get { model: String, id: String },

    /// List records using flat filters: field=value, field[op]=value,
    /// order_by=[-]field, limit=n, offset=n
    List {
        model: String,

        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Find records using a JSON query document
    Find {
        model: String,

        /// Query document, e.g. '{"age": {"$gte": 18}}'
        #[arg(long)]
        filter: Option<String>,

        /// Comma-separated fields to return
        #[arg(long, value_delimiter = ',')]
        projection: Vec<String>,

        /// Sort field, '-' prefix for descending
        #[arg(long)]
        sort: Option<String>,

        #[arg(long)]
        limit: Option<u64>,

        #[arg(long)]
        skip: Option<u64>,
    },

    /// Insert a record given as a JSON object
    Create { model: String, body: String },

    /// Update some fields of a record
    Patch { model: String, id: String, body: String },

    /// Replace every non-key field of a record
    Put { model: String, id: String, body: String },

    /// Delete a record
    Delete { model: String, id: String },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(DEFAULT_CONFIG),
        None => Config::from_env(),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = cli.database {
        config.store.path = Some(path);
    }

    logging::init(&config.logging).context("Failed to initialize logging")?;

    let catalog = Catalog::new(config.schemas()?);
    let engine = DataAccessEngine::open(&config.store).context("Failed to open store")?;

    let output = match cli.command {
        Commands::Init => commands::init(&engine, &catalog)?,
        Commands::Get { model, id } => commands::get(&engine, catalog.schema(&model)?, &id)?,
        Commands::List { model, params } => commands::list(&engine, catalog.schema(&model)?, &params)?,
        Commands::Find {
            model,
            filter,
            projection,
            sort,
            limit,
            skip,
        } => {
            let options = QueryOptions { sort, limit, skip };
            commands::find(
                &engine,
                catalog.schema(&model)?,
                filter.as_deref(),
                &projection,
                &options,
            )?
        }
        Commands::Create { model, body } => commands::create(&engine, catalog.schema(&model)?, &body)?,
        Commands::Patch { model, id, body } => {
            commands::patch(&engine, catalog.schema(&model)?, &id, &body)?
        }
        Commands::Put { model, id, body } => commands::put(&engine, catalog.schema(&model)?, &id, &body)?,
        Commands::Delete { model, id } => commands::delete(&engine, catalog.schema(&model)?, &id)?,
    };

    let text = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", text);
    Ok(())
}

/// 2 for problems with the caller's input, 1 for everything else
fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<CommandError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<EngineError>() {
        Some(engine) if engine.is_client_error() => 2,
        _ if err.downcast_ref::<sqlm_ir::SchemaError>().is_some() => 2,
        _ => 1,
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}
