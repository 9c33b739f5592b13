//! Command-line front-end for SchemaStudio.
//!
//! Every subcommand prints its result as JSON on stdout; logs go to stderr.
//!
//! # Security Guarantees
//! - Connection strings are only ever logged redacted
//! - DDL identifiers are validated before anything is sent
//! - Query values travel as bind parameters

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use schemastudio_core::adapters::postgres::{
    render_add_column, render_alter_column, render_create_table,
};
use schemastudio_core::config::{
    ConnectionResolver, EnvSettings, LayeredSettings, PRIMARY_SETTING, TableListOptions,
};
use schemastudio_core::logging::init_logging;
use schemastudio_core::models::{
    AddColumnRequest, AlterColumnRequest, CreateTableRequest, SelectQueryRequest, parse_request,
    to_pretty_json,
};
use schemastudio_core::{SchemaStudio, create_studio};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "schemastudio")]
#[command(about = "PostgreSQL schema introspection, guarded DDL and paginated queries")]
#[command(version)]
#[command(long_about = "
SchemaStudio - inspect and evolve a live PostgreSQL schema

CONNECTION:
  The connection string is taken from, in order:
    --database-url
    SCHEMASTUDIO_DATABASE_URL
    DATABASE_URL

REQUEST FILES:
  create-table, add-column and alter-column read a JSON request from a file,
  or from stdin when the path is '-'.

EXAMPLES:
  schemastudio tables public --exact-counts
  schemastudio columns farm lots
  schemastudio create-table lots.json --dry-run
  schemastudio query --sql 'select * from farm.lots where area_ha > $1' --param 1=2.5 --limit 20
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Database connection URL
    #[arg(
        long,
        global = true,
        help = "Database connection string (credentials will be sanitized in logs)"
    )]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Test the database connection
    Ping,
    /// List non-system schemas
    Schemas,
    /// List the tables and views of a schema
    Tables(TablesArgs),
    /// List the columns of a table
    Columns(ColumnsArgs),
    /// Create a table from a JSON request
    CreateTable(RequestArgs),
    /// Add a column from a JSON request
    AddColumn(RequestArgs),
    /// Alter a column from a JSON request
    AlterColumn(RequestArgs),
    /// Run one page of a parameterized read query
    Query(QueryArgs),
}

#[derive(Args)]
pub struct TablesArgs {
    /// Schema name
    pub schema: String,

    /// Replace planner estimates with live counts
    #[arg(long, help = "Run count(*) per table instead of using planner estimates")]
    pub exact_counts: bool,
}

#[derive(Args)]
pub struct ColumnsArgs {
    /// Schema name
    pub schema: String,
    /// Table name
    pub table: String,
}

#[derive(Args)]
pub struct RequestArgs {
    /// Request file, or '-' for stdin
    pub input: PathBuf,

    /// Print the statement without executing it
    #[arg(long, help = "Render the DDL statement and exit without executing it")]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct QueryArgs {
    /// SQL text
    #[arg(long)]
    pub sql: String,

    /// Positional parameter as N=<json>; non-JSON values bind as text
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, JsonValue)>,

    /// Page size
    #[arg(long, default_value_t = 100)]
    pub limit: i64,

    /// Rows to skip
    #[arg(long, default_value_t = 0)]
    pub offset: i64,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all logs except errors")]
    pub quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    if let Some(rendered) = dry_run(&cli.command)? {
        return print_json(&json!({ "statement": rendered }));
    }

    let resolved = ConnectionResolver::default()
        .resolve(&settings(cli.database_url.as_deref()), None)
        .map_err(|e| {
            error!("{}", e);
            e
        })?;
    info!("Target: {}", resolved.redacted());

    let studio = create_studio(&resolved)?;
    run(studio.as_ref(), &cli.command).await
}

/// Flags sit above the environment.
fn settings(database_url: Option<&str>) -> LayeredSettings {
    let mut flags = HashMap::new();
    if let Some(url) = database_url {
        flags.insert(PRIMARY_SETTING.to_string(), url.to_string());
    }
    LayeredSettings::new()
        .with_layer(flags)
        .with_layer(EnvSettings)
}

/// Renders the DDL for a `--dry-run` request; `None` for everything else.
fn dry_run(command: &Command) -> Result<Option<String>> {
    let rendered = match command {
        Command::CreateTable(args) if args.dry_run => {
            render_create_table(&read_request::<CreateTableRequest>(&args.input)?)?
        }
        Command::AddColumn(args) if args.dry_run => {
            render_add_column(&read_request::<AddColumnRequest>(&args.input)?)?
        }
        Command::AlterColumn(args) if args.dry_run => {
            render_alter_column(&read_request::<AlterColumnRequest>(&args.input)?)?
        }
        _ => return Ok(None),
    };
    Ok(Some(rendered))
}

async fn run(studio: &dyn SchemaStudio, command: &Command) -> Result<()> {
    match command {
        Command::Ping => {
            studio.test_connection().await?;
            info!("Connection test successful");
            print_json(&json!({ "connected": true }))
        }
        Command::Schemas => print_json(&studio.list_schemas().await?),
        Command::Tables(args) => {
            let options = TableListOptions::default().with_exact_row_counts(args.exact_counts);
            print_json(&studio.list_tables_with(&args.schema, options).await?)
        }
        Command::Columns(args) => {
            print_json(&studio.list_columns(&args.schema, &args.table).await?)
        }
        Command::CreateTable(args) => {
            let request: CreateTableRequest = read_request(&args.input)?;
            studio.create_table(&request).await?;
            print_json(&json!({ "created": format!("{}.{}", request.schema, request.table) }))
        }
        Command::AddColumn(args) => {
            let request: AddColumnRequest = read_request(&args.input)?;
            studio.add_column(&request).await?;
            print_json(&json!({ "added": request.column.name }))
        }
        Command::AlterColumn(args) => {
            let request: AlterColumnRequest = read_request(&args.input)?;
            studio.alter_column(&request).await?;
            print_json(&json!({ "altered": request.column }))
        }
        Command::Query(args) => {
            let page = studio.run_select(&query_request(args)).await?;
            print_json(&page)
        }
    }
}

fn query_request(args: &QueryArgs) -> SelectQueryRequest {
    args.params.iter().fold(
        SelectQueryRequest::new(args.sql.clone())
            .with_limit(args.limit)
            .with_offset(args.offset),
        |request, (name, value)| request.with_param(name.clone(), value.clone()),
    )
}

/// Parses `N=<value>`. The value is read as JSON when it parses, otherwise
/// it is taken as a plain string.
fn parse_param(raw: &str) -> std::result::Result<(String, JsonValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected N=<value>, got '{}'", raw))?;
    if name.trim().is_empty() {
        return Err(format!("missing parameter position in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}

fn read_request<T: DeserializeOwned>(input: &Path) -> Result<T> {
    let text = if input == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read request from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read request file {}", input.display()))?
    };
    Ok(parse_request(&text, &input.display().to_string())?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", to_pretty_json(value)?);
    Ok(())
}
