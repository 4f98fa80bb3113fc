//! mql — the MQL CLI
//!
//! Compiles MQL queries against a catalog snapshot and prints the generated
//! SQL, the bound AST, or the regenerated canonical MQL.
//!
//! # Usage
//!
//! ```bash
//! # Compile a query to PostgreSQL SQL
//! mql --catalog project.json "SELECT Name WHERE Status = 'Open'"
//!
//! # MySQL dialect, with numeric result casts
//! mql --catalog project.json --dialect mysql --cast-numeric "SELECT SUM(Size)"
//!
//! # Dump the bound AST as JSON
//! mql --catalog project.json --format ast "Type = Story"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::*;
use mql::prelude::*;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mql")]
#[command(version)]
#[command(about = "Card query language compiler", long_about = None)]
#[command(after_help = "EXAMPLES:
    mql --catalog project.json \"SELECT Name, SUM(Size) GROUP BY Status\"
    mql --catalog project.json --dialect mysql \"TAGGED WITH 'urgent'\"
    mql --catalog project.json --format mql \"iteration > 2.0\"")]
struct Cli {
    /// The MQL query to compile
    query: String,

    /// Path to the catalog snapshot (JSON)
    #[arg(short, long, env = "MQL_CATALOG")]
    catalog: String,

    /// Target SQL dialect
    #[arg(short, long, value_enum, default_value = "postgres")]
    dialect: DialectArg,

    /// Output format
    #[arg(short, long, value_enum, default_value = "sql")]
    format: OutputFormat,

    /// Cast numeric result columns to decimal
    #[arg(long)]
    cast_numeric: bool,

    /// Acting user login for CURRENT USER comparisons
    #[arg(long)]
    acting_user: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Postgres,
    Mysql,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Sql,
    Ast,
    Mql,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let raw = std::fs::read_to_string(&cli.catalog)
        .with_context(|| format!("reading catalog file '{}'", cli.catalog))?;
    let catalog: PropertyCatalog =
        serde_json::from_str(&raw).context("parsing catalog snapshot")?;

    let alerts = std::cell::RefCell::new(Vec::new());
    let sink = |message: &str| alerts.borrow_mut().push(message.to_string());
    let options = ParseOptions {
        content_provider: ContentProvider::None,
        alert_sink: Some(&sink),
    };

    let query = CardQuery::parse(&cli.query, Arc::new(catalog), options)?;

    for alert in alerts.borrow().iter() {
        eprintln!("{} {alert}", "Note:".yellow().bold());
    }

    match cli.format {
        OutputFormat::Sql => {
            let dialect = match cli.dialect {
                DialectArg::Postgres => Dialect::Postgres,
                DialectArg::Mysql => Dialect::Mysql,
            };
            let mut params = CompileParams::new(dialect, chrono::Local::now().naive_local());
            if let Some(user) = &cli.acting_user {
                params = params.with_acting_user(user.clone());
            }
            if cli.cast_numeric {
                params = params.with_numeric_casts();
            }
            println!("{}", query.to_sql(&params)?);
        }
        OutputFormat::Ast => {
            println!("{}", serde_json::to_string_pretty(query.ast())?);
        }
        OutputFormat::Mql => {
            println!("{query}");
        }
    }
    Ok(())
}
