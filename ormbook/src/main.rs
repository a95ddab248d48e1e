//! The `ormbook` command-line tool.
//!
//! Lists the patterns, runs them against a SQLite database, or prints the SQL
//! a pattern would issue. Results are written to stdout as JSON; logs go to
//! stderr.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ormbook::catalog::{self, PatternCatalog};
use ormbook::{dry_run, fixtures, schema, User};
use ormbook_core::logging::setup_logging;
use ormbook_core::{settings_loader, Settings};
use ormbook_db_backends::{DatabaseConfig, SqliteBackend};
use serde_json::json;

#[derive(Parser)]
#[command(name = "ormbook")]
#[command(about = "Runs annotated ORM query patterns against SQLite")]
#[command(version)]
struct Cli {
    /// TOML settings file (ORMBOOK_* environment variables still apply)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// SQLite database file, or :memory:
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every pattern with its number and description
    List,

    /// Run one pattern, or all of them in order
    Run {
        /// A pattern number (1-20) or "all"
        #[arg(default_value = "all")]
        target: Target,

        /// Print the SQL each pattern issues next to its result
        #[arg(long)]
        show_sql: bool,
    },

    /// Print the SQL a pattern issues without touching the database
    Sql {
        /// A pattern number (1-20)
        number: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    All,
    One(u8),
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let number: u8 = s
            .parse()
            .map_err(|_| format!("expected a pattern number or \"all\", got '{s}'"))?;
        if PatternCatalog::get(number).is_none() {
            return Err(format!("no pattern numbered {number}"));
        }
        Ok(Self::One(number))
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.settings {
        Some(path) => settings_loader::from_toml_file_with_env(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => settings_loader::from_env(),
    };
    if let Some(name) = &cli.database {
        settings.database.name.clone_from(name);
    }
    if let Commands::Run { show_sql: true, .. } = cli.command {
        settings.show_sql = true;
    }
    settings_loader::validate(&settings)?;
    Ok(settings)
}

async fn open_database(settings: &Settings) -> anyhow::Result<SqliteBackend> {
    let config = DatabaseConfig::from_settings(settings)?;
    let backend = SqliteBackend::from_config(&config)
        .with_context(|| format!("opening database '{}'", settings.database.name))?;
    schema::migrate(&backend).await?;
    if settings.seed_fixtures && User::objects().all().count_exec(&backend).await? == 0 {
        fixtures::seed(&backend).await?;
    }
    Ok(backend)
}

async fn run_one(
    number: u8,
    backend: &SqliteBackend,
    settings: &Settings,
) -> anyhow::Result<serde_json::Value> {
    let info = PatternCatalog::get(number).context("unknown pattern")?;
    let mut entry = json!({ "number": info.number, "title": info.title });
    if settings.show_sql {
        entry["sql"] = serde_json::to_value(dry_run::capture_sql(number, settings).await?)?;
    }
    entry["result"] = catalog::run(number, backend, settings).await?;
    Ok(entry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    setup_logging(&settings);

    let output = match cli.command {
        Commands::List => serde_json::to_value(PatternCatalog::all())?,
        Commands::Sql { number } => {
            serde_json::to_value(dry_run::capture_sql(number, &settings).await?)?
        }
        Commands::Run { target, .. } => {
            let backend = open_database(&settings).await?;
            match target {
                Target::One(number) => run_one(number, &backend, &settings).await?,
                Target::All => {
                    let mut results = Vec::new();
                    for number in PatternCatalog::numbers() {
                        results.push(run_one(number, &backend, &settings).await?);
                    }
                    serde_json::Value::Array(results)
                }
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
