//! refit CLI
//!
//! Brings a SQLite database in line with a schema-definition script.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::FmtSubscriber;

use refit::prelude::*;

/// Crash-safe SQLite schema evolution that keeps existing rows.
#[derive(Debug, Parser)]
#[command(name = "refit")]
#[command(author, version, about, long_about = None)]
#[command(after_help = EXIT_CODES)]
struct Cli {
    /// Database file to create or migrate.
    #[arg(env = "REFIT_DATABASE")]
    database: PathBuf,

    /// Schema-definition script (`-` reads stdin).
    #[arg(short, long, env = "REFIT_SCHEMA")]
    schema: PathBuf,

    /// Also write the run log to `<name>.log` next to the database.
    #[arg(long)]
    log: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Fail when a renamed table matches more than one new table.
    #[arg(long)]
    strict_renames: bool,

    /// Fail instead of pairing columns when as many are added as removed.
    #[arg(long)]
    reject_column_pairing: bool,

    /// Build next to the database without replacing it.
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

const EXIT_CODES: &str = "Exit codes:
  0  success
  1  unexpected failure
  2  invalid command line
  3  invalid definition script or database path
  4  schema change that cannot carry the existing rows
  5  database error
  6  filesystem error";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = MigrationPaths::for_target(&cli.database)?;
    init_logging(cli.verbose, cli.log.then_some(paths.log.as_path()))?;

    let script = read_schema(&cli.schema)?;
    let rename_policy = if cli.strict_renames {
        RenamePolicy::RejectAmbiguous
    } else {
        RenamePolicy::FirstMatch
    };
    let column_pairing = if cli.reject_column_pairing {
        ColumnPairing::Reject
    } else {
        ColumnPairing::Intersection
    };

    let report = SchemaUpdater::new(&cli.database, script)?
        .rename_policy(rename_policy)
        .column_pairing(column_pairing)
        .dry_run(cli.dry_run)
        .run()
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.swapped {
        info!(
            "{} is up to date ({} rows carried over)",
            report.target.display(),
            report.rows_restored()
        );
    } else {
        info!(
            "Dry run complete, result left in {}",
            paths.temp.display()
        );
    }
    Ok(())
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let writer = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            BoxMakeWriter::new(std::io::stderr.and(Mutex::new(file)))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(log_file.is_none())
        .with_writer(writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn read_schema(path: &Path) -> refit::error::Result<String> {
    if path.as_os_str() == "-" {
        let mut script = String::new();
        std::io::stdin().read_to_string(&mut script)?;
        return Ok(script);
    }
    Ok(std::fs::read_to_string(path)?)
}

fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(err) = err.downcast_ref::<MigrateError>() else {
        return 1;
    };
    match err.kind() {
        ErrorKind::InputValidation => 3,
        ErrorKind::UnrepairableSchemaDiff => 4,
        ErrorKind::DatabaseExecution => 5,
        ErrorKind::Io => 6,
    }
}
