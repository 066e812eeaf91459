//! upsert-batch — bulk MySQL upserts from JSON
//!
//! # Usage
//!
//! ```bash
//! # Upsert rows from a file
//! upsert-batch rows.json --table users --set "updated_at=NOW()" --exclude created_at
//!
//! # Dry run (show SQL only)
//! upsert-batch rows.json -t users --dry-run
//!
//! # Rows from stdin
//! cat rows.json | upsert-batch -t users
//! ```

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use upsert_batch::logger::setup_logger;
use upsert_batch::parser::{parse_assignments, parse_columns};
use upsert_batch::prelude::*;

#[derive(Parser)]
#[command(name = "upsert-batch")]
#[command(version)]
#[command(about = "Batched INSERT ... ON DUPLICATE KEY UPDATE for MySQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    upsert-batch rows.json -t users
    upsert-batch rows.json -t users --set \"updated_at=NOW()\" --exclude created_at
    cat rows.json | upsert-batch -t users --dry-run")]
struct Cli {
    /// JSON file holding an array of row objects ('-' or omitted for stdin)
    input: Option<PathBuf>,

    #[command(flatten)]
    opts: UpsertArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Clone)]
struct UpsertArgs {
    /// Target table (falls back to upsert.default_table)
    #[arg(short, long, global = true)]
    table: Option<String>,

    /// Extra update assignments, e.g. "updated_at=NOW(), source='import'"
    #[arg(short, long, global = true)]
    set: Option<String>,

    /// Columns left out of the update clause, e.g. "id, created_at"
    #[arg(short = 'x', long, global = true)]
    exclude: Option<String>,

    /// Don't execute, just show the generated SQL
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Rows per statement
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Backtick-quote every column name
    #[arg(long, global = true)]
    quote_identifiers: bool,

    /// Database connection URL
    #[arg(long, env = "UPSERT_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Config file (defaults to ./upsert.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show full error messages
    #[arg(short, long, global = true)]
    debug: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how rows would be split into statements
    Explain {
        /// JSON file holding an array of row objects
        input: Option<PathBuf>,
    },
}

/// Effective settings after merging the config file and flags.
struct Settings {
    config: Config,
    escaper: MysqlEscaper,
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logger(if cli.opts.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    });

    let settings = match load_settings(&cli.opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let result = match &cli.command {
        Some(Commands::Explain { input }) => {
            explain(input.as_deref().or(cli.input.as_deref()), &cli.opts, &settings)
        }
        None => run(cli.input.as_deref(), &cli.opts, &settings).await,
    };

    if let Err(e) = result {
        let message = match e.downcast_ref::<UpsertError>() {
            Some(err) => err.display(settings.debug),
            None if settings.debug => format!("{:#}", e),
            None => "upsert failed".to_string(),
        };
        eprintln!("{} {}", "Error:".red().bold(), message);
        std::process::exit(1);
    }
}

fn load_settings(opts: &UpsertArgs) -> anyhow::Result<Settings> {
    let mut config = match &opts.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => Config::load()?,
    };

    if let Some(size) = opts.batch_size {
        if size == 0 {
            bail!("--batch-size must be at least 1");
        }
        config.upsert.batch_size = size;
    }
    if opts.quote_identifiers {
        config.upsert.quote_identifiers = true;
    }
    if opts.database_url.is_some() {
        config.mysql.url = opts.database_url.clone();
    }

    Ok(Settings {
        escaper: config.escaper(),
        debug: opts.debug || config.upsert.debug,
        config,
    })
}

fn build_upsert(opts: &UpsertArgs, settings: &Settings) -> anyhow::Result<UpsertBatch> {
    let extras = match &opts.set {
        Some(list) => parse_assignments(list)?,
        None => Vec::new(),
    };
    let exclude = match &opts.exclude {
        Some(list) => parse_columns(list)?,
        None => Vec::new(),
    };

    Ok(UpsertBatch::new(opts.table.clone().unwrap_or_default())
        .extras(extras)
        .exclude(exclude)
        .batch_size(settings.config.upsert.batch_size))
}

fn staging_for(settings: &Settings) -> StagingBuffer {
    let mut staging = StagingBuffer::new();
    if let Some(table) = &settings.config.upsert.default_table {
        staging.from(table.clone());
    }
    staging
}

fn read_rows(input: Option<&Path>) -> anyhow::Result<Vec<Row>> {
    let content = match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading rows from stdin")?;
            buf
        }
    };

    let json: serde_json::Value = serde_json::from_str(&content).context("parsing rows as JSON")?;
    let rows = match &json {
        serde_json::Value::Array(items) => items
            .iter()
            .map(Row::from_json)
            .collect::<Result<Vec<_>, _>>()?,
        serde_json::Value::Object(_) => vec![Row::from_json(&json)?],
        other => bail!("expected an array of objects, found {}", other),
    };
    Ok(rows)
}

async fn run(input: Option<&Path>, opts: &UpsertArgs, settings: &Settings) -> anyhow::Result<()> {
    let rows = read_rows(input)?;
    let upsert = build_upsert(opts, settings)?;
    let mut staging = staging_for(settings);

    if opts.verbose {
        println!("{} {} row(s)", "Input:".dimmed(), rows.len().to_string().yellow());
    }

    // Dry run or no database URL - just show SQL
    let url = match (&settings.config.mysql.url, opts.dry_run) {
        (Some(url), false) => url.clone(),
        (url, _) => {
            let mut dry = DryRun::with_escaper(settings.escaper);
            let report = upsert.execute(&mut dry, &mut staging, Some(rows.as_slice())).await?;

            println!("{}", "Generated SQL:".green().bold());
            for (i, sql) in dry.statements().iter().enumerate() {
                println!("\n{}{}:", "Statement ".dimmed(), (i + 1).to_string().cyan());
                println!("  {}", sql.white());
            }
            println!();
            println!(
                "{} statement(s), {} row(s)",
                report.statements.to_string().cyan(),
                report.rows.to_string().cyan()
            );

            if url.is_none() && !opts.dry_run {
                println!();
                println!(
                    "{}",
                    "⚠ No database URL. Use --database-url or set UPSERT_DATABASE_URL".yellow()
                );
            }
            return Ok(());
        }
    };

    if opts.verbose {
        println!("{} {}", "Connecting to:".dimmed(), url);
    }
    let mut db = UpsertDb::connect(&url).await?.with_escaper(settings.escaper);
    let report = upsert.execute(&mut db, &mut staging, Some(rows.as_slice())).await?;

    println!(
        "{} {} row(s) in {} statement(s), {} rows affected",
        "✓".green(),
        report.rows,
        report.statements,
        report.rows_affected
    );
    Ok(())
}

fn explain(input: Option<&Path>, opts: &UpsertArgs, settings: &Settings) -> anyhow::Result<()> {
    let rows = read_rows(input)?;
    let upsert = build_upsert(opts, settings)?;
    let mut staging = staging_for(settings);
    staging.set_insert_batch(&rows, &settings.escaper)?;

    let statements = upsert.statements(&settings.escaper, &staging)?;

    println!("{}", "Upsert Plan".cyan().bold());
    println!();
    println!("  {} {}", "Table:".dimmed(), statements.table().white());
    println!("  {} {}", "Columns:".dimmed(), staging.keys().join(", ").white());
    if !upsert.exclude_from_update().is_empty() {
        println!(
            "  {} {}",
            "Excluded:".dimmed(),
            upsert.exclude_from_update().join(", ").yellow()
        );
    }
    for (column, value) in upsert.extra_update_fields() {
        println!("  {} {} = {}", "Extra:".dimmed(), column.white(), value.to_string().yellow());
    }
    println!("  {} {}", "Update:".dimmed(), statements.update_clause().white());
    println!();

    let total = statements.len();
    println!(
        "{} {} row(s) → {} statement(s) of at most {}",
        "Batches:".green().bold(),
        staging.row_count(),
        total.to_string().cyan(),
        settings.config.upsert.batch_size
    );
    for (i, (size, _)) in statements.enumerate() {
        println!("    [{}] {} row(s)", (i + 1).to_string().cyan(), size);
    }
    Ok(())
}
