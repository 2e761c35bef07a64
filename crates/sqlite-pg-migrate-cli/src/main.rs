//! sqlite-pg-migrate CLI - One-shot SQLite to PostgreSQL migration.

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::{Config, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "One-shot SQLite to PostgreSQL migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration
    Run {
        /// Override the SQLite source file
        #[arg(long)]
        source: Option<PathBuf>,

        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,

        /// Override rows per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Create foreign keys after the data is loaded
        #[arg(long)]
        foreign_keys: bool,

        /// Retry a failed page row by row to locate the bad row
        #[arg(long)]
        row_fallback: bool,

        /// Keep blank strings in typed columns instead of converting them to NULL
        #[arg(long)]
        keep_empty_strings: bool,

        /// Only migrate tables matching this name or glob (repeatable)
        #[arg(long = "include", value_name = "PATTERN")]
        include: Vec<String>,

        /// Skip tables matching this name or glob (repeatable)
        #[arg(long = "exclude", value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Dry run: introspect and print the planned DDL without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate row counts between source and target
    Validate,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            source,
            target_schema,
            page_size,
            foreign_keys,
            row_fallback,
            keep_empty_strings,
            include,
            exclude,
            dry_run,
        } => {
            // Apply overrides
            if let Some(path) = source {
                config.source.path = path;
            }
            if let Some(schema) = target_schema {
                config.target.schema = schema;
            }
            if let Some(n) = page_size {
                config.migration.page_size = n;
            }
            if foreign_keys {
                config.migration.create_foreign_keys = true;
            }
            if row_fallback {
                config.migration.row_fallback = true;
            }
            if keep_empty_strings {
                config.migration.empty_string_as_null = false;
            }
            if !include.is_empty() {
                config.migration.include_tables = include;
            }
            if !exclude.is_empty() {
                config.migration.exclude_tables.extend(exclude);
            }
            config.validate()?;

            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(dry_run).await;
            orchestrator.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else if dry_run {
                println!("\nDry run completed!");
                println!("  Tables: {}", result.tables_total);
                for sql in &result.planned_ddl {
                    println!("{};", sql);
                }
            } else {
                println!("\nMigration completed!");
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Tables: {}/{}",
                    result.tables_migrated, result.tables_total
                );
                println!("  Rows: {}", result.rows_transferred);
                println!("  Throughput: {} rows/sec", result.rows_per_second);
                if result.foreign_keys_created > 0 {
                    println!("  Foreign keys: {}", result.foreign_keys_created);
                }
            }
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::new(config).await?;
            let results = orchestrator.validate().await;
            orchestrator.close().await;
            let results = results?;

            let mismatched = results.iter().filter(|r| !r.matches).count();
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("Validation Results:");
                for r in &results {
                    println!(
                        "  {} {}: source={}, target={}",
                        if r.matches { "OK      " } else { "MISMATCH" },
                        r.table,
                        r.source_rows,
                        r.target_rows
                            .map_or_else(|| "missing".to_string(), |n| n.to_string())
                    );
                }
                println!(
                    "\n  {} tables checked, {} mismatched",
                    results.len(),
                    mismatched
                );
            }

            if mismatched > 0 {
                return Err(MigrateError::Schema(format!(
                    "{} tables have mismatched row counts",
                    mismatched
                )));
            }
        }

        Commands::HealthCheck => {
            let result = Orchestrator::health_check(&config).await;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref version) = result.source_version {
                    println!("    Version: {}", version);
                }
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref version) = result.target_version {
                    println!("    Version: {}", version);
                }
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Invalid verbosity '{}'", other)),
    };

    // Logs go to stderr so --output-json keeps stdout clean.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Invalid log format '{}'", other)),
    }

    Ok(())
}
