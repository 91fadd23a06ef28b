//! sheet-migrate CLI - infer a relational schema from a workbook and migrate it.

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use sheet_migrate::config::DEFAULT_SCHEMA;
use sheet_migrate::migration::DialectKind;
use sheet_migrate::Analysis;
use sheet_migrate::Config;
use sheet_migrate::MigrateError;
use sheet_migrate::MigrationReport;
use sheet_migrate::PreparedWorkbook;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheet-migrate")]
#[command(about = "Infer a relational schema from a workbook and migrate it into a SQL store")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "warn", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the inferred schema of a workbook
    Analyze {
        /// Workbook file (.xlsx, .xlsm or .xls)
        file: PathBuf,

        /// Output the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the schema statements for a workbook
    Plan {
        /// Workbook file (.xlsx, .xlsm or .xls)
        file: PathBuf,

        /// SQL dialect: mariadb or duckdb (default: the configured target type)
        #[arg(long)]
        dialect: Option<DialectKind>,
    },

    /// Create and load the workbook's tables in a MariaDB or DuckDB database
    Migrate {
        /// Workbook file (.xlsx, .xlsm or .xls)
        file: PathBuf,

        /// Target type: mariadb or duckdb
        #[arg(long)]
        target: Option<DialectKind>,

        /// MariaDB server host
        #[arg(long)]
        host: Option<String>,

        /// MariaDB server port
        #[arg(long)]
        port: Option<u16>,

        /// MariaDB user
        #[arg(long)]
        user: Option<String>,

        /// MariaDB password
        #[arg(long, env = "SHEET_MIGRATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// MariaDB database name, or DuckDB database file (:memory: for a transient one)
        #[arg(long)]
        database: Option<String>,

        /// Override target schema (DuckDB)
        #[arg(long)]
        schema: Option<String>,

        /// Rows per insert batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Output the migration report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<MigrateError>() {
                Some(error) => {
                    // context added on the way up, outermost first
                    for context in e.chain().take_while(|cause| cause.downcast_ref::<MigrateError>().is_none()) {
                        eprintln!("{}", context);
                    }
                    eprintln!("{}", error.format_detailed());
                }
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::from(1)
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };

    match cli.command {
        Commands::Analyze { file, json } => {
            let prepared = PreparedWorkbook::open(&file, &config.read)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&prepared.analysis)?);
            } else {
                print_analysis(&prepared.analysis);
            }
        }

        Commands::Plan { file, dialect } => {
            let prepared = PreparedWorkbook::open(&file, &config.read)?;
            let schema = Some(config.target.schema.as_str()).filter(|schema| *schema != DEFAULT_SCHEMA);
            let dialect = dialect.unwrap_or(config.target.kind).dialect(schema);
            let plan = prepared.plan(dialect.as_ref())?;
            print!("{}", plan.to_script());
        }

        Commands::Migrate {
            file,
            target,
            host,
            port,
            user,
            password,
            database,
            schema,
            batch_size,
            json,
        } => {
            // Apply overrides
            if let Some(target) = target {
                config.target.kind = target;
            }
            if let Some(host) = host {
                config.target.host = host;
            }
            if let Some(port) = port {
                config.target.port = port;
            }
            if let Some(user) = user {
                config.target.user = user;
            }
            if let Some(password) = password {
                config.target.password = password;
            }
            if let Some(database) = database {
                config.target.database = database;
            }
            if let Some(schema) = schema {
                config.target.schema = schema;
            }
            if let Some(batch_size) = batch_size {
                config.target.batch_size = batch_size;
            }

            let report = sheet_migrate::migrate(&file, &config)
                .with_context(|| format!("Failed to migrate {}", file.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
    }

    Ok(())
}

fn print_analysis(analysis: &Analysis) {
    println!("Workbook: {}", analysis.workbook);
    for table in &analysis.schema.tables {
        let primary_key = table.primary_key.as_deref().unwrap_or("none");
        println!(
            "\n  {} ({} rows, primary key: {})",
            table.name, table.row_count, primary_key
        );
        for column in &table.columns {
            let mut line = format!(
                "    {} {}{}",
                column.name,
                column.column_type,
                if column.nullable { "" } else { " NOT NULL" }
            );
            if column.is_primary_key {
                line.push_str(" PRIMARY KEY");
            }
            if let Some(references) = column.references() {
                line.push_str(&format!(" -> {}", references));
            }
            println!("{}", line);
        }
    }
    for cycle in &analysis.cycles {
        println!("\n  Cycle: {}", cycle.join(" <-> "));
    }
    for skipped in &analysis.skipped_sheets {
        println!("\n  Skipped sheet {}: {}", skipped.sheet, skipped.message);
    }
}

fn print_report(report: &MigrationReport) {
    println!("\nMigration completed!");
    println!("  Workbook: {}", report.workbook);
    println!("  Store: {}", report.store);
    println!("  Tables: {}", report.tables.len());
    println!("  Rows: {}", report.total_rows());
    println!("  Statements: {}", report.statements_executed);
    println!("  Skipped constraints: {}", report.skipped_constraint_count);
    for table in &report.tables {
        println!(
            "    {}: {} rows, {} columns, primary key: {}",
            table.name,
            table.rows_inserted,
            table.column_count,
            table.primary_key.as_deref().unwrap_or("none")
        );
    }
}

/// Setup logging based on verbosity and format. `RUST_LOG` takes precedence when set.
fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
