//! `flashback`: operator CLI for the USB installer drive fleet.
//!
//! Usage:
//!   flashback [--config <file>] [--db <path>] <command>
//!
//! Output is JSON on stdout. Failures print `{"code", "message"}` and exit
//! non-zero. Logs go to stderr, filtered by `RUST_LOG` (default `info`).

mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use flashback_core::ServiceError;
use flashback_sql::SQLStore;
use fleet::model::DbId;
use fleet::{FleetError, FleetService};

use commands::DriveRef;

/// Flashback fleet tracker.
#[derive(Parser, Debug)]
#[command(name = "flashback", about = "USB installer drive fleet tracker")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides config and FLASHBACK_DB_PATH).
    #[arg(long = "db", global = true)]
    db: Option<PathBuf>,

    /// Log every SQL statement at debug level.
    #[arg(long = "log-queries", global = true)]
    log_queries: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database and schema if missing.
    Init,

    /// Database health and fleet totals.
    Status,

    /// Make a version current for its scope and cascade drive statuses.
    Promote {
        /// Version id.
        version: DbId,
        /// Acting user recorded in the audit log.
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// List drives awaiting re-flash.
    Pending,

    /// Record that pending drives were re-flashed with the current version.
    #[command(name = "mark-updated")]
    MarkUpdated {
        /// Drive ids.
        #[arg(required = true)]
        ids: Vec<DbId>,
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Audit history of one drive, newest first.
    Events {
        /// Drive id or label (e.g. A001).
        drive: DriveRef,
    },

    /// List drives.
    Drives {
        /// Only drives in this status (e.g. pending_update).
        #[arg(long)]
        status: Option<String>,
        /// Whitespace-separated search terms.
        #[arg(long)]
        search: Option<String>,
    },

    /// Dashboard statistics.
    Stats,
}

fn main() -> ExitCode {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}", service_error(e).to_json());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = config::Overrides {
        db: cli.db,
        log_queries: cli.log_queries,
    };
    let cfg = config::resolve(cli.config.as_deref(), &overrides)?;
    let store = config::open_store(&cfg)?;
    let sql: Arc<dyn SQLStore> = store.clone();
    let svc = FleetService::new(sql)?;

    let result = match cli.command {
        Commands::Init => commands::init(&svc),
        Commands::Status => {
            let database = cfg.resolve_sqlite_path().display().to_string();
            commands::status(&store, &svc, &database)
        }
        Commands::Promote { version, user } => commands::promote(&svc, version, &user),
        Commands::Pending => commands::pending(&svc),
        Commands::MarkUpdated { ids, user } => commands::mark_updated(&svc, &ids, &user),
        Commands::Events { drive } => commands::events(&svc, &drive),
        Commands::Drives { status, search } => commands::drives(&svc, status.as_deref(), search),
        Commands::Stats => commands::stats(&svc),
    };

    store.close();
    result
}

/// Map any failure onto the stable error taxonomy.
fn service_error(e: anyhow::Error) -> ServiceError {
    let e = match e.downcast::<FleetError>() {
        Ok(fleet) => return fleet.into(),
        Err(e) => e,
    };
    match e.downcast::<ServiceError>() {
        Ok(svc) => svc,
        Err(other) => ServiceError::Internal(format!("{:#}", other)),
    }
}
