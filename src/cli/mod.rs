use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};

pub mod commands;

use self::commands::{AddArgs, ExportArgs, ImportArgs, RemoveArgs, SearchArgs};

const LOG_FILE: &str = "record-desk.log";

#[derive(Parser, Debug)]
#[command(
    name = "recdesk",
    version,
    about = "Keyboard-first editor for a JSON collection of labeled records"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over RECDESK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over RECDESK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Work on this JSON file instead of the configured one
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the interactive record table (default)
    Tui,
    /// Print every record
    List,
    /// Add a record (missing fields are prompted for)
    Add(AddArgs),
    /// Remove records by id
    Remove(RemoveArgs),
    /// Print records containing a term in any text field
    Search(SearchArgs),
    /// Replace the data file with the records of another JSON file
    Import(ImportArgs),
    /// Write the records to another JSON file
    Export(ExportArgs),
}

enum LogTarget {
    Stderr,
    File(PathBuf),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();

    let command = cli.command.unwrap_or(Commands::Tui);
    let target = match command {
        Commands::Tui => LogTarget::File(paths.log_dir.join(LOG_FILE)),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let mut config = loader.load_or_init()?;
    if let Some(file) = cli.file {
        config.store.data_file = file;
    }
    tracing::debug!(file = %config.store.data_file.display(), "resolved data file");

    let config = Arc::new(config);
    match command {
        Commands::Tui => commands::run_tui(config),
        Commands::List => commands::list_records(&config),
        Commands::Add(args) => commands::add_record(&config, args),
        Commands::Remove(args) => commands::remove_records(&config, args),
        Commands::Search(args) => commands::search_records(&config, args),
        Commands::Import(args) => commands::import_records(&config, args),
        Commands::Export(args) => commands::export_records(&config, args),
    }
}

fn init_tracing(level: &str, target: LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        match target {
            LogTarget::Stderr => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            LogTarget::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
