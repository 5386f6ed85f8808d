// refsync CLI - reconcile document/field reference rows from a CSV file

mod exit_codes;
mod logging;
mod report;
mod sync;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;
use sync::{Overrides, RunArgs};

#[derive(Parser)]
#[command(name = "refsync")]
#[command(about = "Synchronize document/field reference tables from a CSV file")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/refsync/refsync.toml if present)
    #[arg(long, global = true, env = "REFSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging, echoed to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the reference tables live and which category to work in.
#[derive(Args, Debug, Default)]
struct StoreArgs {
    /// SQLite database holding the reference tables
    #[arg(long, env = "REFSYNC_DATABASE")]
    database: Option<PathBuf>,

    /// Claim category to scope documents and fields to
    #[arg(long, env = "REFSYNC_CATEGORY")]
    category: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert missing documents and fields from a CSV file in one transaction
    #[command(after_help = "\
Examples:
  refsync run FieldEntry.csv --database refs.db
  refsync run FieldEntry.csv --category IRF --json
  refsync run FieldEntry.csv --dry-run

Exit codes: 0 committed, 3 input error, 4 database error (rolled back), 5 config error")]
    Run {
        /// CSV file with document_name and field_name columns
        input: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// Also trim document names when matching (field names always are)
        #[arg(long)]
        trim_document_names: bool,

        /// Input delimiter (sniffed when omitted)
        #[arg(long)]
        delimiter: Option<char>,

        /// Run everything, then roll back instead of committing
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,

        /// No terminal output (the log file is still written)
        #[arg(long, short = 'q')]
        quiet: bool,

        /// Append the run log here instead of the configured file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Read a CSV file and report which rows a run would process
    Check {
        /// CSV file with document_name and field_name columns
        input: PathBuf,

        /// Apply the same document-name trimming a run would
        #[arg(long)]
        trim_document_names: bool,

        /// Input delimiter (sniffed when omitted)
        #[arg(long)]
        delimiter: Option<char>,

        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print stored documents and their fields for a category
    List {
        #[command(flatten)]
        store: StoreArgs,

        /// Print as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Manage the config file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a commented default config file
    Init {
        /// Where to write it (default: <config dir>/refsync/refsync.toml)
        path: Option<PathBuf>,
    },
    /// Print the effective settings after file, environment and flags
    Show {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print the default config file location
    Path,
}

impl StoreArgs {
    fn overrides(self) -> Overrides {
        Overrides {
            database: self.database,
            category: self.category,
            ..Default::default()
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("REFSYNC_COMMIT"), ")",
        "\ntarget:  ", env!("REFSYNC_TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run {
            input,
            store,
            trim_document_names,
            delimiter,
            dry_run,
            json,
            quiet,
            log_file,
        } => {
            let overrides = Overrides {
                trim_document_names,
                delimiter,
                log_file,
                ..store.overrides()
            };
            let args = RunArgs { input, dry_run, json, quiet, verbose: cli.verbose };
            sync::cmd_run(args, config, overrides)
        }
        Commands::Check { input, trim_document_names, delimiter, json } => {
            let overrides = Overrides { trim_document_names, delimiter, ..Default::default() };
            sync::cmd_check(&input, json, config, overrides)
        }
        Commands::List { store, json } => sync::cmd_list(json, config, store.overrides()),
        Commands::Config(ConfigCommands::Init { path }) => sync::cmd_config_init(path),
        Commands::Config(ConfigCommands::Show { store }) => {
            sync::cmd_config_show(config, store.overrides())
        }
        Commands::Config(ConfigCommands::Path) => {
            println!("{}", refsync_config::Settings::config_path().display());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
