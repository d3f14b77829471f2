//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod init;
mod query;
mod spreadsheet;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;
use crate::models::DEFAULT_RADIUS_KM;

#[derive(Parser)]
#[command(name = "menor-preco")]
#[command(about = "Search Nota Paraná prices and export them to Google Sheets")]
#[command(version)]
pub struct Cli {
    /// Data directory (holds the database, config and token files)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path (defaults to menor-preco.toml in the data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Manage saved searches
    Query {
        #[command(subcommand)]
        command: QueryCommands,
    },

    /// Manage exported spreadsheets
    Spreadsheet {
        #[command(subcommand)]
        command: SpreadsheetCommands,
    },
}

#[derive(Subcommand)]
enum QueryCommands {
    /// Create a query, discovering categories for its localities
    Create {
        /// Search term
        term: String,
        /// Locality name (repeat for several)
        #[arg(short, long = "local", required = true)]
        localities: Vec<String>,
        /// Search radius in kilometres
        #[arg(short, long, default_value_t = DEFAULT_RADIUS_KM)]
        radius: f64,
        /// 1-based index of the discovered category (prompts if omitted)
        #[arg(long)]
        category: Option<usize>,
    },

    /// Change the term, category or radius of a query
    Update {
        /// Query ID (prompts if omitted)
        #[arg(long)]
        id: Option<i32>,
        /// New search term
        #[arg(long)]
        term: Option<String>,
        /// Stored category ID
        #[arg(long)]
        category: Option<i32>,
        /// New radius in kilometres
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Delete a query (its spreadsheets are kept but detached)
    Delete {
        /// Query ID (prompts if omitted)
        #[arg(long)]
        id: Option<i32>,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List saved queries
    List,
}

#[derive(Subcommand)]
enum SpreadsheetCommands {
    /// Create a remote spreadsheet for a query
    Create {
        /// Query ID (prompts if omitted)
        #[arg(long)]
        query: Option<i32>,
        /// Populate it right away
        #[arg(short, long)]
        populate: bool,
    },

    /// Create missing tabs and append current prices
    Populate {
        /// Spreadsheet ID (prompts if omitted)
        #[arg(long)]
        id: Option<i32>,
    },

    /// Forget a spreadsheet locally (the remote file is left alone)
    Delete {
        /// Spreadsheet ID (prompts if omitted)
        #[arg(long)]
        id: Option<i32>,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List spreadsheets
    List,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.data_dir.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Query { command } => match command {
            QueryCommands::Create {
                term,
                localities,
                radius,
                category,
            } => query::cmd_query_create(&settings, &term, &localities, radius, category).await,
            QueryCommands::Update {
                id,
                term,
                category,
                radius,
            } => query::cmd_query_update(&settings, id, term.as_deref(), category, radius).await,
            QueryCommands::Delete { id, yes } => query::cmd_query_delete(&settings, id, yes).await,
            QueryCommands::List => query::cmd_query_list(&settings).await,
        },
        Commands::Spreadsheet { command } => match command {
            SpreadsheetCommands::Create { query, populate } => {
                spreadsheet::cmd_spreadsheet_create(&settings, query, populate).await
            }
            SpreadsheetCommands::Populate { id } => {
                spreadsheet::cmd_spreadsheet_populate(&settings, id).await
            }
            SpreadsheetCommands::Delete { id, yes } => {
                spreadsheet::cmd_spreadsheet_delete(&settings, id, yes).await
            }
            SpreadsheetCommands::List => spreadsheet::cmd_spreadsheet_list(&settings).await,
        },
    }
}
