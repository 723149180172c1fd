//! Command-line interface for actweek
//!
//! This module defines the CLI structure using clap derive macros.
//! Each group of subcommands is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod context;
mod handle;
mod init;
mod sheet;
mod watch;
mod week;

/// actweek - weekly action sheet reconciliation
///
/// Archives the first action sheet of each ISO week as the requested set,
/// reconciles the next one against it, and sends every owner their share.
#[derive(Parser, Debug)]
#[command(name = "actweek")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (defaults to .actweek.toml in the current directory)
    #[arg(long, global = true, env = "ACTWEEK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit pipeline events as JSONL to a file, or "-" for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    /// Override the clock (RFC 3339), e.g. to replay a past week
    #[arg(long, global = true)]
    pub now: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default config and create the store
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Handle one object-created notification payload
    Handle {
        /// Payload file, or "-" for stdin
        #[arg(long, default_value = "-")]
        event: String,
    },

    /// Drop a local CSV into the inbox and handle it
    Ingest {
        /// Sheet to ingest
        file: PathBuf,

        /// Object name inside the inbox (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Finish a reconcile that stopped after its completed sheet was archived
    Resume {
        /// ISO week number
        #[arg(long)]
        week: u32,
    },

    /// Watch the inbox and handle each new CSV
    Watch {
        /// Handle sheets already in the inbox before watching
        #[arg(long)]
        drain: bool,

        /// Handle sheets already in the inbox, then exit
        #[arg(long)]
        once: bool,
    },

    /// Rows of a requested sheet that are missing from a completed sheet
    Diff {
        requested: PathBuf,
        completed: PathBuf,

        /// Write the incomplete rows as CSV
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Weekly counts and derived columns for a sheet
    Report {
        file: PathBuf,

        /// Write the sheet with derived columns appended
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Split the open rows of a sheet by owner
    Split {
        file: PathBuf,

        /// Directory for {owner}_open.csv files
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show a week's record and objects
    Week {
        /// ISO week number (defaults to the current week)
        #[arg(long)]
        week: Option<u32>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = context::GlobalOptions {
            config: self.config,
            json: self.json,
            quiet: self.quiet,
            events: self.events,
            now: self.now,
        };

        match self.command {
            Commands::Init { force } => init::run(init::InitOptions { force, global }),
            Commands::Handle { event } => handle::run_handle(handle::HandleOptions { event, global }),
            Commands::Ingest { file, name } => {
                handle::run_ingest(handle::IngestOptions { file, name, global })
            }
            Commands::Resume { week } => handle::run_resume(handle::ResumeOptions { week, global }),
            Commands::Watch { drain, once } => watch::run(watch::WatchOptions { drain, once, global }),
            Commands::Diff {
                requested,
                completed,
                out,
            } => sheet::run_diff(sheet::DiffOptions {
                requested,
                completed,
                out,
                global,
            }),
            Commands::Report { file, out } => sheet::run_report(sheet::ReportOptions { file, out, global }),
            Commands::Split { file, out } => sheet::run_split(sheet::SplitOptions { file, out, global }),
            Commands::Week { week } => week::run(week::WeekOptions { week, global }),
        }
    }

    /// Whether events go to stdout, which suppresses the JSON envelope
    pub fn events_to_stdout(&self) -> bool {
        self.events
            .as_deref()
            .map(|value| value.trim() == "-")
            .unwrap_or(false)
    }
}
