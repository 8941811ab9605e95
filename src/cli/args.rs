//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Read configuration from this file
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// metatx - Atomic mutation pipeline for a replicated filesystem metadata service
#[derive(Parser, Debug)]
#[command(name = "metatx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve requests as newline-delimited JSON on stdin/stdout
    #[command(
        name = "serve",
        long_about = "Serve requests as newline-delimited JSON on stdin/stdout.\n\n\
            Each input line is one request; each output line is one reply. Replies \
            are written as requests complete and may be reordered relative to the \
            input, so clients should correlate them by request_id. Logs go to stderr.",
        after_help = "\
REQUEST FORMAT:
    {\"procedure_id\": 10,
     \"payload\": {\"volume_name\": \"default\", \"path\": \"logs\", \"mode\": 493},
     \"user\": {\"user_id\": \"alice\", \"group_ids\": [\"staff\"]},
     \"request_id\": \"<optional uuid>\"}

PROCEDURES:
    2   set_mapping       {uuid, version, protocol, address, port, [match_network], [ttl_s]}
    3   delete_mapping    {uuid}
    10  create_directory  {volume_name, path, mode}"
    )]
    Serve,

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Write a starter configuration file
    Init {
        /// Where to write (defaults to ~/.metatx/config.toml, or --config)
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,

        /// Node id to record (defaults to a fresh UUID)
        #[arg(long)]
        node_id: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
