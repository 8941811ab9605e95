//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Async Commands
//!
//! `serve` drives the commit engines, which live on a Tokio runtime.
//! [`dispatch`] builds that runtime on demand so the other commands stay
//! synchronous.

mod completion;
mod config_cmd;
mod serve;

pub use completion::{completion, write_completion};
pub use config_cmd::{init as config_init, show as config_show};
pub use serve::{run as serve_stream, serve, ServeSummary, WireRequest};

use crate::cli::args::{Cli, Command, ConfigAction};
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Serve => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve::serve(config))
        }
        Command::Config { action } => match action {
            ConfigAction::Init {
                path,
                node_id,
                force,
            } => config_cmd::init(config, path.as_deref(), node_id.as_deref(), force),
            ConfigAction::Show => config_cmd::show(config),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}
