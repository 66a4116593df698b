//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod config;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat with a remote conversation service from the terminal.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a chat screen (a new conversation unless --conversation is given).
    Chat {
        /// Resume an existing conversation by ID.
        #[arg(long, short)]
        conversation: Option<String>,

        /// Title to show for the resumed conversation.
        #[arg(long, requires = "conversation")]
        title: Option<String>,
    },

    /// Show or change connection settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current settings (the API key is masked).
    Show,

    /// Update one or more settings.
    Set {
        /// Chat service base URL.
        #[arg(long)]
        base_url: Option<String>,

        /// API key. Pass the flag without a value to be prompted.
        #[arg(long, num_args = 0..=1)]
        api_key: Option<Option<String>>,

        /// User ID sent with messages and the event stream.
        #[arg(long)]
        user_id: Option<String>,
    },
}
