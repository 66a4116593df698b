//! Parley CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, sets up logging, resolves the data directory, then
//! dispatches to the chat screen or the settings commands.

mod cli;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigAction};
use parley_infra::settings::{resolve_data_dir, FileSettingsStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity; RUST_LOG wins when set.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,parley_core=debug,parley_infra=debug,parley=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Shell completions don't need settings
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    tracing::debug!(data_dir = %data_dir.display(), "resolved data directory");
    let settings_store = FileSettingsStore::new(&data_dir);

    match cli.command {
        Commands::Chat {
            conversation,
            title,
        } => {
            cli::chat::loop_runner::run_chat_loop(&settings_store, conversation, title, cli.quiet)
                .await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                cli::config::show_config(&settings_store, cli.json).await?;
            }
            ConfigAction::Set {
                base_url,
                api_key,
                user_id,
            } => {
                cli::config::set_config(&settings_store, base_url, api_key, user_id, cli.json)
                    .await?;
            }
        },

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
