//! fxstudio CLI - Interactive Audio Effects Engine
//!
//! Command-line interface for rendering and monitoring clips through the
//! fxstudio effects chain.

use clap::Parser;
use env_logger::Env;
use log::info;

use fxstudio::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("fxstudio v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Render {
            input,
            output,
            controls,
        }) => commands::render(config, &input, &output, &controls).await,
        Some(Commands::Play {
            input,
            controls,
            start,
        }) => commands::play(config, &input, &controls, start).await,
        Some(Commands::Presets) => commands::list_presets(),
        Some(Commands::Inspect { input }) => commands::inspect(&input),
        None => {
            println!("fxstudio v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}
