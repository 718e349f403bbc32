// SPDX-License-Identifier: MIT
mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vmbridge", version, about = "Cross-VM bridge operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Config file. Defaults to ~/.vmbridge/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bridge activation height; zero or negative means never activated.
    #[arg(long, global = true, allow_negative_numbers = true)]
    activation_height: Option<i64>,

    /// Chain ID the EVM runs under.
    #[arg(long, global = true)]
    chain_id: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show commit, prune and version filter decisions at a height.
    Filters(commands::filters::FiltersArgs),

    /// Print the SendToWasm event ID and the mintERC20 selector.
    EventId,

    /// Run a bridge call against a demo ledger and print its effects.
    #[command(subcommand)]
    Simulate(commands::simulate::SimulateCommand),

    /// Print the resolved node configuration.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let overrides = config::Overrides {
        activation_height: cli.activation_height,
        chain_id: cli.chain_id,
    };
    let node_config = config::load(cli.config.as_deref(), &overrides)?;
    tracing::debug!(?node_config, "configuration loaded");

    match cli.command {
        Commands::Filters(args) => commands::filters::run(args, &node_config, cli.json),
        Commands::EventId => commands::event_id::run(cli.json),
        Commands::Simulate(cmd) => commands::simulate::run(cmd, &node_config, cli.json),
        Commands::Config => commands::show_config(&node_config, cli.json),
    }
}
