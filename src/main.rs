use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod broadcast;
mod chain;
mod cli;
mod commands;
mod config;
mod error;
mod registry;
mod rpc;
mod signer;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
	// Diagnostics go to stderr via tracing; results stay on stdout.
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
		)
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();

	match &cli.command {
		Command::Register { uri } => commands::register::run(&cli, uri).await,
		Command::UpdateUri { agent_id, uri } => {
			commands::update_uri::run(&cli, *agent_id, uri).await
		}
		Command::GiveFeedback {
			agent_id,
			score,
			uri,
		} => commands::feedback::run(&cli, *agent_id, *score, uri.as_deref()).await,
		Command::Tx { command } => commands::tx::run(&cli, command).await,
	}
}
