use anyhow::{Context, Result};
use ethers::types::{Address, U256};

use crate::chain::CHAINS;
use crate::cli::Cli;
use crate::commands;
use crate::registry;
use crate::signer::TxRequest;

pub async fn run(cli: &Cli, agent_id: u64, score: u8, uri: Option<&str>) -> Result<()> {
	if score > 100 {
		anyhow::bail!("score must be between 0 and 100, got {score}");
	}

	let chain = CHAINS.for_network(cli.network.as_str());
	let to: Address = chain
		.reputation_registry
		.parse()
		.context("invalid reputation registry address")?;

	println!("Posting feedback for agent {agent_id}: score {score}");
	let req = TxRequest::new(
		to,
		registry::give_feedback_call(U256::from(agent_id), score, uri),
	);
	commands::execute(cli, req, uri).await
}
