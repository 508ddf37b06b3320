use anyhow::{Context, Result};
use ethers::types::{Address, U256};

use crate::chain::CHAINS;
use crate::cli::Cli;
use crate::commands;
use crate::registry;
use crate::signer::TxRequest;

pub async fn run(cli: &Cli, agent_id: u64, uri: &str) -> Result<()> {
	let chain = CHAINS.for_network(cli.network.as_str());
	let to: Address = chain
		.identity_registry
		.parse()
		.context("invalid identity registry address")?;

	println!("Updating agent {agent_id} to: {uri}");
	let req = TxRequest::new(to, registry::update_uri_call(U256::from(agent_id), uri));
	commands::execute(cli, req, Some(uri)).await
}
