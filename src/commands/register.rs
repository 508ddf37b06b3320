use anyhow::{Context, Result};
use ethers::types::Address;

use crate::chain::CHAINS;
use crate::cli::Cli;
use crate::commands;
use crate::registry;
use crate::signer::TxRequest;

pub async fn run(cli: &Cli, uri: &str) -> Result<()> {
	let chain = CHAINS.for_network(cli.network.as_str());
	let to: Address = chain
		.identity_registry
		.parse()
		.context("invalid identity registry address")?;

	println!("Registering agent: {uri}");
	let req = TxRequest::new(to, registry::register_call(uri));
	commands::execute(cli, req, Some(uri)).await
}
