use anyhow::{anyhow, Result};
use ethers::types::H256;

use crate::cli::{Cli, TxCommand};
use crate::commands::resolve_rpc;
use crate::config::Config;
use crate::rpc::RpcClient;

pub async fn run(cli: &Cli, cmd: &TxCommand) -> Result<()> {
	let config = Config::load()?;
	let rpc = RpcClient::new(&resolve_rpc(cli, &config))?;

	match cmd {
		TxCommand::Status { tx_hash } => {
			let hash: H256 = tx_hash
				.parse()
				.map_err(|e| anyhow!("invalid transaction hash: {e}"))?;

			match rpc.receipt_once(hash).await? {
				Some(receipt) => {
					println!("Transaction: {hash:#x}");
					let status = match receipt.status {
						Some(status) if status.is_zero() => "reverted",
						_ => "success",
					};
					println!("Status:      {status}");
					if let Some(block) = receipt.block_number {
						println!("Block:       {block}");
					}
				}
				None => println!("Transaction not yet mined (or unknown): {hash:#x}"),
			}
			Ok(())
		}
	}
}
