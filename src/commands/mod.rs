pub mod feedback;
pub mod register;
pub mod tx;
pub mod update_uri;

use anyhow::{Context, Result};
use ethers::types::U256;

use crate::broadcast::{self, BroadcastResult};
use crate::chain::CHAINS;
use crate::cli::Cli;
use crate::config::Config;
use crate::error::SignError;
use crate::rpc::RpcClient;
use crate::signer::{self, SignResult, TxRequest, WalletMethod};

/// Resolve the RPC URL from CLI flag or config.
pub fn resolve_rpc(cli: &Cli, config: &Config) -> String {
	cli.rpc_url
		.clone()
		.unwrap_or_else(|| config.rpc_url(cli.network.as_str()).to_owned())
}

/// Run the signing and submission pipeline for one encoded registry
/// call: pick a strategy, sign, broadcast, confirm, report.
pub async fn execute(cli: &Cli, req: TxRequest, display_uri: Option<&str>) -> Result<()> {
	let chain = CHAINS.for_network(cli.network.as_str());
	let req = match cli.gas_limit {
		Some(gas) => req.with_gas(U256::from(gas)),
		None => req,
	};

	if cli.dry_run {
		println!("Dry run: nothing will be signed or broadcast.");
		println!("  Network:  {}", chain.name);
		println!("  Contract: {:#x}", req.to);
		println!("  Calldata: 0x{}", hex::encode(req.data.as_ref()));
		return Ok(());
	}

	let method = signer::select_method(cli.keystore.as_deref(), cli.browser)?;

	// The browser wallet talks to the chain through its own connection,
	// so a custom endpoint cannot take effect there.  Reject the combo
	// before touching the network or the filesystem.
	if matches!(method, WalletMethod::Browser) && cli.rpc_url.is_some() {
		return Err(SignError::RpcOverrideWithBrowser.into());
	}

	let config = Config::load()?;
	let rpc = RpcClient::new(&resolve_rpc(cli, &config))?;

	let signed = signer::sign(method, &req, chain, &rpc, display_uri).await?;
	match &signed {
		SignResult::Sent { tx_hash } => {
			println!("Wallet broadcast the transaction: {tx_hash:#x}");
			println!("Waiting for confirmation...");
		}
		SignResult::Signed { from, .. } => {
			println!("Signed as {from:#x}, broadcasting...");
		}
	}

	let result = broadcast::broadcast_and_confirm(&rpc, signed).await?;
	print_result(&result);

	let artifact = write_artifact(chain.name, &result)
		.context("confirmed on-chain, but writing the receipt artifact failed")?;
	println!("  Receipt:   {}", artifact.display());

	Ok(())
}

fn print_result(result: &BroadcastResult) {
	let status = match result.receipt.status {
		Some(status) if status.is_zero() => "reverted",
		_ => "success",
	};

	println!("Confirmed.");
	println!("  Tx hash:   {:#x}", result.tx_hash);
	println!("  Status:    {status}");
	if let Some(block) = result.receipt.block_number {
		println!("  Block:     {block}");
	}
	if let Some(gas) = result.receipt.gas_used {
		println!("  Gas used:  {gas}");
	}
	if let Some(price) = result.receipt.effective_gas_price {
		match ethers::utils::format_units(price, "gwei") {
			Ok(gwei) => println!("  Gas price: {gwei} gwei"),
			Err(_) => println!("  Gas price: {price} wei"),
		}
	}
	if let Some(when) =
		chrono::DateTime::from_timestamp(result.block_timestamp.low_u64() as i64, 0)
	{
		println!("  Included:  {}", when.format("%Y-%m-%d %H:%M:%S UTC"));
	}
}

/// Persist a JSON summary of the confirmed transaction under
/// ~/.agent-registry/receipts/.
fn write_artifact(network: &str, result: &BroadcastResult) -> Result<std::path::PathBuf> {
	let dir = Config::receipts_dir();
	std::fs::create_dir_all(&dir)?;

	let artifact = serde_json::json!({
		"txHash": format!("{:#x}", result.tx_hash),
		"network": network,
		"from": format!("{:#x}", result.receipt.from),
		"blockNumber": result.receipt.block_number.map(|b| b.as_u64()),
		"gasUsed": result.receipt.gas_used.map(|g| g.to_string()),
		"effectiveGasPrice": result.receipt.effective_gas_price.map(|p| p.to_string()),
		"blockTimestamp": result.block_timestamp.to_string(),
		"logCount": result.receipt.logs.len(),
	});

	let path = dir.join(format!("{:#x}.json", result.tx_hash));
	std::fs::write(&path, serde_json::to_string_pretty(&artifact)?)?;
	Ok(path)
}
