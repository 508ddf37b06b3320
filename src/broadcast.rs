//! Broadcast & confirmation engine.
//!
//! Takes the unified output of any signing strategy and turns it into
//! a confirmed on-chain transaction.  A `Signed` result is submitted
//! exactly once; a `Sent` result was already broadcast by the wallet
//! extension and is only confirmed.  Failures are surfaced as-is:
//! nothing here retries or resubmits.

use ethers::types::{TransactionReceipt, H256, U256};

use crate::error::BroadcastError;
use crate::rpc::ChainRpc;
use crate::signer::SignResult;

/// A confirmed transaction: the receipt plus the timestamp of the
/// block that included it.
#[derive(Debug, Clone)]
pub struct BroadcastResult {
	pub tx_hash: H256,
	pub receipt: TransactionReceipt,
	pub block_timestamp: U256,
}

pub async fn broadcast_and_confirm(
	rpc: &dyn ChainRpc,
	signed: SignResult,
) -> Result<BroadcastResult, BroadcastError> {
	let tx_hash = match signed {
		// Already on the wire; submitting again would double-broadcast.
		SignResult::Sent { tx_hash } => tx_hash,
		SignResult::Signed { raw_tx, .. } => rpc
			.send_raw_transaction(raw_tx)
			.await
			.map_err(|err| BroadcastError::BroadcastRejected(err.to_string()))?,
	};

	let receipt = rpc
		.await_receipt(tx_hash)
		.await
		.map_err(|err| BroadcastError::ConfirmationFailed(err.to_string()))?;

	let block_timestamp = match receipt.block_number {
		Some(block) => rpc
			.block_timestamp(block)
			.await
			.map_err(|err| BroadcastError::ConfirmationFailed(err.to_string()))?,
		None => {
			return Err(BroadcastError::ConfirmationFailed(format!(
				"receipt for {tx_hash:#x} has no block number"
			)))
		}
	};

	Ok(BroadcastResult {
		tx_hash,
		receipt,
		block_timestamp,
	})
}
