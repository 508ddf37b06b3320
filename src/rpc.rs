use anyhow::{anyhow, Context, Result};
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256, U64};

/// Transaction-parameter defaults resolved from the chain for one sender:
/// the next nonce plus current EIP-1559 fee estimates.
#[derive(Debug, Clone, Copy)]
pub struct TxDefaults {
	pub nonce: U256,
	pub max_fee_per_gas: U256,
	pub max_priority_fee_per_gas: U256,
}

/// The blockchain RPC collaborator as the pipeline sees it.
///
/// The signer uses it to fill transaction defaults, the broadcast engine
/// to submit raw bytes and wait for a receipt.  Network retry/timeout
/// policy lives behind this trait; callers treat every method as a
/// single blocking question to the chain.
#[async_trait::async_trait]
pub trait ChainRpc: Send + Sync {
	/// Next nonce and fee estimates for the given sender.
	async fn tx_defaults(&self, from: Address) -> Result<TxDefaults>;

	/// Gas estimate for an assembled (unsigned) transaction.
	async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256>;

	/// Submit a raw signed transaction, returning its hash.
	async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256>;

	/// Block until a receipt for the given hash is available.
	async fn await_receipt(&self, tx_hash: H256) -> Result<ethers::types::TransactionReceipt>;

	/// Timestamp (unix seconds) of the given block.
	async fn block_timestamp(&self, block: U64) -> Result<U256>;
}

/// Thin wrapper around an ethers HTTP provider.
pub struct RpcClient {
	provider: Provider<Http>,
}

impl RpcClient {
	pub fn new(url: &str) -> Result<Self> {
		let provider = Provider::<Http>::try_from(url)
			.with_context(|| format!("invalid RPC URL: {url}"))?;
		Ok(Self { provider })
	}

	/// One-shot receipt lookup (no polling), for status queries.
	pub async fn receipt_once(
		&self,
		tx_hash: H256,
	) -> Result<Option<ethers::types::TransactionReceipt>> {
		Ok(self.provider.get_transaction_receipt(tx_hash).await?)
	}
}

#[async_trait::async_trait]
impl ChainRpc for RpcClient {
	async fn tx_defaults(&self, from: Address) -> Result<TxDefaults> {
		let nonce = self
			.provider
			.get_transaction_count(from, None)
			.await
			.context("failed to fetch account nonce")?;
		let (max_fee_per_gas, max_priority_fee_per_gas) = self
			.provider
			.estimate_eip1559_fees(None)
			.await
			.context("failed to estimate fees")?;
		Ok(TxDefaults {
			nonce,
			max_fee_per_gas,
			max_priority_fee_per_gas,
		})
	}

	async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256> {
		Ok(self.provider.estimate_gas(tx, None).await?)
	}

	async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
		let pending = self.provider.send_raw_transaction(raw).await?;
		Ok(pending.tx_hash())
	}

	async fn await_receipt(&self, tx_hash: H256) -> Result<ethers::types::TransactionReceipt> {
		// PendingTransaction polls at the provider's own cadence; no
		// extra timeout is layered on top here.
		PendingTransaction::new(tx_hash, &self.provider)
			.await?
			.ok_or_else(|| anyhow!("transaction {tx_hash:#x} was dropped from the mempool"))
	}

	async fn block_timestamp(&self, block: U64) -> Result<U256> {
		let block = self
			.provider
			.get_block(block)
			.await?
			.ok_or_else(|| anyhow!("block {block} not found"))?;
		Ok(block.timestamp)
	}
}
