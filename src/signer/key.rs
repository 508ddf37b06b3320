//! Key-based signing: encrypted keystore files and raw private keys.
//!
//! Both paths resolve a [`LocalWallet`], fill transaction defaults from
//! the chain, and sign locally.  Broadcasting is deliberately left to
//! the broadcast engine so browser-signed and locally-signed
//! transactions share one downstream path.

use std::path::Path;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::Eip1559TransactionRequest;

use crate::chain::ChainInfo;
use crate::error::SignError;
use crate::rpc::ChainRpc;
use crate::signer::{SecretKeyHex, SignResult, TxRequest};

pub async fn sign_with_keystore(
	path: &Path,
	req: &TxRequest,
	chain: &ChainInfo,
	rpc: &dyn ChainRpc,
) -> Result<SignResult, SignError> {
	validate_keystore_file(path)?;
	let passphrase =
		rpassword::prompt_password(format!("Passphrase for {}: ", path.display()))
			.map_err(SignError::PassphraseRead)?;
	let wallet = decrypt_keystore_file(path, &passphrase)?;
	sign_transaction(wallet, req, chain, rpc).await
}

pub async fn sign_with_private_key(
	key: &SecretKeyHex,
	req: &TxRequest,
	chain: &ChainInfo,
	rpc: &dyn ChainRpc,
) -> Result<SignResult, SignError> {
	let wallet = wallet_from_hex(key.expose())?;
	sign_transaction(wallet, req, chain, rpc).await
}

/// Check that the file exists and looks like a Web3 Secret Storage
/// keystore before asking the user for a passphrase.
fn validate_keystore_file(path: &Path) -> Result<(), SignError> {
	let contents = std::fs::read_to_string(path)
		.map_err(|_| SignError::KeystoreNotFound(path.to_owned()))?;

	let json: serde_json::Value = serde_json::from_str(&contents)
		.map_err(|_| SignError::InvalidKeystoreFormat(path.to_owned()))?;

	let crypto = json.get("crypto").or_else(|| json.get("Crypto"));
	match crypto {
		Some(section) if section.is_object() => Ok(()),
		_ => Err(SignError::InvalidKeystoreFormat(path.to_owned())),
	}
}

/// Decrypt the keystore to a wallet.  A failure here after
/// [`validate_keystore_file`] passed almost always means a wrong
/// passphrase; the caller may re-invoke, we never retry ourselves.
pub(crate) fn decrypt_keystore_file(
	path: &Path,
	passphrase: &str,
) -> Result<LocalWallet, SignError> {
	LocalWallet::decrypt_keystore(path, passphrase).map_err(|_| SignError::DecryptionFailed)
}

/// Parse a raw private key, tolerating an optional 0x prefix.
pub(crate) fn wallet_from_hex(key: &str) -> Result<LocalWallet, SignError> {
	let hex_key = key.trim();
	let hex_key = hex_key.strip_prefix("0x").unwrap_or(hex_key);

	if hex_key.len() != 64 || !hex_key.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err(SignError::InvalidPrivateKeyFormat);
	}

	hex_key
		.parse::<LocalWallet>()
		.map_err(|_| SignError::InvalidPrivateKeyFormat)
}

/// Fill defaults from the chain, assemble an EIP-1559 transaction, sign
/// it locally, and return the raw bytes plus the derived sender.
pub(crate) async fn sign_transaction(
	wallet: LocalWallet,
	req: &TxRequest,
	chain: &ChainInfo,
	rpc: &dyn ChainRpc,
) -> Result<SignResult, SignError> {
	let wallet = wallet.with_chain_id(chain.chain_id);
	let from = wallet.address();

	let defaults = rpc.tx_defaults(from).await.map_err(SignError::Rpc)?;

	let tx = Eip1559TransactionRequest::new()
		.from(from)
		.to(req.to)
		.data(req.data.clone())
		.nonce(defaults.nonce)
		.max_fee_per_gas(defaults.max_fee_per_gas)
		.max_priority_fee_per_gas(defaults.max_priority_fee_per_gas)
		.chain_id(chain.chain_id);
	let mut tx: TypedTransaction = tx.into();

	let gas = match req.gas {
		Some(gas) => gas,
		None => rpc.estimate_gas(&tx).await.map_err(SignError::Rpc)?,
	};
	tx.set_gas(gas);

	let signature = wallet
		.sign_transaction(&tx)
		.await
		.map_err(|err| SignError::LocalSigning(err.to_string()))?;
	let raw_tx = tx.rlp_signed(&signature);

	Ok(SignResult::Signed { raw_tx, from })
}
