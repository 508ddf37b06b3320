use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while resolving a signing strategy or producing a
/// signature.  Each variant corresponds to one failure the caller can
/// act on (fix a flag, re-enter a passphrase, re-run the bridge).
#[derive(Error, Debug)]
pub enum SignError {
	#[error(
		"no signing method available: pass --keystore <path> or --browser, \
		 or set {env_var} (non-interactive sessions cannot be prompted)"
	)]
	NoSigningMethod { env_var: &'static str },

	#[error("--rpc-url cannot be combined with browser signing; the wallet extension uses its own connection")]
	RpcOverrideWithBrowser,

	#[error("keystore file not found: {}", .0.display())]
	KeystoreNotFound(PathBuf),

	#[error("{} is not a recognized encrypted keystore file (expected Web3 Secret Storage JSON)", .0.display())]
	InvalidKeystoreFormat(PathBuf),

	#[error("keystore decryption failed (wrong passphrase?)")]
	DecryptionFailed,

	#[error("invalid private key: expected 64 hex characters, with or without a 0x prefix")]
	InvalidPrivateKeyFormat,

	#[error("no response from the browser wallet within {0} seconds")]
	BridgeTimeout(u64),

	#[error("the browser wallet reported an error: {0}")]
	WalletReportedError(String),

	#[error("the signing page sent a callback this tool could not parse")]
	MalformedCallback,

	#[error("the browser wallet returned a malformed transaction hash: {0:?}")]
	InvalidTxHashFromWallet(String),

	#[error("could not read the signing passphrase: {0}")]
	PassphraseRead(#[source] std::io::Error),

	#[error("local signing failed: {0}")]
	LocalSigning(String),

	#[error("failed to start the local signing bridge: {0}")]
	BridgeIo(#[source] std::io::Error),

	#[error("chain rpc request failed: {0}")]
	Rpc(#[source] anyhow::Error),
}

/// Errors produced while broadcasting a signed transaction or waiting
/// for its confirmation.  Both are terminal: the engine never retries,
/// the caller may re-run the whole pipeline.
#[derive(Error, Debug)]
pub enum BroadcastError {
	#[error("the network rejected the transaction: {0}")]
	BroadcastRejected(String),

	#[error("failed while waiting for confirmation: {0}")]
	ConfirmationFailed(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_name_the_remedy() {
		let err = SignError::NoSigningMethod {
			env_var: "AGENT_REGISTRY_PRIVATE_KEY",
		};
		let msg = err.to_string();
		assert!(msg.contains("--keystore"));
		assert!(msg.contains("--browser"));
		assert!(msg.contains("AGENT_REGISTRY_PRIVATE_KEY"));
	}

	#[test]
	fn broadcast_errors_carry_the_reason() {
		let err = BroadcastError::BroadcastRejected("insufficient funds".into());
		assert!(err.to_string().contains("insufficient funds"));
	}
}
