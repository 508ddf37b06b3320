pub mod browser;
pub mod key;

use std::fmt;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use ethers::types::{Address, Bytes, H256, U256};
use tracing::warn;

use crate::chain::ChainInfo;
use crate::error::SignError;
use crate::rpc::ChainRpc;

/// Environment variable holding a raw hex private key.  Read at most
/// once per invocation and cleared from the environment on read.
pub const KEY_ENV_VAR: &str = "AGENT_REGISTRY_PRIVATE_KEY";

/// A hex-encoded private key that stays out of Debug output.
#[derive(Clone)]
pub struct SecretKeyHex(String);

impl SecretKeyHex {
	pub fn new(key: String) -> Self {
		Self(key)
	}

	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for SecretKeyHex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretKeyHex(..)")
	}
}

/// How the signature for a transaction will be produced.
#[derive(Debug, Clone)]
pub enum WalletMethod {
	/// Encrypted Web3 Secret Storage key file on disk.
	Keystore { path: PathBuf },
	/// Browser wallet extension, via the local signing bridge.
	Browser,
	/// Raw private key taken from the environment or a prompt.
	PrivateKey { key: SecretKeyHex },
}

/// The call a registry command wants to land on-chain.  Assembled once
/// by the caller and treated as read-only by every strategy.
#[derive(Debug, Clone)]
pub struct TxRequest {
	pub to: Address,
	pub data: Bytes,
	pub gas: Option<U256>,
}

impl TxRequest {
	pub fn new(to: Address, data: Bytes) -> Self {
		Self {
			to,
			data,
			gas: None,
		}
	}

	pub fn with_gas(mut self, gas: U256) -> Self {
		self.gas = Some(gas);
		self
	}
}

/// Unified output of every signing strategy.
///
/// The broadcast engine branches on the variant: `Signed` still needs
/// to be submitted, `Sent` was already broadcast by the wallet
/// extension and only needs confirmation.
#[derive(Debug, Clone)]
pub enum SignResult {
	Signed { raw_tx: Bytes, from: Address },
	Sent { tx_hash: H256 },
}

/// Read the private key from the environment, clearing the variable so
/// the secret cannot be observed by anything that runs after us.
pub fn take_env_key() -> Option<SecretKeyHex> {
	let key = std::env::var(KEY_ENV_VAR).ok()?;
	std::env::remove_var(KEY_ENV_VAR);
	Some(SecretKeyHex::new(key))
}

/// Decide which signing strategy to use.
///
/// Precedence: explicit keystore path, explicit browser flag, private
/// key in the environment, interactive choice.  Exactly one method is
/// returned; non-interactive sessions must use one of the first three.
pub fn select_method(
	keystore: Option<&Path>,
	use_browser: bool,
) -> Result<WalletMethod, SignError> {
	if let Some(path) = keystore {
		return Ok(WalletMethod::Keystore {
			path: path.to_owned(),
		});
	}

	if use_browser {
		return Ok(WalletMethod::Browser);
	}

	if let Some(key) = take_env_key() {
		warn!(
			"using a raw private key from {KEY_ENV_VAR}; \
			 prefer --keystore or --browser for anything but throwaway keys"
		);
		return Ok(WalletMethod::PrivateKey { key });
	}

	if !std::io::stdin().is_terminal() {
		return Err(SignError::NoSigningMethod {
			env_var: KEY_ENV_VAR,
		});
	}

	prompt_method(
		&mut std::io::stdin().lock(),
		&mut std::io::stderr(),
	)
}

/// Interactive fallback: let the user pick a browser signature or type
/// a keystore path.
fn prompt_method(
	input: &mut impl BufRead,
	output: &mut impl Write,
) -> Result<WalletMethod, SignError> {
	let _ = writeln!(output, "No signing method configured.");
	let _ = writeln!(output, "  [1] sign in the browser (wallet extension)");
	let _ = writeln!(output, "  [2] use an encrypted keystore file");
	let _ = write!(output, "Choice [1/2]: ");
	let _ = output.flush();

	let mut line = String::new();
	input
		.read_line(&mut line)
		.map_err(SignError::PassphraseRead)?;

	match line.trim() {
		"1" | "" => Ok(WalletMethod::Browser),
		"2" => {
			let _ = write!(output, "Keystore path: ");
			let _ = output.flush();
			let mut path = String::new();
			input
				.read_line(&mut path)
				.map_err(SignError::PassphraseRead)?;
			let path = path.trim();
			if path.is_empty() {
				return Err(SignError::NoSigningMethod {
					env_var: KEY_ENV_VAR,
				});
			}
			Ok(WalletMethod::Keystore {
				path: PathBuf::from(path),
			})
		}
		_ => Err(SignError::NoSigningMethod {
			env_var: KEY_ENV_VAR,
		}),
	}
}

/// Produce a signature for `req` using the chosen method.
///
/// `display_uri` is surfaced on the browser signing page so the user
/// can see which agent URI the transaction is about; key-based
/// strategies ignore it.
pub async fn sign(
	method: WalletMethod,
	req: &TxRequest,
	chain: &ChainInfo,
	rpc: &dyn ChainRpc,
	display_uri: Option<&str>,
) -> Result<SignResult, SignError> {
	match method {
		WalletMethod::Keystore { path } => key::sign_with_keystore(&path, req, chain, rpc).await,
		WalletMethod::PrivateKey { key } => {
			key::sign_with_private_key(&key, req, chain, rpc).await
		}
		WalletMethod::Browser => {
			browser::BrowserBridge::new()
				.sign(req, chain, display_uri)
				.await
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	// Single test for everything touching KEY_ENV_VAR: the test harness
	// runs tests concurrently and the process environment is shared.
	#[test]
	fn selection_precedence_and_one_shot_env_key() {
		std::env::set_var(KEY_ENV_VAR, "aa".repeat(32));

		// Explicit keystore wins and leaves the env var untouched.
		let method = select_method(Some(Path::new("/tmp/key.json")), true).unwrap();
		assert!(matches!(method, WalletMethod::Keystore { .. }));
		assert!(std::env::var(KEY_ENV_VAR).is_ok());

		// Browser flag wins over the env key and also leaves it alone.
		let method = select_method(None, true).unwrap();
		assert!(matches!(method, WalletMethod::Browser));
		assert!(std::env::var(KEY_ENV_VAR).is_ok());

		// With nothing explicit, the env key is used and consumed.
		let method = select_method(None, false).unwrap();
		assert!(matches!(method, WalletMethod::PrivateKey { .. }));
		assert!(std::env::var(KEY_ENV_VAR).is_err(), "secret must be cleared");
		assert!(take_env_key().is_none(), "second take must find nothing");
	}

	#[test]
	fn secret_key_debug_is_redacted() {
		let key = SecretKeyHex::new("deadbeef".into());
		assert_eq!(format!("{key:?}"), "SecretKeyHex(..)");
	}

	#[test]
	fn prompt_accepts_browser_choice() {
		let mut input = std::io::Cursor::new(b"1\n".to_vec());
		let mut output = Vec::new();
		let method = prompt_method(&mut input, &mut output).unwrap();
		assert!(matches!(method, WalletMethod::Browser));
	}

	#[test]
	fn prompt_accepts_keystore_path() {
		let mut input = std::io::Cursor::new(b"2\n/home/me/key.json\n".to_vec());
		let mut output = Vec::new();
		let method = prompt_method(&mut input, &mut output).unwrap();
		match method {
			WalletMethod::Keystore { path } => {
				assert_eq!(path, PathBuf::from("/home/me/key.json"));
			}
			other => panic!("expected keystore, got {other:?}"),
		}
	}

	#[test]
	fn prompt_rejects_garbage_choice() {
		let mut input = std::io::Cursor::new(b"ledger\n".to_vec());
		let mut output = Vec::new();
		let err = prompt_method(&mut input, &mut output).unwrap_err();
		assert!(matches!(err, SignError::NoSigningMethod { .. }));
	}
}
