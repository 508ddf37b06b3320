use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::chain::CHAINS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
	pub default: String,
	pub sepolia_rpc: String,
	pub mainnet_rpc: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			network: NetworkConfig {
				default: "sepolia".into(),
				sepolia_rpc: CHAINS.for_network("sepolia").rpc_url.into(),
				mainnet_rpc: CHAINS.for_network("mainnet").rpc_url.into(),
			},
		}
	}
}

impl Config {
	/// Directory where CLI state is stored (~/.agent-registry/).
	pub fn dir() -> PathBuf {
		dirs::home_dir()
			.expect("could not determine home directory")
			.join(".agent-registry")
	}

	/// Path to the config file.
	pub fn path() -> PathBuf {
		Self::dir().join("config.toml")
	}

	/// Directory where confirmed-transaction artifacts are written.
	pub fn receipts_dir() -> PathBuf {
		Self::dir().join("receipts")
	}

	/// Load config from disk.  On first run the defaults are written
	/// out so the user has a file to edit.
	pub fn load() -> anyhow::Result<Self> {
		let path = Self::path();
		if path.exists() {
			let content = std::fs::read_to_string(&path)?;
			Ok(toml::from_str(&content)?)
		} else {
			let config = Self::default();
			config.save()?;
			Ok(config)
		}
	}

	/// Persist the current config to disk, creating the directory if needed.
	pub fn save(&self) -> anyhow::Result<()> {
		let path = Self::path();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&path, toml::to_string_pretty(self)?)?;
		Ok(())
	}

	/// Return the RPC URL for the given network name.
	pub fn rpc_url(&self, network: &str) -> &str {
		match network {
			"mainnet" => &self.network.mainnet_rpc,
			_ => &self.network.sepolia_rpc,
		}
	}
}
