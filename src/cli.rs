use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
	name = "agent-registry",
	about = "Register agents and post feedback on EVM agent registries.",
	version
)]
pub struct Cli {
	/// Network to connect to.
	#[arg(long, default_value = "sepolia", global = true)]
	pub network: Network,

	/// Override RPC endpoint URL.
	#[arg(long, global = true)]
	pub rpc_url: Option<String>,

	/// Sign with an encrypted keystore file at this path.
	#[arg(long, global = true)]
	pub keystore: Option<PathBuf>,

	/// Sign with a browser wallet extension.
	#[arg(long, global = true)]
	pub browser: bool,

	/// Gas limit override (skips estimation).
	#[arg(long, global = true)]
	pub gas_limit: Option<u64>,

	/// Encode and display the call without signing or broadcasting.
	#[arg(long, global = true)]
	pub dry_run: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Clone, ValueEnum)]
pub enum Network {
	Sepolia,
	Mainnet,
}

impl Network {
	pub fn as_str(&self) -> &str {
		match self {
			Self::Sepolia => "sepolia",
			Self::Mainnet => "mainnet",
		}
	}
}

#[derive(Subcommand)]
pub enum Command {
	/// Register a new agent with its URI.
	Register {
		/// URI of the agent card (https:// or ipfs://).
		#[arg(long)]
		uri: String,
	},

	/// Point an existing agent at a new URI.
	UpdateUri {
		/// Agent ID assigned at registration.
		agent_id: u64,

		/// Replacement URI for the agent card.
		#[arg(long)]
		uri: String,
	},

	/// Post feedback for an agent on the reputation registry.
	GiveFeedback {
		/// Agent ID to rate.
		agent_id: u64,

		/// Score from 0 to 100.
		#[arg(long)]
		score: u8,

		/// Optional URI with detailed feedback.
		#[arg(long)]
		uri: Option<String>,
	},

	/// Check transaction status on-chain.
	Tx {
		#[command(subcommand)]
		command: TxCommand,
	},
}

// -- Tx subcommands --

#[derive(Subcommand)]
pub enum TxCommand {
	/// Check confirmation status of a transaction.
	Status {
		/// Transaction hash (0x-prefixed).
		tx_hash: String,
	},
}
