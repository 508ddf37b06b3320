//! Calldata encoding for the registry contracts.
//!
//! Each helper produces the full call payload (4-byte selector plus
//! ABI-encoded arguments) for one registry operation.  Nothing here
//! touches the network; the pipeline decides how the call gets signed
//! and submitted.

use ethers::abi::{encode, Token};
use ethers::types::{Bytes, U256};
use ethers::utils::id;

/// `register(string agentUri)` on the identity registry.
pub fn register_call(agent_uri: &str) -> Bytes {
	call("register(string)", &[Token::String(agent_uri.to_owned())])
}

/// `updateUri(uint256 agentId, string newUri)` on the identity registry.
pub fn update_uri_call(agent_id: U256, new_uri: &str) -> Bytes {
	call(
		"updateUri(uint256,string)",
		&[Token::Uint(agent_id), Token::String(new_uri.to_owned())],
	)
}

/// `giveFeedback(uint256 agentId, uint8 score, string feedbackUri)` on the
/// reputation registry.  An absent feedback URI is encoded as the empty
/// string, which the contract treats as "score only".
pub fn give_feedback_call(agent_id: U256, score: u8, feedback_uri: Option<&str>) -> Bytes {
	call(
		"giveFeedback(uint256,uint8,string)",
		&[
			Token::Uint(agent_id),
			Token::Uint(U256::from(score)),
			Token::String(feedback_uri.unwrap_or_default().to_owned()),
		],
	)
}

fn call(signature: &str, args: &[Token]) -> Bytes {
	let mut data = id(signature).to_vec();
	data.extend_from_slice(&encode(args));
	data.into()
}
