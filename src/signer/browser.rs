//! Browser signing bridge.
//!
//! Signs (and broadcasts) a transaction through the user's browser
//! wallet extension: a short-lived HTTP server on a loopback port
//! serves a signing page, the page drives the extension and POSTs the
//! resulting transaction hash back, and the CLI resumes with a
//! [`SignResult::Sent`].
//!
//! One session exists per invocation.  The first callback to arrive
//! settles the session; later callbacks (retries, duplicate clicks)
//! are acknowledged but discarded.  The whole wait is raced against a
//! five-minute timer, and the listener is torn down on every exit
//! path before control returns to the caller.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ethers::types::H256;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chain::ChainInfo;
use crate::error::SignError;
use crate::signer::{SignResult, TxRequest};

/// How long the bridge waits for the wallet before giving up.
const BRIDGE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Callback bodies larger than this are rejected outright.
const MAX_CALLBACK_BODY: usize = 64 * 1024;

pub struct BrowserBridge {
	timeout: Duration,
}

impl Default for BrowserBridge {
	fn default() -> Self {
		Self::new()
	}
}

impl BrowserBridge {
	pub fn new() -> Self {
		Self {
			timeout: BRIDGE_TIMEOUT,
		}
	}

	/// Override the wallet-response timeout.  CLI callers keep the
	/// five-minute default.
	pub fn with_timeout(timeout: Duration) -> Self {
		Self { timeout }
	}

	/// Run one full signing session: serve the page, open the browser,
	/// wait for the wallet's callback or the timeout.
	pub async fn sign(
		&self,
		req: &TxRequest,
		chain: &ChainInfo,
		display_uri: Option<&str>,
	) -> Result<SignResult, SignError> {
		let session = start_session(req, chain, display_uri).await?;
		let url = format!("http://{}/", session.addr);

		println!("Sign the transaction in your browser wallet.");
		println!("If no window opened, visit: {url}");
		if let Err(err) = opener::open_browser(&url) {
			warn!("could not open a browser automatically: {err}");
		}

		self.wait(session).await
	}

	/// Race the session's callback against the timeout, then tear the
	/// server down unconditionally before interpreting the outcome.
	async fn wait(&self, session: Session) -> Result<SignResult, SignError> {
		let Session {
			server, result_rx, ..
		} = session;

		let outcome = tokio::select! {
			callback = result_rx => callback.ok(),
			_ = tokio::time::sleep(self.timeout) => None,
		};

		// Teardown runs on every path: abort the accept loop and wait
		// for it to finish so the port is released before we return.
		server.abort();
		let _ = server.await;

		match outcome {
			None => Err(SignError::BridgeTimeout(self.timeout.as_secs())),
			Some(CallbackOutcome::Malformed) => Err(SignError::MalformedCallback),
			Some(CallbackOutcome::WalletError(message)) => {
				Err(SignError::WalletReportedError(message))
			}
			Some(CallbackOutcome::TxHash(hash)) => {
				let tx_hash = parse_tx_hash(&hash)?;
				Ok(SignResult::Sent { tx_hash })
			}
		}
	}
}

/// One live bridge session: the bound server plus the channel that
/// will carry the first callback.
struct Session {
	addr: SocketAddr,
	#[cfg_attr(not(test), allow(dead_code))]
	token: String,
	server: JoinHandle<()>,
	result_rx: oneshot::Receiver<CallbackOutcome>,
}

/// What the signing page reported, before hash-shape validation.
#[derive(Debug)]
enum CallbackOutcome {
	TxHash(String),
	WalletError(String),
	Malformed,
}

/// Shared with every request handler for the session's lifetime.  The
/// sender slot is the settle-once guard: taking it claims the right to
/// deliver the result, and an empty slot marks the session settled.
struct SessionState {
	page: String,
	result_path: String,
	slot: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
}

/// Bind the loopback listener, mint the session token, and start the
/// accept loop.
async fn start_session(
	req: &TxRequest,
	chain: &ChainInfo,
	display_uri: Option<&str>,
) -> Result<Session, SignError> {
	let listener = TcpListener::bind(("127.0.0.1", 0))
		.await
		.map_err(SignError::BridgeIo)?;
	let addr = listener.local_addr().map_err(SignError::BridgeIo)?;

	let token = session_token();
	let (result_tx, result_rx) = oneshot::channel();
	let state = Arc::new(SessionState {
		page: render_page(req, chain, display_uri, &token),
		result_path: format!("/result/{token}"),
		slot: Mutex::new(Some(result_tx)),
	});

	let server = tokio::spawn(serve(listener, state));
	debug!(%addr, "signing bridge listening");

	Ok(Session {
		addr,
		token,
		server,
		result_rx,
	})
}

/// Accept loop.  Runs until the session aborts it; each connection is
/// handled on its own task so a stalled client cannot block the
/// wallet's callback.
async fn serve(listener: TcpListener, state: Arc<SessionState>) {
	loop {
		match listener.accept().await {
			Ok((stream, _)) => {
				let state = Arc::clone(&state);
				tokio::spawn(async move {
					if let Err(err) = handle_connection(stream, state).await {
						debug!("bridge connection error: {err}");
					}
				});
			}
			Err(err) => debug!("bridge accept error: {err}"),
		}
	}
}

/// Minimal HTTP/1.1 exchange: request line, headers (only
/// Content-Length matters), optional body, one response, close.
async fn handle_connection(
	stream: TcpStream,
	state: Arc<SessionState>,
) -> std::io::Result<()> {
	let (read_half, mut write_half) = stream.into_split();
	let mut reader = BufReader::new(read_half);

	let mut request_line = String::new();
	reader.read_line(&mut request_line).await?;
	let mut parts = request_line.split_whitespace();
	let method = parts.next().unwrap_or_default().to_owned();
	let path = parts.next().unwrap_or_default().to_owned();

	let mut content_length = 0usize;
	loop {
		let mut line = String::new();
		if reader.read_line(&mut line).await? == 0 {
			break;
		}
		let line = line.trim_end();
		if line.is_empty() {
			break;
		}
		let lower = line.to_ascii_lowercase();
		if let Some(value) = lower.strip_prefix("content-length:") {
			content_length = value.trim().parse().unwrap_or(0);
		}
	}

	let (status, content_type, payload) = if content_length > MAX_CALLBACK_BODY {
		(
			"400 Bad Request",
			"application/json",
			r#"{"error":"body too large"}"#.to_owned(),
		)
	} else {
		let mut body = vec![0u8; content_length];
		reader.read_exact(&mut body).await?;
		route(&method, &path, &body, &state)
	};

	let response = format!(
		"HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
		payload.len()
	);
	write_half.write_all(response.as_bytes()).await?;
	write_half.shutdown().await
}

fn route(
	method: &str,
	path: &str,
	body: &[u8],
	state: &SessionState,
) -> (&'static str, &'static str, String) {
	match (method, path) {
		("GET", "/") => ("200 OK", "text/html; charset=utf-8", state.page.clone()),
		("POST", p) if p == state.result_path => handle_result(state, body),
		_ => (
			"404 Not Found",
			"application/json",
			r#"{"error":"not found"}"#.to_owned(),
		),
	}
}

/// The only route that can settle the session.  Holding the lock
/// across parsing keeps "check settled" and "claim the sender" atomic
/// under concurrent callbacks.
fn handle_result(state: &SessionState, body: &[u8]) -> (&'static str, &'static str, String) {
	let mut slot = state.slot.lock().expect("bridge session lock poisoned");
	let Some(sender) = slot.take() else {
		// Already settled: acknowledge so the page does not retry, but
		// discard the payload without re-parsing it.
		return (
			"200 OK",
			"application/json",
			r#"{"ok":true,"ignored":true}"#.to_owned(),
		);
	};

	let (status, payload, outcome) = match parse_callback(body) {
		Some(outcome) => ("200 OK", r#"{"ok":true}"#.to_owned(), outcome),
		None => (
			"400 Bad Request",
			r#"{"error":"expected a JSON body with a txHash or error field"}"#.to_owned(),
			CallbackOutcome::Malformed,
		),
	};

	// The receiver may already be gone if the timeout won the race; the
	// late result is dropped, which is exactly the contract.
	let _ = sender.send(outcome);
	(status, "application/json", payload)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackBody {
	tx_hash: Option<String>,
	error: Option<String>,
}

fn parse_callback(body: &[u8]) -> Option<CallbackOutcome> {
	let callback: CallbackBody = serde_json::from_slice(body).ok()?;
	match (callback.tx_hash, callback.error) {
		(Some(hash), _) => Some(CallbackOutcome::TxHash(hash)),
		(None, Some(message)) => Some(CallbackOutcome::WalletError(message)),
		(None, None) => None,
	}
}

/// 128-bit random token; the result path is unguessable even though
/// the port is world-visible on the local machine.
fn session_token() -> String {
	let bytes: [u8; 16] = rand::random();
	hex::encode(bytes)
}

/// Validate the wallet-reported hash: 0x prefix plus 64 hex chars.
fn parse_tx_hash(hash: &str) -> Result<H256, SignError> {
	let invalid = || SignError::InvalidTxHashFromWallet(hash.to_owned());

	let digits = hash.strip_prefix("0x").ok_or_else(invalid)?;
	if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err(invalid());
	}
	hash.parse::<H256>().map_err(|_| invalid())
}

// -- Signing page --

/// Self-contained page served at `/`.  Talks to the injected EIP-1193
/// provider (`window.ethereum`) and reports back over the session's
/// result path.
const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Agent Registry &mdash; sign transaction</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 3rem auto; padding: 0 1rem; color: #222; }
  h1 { font-size: 1.3rem; }
  dt { font-weight: 600; margin-top: .7rem; }
  dd { margin: 0; word-break: break-all; font-family: ui-monospace, monospace; font-size: .85rem; }
  button { font-size: 1rem; padding: .5rem 1.4rem; margin-top: 1.2rem; cursor: pointer; }
  #status { margin-top: 1rem; font-weight: 600; }
  .err { color: #b00020; }
</style>
</head>
<body>
<h1>Sign registry transaction</h1>
<p>Review the call below, then approve it in your wallet extension.
You can close this tab once the status reads &ldquo;done&rdquo;.</p>
<dl>
  <dt>Agent URI</dt><dd>__URI_LABEL__</dd>
  <dt>Network</dt><dd>__CHAIN_NAME__ (chain id __CHAIN_ID_DEC__)</dd>
  <dt>Contract</dt><dd>__TO__</dd>
  <dt>Call data</dt><dd>__DATA__</dd>
</dl>
<button id="sign">Sign with wallet</button>
<div id="status"></div>
<script>
const status = document.getElementById("status");
const button = document.getElementById("sign");

async function report(body) {
  await fetch("/result/__TOKEN__", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(body),
  });
}

button.addEventListener("click", async () => {
  button.disabled = true;
  try {
    if (!window.ethereum) {
      throw new Error("no wallet extension found in this browser");
    }
    status.textContent = "waiting for wallet...";
    const [from] = await window.ethereum.request({ method: "eth_requestAccounts" });
    await window.ethereum.request({
      method: "wallet_switchEthereumChain",
      params: [{ chainId: "__CHAIN_ID_HEX__" }],
    });
    const tx = { from: from, to: "__TO__", data: "__DATA__" };
    const gas = __GAS_JSON__;
    if (gas) { tx.gas = gas; }
    const txHash = await window.ethereum.request({
      method: "eth_sendTransaction",
      params: [tx],
    });
    await report({ txHash: txHash });
    status.textContent = "done - transaction " + txHash + " sent. Back to your terminal.";
  } catch (err) {
    const message = err && err.message ? err.message : String(err);
    await report({ error: message });
    status.textContent = "failed: " + message;
    status.className = "err";
  }
});
</script>
</body>
</html>
"#;

fn render_page(
	req: &TxRequest,
	chain: &ChainInfo,
	display_uri: Option<&str>,
	token: &str,
) -> String {
	let gas_json = match req.gas {
		Some(gas) => format!("\"0x{gas:x}\""),
		None => "null".to_owned(),
	};

	PAGE_TEMPLATE
		.replace("__URI_LABEL__", &escape_html(display_uri.unwrap_or("-")))
		.replace("__CHAIN_NAME__", chain.name)
		.replace("__CHAIN_ID_DEC__", &chain.chain_id.to_string())
		.replace("__CHAIN_ID_HEX__", &format!("0x{:x}", chain.chain_id))
		.replace("__TO__", &format!("{:#x}", req.to))
		.replace("__DATA__", &format!("0x{}", hex::encode(req.data.as_ref())))
		.replace("__GAS_JSON__", &gas_json)
		.replace("__TOKEN__", token)
}

fn escape_html(text: &str) -> String {
	text.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
		.replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
	use ethers::types::{Address, Bytes};
	use serde_json::{json, Value};

	use super::*;
	use crate::chain::CHAINS;

	fn request() -> TxRequest {
		TxRequest::new(
			Address::from_low_u64_be(0x8004),
			Bytes::from(vec![0x12, 0x34]),
		)
	}

	async fn started_session() -> Session {
		start_session(
			&request(),
			CHAINS.for_network("sepolia"),
			Some("https://agent.example/card.json"),
		)
		.await
		.unwrap()
	}

	fn result_url(session: &Session) -> String {
		format!("http://{}/result/{}", session.addr, session.token)
	}

	async fn post(url: &str, body: &str) -> (u16, Value) {
		let resp = reqwest::Client::new()
			.post(url)
			.header("content-type", "application/json")
			.body(body.to_owned())
			.send()
			.await
			.unwrap();
		let status = resp.status().as_u16();
		(status, resp.json().await.unwrap())
	}

	#[tokio::test]
	async fn serves_the_signing_page() {
		let session = started_session().await;
		let url = format!("http://{}/", session.addr);

		let page = reqwest::get(&url).await.unwrap().text().await.unwrap();
		assert!(page.contains("https://agent.example/card.json"));
		assert!(page.contains("sepolia"));
		assert!(page.contains(&session.token));

		session.server.abort();
	}

	#[tokio::test]
	async fn unknown_paths_are_not_found() {
		let session = started_session().await;
		let url = format!("http://{}/result/wrong-token", session.addr);

		let (status, _) = post(&url, r#"{"txHash":"0x00"}"#).await;
		assert_eq!(status, 404);

		let resp = reqwest::get(format!("http://{}/other", session.addr))
			.await
			.unwrap();
		assert_eq!(resp.status().as_u16(), 404);

		session.server.abort();
	}

	#[tokio::test]
	async fn first_callback_wins_and_duplicates_are_ignored() {
		let bridge = BrowserBridge::with_timeout(Duration::from_secs(30));
		let session = started_session().await;
		let url = result_url(&session);

		let first_hash = format!("0x{}", "11".repeat(32));
		let (status, body) = post(&url, &json!({ "txHash": &first_hash }).to_string()).await;
		assert_eq!(status, 200);
		assert_eq!(body["ok"], json!(true));
		assert!(body.get("ignored").is_none());

		// A retry with a different hash is acknowledged but discarded.
		let (status, body) =
			post(&url, &json!({ "txHash": format!("0x{}", "22".repeat(32)) }).to_string()).await;
		assert_eq!(status, 200);
		assert_eq!(body["ignored"], json!(true));

		// So is garbage after settlement: it is not even parsed.
		let (status, body) = post(&url, "not json at all").await;
		assert_eq!(status, 200);
		assert_eq!(body["ignored"], json!(true));

		match bridge.wait(session).await.unwrap() {
			SignResult::Sent { tx_hash } => {
				assert_eq!(tx_hash, first_hash.parse::<H256>().unwrap());
			}
			other => panic!("expected Sent, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn wallet_error_settles_the_session() {
		let bridge = BrowserBridge::with_timeout(Duration::from_secs(30));
		let session = started_session().await;
		let url = result_url(&session);

		let (status, _) = post(&url, r#"{"error":"user rejected the request"}"#).await;
		assert_eq!(status, 200);

		let err = bridge.wait(session).await.unwrap_err();
		match err {
			SignError::WalletReportedError(message) => {
				assert_eq!(message, "user rejected the request");
			}
			other => panic!("expected WalletReportedError, got {other}"),
		}
	}

	#[tokio::test]
	async fn malformed_callback_gets_400_and_settles() {
		let bridge = BrowserBridge::with_timeout(Duration::from_secs(30));
		let session = started_session().await;
		let url = result_url(&session);

		let (status, body) = post(&url, "{\"neither\":1}").await;
		assert_eq!(status, 400);
		assert!(body["error"].as_str().is_some());

		// Second malformed POST: ignored, not re-parsed, not another 400.
		let (status, body) = post(&url, "also not json").await;
		assert_eq!(status, 200);
		assert_eq!(body["ignored"], json!(true));

		let err = bridge.wait(session).await.unwrap_err();
		assert!(matches!(err, SignError::MalformedCallback));
	}

	#[tokio::test]
	async fn invalid_hash_shape_is_rejected() {
		let not_hex = format!("0x{}", "zz".repeat(32));
		let missing_prefix = "11".repeat(32);

		for bad in ["11111111", "0x1234", not_hex.as_str(), missing_prefix.as_str()] {
			let bridge = BrowserBridge::with_timeout(Duration::from_secs(30));
			let session = started_session().await;
			let url = result_url(&session);

			post(&url, &json!({ "txHash": bad }).to_string()).await;
			let err = bridge.wait(session).await.unwrap_err();
			assert!(
				matches!(err, SignError::InvalidTxHashFromWallet(_)),
				"hash {bad:?} should be rejected"
			);
		}
	}

	#[tokio::test]
	async fn timeout_resolves_and_releases_the_port() {
		let bridge = BrowserBridge::with_timeout(Duration::from_millis(150));
		let session = started_session().await;
		let addr = session.addr;

		let err = bridge.wait(session).await.unwrap_err();
		assert!(matches!(err, SignError::BridgeTimeout(_)));

		// The listener is gone: a fresh connection must be refused.
		assert!(TcpStream::connect(addr).await.is_err());
	}

	#[tokio::test]
	async fn callback_after_timeout_is_dropped() {
		let bridge = BrowserBridge::with_timeout(Duration::from_millis(100));
		let session = started_session().await;
		let url = result_url(&session);

		let err = bridge.wait(session).await.unwrap_err();
		assert!(matches!(err, SignError::BridgeTimeout(_)));

		// The server is down, so the late callback cannot even connect;
		// nothing can reopen the settled session.
		assert!(reqwest::Client::new()
			.post(&url)
			.body(r#"{"txHash":"0x00"}"#)
			.send()
			.await
			.is_err());
	}

	#[test]
	fn tokens_are_long_and_random() {
		let a = session_token();
		let b = session_token();
		assert_eq!(a.len(), 32);
		assert_ne!(a, b);
	}

	#[test]
	fn page_escapes_display_metadata() {
		let page = render_page(
			&request(),
			CHAINS.for_network("sepolia"),
			Some("<script>alert(1)</script>"),
			"tok",
		);
		assert!(!page.contains("<script>alert(1)</script>"));
		assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
	}
}
