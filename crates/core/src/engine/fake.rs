//! In-memory engine for exercising the coordinator without a real runtime.
//!
//! # Example
//!
//! ```ignore
//! let (engine, controller) = FakeEngine::new();
//! let session = Session::start(Arc::new(engine), SessionOptions::default()).await?;
//!
//! controller.emit_state("NeedsLogin");
//! tokio::time::sleep(Duration::from_millis(1)).await;
//! assert_eq!(controller.login_count(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use ipn_protocol::FetchResponse;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::oneshot;

use super::{BoxFuture, Callbacks, Engine};
use crate::error::{Error, Result};

/// A request the fake engine received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
	Run,
	Login,
	NetCheck,
	Fetch(String),
	StartHttpServer(u16),
}

enum NetCheckReply {
	Ready(Result<String>),
	Pending(oneshot::Receiver<Result<String>>),
}

enum HttpServerReply {
	Fail(String),
	Pending(oneshot::Receiver<Result<Value>>),
}

#[derive(Default)]
struct Shared {
	callbacks: Mutex<Option<Callbacks>>,
	calls: Mutex<Vec<EngineCall>>,
	net_checks: Mutex<VecDeque<NetCheckReply>>,
	logins: Mutex<VecDeque<oneshot::Receiver<Result<()>>>>,
	http_servers: Mutex<VecDeque<HttpServerReply>>,
	fetches: Mutex<VecDeque<Result<FetchResponse>>>,
}

impl Shared {
	fn record(&self, call: EngineCall) {
		self.calls.lock().push(call);
	}
}

/// Engine double that records requests and replays scripted answers.
#[derive(Clone)]
pub struct FakeEngine {
	shared: Arc<Shared>,
}

/// Drives a [`FakeEngine`]: emits notifications and scripts responses.
#[derive(Clone)]
pub struct FakeEngineController {
	shared: Arc<Shared>,
}

impl FakeEngine {
	/// Creates the engine and its controller.
	pub fn new() -> (Self, FakeEngineController) {
		let shared = Arc::new(Shared::default());
		(
			Self { shared: Arc::clone(&shared) },
			FakeEngineController { shared },
		)
	}
}

impl Engine for FakeEngine {
	fn run(&self, callbacks: Callbacks) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let mut slot = self.shared.callbacks.lock();
			if slot.is_some() {
				return Err(Error::AlreadyAttached);
			}
			callbacks.notify_state("NoState");
			*slot = Some(callbacks);
			drop(slot);
			self.shared.record(EngineCall::Run);
			Ok(())
		})
	}

	fn login(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.shared.record(EngineCall::Login);
			let held = self.shared.logins.lock().pop_front();
			match held {
				Some(rx) => rx.await.map_err(|_| Error::ChannelClosed)?,
				None => Ok(()),
			}
		})
	}

	fn net_check(&self) -> BoxFuture<'_, Result<String>> {
		Box::pin(async move {
			self.shared.record(EngineCall::NetCheck);
			let reply = self.shared.net_checks.lock().pop_front();
			match reply {
				Some(NetCheckReply::Ready(result)) => result,
				Some(NetCheckReply::Pending(rx)) => rx.await.map_err(|_| Error::ChannelClosed)?,
				None => Err(Error::Engine("no net check response scripted".to_string())),
			}
		})
	}

	fn fetch(&self, url: String) -> BoxFuture<'_, Result<FetchResponse>> {
		Box::pin(async move {
			self.shared.record(EngineCall::Fetch(url));
			self.shared.fetches.lock().pop_front().unwrap_or_else(|| {
				Ok(FetchResponse {
					status: 200,
					status_text: "OK".to_string(),
					body: String::new(),
				})
			})
		})
	}

	fn start_http_server(&self, port: u16) -> BoxFuture<'_, Result<Value>> {
		Box::pin(async move {
			self.shared.record(EngineCall::StartHttpServer(port));
			let reply = self.shared.http_servers.lock().pop_front();
			match reply {
				Some(HttpServerReply::Fail(message)) => Err(Error::Engine(message)),
				Some(HttpServerReply::Pending(rx)) => rx.await.map_err(|_| Error::ChannelClosed)?,
				None => Ok(json!({ "listening": port })),
			}
		})
	}
}

impl FakeEngineController {
	fn with_callbacks(&self, f: impl FnOnce(&Callbacks) -> bool) -> bool {
		self.shared.callbacks.lock().as_ref().is_some_and(f)
	}

	/// Emits a state notification. Returns `false` if nothing is attached.
	pub fn emit_state(&self, state: &str) -> bool {
		self.with_callbacks(|cb| cb.notify_state(state))
	}

	pub fn emit_net_map(&self, raw: &str) -> bool {
		self.with_callbacks(|cb| cb.notify_net_map(raw))
	}

	pub fn emit_browse_to_url(&self, url: &str) -> bool {
		self.with_callbacks(|cb| cb.notify_browse_to_url(url))
	}

	pub fn emit_panic(&self, message: &str) -> bool {
		self.with_callbacks(|cb| cb.notify_panic_recover(message))
	}

	/// Drops the notification channels, as an engine shutdown would.
	pub fn shut_down(&self) {
		self.shared.callbacks.lock().take();
	}

	/// Queues the answer to the next `netCheck`.
	pub fn push_net_check(&self, result: Result<String>) {
		self.shared.net_checks.lock().push_back(NetCheckReply::Ready(result));
	}

	/// Queues a `netCheck` answer that is delivered through the returned sender.
	pub fn hold_net_check(&self) -> oneshot::Sender<Result<String>> {
		let (tx, rx) = oneshot::channel();
		self.shared.net_checks.lock().push_back(NetCheckReply::Pending(rx));
		tx
	}

	/// Makes the next `startHTTPServer` fail with `message`.
	pub fn fail_next_http_server(&self, message: &str) {
		self.shared.http_servers.lock().push_back(HttpServerReply::Fail(message.to_string()));
	}

	/// Keeps the next `startHTTPServer` unanswered until the returned sender fires.
	pub fn hold_http_server(&self) -> oneshot::Sender<Result<Value>> {
		let (tx, rx) = oneshot::channel();
		self.shared.http_servers.lock().push_back(HttpServerReply::Pending(rx));
		tx
	}

	/// Keeps the next `login` unanswered until the returned sender fires.
	pub fn hold_login(&self) -> oneshot::Sender<Result<()>> {
		let (tx, rx) = oneshot::channel();
		self.shared.logins.lock().push_back(rx);
		tx
	}

	pub fn push_fetch(&self, result: Result<FetchResponse>) {
		self.shared.fetches.lock().push_back(result);
	}

	/// All requests received so far, in order.
	pub fn calls(&self) -> Vec<EngineCall> {
		self.shared.calls.lock().clone()
	}

	pub fn login_count(&self) -> usize {
		self.count(|call| matches!(call, EngineCall::Login))
	}

	pub fn http_server_starts(&self) -> usize {
		self.count(|call| matches!(call, EngineCall::StartHttpServer(_)))
	}

	fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
		self.shared.calls.lock().iter().filter(|call| pred(call)).count()
	}
}
