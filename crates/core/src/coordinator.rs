//! Session lifecycle coordinator.
//!
//! A single task owns the [`SessionCoordinator`] and feeds it notifications
//! one at a time, so handlers mutate state without locks. After every change
//! the coordinator publishes a [`SessionSnapshot`] on a watch channel.
//!
//! # Policy
//!
//! - Entering `NeedsLogin` triggers `login()` once per entry.
//! - Entering `Running` or `NeedsMachineAuth` clears the auth prompt and, the
//!   first time it succeeds, starts the engine-hosted HTTP server.
//! - Browse-to-URL requests are ignored while `Running`.
//! - Panic-recovery messages are shown for [`FAULT_TTL`], each with its own
//!   expiry timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ipn_protocol::LifecycleState;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::DEFAULT_HTTP_PORT;
use crate::dispatcher::{Notification, NotificationDispatcher};
use crate::engine::Engine;
use crate::error::Result;
use crate::netmap::NetworkMapStore;

/// How long a panic-recovery message stays visible.
pub const FAULT_TTL: Duration = Duration::from_secs(10);

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
	/// Port for the engine-hosted HTTP server.
	pub http_port: u16,
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			http_port: DEFAULT_HTTP_PORT,
		}
	}
}

/// Authentication URL the user has been asked to visit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthPrompt {
	/// No prompt is active.
	#[default]
	None,
	/// The engine asked for this URL. It may be empty.
	Pending(String),
}

impl AuthPrompt {
	pub fn url(&self) -> Option<&str> {
		match self {
			AuthPrompt::None => None,
			AuthPrompt::Pending(url) => Some(url),
		}
	}

	/// URL worth showing to a user; empty URLs are not.
	pub fn display_url(&self) -> Option<&str> {
		self.url().filter(|url| !url.is_empty())
	}

	pub fn is_none(&self) -> bool {
		matches!(self, AuthPrompt::None)
	}
}

/// Engine fault shown to the user until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientFault {
	pub id: u64,
	pub message: String,
	pub raised_at: Instant,
	pub expires_at: Instant,
}

impl TransientFault {
	pub fn remaining(&self) -> Duration {
		self.expires_at.saturating_duration_since(Instant::now())
	}
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
	pub state: LifecycleState,
	pub network_map: NetworkMapStore,
	pub auth_prompt: AuthPrompt,
	pub fault: Option<TransientFault>,
	pub http_server_started: bool,
}

impl SessionSnapshot {
	/// The engine has reported at least one real state.
	pub fn is_ready(&self) -> bool {
		self.state != LifecycleState::NoState
	}
}

/// Completion reported back to the loop by background work.
enum Internal {
	FaultExpired(u64),
	HttpServerStarted(Result<Value>),
}

enum LoopEvent {
	Notification(Notification),
	Internal(Internal),
}

/// Applies lifecycle policy to engine notifications.
///
/// Handlers never await the engine. `login()` runs detached and the HTTP
/// server start reports back through the loop.
pub struct SessionCoordinator {
	engine: Arc<dyn Engine>,
	options: SessionOptions,
	snapshot: SessionSnapshot,
	snapshot_tx: watch::Sender<SessionSnapshot>,
	/// A `startHTTPServer` request is outstanding.
	http_server_pending: bool,
	next_fault_id: u64,
	background: HashMap<Task, AbortHandle>,
	internal_tx: mpsc::UnboundedSender<Internal>,
	internal_rx: Option<mpsc::UnboundedReceiver<Internal>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Task {
	FaultTimer(u64),
	HttpServer,
}

impl SessionCoordinator {
	pub fn new(engine: Arc<dyn Engine>, options: SessionOptions) -> Self {
		let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
		let (internal_tx, internal_rx) = mpsc::unbounded_channel();
		Self {
			engine,
			options,
			snapshot: SessionSnapshot::default(),
			snapshot_tx,
			http_server_pending: false,
			next_fault_id: 0,
			background: HashMap::new(),
			internal_tx,
			internal_rx: Some(internal_rx),
		}
	}

	/// Receiver that observes every published snapshot.
	pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
		self.snapshot_tx.subscribe()
	}

	pub fn snapshot(&self) -> &SessionSnapshot {
		&self.snapshot
	}

	/// Processes notifications and background completions until the engine
	/// drops its notification channels.
	///
	/// Can only be driven once per coordinator.
	pub async fn run(mut self, mut dispatcher: NotificationDispatcher) {
		let Some(mut internal_rx) = self.internal_rx.take() else {
			warn!(target = "ipn.session", "coordinator loop already ran");
			return;
		};

		loop {
			let event = tokio::select! {
				Some(internal) = internal_rx.recv() => LoopEvent::Internal(internal),
				notification = dispatcher.next() => match notification {
					Some(notification) => LoopEvent::Notification(notification),
					None => break,
				},
			};

			match event {
				LoopEvent::Notification(notification) => {
					debug!(target = "ipn.session", kind = notification.kind(), "notification received");
					NotificationDispatcher::deliver(&mut self, notification);
				}
				LoopEvent::Internal(internal) => self.on_internal(internal),
			}
		}

		warn!(
			target = "ipn.session",
			state = %self.snapshot.state,
			"engine closed its notification channels; session ended"
		);
	}

	/// Records the engine's new lifecycle state and reacts to it.
	pub fn on_state(&mut self, state: LifecycleState) {
		let previous = std::mem::replace(&mut self.snapshot.state, state.clone());
		if previous != state {
			info!(target = "ipn.session", from = %previous, to = %state, "engine state changed");
		}

		if state.is_authorized() {
			self.snapshot.auth_prompt = AuthPrompt::None;
		}
		self.publish();

		if state == LifecycleState::NeedsLogin && previous != LifecycleState::NeedsLogin {
			self.start_login();
		}
		if state.is_authorized() {
			self.ensure_http_server();
		}
	}

	/// Stores an authentication URL unless the session is already running.
	pub fn on_browse_to_url(&mut self, url: String) {
		if self.snapshot.state == LifecycleState::Running {
			debug!(target = "ipn.session", %url, "ignoring stale browse-to-url while running");
			return;
		}
		info!(target = "ipn.session", %url, "engine requested browser authentication");
		self.snapshot.auth_prompt = AuthPrompt::Pending(url);
		self.publish();
	}

	/// Shows an engine fault for [`FAULT_TTL`].
	pub fn on_panic(&mut self, message: String) {
		error!(target = "ipn.session", %message, "engine recovered from panic");

		let id = self.next_fault_id;
		self.next_fault_id += 1;
		let raised_at = Instant::now();
		let expires_at = raised_at + FAULT_TTL;

		let internal_tx = self.internal_tx.clone();
		let timer = tokio::spawn(async move {
			tokio::time::sleep_until(expires_at).await;
			let _ = internal_tx.send(Internal::FaultExpired(id));
		});
		self.background.insert(Task::FaultTimer(id), timer.abort_handle());

		self.snapshot.fault = Some(TransientFault {
			id,
			message,
			raised_at,
			expires_at,
		});
		self.publish();
	}

	/// Replaces the network map with `raw` when it decodes.
	pub fn on_network_map(&mut self, raw: &str) -> Result<()> {
		let map = self.snapshot.network_map.replace_from(raw)?;
		debug!(
			target = "ipn.session",
			self_name = %map.self_node.name,
			peers = map.peers.len(),
			locked_out = map.locked_out,
			"network map updated"
		);
		self.publish();
		Ok(())
	}

	fn on_internal(&mut self, internal: Internal) {
		match internal {
			Internal::FaultExpired(fault_id) => self.on_fault_expired(fault_id),
			Internal::HttpServerStarted(result) => self.on_http_server_started(result),
		}
	}

	fn on_fault_expired(&mut self, fault_id: u64) {
		self.background.remove(&Task::FaultTimer(fault_id));
		if self.snapshot.fault.as_ref().is_some_and(|fault| fault.id == fault_id) {
			debug!(target = "ipn.session", fault_id, "engine fault expired");
			self.snapshot.fault = None;
			self.publish();
		}
	}

	fn start_login(&self) {
		debug!(target = "ipn.session", "starting interactive login");
		let engine = Arc::clone(&self.engine);
		tokio::spawn(async move {
			if let Err(err) = engine.login().await {
				warn!(target = "ipn.session", error = %err, "login request failed");
			}
		});
	}

	fn ensure_http_server(&mut self) {
		if self.snapshot.http_server_started || self.http_server_pending {
			return;
		}
		self.http_server_pending = true;

		let port = self.options.http_port;
		debug!(target = "ipn.session", port, "starting engine HTTP server");
		let engine = Arc::clone(&self.engine);
		let internal_tx = self.internal_tx.clone();
		let task = tokio::spawn(async move {
			let result = engine.start_http_server(port).await;
			let _ = internal_tx.send(Internal::HttpServerStarted(result));
		});
		self.background.insert(Task::HttpServer, task.abort_handle());
	}

	/// A failed start is not recorded, so the next authorized state retries it.
	fn on_http_server_started(&mut self, result: Result<Value>) {
		self.http_server_pending = false;
		self.background.remove(&Task::HttpServer);
		let port = self.options.http_port;
		match result {
			Ok(result) => {
				info!(target = "ipn.session", port, %result, "engine HTTP server started");
				self.snapshot.http_server_started = true;
				self.publish();
			}
			Err(err) => {
				warn!(target = "ipn.session", port, error = %err, "failed to start engine HTTP server");
			}
		}
	}

	fn publish(&self) {
		self.snapshot_tx.send_replace(self.snapshot.clone());
	}

	/// Applies the next background completion, for driving the coordinator
	/// without its loop.
	#[cfg(test)]
	async fn next_internal(&mut self) {
		let internal = match self.internal_rx.as_mut() {
			Some(rx) => rx.recv().await,
			None => None,
		};
		if let Some(internal) = internal {
			self.on_internal(internal);
		}
	}
}

impl Drop for SessionCoordinator {
	fn drop(&mut self) {
		for task in self.background.values() {
			task.abort();
		}
	}
}
