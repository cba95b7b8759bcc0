//! Engine session: one coordinator task per engine instance.

use std::sync::Arc;

use ipn_protocol::FetchResponse;
use tokio::sync::{OnceCell, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::{SessionCoordinator, SessionOptions, SessionSnapshot};
use crate::diagnostics::{DiagnosticResult, DiagnosticsClient};
use crate::dispatcher::NotificationDispatcher;
use crate::engine::{Engine, EngineLoader};
use crate::error::{Error, Result};

/// A running session against one engine instance.
///
/// The coordinator runs on its own task; observers read snapshots through
/// [`Session::subscribe`]. Dropping the session stops the task.
pub struct Session {
	engine: Arc<dyn Engine>,
	snapshots: watch::Receiver<SessionSnapshot>,
	diagnostics: DiagnosticsClient,
	task: JoinHandle<()>,
}

impl Session {
	/// Attaches to `engine` and spawns the coordinator loop.
	pub async fn start(engine: Arc<dyn Engine>, options: SessionOptions) -> Result<Self> {
		let coordinator = SessionCoordinator::new(Arc::clone(&engine), options);
		let snapshots = coordinator.subscribe();
		let dispatcher = NotificationDispatcher::attach(engine.as_ref()).await?;
		let task = tokio::spawn(coordinator.run(dispatcher));
		let diagnostics = DiagnosticsClient::new(Arc::clone(&engine), snapshots.clone());
		info!(target = "ipn.session", "session started");

		Ok(Self {
			engine,
			snapshots,
			diagnostics,
			task,
		})
	}

	/// Latest published snapshot.
	pub fn snapshot(&self) -> SessionSnapshot {
		self.snapshots.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
		self.snapshots.clone()
	}

	pub fn diagnostics(&self) -> &DiagnosticsClient {
		&self.diagnostics
	}

	/// Shorthand for [`DiagnosticsClient::run_check`].
	pub async fn net_check(&self) -> Result<Option<DiagnosticResult>> {
		self.diagnostics.run_check().await
	}

	/// Probes `url` through the engine. Failures go straight to the caller.
	pub async fn fetch(&self, url: &str) -> Result<FetchResponse> {
		debug!(target = "ipn.session", %url, "fetching through engine");
		self.engine.fetch(url.to_string()).await
	}

	/// Waits until a snapshot satisfies `predicate`.
	///
	/// Fails with [`Error::ChannelClosed`] if the session ends first.
	pub async fn wait_for(&self, mut predicate: impl FnMut(&SessionSnapshot) -> bool) -> Result<SessionSnapshot> {
		let mut rx = self.snapshots.clone();
		let snapshot = rx.wait_for(|snapshot| predicate(snapshot)).await.map_err(|_| Error::ChannelClosed)?;
		Ok(snapshot.clone())
	}

	/// Whether the coordinator loop has ended, e.g. because the engine went away.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Resolves once the coordinator loop has ended.
	pub async fn closed(&self) {
		let mut rx = self.snapshots.clone();
		while rx.changed().await.is_ok() {}
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.task.abort();
	}
}

/// Guards engine creation so one host never produces two engine instances.
#[derive(Default)]
pub struct SessionHost {
	session: OnceCell<Session>,
}

impl SessionHost {
	pub fn new() -> Self {
		Self::default()
	}

	/// Loads the engine and starts its session on first call; later and
	/// concurrent calls return the same session without touching `loader`.
	pub async fn get_or_start(&self, loader: &dyn EngineLoader, options: SessionOptions) -> Result<&Session> {
		self.session
			.get_or_try_init(|| async move {
				debug!(target = "ipn.session", "loading engine");
				let engine = loader.load().await?;
				Session::start(engine, options).await
			})
			.await
	}

	pub fn get(&self) -> Option<&Session> {
		self.session.get()
	}
}
