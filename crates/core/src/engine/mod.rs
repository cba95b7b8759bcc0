//! Boundary to the sandboxed networking engine.
//!
//! The engine is an external collaborator: it decides every lifecycle
//! transition and pushes them through four notification channels. This module
//! defines the request surface the coordinator relies on and the typed
//! channel ends handed to the engine in place of callbacks.

pub mod fake;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ipn_protocol::FetchResponse;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Boxed future returned by [`Engine`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Request surface of a running engine instance.
///
/// Implementations carry their own persisted-state capability (see
/// [`StateStore`](crate::StateStore)); the coordinator never touches it.
pub trait Engine: Send + Sync {
	/// Registers the notification channels and starts the engine.
	///
	/// Must be called exactly once per engine instance; later calls fail with
	/// [`Error::AlreadyAttached`](crate::Error::AlreadyAttached).
	fn run(&self, callbacks: Callbacks) -> BoxFuture<'_, Result<()>>;

	/// Starts interactive login. The outcome arrives as state notifications.
	fn login(&self) -> BoxFuture<'_, Result<()>>;

	/// Runs a connectivity check and returns its JSON-encoded report.
	fn net_check(&self) -> BoxFuture<'_, Result<String>>;

	/// Fetches `url` through the tailnet.
	fn fetch(&self, url: String) -> BoxFuture<'_, Result<FetchResponse>>;

	/// Starts the engine-hosted HTTP endpoint on `port`.
	fn start_http_server(&self, port: u16) -> BoxFuture<'_, Result<Value>>;
}

/// Produces the engine instance for a session.
pub trait EngineLoader: Send + Sync {
	fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Engine>>>;
}

/// Sending halves of the four notification channels.
///
/// Each channel is FIFO, so the engine's emission order is preserved within
/// one kind. Nothing orders deliveries across kinds.
#[derive(Debug, Clone)]
pub struct Callbacks {
	pub(crate) state: mpsc::UnboundedSender<String>,
	pub(crate) net_map: mpsc::UnboundedSender<String>,
	pub(crate) browse_to_url: mpsc::UnboundedSender<String>,
	pub(crate) panic_recover: mpsc::UnboundedSender<String>,
}

impl Callbacks {
	/// Returns `false` once the session has stopped listening.
	pub fn notify_state(&self, state: impl Into<String>) -> bool {
		self.state.send(state.into()).is_ok()
	}

	pub fn notify_net_map(&self, net_map: impl Into<String>) -> bool {
		self.net_map.send(net_map.into()).is_ok()
	}

	pub fn notify_browse_to_url(&self, url: impl Into<String>) -> bool {
		self.browse_to_url.send(url.into()).is_ok()
	}

	pub fn notify_panic_recover(&self, message: impl Into<String>) -> bool {
		self.panic_recover.send(message.into()).is_ok()
	}

	/// Whether every receiving end is gone.
	pub fn is_closed(&self) -> bool {
		self.state.is_closed() && self.net_map.is_closed() && self.browse_to_url.is_closed() && self.panic_recover.is_closed()
	}
}
