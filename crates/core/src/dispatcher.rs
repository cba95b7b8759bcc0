//! Demultiplexes the engine's notification channels.
//!
//! The dispatcher owns the receiving ends of the four channels registered
//! with the engine and forwards each notification to exactly one
//! coordinator handler. It holds no policy of its own.

use ipn_protocol::LifecycleState;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::coordinator::SessionCoordinator;
use crate::engine::{Callbacks, Engine};
use crate::error::Result;

/// A notification as delivered by the engine, decoded only as far as its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
	State(LifecycleState),
	/// Raw JSON; decoding belongs to the network-map store.
	NetMap(String),
	BrowseToUrl(String),
	PanicRecover(String),
}

impl Notification {
	pub fn kind(&self) -> &'static str {
		match self {
			Notification::State(_) => "state",
			Notification::NetMap(_) => "net_map",
			Notification::BrowseToUrl(_) => "browse_to_url",
			Notification::PanicRecover(_) => "panic_recover",
		}
	}
}

/// Receiving side of the engine's notification channels.
#[derive(Debug)]
pub struct NotificationDispatcher {
	state: mpsc::UnboundedReceiver<String>,
	net_map: mpsc::UnboundedReceiver<String>,
	browse_to_url: mpsc::UnboundedReceiver<String>,
	panic_recover: mpsc::UnboundedReceiver<String>,
}

impl NotificationDispatcher {
	/// Creates the four channels without attaching them to an engine.
	pub fn channels() -> (Callbacks, Self) {
		let (state_tx, state) = mpsc::unbounded_channel();
		let (net_map_tx, net_map) = mpsc::unbounded_channel();
		let (browse_tx, browse_to_url) = mpsc::unbounded_channel();
		let (panic_tx, panic_recover) = mpsc::unbounded_channel();
		let callbacks = Callbacks {
			state: state_tx,
			net_map: net_map_tx,
			browse_to_url: browse_tx,
			panic_recover: panic_tx,
		};
		(
			callbacks,
			Self {
				state,
				net_map,
				browse_to_url,
				panic_recover,
			},
		)
	}

	/// Registers the channels with `engine` by calling its `run`.
	pub async fn attach(engine: &dyn Engine) -> Result<Self> {
		let (callbacks, dispatcher) = Self::channels();
		engine.run(callbacks).await?;
		debug!(target = "ipn.dispatch", "notification channels attached");
		Ok(dispatcher)
	}

	/// Waits for the next notification of any kind.
	///
	/// Returns `None` once the engine has dropped every channel.
	pub async fn next(&mut self) -> Option<Notification> {
		tokio::select! {
			Some(state) = self.state.recv() => Some(Notification::State(LifecycleState::from(state))),
			Some(raw) = self.net_map.recv() => Some(Notification::NetMap(raw)),
			Some(url) = self.browse_to_url.recv() => Some(Notification::BrowseToUrl(url)),
			Some(message) = self.panic_recover.recv() => Some(Notification::PanicRecover(message)),
			else => None,
		}
	}

	/// Hands `notification` to the matching coordinator handler.
	///
	/// Decode failures are logged and dropped; the coordinator keeps its
	/// previous state.
	pub fn deliver(coordinator: &mut SessionCoordinator, notification: Notification) {
		match notification {
			Notification::State(state) => coordinator.on_state(state),
			Notification::NetMap(raw) => {
				if let Err(err) = coordinator.on_network_map(&raw) {
					warn!(target = "ipn.dispatch", error = %err, bytes = raw.len(), "dropping malformed network map");
				}
			}
			Notification::BrowseToUrl(url) => coordinator.on_browse_to_url(url),
			Notification::PanicRecover(message) => coordinator.on_panic(message),
		}
	}
}
