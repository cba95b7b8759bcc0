//! Request/response correlation for the engine bridge.
//!
//! Outgoing requests get sequential ids and a oneshot channel; the message
//! loop completes the channel when the engine answers. Notifications are
//! forwarded to the attached [`Callbacks`], and engine-initiated state calls
//! are answered from the injected [`StateStore`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use ipn_protocol::{
	CALL_GET_STATE, CALL_SET_STATE, Call, Message, NOTIFY_BROWSE_TO_URL, NOTIFY_NET_MAP, NOTIFY_PANIC_RECOVER, NOTIFY_STATE, Notification, Request,
	Response, StateParams,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::transport::LineWriter;
use crate::engine::Callbacks;
use crate::error::{Error, Result};
use crate::state_store::StateStore;

pub struct Connection {
	last_id: AtomicU32,
	callbacks: Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>,
	writer: tokio::sync::Mutex<LineWriter>,
	notifications: Mutex<Option<Callbacks>>,
	store: Arc<dyn StateStore>,
	closed: AtomicBool,
}

impl Connection {
	pub fn new(writer: LineWriter, store: Arc<dyn StateStore>) -> Self {
		Self {
			last_id: AtomicU32::new(0),
			callbacks: Mutex::new(HashMap::new()),
			writer: tokio::sync::Mutex::new(writer),
			notifications: Mutex::new(None),
			store,
			closed: AtomicBool::new(false),
		}
	}

	/// Installs the notification channels. Only the first call succeeds.
	pub fn attach(&self, callbacks: Callbacks) -> Result<()> {
		let mut slot = self.notifications.lock();
		if slot.is_some() {
			return Err(Error::AlreadyAttached);
		}
		*slot = Some(callbacks);
		Ok(())
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Sends a request and waits for the engine's answer.
	pub async fn send_message(&self, method: &str, params: Value) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		if self.is_closed() {
			self.callbacks.lock().remove(&id);
			return Err(Error::ChannelClosed);
		}

		let request = Request {
			id,
			method: method.to_string(),
			params,
		};
		if let Err(err) = self.writer.lock().await.send(&request).await {
			self.callbacks.lock().remove(&id);
			return Err(Error::Transport(format!("failed to send {method}: {err}")));
		}

		rx.await.map_err(|_| Error::ChannelClosed)?
	}

	/// Dispatches incoming messages until the transport closes, then fails
	/// every pending request and drops the notification channels.
	pub async fn run(&self, mut message_rx: mpsc::UnboundedReceiver<Value>) {
		while let Some(value) = message_rx.recv().await {
			match serde_json::from_value::<Message>(value) {
				Ok(message) => {
					if let Err(err) = self.dispatch(message).await {
						warn!(target = "ipn.bridge", error = %err, "failed to dispatch engine message");
					}
				}
				Err(err) => warn!(target = "ipn.bridge", error = %err, "unrecognized engine message"),
			}
		}
		debug!(target = "ipn.bridge", "engine message loop ended");
		self.close();
	}

	fn close(&self) {
		self.closed.store(true, Ordering::Release);
		let pending: Vec<_> = self.callbacks.lock().drain().collect();
		for (_, callback) in pending {
			let _ = callback.send(Err(Error::ChannelClosed));
		}
		self.notifications.lock().take();
	}

	async fn dispatch(&self, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let callback = self
					.callbacks
					.lock()
					.remove(&response.id)
					.ok_or_else(|| Error::Transport(format!("no pending request with id={}", response.id)))?;

				let result = match response.error {
					Some(error) => Err(Error::Engine(error.message)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = callback.send(result);
				Ok(())
			}
			Message::Notification(notification) => {
				self.notify(notification);
				Ok(())
			}
			Message::Call(call) => {
				let reply = self.answer(call);
				self.writer.lock().await.send(&reply).await
			}
		}
	}

	fn notify(&self, notification: Notification) {
		let payload = match notification.params {
			Value::String(text) => text,
			other => other.to_string(),
		};

		let slot = self.notifications.lock();
		let Some(callbacks) = slot.as_ref() else {
			warn!(target = "ipn.bridge", method = %notification.method, "notification before run; dropped");
			return;
		};

		let delivered = match notification.method.as_str() {
			NOTIFY_STATE => callbacks.notify_state(payload),
			NOTIFY_NET_MAP => callbacks.notify_net_map(payload),
			NOTIFY_BROWSE_TO_URL => callbacks.notify_browse_to_url(payload),
			NOTIFY_PANIC_RECOVER => callbacks.notify_panic_recover(payload),
			other => {
				warn!(target = "ipn.bridge", method = %other, "unknown notification");
				return;
			}
		};
		if !delivered {
			debug!(target = "ipn.bridge", method = %notification.method, "session no longer listening");
		}
	}

	fn answer(&self, call: Call) -> Response {
		let params: StateParams = match serde_json::from_value(call.params) {
			Ok(params) => params,
			Err(err) => return Response::err(call.id, format!("invalid {} params: {err}", call.method)),
		};

		let outcome = match call.method.as_str() {
			CALL_GET_STATE => self.store.get(&params.key).map(|value| json!(value)),
			CALL_SET_STATE => match params.value.as_deref() {
				Some(value) => self.store.set(&params.key, value).map(|()| Value::Null),
				None => return Response::err(call.id, "setState requires a value"),
			},
			other => return Response::err(call.id, format!("unknown call {other}")),
		};

		match outcome {
			Ok(result) => Response::ok(call.id, result),
			Err(err) => {
				warn!(target = "ipn.bridge", method = %call.method, key = %params.key, error = %err, "state call failed");
				Response::err(call.id, err.to_string())
			}
		}
	}
}
