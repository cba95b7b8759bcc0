//! Error types for the session coordinator.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to the engine or decoding its payloads.
#[derive(Debug, Error)]
pub enum Error {
	/// A payload from the engine was not well-formed.
	#[error("failed to decode {what}: {source}")]
	Decode {
		what: &'static str,
		#[source]
		source: serde_json::Error,
	},

	/// The request never reached the engine, or its answer never came back.
	#[error("transport failure: {0}")]
	Transport(String),

	/// The engine answered with an error.
	#[error("engine error: {0}")]
	Engine(String),

	/// The connection to the engine closed while a request was pending.
	#[error("engine connection closed")]
	ChannelClosed,

	/// The engine has not reported any state yet.
	#[error("engine not ready: {0}")]
	NotReady(String),

	/// `run` was already called on this engine instance.
	#[error("engine notifications are already attached")]
	AlreadyAttached,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	pub(crate) fn decode(what: &'static str, source: serde_json::Error) -> Self {
		Error::Decode { what, source }
	}

	/// Whether this error is a decode failure rather than a transport one.
	pub fn is_decode(&self) -> bool {
		matches!(self, Error::Decode { .. })
	}

	/// Whether the failure happened on the way to or from the engine.
	pub fn is_transport(&self) -> bool {
		matches!(self, Error::Transport(_) | Error::Engine(_) | Error::ChannelClosed | Error::Io(_))
	}
}
