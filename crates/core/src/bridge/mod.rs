//! Engine reached through a line-delimited JSON bridge.
//!
//! The engine runs out of process: either as a child whose stdio carries the
//! protocol, or as a TCP listener. See [`ipn_protocol::bridge`] for the
//! message shapes.

pub mod connection;
pub mod transport;

use std::fmt;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;

use ipn_protocol::{EngineConfig, FetchResponse, METHOD_FETCH, METHOD_LOGIN, METHOD_NET_CHECK, METHOD_RUN, METHOD_START_HTTP_SERVER};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use self::connection::Connection;
use self::transport::{LineWriter, read_lines};
use crate::engine::{BoxFuture, Callbacks, Engine, EngineLoader};
use crate::error::{Error, Result};
use crate::state_store::StateStore;

/// Where to find the engine bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineTarget {
	/// Spawn `program args...` and speak the protocol over its stdio.
	Command { program: String, args: Vec<String> },
	/// Connect to `host:port`.
	Tcp(String),
}

impl FromStr for EngineTarget {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		let s = s.trim();
		if let Some(addr) = s.strip_prefix("tcp://") {
			if addr.is_empty() {
				return Err("tcp engine target needs host:port".to_string());
			}
			return Ok(EngineTarget::Tcp(addr.to_string()));
		}

		let mut parts = s.split_whitespace().map(str::to_string);
		let program = parts.next().ok_or_else(|| "engine target is empty".to_string())?;
		Ok(EngineTarget::Command {
			program,
			args: parts.collect(),
		})
	}
}

impl fmt::Display for EngineTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EngineTarget::Command { program, args } if args.is_empty() => write!(f, "{program}"),
			EngineTarget::Command { program, args } => write!(f, "{program} {}", args.join(" ")),
			EngineTarget::Tcp(addr) => write!(f, "tcp://{addr}"),
		}
	}
}

/// [`Engine`] implementation backed by a bridge [`Connection`].
pub struct BridgeEngine {
	connection: Arc<Connection>,
	config: EngineConfig,
	tasks: Vec<JoinHandle<()>>,
}

impl BridgeEngine {
	/// Wraps an already-connected byte stream.
	pub fn new(
		reader: impl AsyncRead + Send + Unpin + 'static,
		writer: impl AsyncWrite + Send + Unpin + 'static,
		store: Arc<dyn StateStore>,
		config: EngineConfig,
	) -> Self {
		let connection = Arc::new(Connection::new(LineWriter::new(writer), store));
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		let read_task = tokio::spawn(async move {
			if let Err(err) = read_lines(reader, message_tx).await {
				error!(target = "ipn.bridge", error = %err, "engine transport error");
			}
		});
		let dispatch_task = tokio::spawn({
			let connection = Arc::clone(&connection);
			async move { connection.run(message_rx).await }
		});

		Self {
			connection,
			config,
			tasks: vec![read_task, dispatch_task],
		}
	}

	/// Spawns the engine bridge process and talks to it over stdio.
	///
	/// The child is killed when the engine is dropped.
	pub async fn spawn(program: &str, args: &[String], store: Arc<dyn StateStore>, config: EngineConfig) -> Result<Self> {
		let mut child = Command::new(program)
			.args(args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.spawn()
			.map_err(|err| Error::Transport(format!("failed to spawn engine `{program}`: {err}")))?;

		let stdin = child.stdin.take().ok_or_else(|| Error::Transport("engine stdin unavailable".to_string()))?;
		let stdout = child.stdout.take().ok_or_else(|| Error::Transport("engine stdout unavailable".to_string()))?;
		info!(target = "ipn.bridge", program, pid = child.id(), "engine process spawned");

		let mut engine = Self::new(stdout, stdin, store, config);
		engine.tasks.push(tokio::spawn(async move {
			match child.wait().await {
				Ok(status) => warn!(target = "ipn.bridge", %status, "engine process exited"),
				Err(err) => error!(target = "ipn.bridge", error = %err, "failed to wait for engine process"),
			}
		}));
		Ok(engine)
	}

	/// Connects to an engine bridge listening on `addr`.
	pub async fn connect_tcp(addr: &str, store: Arc<dyn StateStore>, config: EngineConfig) -> Result<Self> {
		let stream = TcpStream::connect(addr)
			.await
			.map_err(|err| Error::Transport(format!("failed to connect to engine at {addr}: {err}")))?;
		info!(target = "ipn.bridge", %addr, "connected to engine");
		let (reader, writer) = stream.into_split();
		Ok(Self::new(reader, writer, store, config))
	}

	pub async fn open(target: &EngineTarget, store: Arc<dyn StateStore>, config: EngineConfig) -> Result<Self> {
		match target {
			EngineTarget::Command { program, args } => Self::spawn(program, args, store, config).await,
			EngineTarget::Tcp(addr) => Self::connect_tcp(addr, store, config).await,
		}
	}
}

impl Drop for BridgeEngine {
	fn drop(&mut self) {
		for task in &self.tasks {
			task.abort();
		}
	}
}

impl Engine for BridgeEngine {
	fn run(&self, callbacks: Callbacks) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.connection.attach(callbacks)?;
			let config = serde_json::to_value(&self.config)?;
			self.connection.send_message(METHOD_RUN, config).await?;
			debug!(target = "ipn.bridge", "engine running");
			Ok(())
		})
	}

	fn login(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.connection.send_message(METHOD_LOGIN, Value::Null).await?;
			Ok(())
		})
	}

	fn net_check(&self) -> BoxFuture<'_, Result<String>> {
		Box::pin(async move {
			match self.connection.send_message(METHOD_NET_CHECK, Value::Null).await? {
				Value::String(report) => Ok(report),
				other => Ok(other.to_string()),
			}
		})
	}

	fn fetch(&self, url: String) -> BoxFuture<'_, Result<FetchResponse>> {
		Box::pin(async move {
			let value = self.connection.send_message(METHOD_FETCH, json!({ "url": url })).await?;
			serde_json::from_value(value).map_err(|err| Error::decode("fetch response", err))
		})
	}

	fn start_http_server(&self, port: u16) -> BoxFuture<'_, Result<Value>> {
		Box::pin(async move { self.connection.send_message(METHOD_START_HTTP_SERVER, json!({ "port": port })).await })
	}
}

/// [`EngineLoader`] that opens a [`BridgeEngine`] for a configured target.
pub struct BridgeLoader {
	target: EngineTarget,
	store: Arc<dyn StateStore>,
	config: EngineConfig,
}

impl BridgeLoader {
	pub fn new(target: EngineTarget, store: Arc<dyn StateStore>, config: EngineConfig) -> Self {
		Self { target, store, config }
	}
}

impl EngineLoader for BridgeLoader {
	fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Engine>>> {
		Box::pin(async move {
			let engine = BridgeEngine::open(&self.target, Arc::clone(&self.store), self.config.clone()).await?;
			Ok(Arc::new(engine) as Arc<dyn Engine>)
		})
	}
}
