//! Newline-delimited JSON framing over an async byte stream.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::Result;

/// Writing half: one JSON document per line.
pub struct LineWriter {
	inner: Box<dyn AsyncWrite + Send + Unpin>,
}

impl LineWriter {
	pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
		Self { inner: Box::new(writer) }
	}

	pub async fn send(&mut self, message: &impl Serialize) -> Result<()> {
		let mut line = serde_json::to_string(message)?;
		trace!(target = "ipn.bridge", %line, "send");
		line.push('\n');
		self.inner.write_all(line.as_bytes()).await?;
		self.inner.flush().await?;
		Ok(())
	}
}

/// Reads lines from `reader` and forwards each parsed document to `tx`.
///
/// Blank lines are skipped and lines that are not JSON are logged and
/// dropped. Returns when the stream ends or the receiver goes away.
pub async fn read_lines(reader: impl AsyncRead + Unpin, tx: mpsc::UnboundedSender<Value>) -> Result<()> {
	let mut lines = BufReader::new(reader).lines();
	while let Some(line) = lines.next_line().await? {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		trace!(target = "ipn.bridge", %line, "recv");
		match serde_json::from_str::<Value>(line) {
			Ok(value) => {
				if tx.send(value).is_err() {
					break;
				}
			}
			Err(err) => warn!(target = "ipn.bridge", error = %err, "dropping non-JSON line from engine"),
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use tokio::io::{AsyncReadExt, duplex};

	#[tokio::test]
	async fn writer_frames_one_document_per_line() {
		let (client, mut server) = duplex(1024);
		let mut writer = LineWriter::new(client);
		writer.send(&json!({"id": 0, "method": "login"})).await.unwrap();
		writer.send(&json!({"id": 1, "method": "netCheck"})).await.unwrap();
		drop(writer);

		let mut out = String::new();
		server.read_to_string(&mut out).await.unwrap();
		let lines: Vec<&str> = out.lines().collect();
		assert_eq!(lines.len(), 2);
		assert_eq!(serde_json::from_str::<Value>(lines[1]).unwrap()["method"], "netCheck");
	}

	#[tokio::test]
	async fn reader_skips_blank_and_garbage_lines() {
		let input: &[u8] = b"{\"method\":\"notifyState\",\"params\":\"Running\"}\n\n  \nnot json\n{\"id\":3,\"result\":null}\n";
		let (tx, mut rx) = mpsc::unbounded_channel();
		read_lines(input, tx).await.unwrap();

		assert_eq!(rx.recv().await.unwrap()["params"], "Running");
		assert_eq!(rx.recv().await.unwrap()["id"], 3);
		assert!(rx.recv().await.is_none());
	}
}
