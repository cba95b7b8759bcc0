//! Persisted key/value state handed to the engine.
//!
//! The engine keeps its machine identity and log policy here. The storage
//! medium is up to the embedder: [`MemoryStore`] lives for one process,
//! [`FileStore`] survives restarts.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

const STATE_SCHEMA_VERSION: u32 = 1;

/// Key/value capability the engine reads and writes its state through.
pub trait StateStore: Send + Sync + fmt::Debug {
	fn get(&self, key: &str) -> Result<Option<String>>;
	fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StateStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>> {
		Ok(self.entries.lock().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		self.entries.lock().insert(key.to_string(), value.to_string());
		Ok(())
	}
}

/// On-disk format of a [`FileStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFile {
	schema: u32,
	#[serde(default)]
	entries: BTreeMap<String, String>,
}

impl Default for StateFile {
	fn default() -> Self {
		Self {
			schema: STATE_SCHEMA_VERSION,
			entries: BTreeMap::new(),
		}
	}
}

/// JSON-file backed store; every write rewrites the file.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	file: Mutex<StateFile>,
}

impl FileStore {
	/// Loads `path`, starting empty when it is missing or unreadable.
	pub fn load(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let file = match fs::read_to_string(&path) {
			Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
				warn!(target = "ipn.state", path = %path.display(), error = %err, "state file unreadable; starting empty");
				StateFile::default()
			}),
			Err(err) => {
				if err.kind() != std::io::ErrorKind::NotFound {
					warn!(target = "ipn.state", path = %path.display(), error = %err, "failed to read state file");
				}
				StateFile::default()
			}
		};
		Self {
			path,
			file: Mutex::new(file),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Snapshot of all stored entries.
	pub fn entries(&self) -> BTreeMap<String, String> {
		self.file.lock().entries.clone()
	}

	/// Removes `key`, returning whether it was present.
	pub fn remove(&self, key: &str) -> Result<bool> {
		let mut file = self.file.lock();
		let removed = file.entries.remove(key).is_some();
		if removed {
			write_state_file(&self.path, &file)?;
		}
		Ok(removed)
	}

	/// Deletes the backing file. Returns `false` if there was none.
	pub fn clear(&self) -> Result<bool> {
		let mut file = self.file.lock();
		file.entries.clear();
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err.into()),
		}
	}
}

impl StateStore for FileStore {
	fn get(&self, key: &str) -> Result<Option<String>> {
		Ok(self.file.lock().entries.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		let mut file = self.file.lock();
		file.entries.insert(key.to_string(), value.to_string());
		write_state_file(&self.path, &file)?;
		debug!(target = "ipn.state", key, "state entry written");
		Ok(())
	}
}

fn write_state_file(path: &Path, file: &StateFile) -> Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	let json = serde_json::to_string_pretty(file)?;
	fs::write(path, json)?;
	Ok(())
}
