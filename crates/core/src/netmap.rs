//! Network map decoding and derived views.

use std::sync::Arc;

use ipn_protocol::{NetworkMap, Node};

use crate::error::{Error, Result};

/// Holds the latest valid network map.
///
/// Maps are replaced wholesale; a payload that fails to decode leaves the
/// previous map untouched. Cloning is cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkMapStore {
	current: Option<Arc<NetworkMap>>,
}

impl NetworkMapStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Decodes a `notifyNetMap` payload.
	pub fn parse(raw: &str) -> Result<NetworkMap> {
		serde_json::from_str(raw).map_err(|err| Error::decode("network map", err))
	}

	/// Parses `raw` and, only on success, makes it the current map.
	pub fn replace_from(&mut self, raw: &str) -> Result<&NetworkMap> {
		let map = Self::parse(raw)?;
		let current = self.current.insert(Arc::new(map));
		Ok(&**current)
	}

	pub fn current(&self) -> Option<&NetworkMap> {
		self.current.as_deref()
	}

	pub fn self_node(&self) -> Option<&Node> {
		self.current().map(|map| &map.self_node)
	}

	pub fn peers(&self) -> &[Node] {
		self.current().map(|map| map.peers.as_slice()).unwrap_or_default()
	}

	/// Peers the control plane reports as online.
	pub fn online_peers(&self) -> impl Iterator<Item = &Node> {
		self.peers().iter().filter(|peer| peer.online == Some(true))
	}

	pub fn is_locked_out(&self) -> bool {
		self.current().is_some_and(|map| map.locked_out)
	}

	/// Command a trusted device must run to sign this node, when locked out.
	pub fn lock_sign_command(&self) -> Option<String> {
		self.current().and_then(lock_sign_command)
	}
}

/// `"lock sign <nodeKey>"` for a locked-out map; `None` otherwise or when the
/// engine did not report a node key.
pub fn lock_sign_command(map: &NetworkMap) -> Option<String> {
	if !map.locked_out {
		return None;
	}
	map.self_node.node_key.as_deref().map(|key| format!("lock sign {key}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	const MAP: &str = r#"{
		"self": { "name": "kiosk", "addresses": ["100.64.0.5"], "nodeKey": "abc123" },
		"peers": [
			{ "name": "db", "addresses": ["100.64.0.9"], "online": true },
			{ "name": "nas", "addresses": ["100.64.0.10"], "online": false },
			{ "name": "phone", "addresses": ["100.64.0.11"] }
		],
		"lockedOut": true
	}"#;

	#[test]
	fn locked_out_map_derives_sign_command() {
		let mut store = NetworkMapStore::new();
		store.replace_from(MAP).unwrap();
		assert!(store.is_locked_out());
		assert_eq!(store.lock_sign_command().as_deref(), Some("lock sign abc123"));
	}

	#[test]
	fn unlocked_map_has_no_sign_command() {
		let mut store = NetworkMapStore::new();
		store
			.replace_from(r#"{ "self": { "name": "kiosk", "addresses": [], "nodeKey": "abc123" }, "peers": [], "lockedOut": false }"#)
			.unwrap();
		assert_eq!(store.lock_sign_command(), None);
	}

	#[test]
	fn locked_out_without_key_has_no_sign_command() {
		let map = NetworkMapStore::parse(r#"{ "self": { "name": "kiosk" }, "lockedOut": true }"#).unwrap();
		assert_eq!(lock_sign_command(&map), None);
	}

	#[test]
	fn malformed_payload_keeps_previous_map() {
		let mut store = NetworkMapStore::new();
		store.replace_from(MAP).unwrap();
		let before = store.clone();

		let err = store.replace_from("{\"self\": ").unwrap_err();
		assert!(err.is_decode());
		assert_eq!(store, before);

		let err = store.replace_from(r#"{"peers": []}"#).unwrap_err();
		assert!(err.is_decode());
		assert_eq!(store, before);
	}

	#[test]
	fn views() {
		let mut store = NetworkMapStore::new();
		assert!(store.self_node().is_none());
		assert!(store.peers().is_empty());

		store.replace_from(MAP).unwrap();
		assert_eq!(store.self_node().map(|n| n.name.as_str()), Some("kiosk"));
		assert_eq!(store.peers().len(), 3);
		let online: Vec<&str> = store.online_peers().map(|n| n.name.as_str()).collect();
		assert_eq!(online, vec!["db"]);
	}
}
