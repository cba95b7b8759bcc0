//! Network map snapshots emitted through `notifyNetMap`.

use serde::{Deserialize, Deserializer, Serialize};

/// Snapshot of the local node and the peers it can see.
///
/// ```json
/// {
///   "self": { "name": "laptop", "addresses": ["100.64.0.1"], "nodeKey": "nodekey:ab12" },
///   "peers": [{ "name": "server", "addresses": ["100.64.0.2"], "online": true }],
///   "lockedOut": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMap {
	#[serde(rename = "self")]
	pub self_node: Node,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub peers: Vec<Node>,
	/// Tailnet lock is enabled and this node's key carries no signature.
	#[serde(default)]
	pub locked_out: bool,
}

/// A single node entry, used for both the local node and peers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
	pub name: String,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub addresses: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node_key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub machine_key: Option<String>,
	/// Only reported for peers, and only when the control plane knows.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub online: Option<bool>,
	/// Only reported for the local node.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub machine_status: Option<String>,
	#[serde(default, rename = "tailscaleSSHEnabled")]
	pub ssh_enabled: bool,
}

impl Node {
	/// First address, which the engine orders IPv4-first.
	pub fn primary_address(&self) -> Option<&str> {
		self.addresses.first().map(String::as_str)
	}
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_engine_payload() {
		let raw = r#"{
			"self": {
				"name": "wasm-node",
				"addresses": ["100.101.102.103", "fd7a:115c:a1e0::1"],
				"nodeKey": "nodekey:abc",
				"machineKey": "mkey:def",
				"machineStatus": "MachineAuthorized"
			},
			"peers": [
				{ "name": "db", "addresses": ["100.64.0.9"], "nodeKey": "nodekey:1", "online": true, "tailscaleSSHEnabled": true },
				{ "name": "laptop", "addresses": [], "nodeKey": "nodekey:2", "tailscaleSSHEnabled": false }
			],
			"lockedOut": false
		}"#;
		let map: NetworkMap = serde_json::from_str(raw).unwrap();
		assert_eq!(map.self_node.name, "wasm-node");
		assert_eq!(map.self_node.primary_address(), Some("100.101.102.103"));
		assert_eq!(map.self_node.machine_status.as_deref(), Some("MachineAuthorized"));
		assert_eq!(map.peers.len(), 2);
		assert_eq!(map.peers[0].online, Some(true));
		assert!(map.peers[0].ssh_enabled);
		assert_eq!(map.peers[1].online, None);
		assert!(!map.locked_out);
	}

	#[test]
	fn null_lists_decode_as_empty() {
		let raw = r#"{ "self": { "name": "n", "addresses": null }, "peers": null, "lockedOut": true }"#;
		let map: NetworkMap = serde_json::from_str(raw).unwrap();
		assert!(map.self_node.addresses.is_empty());
		assert!(map.peers.is_empty());
		assert!(map.locked_out);
	}

	#[test]
	fn missing_self_is_rejected() {
		assert!(serde_json::from_str::<NetworkMap>(r#"{ "peers": [] }"#).is_err());
	}
}
