//! Serializable views of session data and their text rendering.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use colored::{ColoredString, Colorize};
use ipn::{DiagnosticResult, LifecycleState, Node, SessionSnapshot};
use serde::Serialize;
use serde_json::Value;

use super::Render;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
	pub state: String,
	pub ready: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub auth_url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub fault: Option<FaultView>,
	pub http_server_started: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub node: Option<NodeView>,
	pub peers: Vec<NodeView>,
	pub locked_out: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lock_sign_command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultView {
	pub message: String,
	pub remaining_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
	pub name: String,
	pub addresses: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub online: Option<bool>,
}

impl From<&Node> for NodeView {
	fn from(node: &Node) -> Self {
		Self {
			name: node.name.clone(),
			addresses: node.addresses.clone(),
			online: node.online,
		}
	}
}

impl NodeView {
	/// Every address, comma separated, or `-` when the node has none.
	fn address_list(&self) -> String {
		if self.addresses.is_empty() {
			"-".to_string()
		} else {
			self.addresses.join(", ")
		}
	}
}

impl From<&SessionSnapshot> for SnapshotView {
	fn from(snapshot: &SessionSnapshot) -> Self {
		let map = &snapshot.network_map;
		Self {
			state: snapshot.state.to_string(),
			ready: snapshot.is_ready(),
			auth_url: snapshot.auth_prompt.display_url().map(str::to_string),
			fault: snapshot.fault.as_ref().map(|fault| FaultView {
				message: fault.message.clone(),
				remaining_ms: fault.remaining().as_millis() as u64,
			}),
			http_server_started: snapshot.http_server_started,
			node: map.self_node().map(NodeView::from),
			peers: map.peers().iter().map(NodeView::from).collect(),
			locked_out: map.is_locked_out(),
			lock_sign_command: map.lock_sign_command(),
		}
	}
}

fn state_label(state: &str) -> ColoredString {
	match LifecycleState::from(state) {
		LifecycleState::Running => state.green().bold(),
		LifecycleState::NeedsLogin | LifecycleState::NeedsMachineAuth => state.yellow().bold(),
		LifecycleState::InUseOtherUser => state.red().bold(),
		_ => state.dimmed(),
	}
}

impl Render for SnapshotView {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		writeln!(out, "{:<8} {}", "state", state_label(&self.state))?;
		if LifecycleState::from(self.state.as_str()) == LifecycleState::NeedsMachineAuth {
			writeln!(out, "{:<8} {}", "", "An administrator needs to approve this device".yellow())?;
		}
		if let Some(url) = &self.auth_url {
			writeln!(out, "{:<8} visit {}", "login", url.cyan().underline())?;
		}
		if let Some(fault) = &self.fault {
			writeln!(
				out,
				"{:<8} {} {}",
				"fault",
				fault.message.red(),
				format!("(clears in {}s)", fault.remaining_ms.div_ceil(1000)).dimmed()
			)?;
		}
		if let Some(node) = &self.node {
			writeln!(out, "{:<8} {} {}", "self", node.name.bold(), node.address_list())?;
		}
		if !self.peers.is_empty() {
			let online = self.peers.iter().filter(|peer| peer.online == Some(true)).count();
			writeln!(out, "{:<8} {} ({online} online)", "peers", self.peers.len())?;
			for peer in &self.peers {
				let marker = if peer.online == Some(true) { "●".green() } else { "○".dimmed() };
				writeln!(out, "  {marker} {} {}", peer.name, peer.address_list().dimmed())?;
			}
		}
		if self.locked_out {
			match &self.lock_sign_command {
				Some(command) => writeln!(out, "{:<8} {} `{command}` on a trusted device", "locked", "run".yellow())?,
				None => writeln!(out, "{:<8} {}", "locked", "node key unknown".yellow())?,
			}
		}
		if self.http_server_started {
			writeln!(out, "{:<8} {}", "http", "started".green())?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetCheckView {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub summary: Option<NetCheckSummary>,
	pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetCheckSummary {
	pub udp_supported: bool,
	pub preferred_derp: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub global_v4: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub global_v6: String,
	pub regions: Vec<RegionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionView {
	pub code: String,
	pub name: String,
	pub latency_ms: f64,
}

impl From<&DiagnosticResult> for NetCheckView {
	fn from(result: &DiagnosticResult) -> Self {
		// Payloads stay opaque; the summary is best effort.
		let summary = result.report().ok().map(|report| NetCheckSummary {
			udp_supported: report.udp_supported,
			preferred_derp: report.preferred_derp.clone(),
			regions: report
				.regions_by_latency()
				.into_iter()
				.map(|region| RegionView {
					code: region.code.clone(),
					name: region.name.clone(),
					latency_ms: region.latency_ms,
				})
				.collect(),
			global_v4: report.global_v4,
			global_v6: report.global_v6,
		});
		Self {
			summary,
			payload: result.payload().clone(),
		}
	}
}

impl Render for NetCheckView {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		let Some(summary) = &self.summary else {
			return writeln!(out, "{}", serde_json::to_string_pretty(&self.payload).unwrap_or_default());
		};
		let udp = if summary.udp_supported { "yes".green() } else { "no".red() };
		writeln!(out, "{:<10} {udp}", "udp")?;
		if !summary.global_v4.is_empty() {
			writeln!(out, "{:<10} {}", "ipv4", summary.global_v4)?;
		}
		if !summary.global_v6.is_empty() {
			writeln!(out, "{:<10} {}", "ipv6", summary.global_v6)?;
		}
		writeln!(out, "{:<10} {}", "preferred", summary.preferred_derp.bold())?;
		for region in &summary.regions {
			writeln!(out, "  {:<6} {:>8.1}ms  {}", region.code, region.latency_ms, region.name.dimmed())?;
		}
		Ok(())
	}
}

/// Event emitted by `watch`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WatchEvent {
	Snapshot(SnapshotView),
	Netcheck(NetCheckView),
	NetcheckFailed { message: String },
}

impl Render for WatchEvent {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		match self {
			WatchEvent::Snapshot(view) => view.render(out),
			WatchEvent::Netcheck(view) => {
				writeln!(out, "{}", "network check".bold())?;
				view.render(out)
			}
			WatchEvent::NetcheckFailed { message } => writeln!(out, "{} {message}", "network check failed:".red()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEntriesView {
	pub path: PathBuf,
	pub entries: BTreeMap<String, String>,
}

impl Render for StateEntriesView {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		if self.entries.is_empty() {
			return writeln!(out, "{} {}", "no state in".dimmed(), self.path.display());
		}
		for (key, value) in &self.entries {
			writeln!(out, "{} {value}", key.bold())?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEntryView {
	pub key: String,
	pub value: Option<String>,
}

impl Render for StateEntryView {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		match &self.value {
			Some(value) => writeln!(out, "{value}"),
			None => writeln!(out, "{} {}", self.key.bold(), "not set".dimmed()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeView {
	pub path: PathBuf,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub key: Option<String>,
	pub changed: bool,
}

impl Render for StateChangeView {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		let what = self.key.as_deref().unwrap_or("state");
		if self.changed {
			writeln!(out, "{} {what}", "updated".green())
		} else {
			writeln!(out, "{} {what}", "unchanged".dimmed())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ipn::{AuthPrompt, NetworkMapStore};
	use serde_json::json;

	fn render(view: &impl Render) -> String {
		colored::control::set_override(false);
		let mut out = Vec::new();
		view.render(&mut out).unwrap();
		String::from_utf8(out).unwrap()
	}

	#[test]
	fn snapshot_view_for_locked_out_node() {
		let mut network_map = NetworkMapStore::new();
		network_map
			.replace_from(
				&json!({
					"self": { "name": "kiosk", "addresses": ["100.64.0.1", "fd7a:115c:a1e0::1"], "nodeKey": "nodekey:abc" },
					"peers": [{ "name": "nas", "addresses": ["100.64.0.2", "fd7a:115c:a1e0::2"], "online": true }],
					"lockedOut": true
				})
				.to_string(),
			)
			.unwrap();
		let snapshot = SessionSnapshot {
			state: LifecycleState::NeedsLogin,
			network_map,
			auth_prompt: AuthPrompt::Pending("https://login.example/x".to_string()),
			..Default::default()
		};

		let view = SnapshotView::from(&snapshot);
		assert_eq!(view.state, "NeedsLogin");
		assert!(view.ready);
		assert_eq!(view.auth_url.as_deref(), Some("https://login.example/x"));
		assert_eq!(view.lock_sign_command.as_deref(), Some("lock sign nodekey:abc"));

		let json = serde_json::to_value(&view).unwrap();
		assert_eq!(json["node"]["addresses"], json!(["100.64.0.1", "fd7a:115c:a1e0::1"]));
		assert_eq!(json["peers"][0]["online"], true);
		assert!(json.get("fault").is_none());

		let text = render(&view);
		assert!(text.contains("visit https://login.example/x"));
		assert!(text.contains("`lock sign nodekey:abc`"));
		assert!(text.contains("(1 online)"));
		assert!(text.contains("kiosk 100.64.0.1, fd7a:115c:a1e0::1"));
		assert!(text.contains("nas 100.64.0.2, fd7a:115c:a1e0::2"));
		assert!(!text.contains("administrator"));
	}

	#[test]
	fn machine_auth_asks_for_admin_approval() {
		let snapshot = SessionSnapshot {
			state: LifecycleState::NeedsMachineAuth,
			..Default::default()
		};
		let text = render(&SnapshotView::from(&snapshot));
		assert!(text.contains("NeedsMachineAuth"));
		assert!(text.contains("An administrator needs to approve this device"));
	}

	#[test]
	fn empty_auth_url_is_not_shown() {
		let snapshot = SessionSnapshot {
			auth_prompt: AuthPrompt::Pending(String::new()),
			..Default::default()
		};
		let view = SnapshotView::from(&snapshot);
		assert_eq!(view.auth_url, None);
		assert!(!view.ready);
	}

	#[test]
	fn watch_events_are_tagged() {
		let event = WatchEvent::NetcheckFailed {
			message: "engine error: busy".to_string(),
		};
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["event"], "netcheckFailed");
		assert_eq!(json["message"], "engine error: busy");
	}
}
