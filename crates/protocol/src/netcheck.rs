//! Network check report shape produced by the engine's `netCheck`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Connectivity report as encoded by the engine.
///
/// The diagnostics layer treats results as opaque JSON; this type is a typed
/// view for callers that want to render the well-known fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetCheckReport {
	/// Display name of the preferred relay region, e.g. `"Tokyo (tok)"`.
	#[serde(default, rename = "preferredDERP")]
	pub preferred_derp: String,
	/// Latency per relay region, keyed by display name.
	#[serde(default)]
	pub region_latency: BTreeMap<String, RegionLatency>,
	#[serde(default)]
	pub udp_supported: bool,
	#[serde(default, rename = "globalV4")]
	pub global_v4: String,
	#[serde(default, rename = "globalV6")]
	pub global_v6: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionLatency {
	pub name: String,
	pub code: String,
	/// `"lat, lon"` with two decimals.
	#[serde(default)]
	pub location: String,
	#[serde(rename = "latencyMS")]
	pub latency_ms: f64,
}

impl NetCheckReport {
	/// Regions ordered from fastest to slowest.
	pub fn regions_by_latency(&self) -> Vec<&RegionLatency> {
		let mut regions: Vec<&RegionLatency> = self.region_latency.values().collect();
		regions.sort_by(|a, b| a.latency_ms.total_cmp(&b.latency_ms));
		regions
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_and_orders_regions() {
		let raw = r#"{
			"preferredDERP": "Tokyo (tok)",
			"regionLatency": {
				"Tokyo (tok)": { "name": "Tokyo", "code": "tok", "location": "35.68, 139.69", "latencyMS": 12.5 },
				"Frankfurt (fra)": { "name": "Frankfurt", "code": "fra", "location": "50.11, 8.68", "latencyMS": 220.0 },
				"Singapore (sin)": { "name": "Singapore", "code": "sin", "location": "1.35, 103.82", "latencyMS": 70.25 }
			},
			"udpSupported": true,
			"globalV4": "203.0.113.7:41641",
			"globalV6": ""
		}"#;
		let report: NetCheckReport = serde_json::from_str(raw).unwrap();
		assert_eq!(report.preferred_derp, "Tokyo (tok)");
		assert!(report.udp_supported);
		let codes: Vec<&str> = report.regions_by_latency().iter().map(|r| r.code.as_str()).collect();
		assert_eq!(codes, vec!["tok", "sin", "fra"]);
	}
}
