//! Line-delimited JSON messages exchanged with an out-of-process engine.
//!
//! Each message is a single JSON object on its own line. Requests flow from
//! the client to the engine and are answered by a [`Response`] with the same
//! `id`. The engine pushes notifications (no `id`) and may call back into the
//! client for persisted state (`id` plus `method`):
//!
//! ```json
//! {"id":0,"method":"run","params":{"hostname":"kiosk"}}
//! {"method":"notifyState","params":"NeedsLogin"}
//! {"id":7,"method":"getState","params":{"key":"log-policy"}}
//! {"id":0,"result":null}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METHOD_RUN: &str = "run";
pub const METHOD_LOGIN: &str = "login";
pub const METHOD_NET_CHECK: &str = "netCheck";
pub const METHOD_FETCH: &str = "fetch";
pub const METHOD_START_HTTP_SERVER: &str = "startHTTPServer";

pub const NOTIFY_STATE: &str = "notifyState";
pub const NOTIFY_NET_MAP: &str = "notifyNetMap";
pub const NOTIFY_BROWSE_TO_URL: &str = "notifyBrowseToURL";
pub const NOTIFY_PANIC_RECOVER: &str = "notifyPanicRecover";

pub const CALL_GET_STATE: &str = "getState";
pub const CALL_SET_STATE: &str = "setState";

/// Request sent from the client to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	pub id: u32,
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Answer to a [`Request`] or to an engine-initiated [`Call`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub id: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

impl Response {
	pub fn ok(id: u32, result: Value) -> Self {
		Self {
			id,
			result: Some(result),
			error: None,
		}
	}

	pub fn err(id: u32, message: impl Into<String>) -> Self {
		Self {
			id,
			result: None,
			error: Some(ErrorPayload { message: message.into() }),
		}
	}
}

/// Engine-side failure description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub message: String,
}

/// Fire-and-forget notification pushed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Engine-initiated request that the client must answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
	pub id: u32,
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Discriminated union of messages arriving from the engine.
///
/// Variant order matters for `untagged`: a call carries both `id` and
/// `method`, a notification only `method`, a response only `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Call(Call),
	Notification(Notification),
	Response(Response),
}

/// Parameters of a `getState`/`setState` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateParams {
	pub key: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
}

/// Startup options handed to the engine with `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
	#[serde(default, rename = "controlURL", skip_serializing_if = "Option::is_none")]
	pub control_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hostname: Option<String>,
}

/// `fetch` result: the subset of a browser `Response` the client reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
	pub status: u16,
	#[serde(default)]
	pub status_text: String,
	#[serde(default)]
	pub body: String,
}

impl FetchResponse {
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn untagged_message_variants() {
		let response: Message = serde_json::from_str(r#"{"id": 3, "result": {"ok": true}}"#).unwrap();
		assert!(matches!(response, Message::Response(Response { id: 3, .. })));

		let notification: Message = serde_json::from_str(r#"{"method": "notifyState", "params": "Running"}"#).unwrap();
		match notification {
			Message::Notification(n) => {
				assert_eq!(n.method, NOTIFY_STATE);
				assert_eq!(n.params, json!("Running"));
			}
			other => panic!("expected notification, got {other:?}"),
		}

		let call: Message = serde_json::from_str(r#"{"id": 9, "method": "getState", "params": {"key": "k"}}"#).unwrap();
		assert!(matches!(call, Message::Call(Call { id: 9, .. })));
	}

	#[test]
	fn error_response_shape() {
		let value = serde_json::to_value(Response::err(4, "DERPMap not available")).unwrap();
		assert_eq!(value, json!({"id": 4, "error": {"message": "DERPMap not available"}}));
	}

	#[test]
	fn engine_config_uses_engine_field_names() {
		let config = EngineConfig {
			control_url: Some("https://controlplane.example".to_string()),
			auth_key: None,
			hostname: Some("kiosk".to_string()),
		};
		assert_eq!(
			serde_json::to_value(&config).unwrap(),
			json!({"controlURL": "https://controlplane.example", "hostname": "kiosk"})
		);
	}
}
