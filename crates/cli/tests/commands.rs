use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;

use serde_json::{Value, json};
use tempfile::TempDir;

fn ipn_binary() -> PathBuf {
	PathBuf::from(env!("CARGO_BIN_EXE_ipn"))
}

/// Runs `ipn` with an isolated home, config file and state file.
fn run_ipn(workdir: &Path, args: &[&str]) -> (bool, String, String) {
	let config = workdir.join("config.json");
	let state = workdir.join("state.json");
	let output = Command::new(ipn_binary())
		.current_dir(workdir)
		.env("HOME", workdir)
		.env("XDG_CONFIG_HOME", workdir.join(".config"))
		.env("NO_COLOR", "1")
		.env_remove("IPN_AUTH_KEY")
		.env_remove("IPN_CONFIG")
		.env_remove("RUST_LOG")
		.args(["--config", config.to_str().expect("utf-8 path")])
		.args(["--state-file", state.to_str().expect("utf-8 path")])
		.args(args)
		.output()
		.expect("failed to execute ipn");

	let stdout = String::from_utf8_lossy(&output.stdout).to_string();
	let stderr = String::from_utf8_lossy(&output.stderr).to_string();
	(output.status.success(), stdout, stderr)
}

fn run_json(workdir: &Path, args: &[&str]) -> (bool, Value, String) {
	let (success, stdout, stderr) = run_ipn(workdir, args);
	let parsed = serde_json::from_str::<Value>(&stdout).unwrap_or_else(|_| json!({ "raw": stdout }));
	(success, parsed, stderr)
}

fn workspace(config: Value) -> TempDir {
	let tmp = TempDir::new().expect("temp dir should be created");
	std::fs::write(tmp.path().join("config.json"), config.to_string()).expect("config should be written");
	tmp
}

#[test]
fn state_commands_edit_the_state_file() {
	let tmp = workspace(json!({}));

	let (success, json, stderr) = run_json(tmp.path(), &["state", "set", "_machinekey", "mkey:01"]);
	assert!(success, "state set failed: {stderr}");
	assert_eq!(json["ok"], true);
	assert_eq!(json["command"], "state.set");
	assert_eq!(json["data"]["changed"], true);

	let (success, json, _) = run_json(tmp.path(), &["state", "get", "_machinekey"]);
	assert!(success);
	assert_eq!(json["data"]["value"], "mkey:01");

	let (success, json, _) = run_json(tmp.path(), &["state", "list"]);
	assert!(success);
	assert_eq!(json["data"]["entries"], json!({ "_machinekey": "mkey:01" }));

	let (success, json, _) = run_json(tmp.path(), &["state", "rm", "_machinekey"]);
	assert!(success);
	assert_eq!(json["data"]["changed"], true);

	let (success, json, _) = run_json(tmp.path(), &["state", "get", "_machinekey"]);
	assert!(success);
	assert_eq!(json["data"]["value"], Value::Null);

	let (success, json, _) = run_json(tmp.path(), &["state", "clear"]);
	assert!(success);
	assert_eq!(json["data"]["changed"], true);
	assert!(!tmp.path().join("state.json").exists());
}

#[test]
fn state_get_text_output() {
	let tmp = workspace(json!({}));
	let (success, _, stderr) = run_ipn(tmp.path(), &["state", "set", "_profiles", "{}"]);
	assert!(success, "state set failed: {stderr}");

	let (success, stdout, _) = run_ipn(tmp.path(), &["-f", "text", "state", "get", "_profiles"]);
	assert!(success);
	assert_eq!(stdout.trim(), "{}");
}

#[test]
fn config_show_merges_flags_and_redacts_auth_key() {
	let tmp = workspace(json!({
		"controlUrl": "https://control.example.com",
		"hostname": "kiosk",
		"engine": "ipn-bridge --stdio",
	}));

	let (success, json, stderr) = run_json(tmp.path(), &["config", "show", "--hostname", "lobby", "--auth-key", "tskey-secret"]);
	assert!(success, "config show failed: {stderr}");
	let data = &json["data"];
	assert_eq!(data["hostname"], "lobby");
	assert_eq!(data["controlUrl"], "https://control.example.com/");
	assert_eq!(data["engine"], "ipn-bridge --stdio");
	assert_eq!(data["httpPort"], 8080);
	assert_eq!(data["authKey"], "<redacted>");
	assert!(!json.to_string().contains("tskey-secret"));
}

#[test]
fn invalid_control_url_is_rejected() {
	let tmp = workspace(json!({ "controlUrl": "control.example.com" }));
	let (success, json, _) = run_json(tmp.path(), &["config", "show"]);
	assert!(!success);
	assert_eq!(json["ok"], false);
	assert_eq!(json["error"]["code"], "INVALID_CONFIG");
}

#[test]
fn netcheck_requires_an_engine() {
	let tmp = workspace(json!({}));
	let (success, json, _) = run_json(tmp.path(), &["netcheck"]);
	assert!(!success);
	assert_eq!(json["command"], "netcheck");
	assert_eq!(json["error"]["code"], "INVALID_CONFIG");
}

/// Minimal engine bridge: persists one state key, reports `Running` and
/// answers a network check.
fn spawn_fake_engine() -> (String, thread::JoinHandle<Vec<String>>) {
	let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake engine");
	let addr = listener.local_addr().expect("local addr").to_string();

	let handle = thread::spawn(move || {
		let (stream, _) = listener.accept().expect("accept client");
		let mut writer = stream.try_clone().expect("clone stream");
		let reader = BufReader::new(stream);
		let mut methods = Vec::new();

		let mut send = |message: Value| {
			writeln!(writer, "{message}").expect("write to client");
		};

		for line in reader.lines() {
			let Ok(line) = line else { break };
			let message: Value = serde_json::from_str(&line).expect("client sends JSON");
			let Some(method) = message["method"].as_str() else {
				continue;
			};
			methods.push(method.to_string());
			let id = message["id"].clone();
			match method {
				"run" => {
					send(json!({ "id": id, "result": null }));
					send(json!({ "id": 9000, "method": "setState", "params": { "key": "_machinekey", "value": "mkey:42" } }));
					send(json!({ "method": "notifyState", "params": "Running" }));
				}
				"startHTTPServer" => send(json!({ "id": id, "result": { "listening": true } })),
				"netCheck" => {
					let report = json!({
						"udpSupported": true,
						"preferredDERP": "Frankfurt (fra)",
						"regionLatency": {
							"Frankfurt (fra)": { "name": "Frankfurt", "code": "fra", "latencyMS": 12.5 },
							"Tokyo (tok)": { "name": "Tokyo", "code": "tok", "latencyMS": 240.0 }
						}
					});
					send(json!({ "id": id, "result": report.to_string() }));
				}
				_ => send(json!({ "id": id, "result": null })),
			}
		}
		methods
	});

	(format!("tcp://{addr}"), handle)
}

#[test]
fn netcheck_against_bridge_engine() {
	let tmp = workspace(json!({}));
	let (engine, fake) = spawn_fake_engine();

	let (success, json, stderr) = run_json(tmp.path(), &["--engine", &engine, "netcheck", "--timeout-secs", "10"]);
	assert!(success, "netcheck failed: {stderr}");
	assert_eq!(json["ok"], true);
	let summary = &json["data"]["summary"];
	assert_eq!(summary["udpSupported"], true);
	assert_eq!(summary["preferredDerp"], "Frankfurt (fra)");
	assert_eq!(summary["regions"][0]["code"], "fra");
	assert_eq!(json["data"]["payload"]["regionLatency"]["Tokyo (tok)"]["code"], "tok");

	let methods = fake.join().expect("fake engine thread");
	assert_eq!(methods[0], "run");
	assert!(methods.contains(&"netCheck".to_string()));

	let (success, json, _) = run_json(tmp.path(), &["state", "get", "_machinekey"]);
	assert!(success);
	assert_eq!(json["data"]["value"], "mkey:42");
}
