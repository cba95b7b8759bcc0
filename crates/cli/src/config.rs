//! Config file loading and flag overrides.
//!
//! The file lives at `~/.config/ipn-status/config.json` unless `--config`
//! points elsewhere. A missing default file is not an error; a missing
//! explicit one is.

use std::fs;
use std::path::{Path, PathBuf};

use ipn::{EngineConfig, EngineTarget, SessionOptions};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::ConfigOverrides;
use crate::error::{CliError, Result};

const APP_DIR: &str = "ipn-status";
const CONFIG_FILE: &str = "config.json";
const STATE_FILE: &str = "state.json";

/// On-disk config format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
	#[serde(default)]
	pub control_url: Option<String>,
	#[serde(default)]
	pub auth_key: Option<String>,
	#[serde(default)]
	pub hostname: Option<String>,
	#[serde(default)]
	pub http_port: Option<u16>,
	/// Command line to spawn, or `tcp://host:port`.
	#[serde(default)]
	pub engine: Option<String>,
	#[serde(default)]
	pub state_file: Option<PathBuf>,
}

impl ConfigFile {
	/// Reads `explicit`, or the default location when `None`.
	pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
		match explicit {
			Some(path) => {
				let content = fs::read_to_string(path).map_err(|source| CliError::ConfigFile {
					path: path.to_path_buf(),
					source,
				})?;
				Ok((Self::parse(&content, path)?, Some(path.to_path_buf())))
			}
			None => {
				let Some(path) = default_config_path() else {
					return Ok((Self::default(), None));
				};
				match fs::read_to_string(&path) {
					Ok(content) => Ok((Self::parse(&content, &path)?, Some(path))),
					Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok((Self::default(), None)),
					Err(source) => Err(CliError::ConfigFile { path, source }),
				}
			}
		}
	}

	fn parse(content: &str, path: &Path) -> Result<Self> {
		serde_json::from_str(content).map_err(|err| CliError::Config(format!("{}: {err}", path.display())))
	}
}

pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn default_state_path() -> PathBuf {
	dirs::data_local_dir()
		.map(|dir| dir.join(APP_DIR))
		.unwrap_or_else(|| PathBuf::from(".").join(format!(".{APP_DIR}")))
		.join(STATE_FILE)
}

/// Configuration after applying flags over the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub config_path: Option<PathBuf>,
	#[serde(skip_serializing_if = "Option::is_none", serialize_with = "display")]
	pub control_url: Option<Url>,
	#[serde(skip_serializing_if = "Option::is_none", serialize_with = "redact")]
	pub auth_key: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub hostname: Option<String>,
	pub http_port: u16,
	#[serde(skip_serializing_if = "Option::is_none", serialize_with = "display")]
	pub engine: Option<EngineTarget>,
	pub state_file: PathBuf,
}

impl EffectiveConfig {
	pub fn resolve(file: ConfigFile, config_path: Option<PathBuf>, overrides: &ConfigOverrides) -> Result<Self> {
		let control_url = overrides
			.control_url
			.clone()
			.or(file.control_url)
			.map(|raw| parse_control_url(&raw))
			.transpose()?;
		let engine = overrides
			.engine
			.clone()
			.or(file.engine)
			.map(|raw| raw.parse::<EngineTarget>().map_err(|err| CliError::Config(format!("engine: {err}"))))
			.transpose()?;
		let http_port = overrides.http_port.or(file.http_port).unwrap_or(ipn::DEFAULT_HTTP_PORT);
		if http_port == 0 {
			return Err(CliError::Config("httpPort must be non-zero".to_string()));
		}

		Ok(Self {
			config_path,
			control_url,
			auth_key: overrides.auth_key.clone().or(file.auth_key).filter(|key| !key.is_empty()),
			hostname: overrides.hostname.clone().or(file.hostname),
			http_port,
			engine,
			state_file: overrides.state_file.clone().or(file.state_file).unwrap_or_else(default_state_path),
		})
	}

	pub fn load(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
		let (file, path) = ConfigFile::load(explicit)?;
		Self::resolve(file, path, overrides)
	}

	/// Options handed to the engine with `run`.
	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			control_url: self.control_url.as_ref().map(Url::to_string),
			auth_key: self.auth_key.clone(),
			hostname: self.hostname.clone(),
		}
	}

	pub fn session_options(&self) -> SessionOptions {
		SessionOptions { http_port: self.http_port }
	}

	pub fn engine_target(&self) -> Result<&EngineTarget> {
		self.engine.as_ref().ok_or(CliError::NoEngine)
	}
}

fn parse_control_url(raw: &str) -> Result<Url> {
	let url = Url::parse(raw).map_err(|err| CliError::Config(format!("controlUrl `{raw}`: {err}")))?;
	match url.scheme() {
		"http" | "https" => Ok(url),
		other => Err(CliError::Config(format!("controlUrl must be http or https, got `{other}`"))),
	}
}

fn redact<S: serde::Serializer>(value: &Option<String>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
	match value {
		Some(_) => serializer.serialize_str("<redacted>"),
		None => serializer.serialize_none(),
	}
}

fn display<T: std::fmt::Display, S: serde::Serializer>(value: &Option<T>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
	match value {
		Some(value) => serializer.collect_str(value),
		None => serializer.serialize_none(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn write_config(dir: &TempDir, body: serde_json::Value) -> PathBuf {
		let path = dir.path().join("config.json");
		fs::write(&path, body.to_string()).unwrap();
		path
	}

	#[test]
	fn flags_override_file_values() {
		let dir = TempDir::new().unwrap();
		let path = write_config(
			&dir,
			serde_json::json!({
				"controlUrl": "https://control.example.com",
				"hostname": "from-file",
				"httpPort": 9000,
				"engine": "ipn-bridge --stdio",
				"stateFile": dir.path().join("state.json"),
			}),
		);
		let overrides = ConfigOverrides {
			hostname: Some("from-flag".to_string()),
			..Default::default()
		};

		let config = EffectiveConfig::load(Some(&path), &overrides).unwrap();
		assert_eq!(config.hostname.as_deref(), Some("from-flag"));
		assert_eq!(config.http_port, 9000);
		assert_eq!(config.control_url.as_ref().map(Url::as_str), Some("https://control.example.com/"));
		assert_eq!(
			config.engine_target().unwrap(),
			&EngineTarget::Command {
				program: "ipn-bridge".to_string(),
				args: vec!["--stdio".to_string()],
			}
		);
		assert_eq!(config.state_file, dir.path().join("state.json"));
		assert_eq!(config.engine_config().hostname.as_deref(), Some("from-flag"));
	}

	#[test]
	fn defaults_without_file_values() {
		let config = EffectiveConfig::resolve(ConfigFile::default(), None, &ConfigOverrides::default()).unwrap();
		assert_eq!(config.http_port, ipn::DEFAULT_HTTP_PORT);
		assert!(matches!(config.engine_target(), Err(CliError::NoEngine)));
		assert!(config.state_file.ends_with("state.json"));
	}

	#[test]
	fn rejects_bad_control_url() {
		let overrides = ConfigOverrides {
			control_url: Some("ftp://control.example.com".to_string()),
			..Default::default()
		};
		assert!(matches!(
			EffectiveConfig::resolve(ConfigFile::default(), None, &overrides),
			Err(CliError::Config(_))
		));

		let overrides = ConfigOverrides {
			control_url: Some("not a url".to_string()),
			..Default::default()
		};
		assert!(EffectiveConfig::resolve(ConfigFile::default(), None, &overrides).is_err());
	}

	#[test]
	fn missing_explicit_file_is_an_error() {
		let dir = TempDir::new().unwrap();
		let missing = dir.path().join("nope.json");
		assert!(matches!(
			EffectiveConfig::load(Some(&missing), &ConfigOverrides::default()),
			Err(CliError::ConfigFile { .. })
		));
	}

	#[test]
	fn auth_key_is_redacted() {
		let overrides = ConfigOverrides {
			auth_key: Some("tskey-secret".to_string()),
			engine: Some("tcp://127.0.0.1:7070".to_string()),
			..Default::default()
		};
		let config = EffectiveConfig::resolve(ConfigFile::default(), None, &overrides).unwrap();
		assert_eq!(config.engine_config().auth_key.as_deref(), Some("tskey-secret"));

		let json = serde_json::to_value(&config).unwrap();
		assert_eq!(json["authKey"], "<redacted>");
		assert_eq!(json["engine"], "tcp://127.0.0.1:7070");
	}
}
