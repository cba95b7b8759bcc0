use std::path::PathBuf;

use thiserror::Error;

use crate::output::ErrorCode;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("failed to read config file {path}: {source}")]
	ConfigFile {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("no engine configured; pass --engine or set `engine` in the config file")]
	NoEngine,

	#[error("{0}")]
	Session(#[from] ipn::Error),

	#[error("timed out after {secs}s waiting for {what}")]
	Timeout { what: &'static str, secs: u64 },

	#[error("a network check is already in progress")]
	CheckInProgress,

	#[error("engine disconnected")]
	Disconnected,

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl CliError {
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::Config(_) | CliError::ConfigFile { .. } | CliError::NoEngine => ErrorCode::InvalidConfig,
			CliError::Session(err) if err.is_decode() => ErrorCode::DecodeError,
			CliError::Session(ipn::Error::NotReady(_)) => ErrorCode::NotReady,
			CliError::Session(ipn::Error::Json(_)) | CliError::Json(_) => ErrorCode::InternalError,
			CliError::Session(_) | CliError::Disconnected => ErrorCode::EngineError,
			CliError::CheckInProgress => ErrorCode::Busy,
			CliError::Timeout { .. } => ErrorCode::Timeout,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Other(_) => ErrorCode::InternalError,
		}
	}
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes() {
		assert_eq!(CliError::NoEngine.code(), ErrorCode::InvalidConfig);
		assert_eq!(CliError::Session(ipn::Error::NotReady("NoState".into())).code(), ErrorCode::NotReady);
		assert_eq!(CliError::Session(ipn::Error::ChannelClosed).code(), ErrorCode::EngineError);
		let decode: ipn::Error = serde_json::from_str::<u8>("x").unwrap_err().into();
		assert_eq!(CliError::Session(decode).code(), ErrorCode::InternalError);
		assert_eq!(CliError::Timeout { what: "engine", secs: 3 }.code(), ErrorCode::Timeout);
		assert_eq!(CliError::CheckInProgress.code(), ErrorCode::Busy);
		assert_eq!(CliError::from(anyhow::anyhow!("boom")).code(), ErrorCode::InternalError);
	}

	#[test]
	fn skipped_network_check_is_reported_as_busy() {
		let err = CliError::CheckInProgress;
		assert_eq!(err.to_string(), "a network check is already in progress");
		assert_eq!(serde_json::to_value(err.code()).unwrap(), "BUSY");
		assert_eq!(err.code().to_string(), "BUSY");
	}
}
