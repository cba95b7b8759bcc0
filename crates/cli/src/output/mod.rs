//! Structured output envelope, streaming events and text rendering.

mod format;
mod model;
mod views;

use std::io::{self, Write};
use std::time::Instant;

use colored::Colorize;
use serde::Serialize;

pub use format::OutputFormat;
pub use model::{CommandError, CommandResult, ErrorCode, SCHEMA_VERSION};
pub use views::*;

use crate::error::CliError;

/// Human-readable rendering for [`OutputFormat::Text`].
pub trait Render {
	fn render(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Builder for constructing command results.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
		});
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			schema_version: SCHEMA_VERSION,
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			data: self.data,
			error: self.error,
			duration_ms: Some(self.start_time.elapsed().as_millis() as u64),
		}
	}
}

/// Print a command result to stdout in the specified format.
pub fn print_result<T: Serialize + Render>(result: &CommandResult<T>, format: OutputFormat) {
	if let Some(encoded) = format.encode(result, format.is_streaming()) {
		if let Ok(json) = encoded {
			println!("{json}");
		}
		return;
	}

	let mut stdout = io::stdout().lock();
	if let Some(data) = &result.data {
		let _ = data.render(&mut stdout);
	}
	if let Some(error) = &result.error {
		let _ = writeln!(stdout, "{} {}", format!("Error [{}]:", error.code).red().bold(), error.message);
	}
}

/// Print one event of a streaming command. JSON formats emit one line per
/// event so the stream can be consumed incrementally.
pub fn print_event<T: Serialize + Render>(event: &T, format: OutputFormat) {
	let mut stdout = io::stdout().lock();
	match format.encode(event, true) {
		Some(Ok(json)) => {
			let _ = writeln!(stdout, "{json}");
		}
		Some(Err(_)) => {}
		None => {
			let _ = event.render(&mut stdout);
			let _ = writeln!(stdout);
		}
	}
	let _ = stdout.flush();
}

/// Print the envelope for a failed command.
pub fn print_failure(command: &str, err: &CliError, format: OutputFormat) {
	let result: CommandResult<()> = ResultBuilder::new(command).error(err.code(), err.to_string()).build();
	if format == OutputFormat::Text {
		eprintln!("{} {}", format!("Error [{}]:", err.code()).red().bold(), err);
	} else {
		print_result(&result, format);
	}
}

impl Render for () {
	fn render(&self, _out: &mut dyn Write) -> io::Result<()> {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_marks_success_only_with_data() {
		let ok = ResultBuilder::new("state.get").data(serde_json::json!({ "key": "k" })).build();
		assert!(ok.ok);
		assert_eq!(ok.schema_version, SCHEMA_VERSION);

		let failed: CommandResult<()> = ResultBuilder::new("netcheck").error(ErrorCode::NotReady, "engine state is NoState").build();
		assert!(!failed.ok);
		let json = serde_json::to_value(&failed).unwrap();
		assert_eq!(json["error"]["code"], "NOT_READY");
		assert!(json.get("data").is_none());
	}
}
