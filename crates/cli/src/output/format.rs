use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

/// How results and events reach stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON envelope (default)
	#[default]
	Json,
	/// One compact JSON object per line
	Ndjson,
	/// Human-readable, colored text
	Text,
}

impl OutputFormat {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Json => "json",
			Self::Ndjson => "ndjson",
			Self::Text => "text",
		}
	}

	/// Every record is written as a single compact line.
	pub const fn is_streaming(self) -> bool {
		matches!(self, Self::Ndjson)
	}

	/// Serializes `value` for the JSON formats. Returns `None` for text, which
	/// goes through [`Render`](super::Render) instead.
	pub fn encode<T: Serialize>(self, value: &T, single_line: bool) -> Option<serde_json::Result<String>> {
		match self {
			Self::Text => None,
			_ if single_line => Some(serde_json::to_string(value)),
			_ => Some(serde_json::to_string_pretty(value)),
		}
	}
}

impl fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn names_match_the_command_line() {
		for format in OutputFormat::value_variants() {
			let value = format.to_possible_value().unwrap();
			assert_eq!(value.get_name(), format.as_str());
			assert_eq!(format.to_string(), format.as_str());
		}
	}

	#[test]
	fn only_ndjson_streams() {
		assert!(OutputFormat::Ndjson.is_streaming());
		assert!(!OutputFormat::Json.is_streaming());
		assert!(!OutputFormat::Text.is_streaming());
	}

	#[test]
	fn encode_follows_the_format() {
		let value = json!({ "state": "Running", "ready": true });

		let pretty = OutputFormat::Json.encode(&value, false).unwrap().unwrap();
		assert!(pretty.contains('\n'));
		let line = OutputFormat::Json.encode(&value, true).unwrap().unwrap();
		assert!(!line.contains('\n'));
		let streamed = OutputFormat::Ndjson.encode(&value, OutputFormat::Ndjson.is_streaming()).unwrap().unwrap();
		assert_eq!(streamed, line);

		assert!(OutputFormat::Text.encode(&value, true).is_none());
	}
}
