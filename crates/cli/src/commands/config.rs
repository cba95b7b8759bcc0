use std::io::{self, Write};

use colored::Colorize;

use crate::config::EffectiveConfig;
use crate::error::Result;
use crate::output::{OutputFormat, Render, ResultBuilder, print_result};

pub fn show(config: &EffectiveConfig, format: OutputFormat) -> Result<()> {
	print_result(&ResultBuilder::new("config.show").data(config.clone()).build(), format);
	Ok(())
}

impl Render for EffectiveConfig {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		let unset = || "(unset)".dimmed().to_string();
		let path = self.config_path.as_ref().map(|path| path.display().to_string());
		writeln!(out, "{:<12} {}", "config", path.unwrap_or_else(unset))?;
		writeln!(out, "{:<12} {}", "engine", self.engine.as_ref().map(ToString::to_string).unwrap_or_else(unset))?;
		writeln!(out, "{:<12} {}", "controlUrl", self.control_url.as_ref().map(ToString::to_string).unwrap_or_else(unset))?;
		writeln!(out, "{:<12} {}", "hostname", self.hostname.clone().unwrap_or_else(unset))?;
		let auth_key = if self.auth_key.is_some() { "<redacted>".to_string() } else { unset() };
		writeln!(out, "{:<12} {auth_key}", "authKey")?;
		writeln!(out, "{:<12} {}", "httpPort", self.http_port)?;
		writeln!(out, "{:<12} {}", "stateFile", self.state_file.display())
	}
}
