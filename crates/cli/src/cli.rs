use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ipn")]
#[command(about = "Session status and diagnostics for a mesh-VPN engine")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Json)]
	pub format: OutputFormat,

	/// Config file (defaults to ~/.config/ipn-status/config.json)
	#[arg(long, global = true, value_name = "FILE", env = "IPN_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(flatten)]
	pub overrides: ConfigOverrides,

	#[command(subcommand)]
	pub command: Commands,
}

/// Flags that take precedence over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
	/// Engine to drive: a command line to spawn, or tcp://host:port
	#[arg(long, global = true, value_name = "TARGET")]
	pub engine: Option<String>,

	/// Coordination server URL
	#[arg(long, global = true, value_name = "URL")]
	pub control_url: Option<String>,

	/// Pre-authorized key for unattended login
	#[arg(long, global = true, env = "IPN_AUTH_KEY", hide_env_values = true)]
	pub auth_key: Option<String>,

	/// Hostname to register with
	#[arg(long, global = true)]
	pub hostname: Option<String>,

	/// Port for the engine-hosted HTTP server
	#[arg(long, global = true)]
	pub http_port: Option<u16>,

	/// File backing the engine's persisted state
	#[arg(long, global = true, value_name = "FILE")]
	pub state_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Start the engine and print every session change until interrupted
	Watch {
		/// Run one network check as soon as the engine is ready
		#[arg(long)]
		netcheck: bool,
	},

	/// Run a single network check and print the report
	#[command(alias = "nc")]
	Netcheck {
		/// How long to wait for the engine to become ready
		#[arg(long, default_value_t = 30)]
		timeout_secs: u64,
	},

	/// Inspect the engine's persisted state
	State {
		#[command(subcommand)]
		action: StateAction,
	},

	/// Inspect configuration
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

impl Commands {
	/// Name reported in the output envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Watch { .. } => "watch",
			Commands::Netcheck { .. } => "netcheck",
			Commands::State { action } => match action {
				StateAction::List => "state.list",
				StateAction::Get { .. } => "state.get",
				StateAction::Set { .. } => "state.set",
				StateAction::Remove { .. } => "state.remove",
				StateAction::Clear => "state.clear",
			},
			Commands::Config { action } => match action {
				ConfigAction::Show => "config.show",
			},
		}
	}
}

#[derive(Subcommand, Debug)]
pub enum StateAction {
	/// List all stored keys and values
	#[command(alias = "ls")]
	List,
	/// Print one value
	Get { key: String },
	/// Store a value
	Set { key: String, value: String },
	/// Delete one key
	#[command(alias = "rm")]
	Remove { key: String },
	/// Delete the state file
	Clear,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
	/// Print the effective configuration
	Show,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_watch_with_netcheck() {
		let cli = Cli::try_parse_from(["ipn", "watch", "--netcheck"]).unwrap();
		assert!(matches!(cli.command, Commands::Watch { netcheck: true }));
		assert_eq!(cli.format, OutputFormat::Json);
		assert_eq!(cli.command.name(), "watch");
	}

	#[test]
	fn parse_netcheck_default_timeout() {
		let cli = Cli::try_parse_from(["ipn", "netcheck"]).unwrap();
		match cli.command {
			Commands::Netcheck { timeout_secs } => assert_eq!(timeout_secs, 30),
			_ => panic!("Expected Netcheck command"),
		}
	}

	#[test]
	fn global_flags_after_subcommand() {
		let cli = Cli::try_parse_from([
			"ipn",
			"state",
			"set",
			"_profiles",
			"{}",
			"--state-file",
			"/tmp/state.json",
			"-f",
			"text",
			"-vv",
		])
		.unwrap();
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.format, OutputFormat::Text);
		assert_eq!(cli.overrides.state_file, Some(PathBuf::from("/tmp/state.json")));
		match cli.command {
			Commands::State {
				action: StateAction::Set { key, value },
			} => {
				assert_eq!(key, "_profiles");
				assert_eq!(value, "{}");
			}
			_ => panic!("Expected state set"),
		}
	}

	#[test]
	fn engine_override() {
		let cli = Cli::try_parse_from(["ipn", "--engine", "tcp://127.0.0.1:7070", "--http-port", "9000", "config", "show"]).unwrap();
		assert_eq!(cli.overrides.engine.as_deref(), Some("tcp://127.0.0.1:7070"));
		assert_eq!(cli.overrides.http_port, Some(9000));
		assert_eq!(cli.command.name(), "config.show");
	}

	#[test]
	fn rejects_unknown_format() {
		assert!(Cli::try_parse_from(["ipn", "-f", "yaml", "config", "show"]).is_err());
	}
}
