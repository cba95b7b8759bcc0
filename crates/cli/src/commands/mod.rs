//! Command dispatch.

mod config;
mod netcheck;
mod state;
mod watch;

use std::sync::Arc;
use std::time::Duration;

use ipn::{BridgeLoader, FileStore, Session, SessionHost};
use tracing::debug;

use crate::cli::{Cli, Commands, ConfigAction};
use crate::config::EffectiveConfig;
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = EffectiveConfig::load(cli.config.as_deref(), &cli.overrides)?;
	let format = cli.format;

	match cli.command {
		Commands::Watch { netcheck } => watch::run(&config, netcheck, format).await,
		Commands::Netcheck { timeout_secs } => netcheck::run(&config, Duration::from_secs(timeout_secs), format).await,
		Commands::State { action } => state::run(&config, action, format),
		Commands::Config {
			action: ConfigAction::Show,
		} => config::show(&config, format),
	}
}

/// Opens the configured engine, backed by the state file, and starts its session.
async fn start_session<'a>(host: &'a SessionHost, config: &EffectiveConfig) -> Result<&'a Session> {
	let target = config.engine_target()?.clone();
	debug!(target = "ipn", engine = %target, state_file = %config.state_file.display(), "starting session");

	let store = Arc::new(FileStore::load(&config.state_file));
	let loader = BridgeLoader::new(target, store, config.engine_config());
	Ok(host.get_or_start(&loader, config.session_options()).await?)
}
