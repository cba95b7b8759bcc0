use std::time::Duration;

use ipn::{SessionHost, SessionSnapshot};

use super::start_session;
use crate::config::EffectiveConfig;
use crate::error::{CliError, Result};
use crate::output::{NetCheckView, OutputFormat, ResultBuilder, print_result};

/// Waits for the engine to report a state, then runs one network check.
pub async fn run(config: &EffectiveConfig, timeout: Duration, format: OutputFormat) -> Result<()> {
	let host = SessionHost::new();
	let session = start_session(&host, config).await?;

	let result = tokio::time::timeout(timeout, async {
		session.wait_for(SessionSnapshot::is_ready).await?;
		session.net_check().await
	})
	.await
	.map_err(|_| CliError::Timeout {
		what: "the network check",
		secs: timeout.as_secs(),
	})??;

	let Some(result) = result else {
		return Err(CliError::CheckInProgress);
	};

	let view = NetCheckView::from(&result);
	print_result(&ResultBuilder::new("netcheck").data(view).build(), format);
	Ok(())
}
