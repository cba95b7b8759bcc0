use ipn::SessionHost;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::start_session;
use crate::config::EffectiveConfig;
use crate::error::{CliError, Result};
use crate::output::{NetCheckView, OutputFormat, SnapshotView, WatchEvent, print_event};

/// Streams session snapshots until Ctrl-C or until the engine goes away.
pub async fn run(config: &EffectiveConfig, netcheck: bool, format: OutputFormat) -> Result<()> {
	let host = SessionHost::new();
	let session = start_session(&host, config).await?;
	let mut snapshots = session.subscribe();
	let (check_tx, mut check_rx) = mpsc::unbounded_channel();
	let mut check_requested = false;

	let interrupt = tokio::signal::ctrl_c();
	tokio::pin!(interrupt);

	let initial = SnapshotView::from(&*snapshots.borrow_and_update());
	print_event(&WatchEvent::Snapshot(initial), format);

	loop {
		tokio::select! {
			result = &mut interrupt => {
				if let Err(err) = result {
					warn!(target = "ipn", error = %err, "failed to listen for Ctrl-C");
				}
				info!(target = "ipn", "interrupted");
				return Ok(());
			}
			changed = snapshots.changed() => {
				if changed.is_err() {
					return Err(CliError::Disconnected);
				}
				let snapshot = snapshots.borrow_and_update().clone();
				print_event(&WatchEvent::Snapshot(SnapshotView::from(&snapshot)), format);

				if netcheck && !check_requested && snapshot.is_ready() {
					check_requested = true;
					let diagnostics = session.diagnostics().clone();
					let check_tx = check_tx.clone();
					tokio::spawn(async move {
						let _ = check_tx.send(diagnostics.run_check().await);
					});
				}
			}
			Some(result) = check_rx.recv() => {
				let event = match result {
					Ok(Some(result)) => WatchEvent::Netcheck(NetCheckView::from(&result)),
					Ok(None) => continue,
					Err(err) => WatchEvent::NetcheckFailed { message: err.to_string() },
				};
				print_event(&event, format);
			}
		}
	}
}
