//! On-demand network checks against the engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ipn_protocol::NetCheckReport;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::coordinator::SessionSnapshot;
use crate::engine::Engine;
use crate::error::{Error, Result};

/// Decoded result of one network check.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticResult {
	payload: Value,
}

impl DiagnosticResult {
	/// The report exactly as the engine encoded it.
	pub fn payload(&self) -> &Value {
		&self.payload
	}

	pub fn into_payload(self) -> Value {
		self.payload
	}

	/// Typed view, when the payload has the engine's usual shape.
	pub fn report(&self) -> Result<NetCheckReport> {
		serde_json::from_value(self.payload.clone()).map_err(|err| Error::decode("net check report", err))
	}
}

/// Runs network checks, never more than one at a time.
#[derive(Clone)]
pub struct DiagnosticsClient {
	engine: Arc<dyn Engine>,
	snapshots: watch::Receiver<SessionSnapshot>,
	checking: Arc<AtomicBool>,
	last: Arc<Mutex<Option<DiagnosticResult>>>,
}

/// Holds the busy flag for the lifetime of one check.
struct CheckGuard<'a> {
	flag: &'a AtomicBool,
}

impl<'a> CheckGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| Self { flag })
	}
}

impl Drop for CheckGuard<'_> {
	fn drop(&mut self) {
		self.flag.store(false, Ordering::Release);
	}
}

impl DiagnosticsClient {
	pub fn new(engine: Arc<dyn Engine>, snapshots: watch::Receiver<SessionSnapshot>) -> Self {
		Self {
			engine,
			snapshots,
			checking: Arc::new(AtomicBool::new(false)),
			last: Arc::new(Mutex::new(None)),
		}
	}

	/// Whether a check is currently outstanding.
	pub fn is_checking(&self) -> bool {
		self.checking.load(Ordering::Acquire)
	}

	/// Result of the most recent successful check.
	pub fn last_result(&self) -> Option<DiagnosticResult> {
		self.last.lock().clone()
	}

	/// Runs one network check.
	///
	/// Returns `Ok(None)` without contacting the engine when another check is
	/// still outstanding. Fails with [`Error::NotReady`] before the engine has
	/// reported a state. Transport and decode failures are returned to the
	/// caller and leave session state untouched.
	pub async fn run_check(&self) -> Result<Option<DiagnosticResult>> {
		let (ready, state) = {
			let snapshot = self.snapshots.borrow();
			(snapshot.is_ready(), snapshot.state.clone())
		};
		if !ready {
			return Err(Error::NotReady(format!("engine state is {state}")));
		}

		let Some(_guard) = CheckGuard::acquire(&self.checking) else {
			debug!(target = "ipn.diag", "network check already in progress; skipping");
			return Ok(None);
		};

		debug!(target = "ipn.diag", %state, "running network check");
		let raw = self.engine.net_check().await.inspect_err(|err| {
			warn!(target = "ipn.diag", error = %err, "network check failed");
		})?;
		let payload: Value = serde_json::from_str(&raw).map_err(|err| {
			warn!(target = "ipn.diag", error = %err, "network check returned malformed JSON");
			Error::decode("net check result", err)
		})?;

		let result = DiagnosticResult { payload };
		info!(target = "ipn.diag", "network check completed");
		*self.last.lock() = Some(result.clone());
		Ok(Some(result))
	}
}
