//! Engine lifecycle states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Connection phase reported by the engine through `notifyState`.
///
/// The engine owns the vocabulary; names it may add later are kept verbatim
/// in [`LifecycleState::Other`] rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifecycleState {
	#[default]
	NoState,
	InUseOtherUser,
	NeedsLogin,
	NeedsMachineAuth,
	Stopped,
	Starting,
	Running,
	Other(String),
}

impl LifecycleState {
	/// Wire name of the state.
	pub fn as_str(&self) -> &str {
		match self {
			LifecycleState::NoState => "NoState",
			LifecycleState::InUseOtherUser => "InUseOtherUser",
			LifecycleState::NeedsLogin => "NeedsLogin",
			LifecycleState::NeedsMachineAuth => "NeedsMachineAuth",
			LifecycleState::Stopped => "Stopped",
			LifecycleState::Starting => "Starting",
			LifecycleState::Running => "Running",
			LifecycleState::Other(name) => name,
		}
	}

	/// States in which the engine has been authorized far enough that no
	/// browser login prompt is relevant.
	pub fn is_authorized(&self) -> bool {
		matches!(self, LifecycleState::Running | LifecycleState::NeedsMachineAuth)
	}
}

impl From<&str> for LifecycleState {
	fn from(value: &str) -> Self {
		match value {
			"NoState" => LifecycleState::NoState,
			"InUseOtherUser" => LifecycleState::InUseOtherUser,
			"NeedsLogin" => LifecycleState::NeedsLogin,
			"NeedsMachineAuth" => LifecycleState::NeedsMachineAuth,
			"Stopped" => LifecycleState::Stopped,
			"Starting" => LifecycleState::Starting,
			"Running" => LifecycleState::Running,
			other => LifecycleState::Other(other.to_string()),
		}
	}
}

impl From<String> for LifecycleState {
	fn from(value: String) -> Self {
		match LifecycleState::from(value.as_str()) {
			LifecycleState::Other(_) => LifecycleState::Other(value),
			known => known,
		}
	}
}

impl From<LifecycleState> for String {
	fn from(state: LifecycleState) -> Self {
		match state {
			LifecycleState::Other(name) => name,
			known => known.as_str().to_string(),
		}
	}
}

impl FromStr for LifecycleState {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(LifecycleState::from(s))
	}
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
