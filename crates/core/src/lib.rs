//! Session lifecycle coordination for a sandboxed mesh-VPN engine.
//!
//! The engine is reached through the [`Engine`] trait. A [`Session`] attaches
//! to it once, routes its four notification streams through the
//! [`NotificationDispatcher`] into a single-task [`SessionCoordinator`], and
//! publishes [`SessionSnapshot`]s to observers. Diagnostics are requested
//! through the [`DiagnosticsClient`], which never runs two checks at once.

pub mod bridge;
pub mod coordinator;
pub mod diagnostics;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod netmap;
pub mod session;
pub mod state_store;

/// Port handed to `startHTTPServer` when the session options leave it unset.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

pub use bridge::{BridgeEngine, BridgeLoader, EngineTarget};
pub use coordinator::{AuthPrompt, FAULT_TTL, SessionCoordinator, SessionOptions, SessionSnapshot, TransientFault};
pub use diagnostics::{DiagnosticResult, DiagnosticsClient};
pub use dispatcher::{Notification, NotificationDispatcher};
pub use engine::fake::{EngineCall, FakeEngine, FakeEngineController};
pub use engine::{BoxFuture, Callbacks, Engine, EngineLoader};
pub use error::{Error, Result};
pub use ipn_protocol::{EngineConfig, FetchResponse, LifecycleState, NetCheckReport, NetworkMap, Node, RegionLatency};
pub use netmap::NetworkMapStore;
pub use session::{Session, SessionHost};
pub use state_store::{FileStore, MemoryStore, StateStore};
