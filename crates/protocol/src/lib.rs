//! Wire types for the mesh-VPN engine bridge.
//!
//! This crate contains the serde-serializable types exchanged with the
//! networking engine: the notification payloads it emits and the messages
//! of the line-delimited bridge protocol used to reach an out-of-process
//! engine.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and trivial views
//! * 1:1 with the engine: Field names match the JSON the engine produces
//! * Stable: Changes only when the engine's payload shapes change
//!
//! Policy and state handling live in `ipn-rs`.

pub mod bridge;
pub mod netcheck;
pub mod netmap;
pub mod state;

pub use bridge::*;
pub use netcheck::*;
pub use netmap::*;
pub use state::*;
