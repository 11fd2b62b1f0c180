//! Testing utilities for deterministic scenario runs.

pub mod scripted_transport;

pub use scripted_transport::{Click, ScriptedTransport};
