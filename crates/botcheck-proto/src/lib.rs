//! # botcheck-proto
//!
//! Shared types, error definitions, and traits for botcheck.
//!
//! This crate holds the narrow contract the scenario engine consumes from a
//! conversation transport:
//! - [`Transport`] and [`Conversation`], the capability set an adapter implements
//! - [`Message`] and [`Button`], what the partner sends back
//! - [`TransportError`], the failure taxonomy adapters surface

mod error;
mod message;
mod transport;

pub use error::{TransportError, TransportResult};
pub use message::{Button, Message};
pub use transport::{Conversation, Transport};
