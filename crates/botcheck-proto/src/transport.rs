//! The capability set the scenario engine consumes.
//!
//! A [`Transport`] owns the link to the messaging platform; a [`Conversation`]
//! is a scoped exchange with one partner. The engine opens one conversation per
//! scenario and always calls [`Conversation::close`] when the scenario ends,
//! whichever way it ends.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::message::{Button, Message};

/// A link to a messaging platform that can open conversations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes or verifies the underlying link.
    ///
    /// Fails with [`TransportError::NotAuthorized`](crate::TransportError::NotAuthorized)
    /// if credential setup is missing.
    async fn connect(&mut self) -> TransportResult<()>;

    /// Returns whether the link is authorized to talk on behalf of a user.
    async fn is_authorized(&self) -> TransportResult<bool>;

    /// Tears the link down. Calling it twice is not an error.
    async fn disconnect(&mut self) -> TransportResult<()>;

    /// Opens a conversation with `target`. Replies that do not arrive within
    /// `timeout` fail with [`TransportError::Timeout`](crate::TransportError::Timeout).
    async fn open_conversation(
        &self,
        target: &str,
        timeout: Duration,
    ) -> TransportResult<Box<dyn Conversation>>;
}

/// An exclusive exchange with one conversation partner.
///
/// [`close`](Conversation::close) is the orderly release. A conversation can
/// also be dropped without it, when the run future is cancelled or a step
/// panics, so implementations must free whatever they hold on `Drop` and must
/// not rely on `close` having run.
#[async_trait]
pub trait Conversation: Send {
    /// Sends text. Does not wait for a reply.
    async fn send(&mut self, text: &str) -> TransportResult<()>;

    /// Waits for the next message from the partner, up to the conversation timeout.
    async fn await_reply(&mut self) -> TransportResult<Message>;

    /// Presses `button`, which belongs to `message`.
    async fn click(&mut self, message: &Message, button: &Button) -> TransportResult<()>;

    /// Releases the conversation.
    async fn close(&mut self) -> TransportResult<()>;
}
