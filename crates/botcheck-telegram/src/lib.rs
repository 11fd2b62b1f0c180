//! # botcheck-telegram
//!
//! Telegram transport for botcheck.
//!
//! Scenarios are replayed from a regular user account (MTProto, via
//! `grammers`), so the bot under test sees exactly what a human would send:
//!
//! - [`TelegramTransport`]: implements `botcheck_proto::Transport`
//! - [`login`]: creates the session file the transport connects with
//! - [`TelegramConfig`]: API credentials and session location from the environment

mod client;
mod config;
mod error;
mod login;

pub use client::{TelegramConversation, TelegramTransport};
pub use config::TelegramConfig;
pub use error::{TelegramError, TelegramResult};
pub use login::{LoginOutcome, Prompt, StdinPrompt, login};
