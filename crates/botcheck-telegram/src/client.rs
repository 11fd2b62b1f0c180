//! Transport over a Telegram user session.
//!
//! The tester talks to the bot as a regular user: messages are sent to the
//! bot's private chat and replies are read from the client's update stream.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use botcheck_proto::{Button, Conversation, Message, Transport, TransportError, TransportResult};
use grammers_client::grammers_tl_types as tl;
use grammers_client::{Client, Config, InitParams, Update};
use grammers_session::{PackedChat, Session};
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::error::{TelegramError, TelegramResult};

/// RPC error returned when a bot does not answer a callback query in time.
/// The press itself went through, so it is not a failure.
const BOT_RESPONSE_TIMEOUT: &str = "BOT_RESPONSE_TIMEOUT";

/// Connects a client for `config`, creating the session file if needed.
pub(crate) async fn open_client(config: &TelegramConfig) -> TelegramResult<Client> {
    if let Some(parent) = config.session_file.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(TelegramError::Session)?;
    }
    let session =
        Session::load_file_or_create(&config.session_file).map_err(TelegramError::Session)?;

    let connect = Client::connect(Config {
        session,
        api_id: config.api_id,
        api_hash: config.api_hash.clone(),
        params: InitParams::default(),
    });
    match tokio::time::timeout(config.connect_timeout, connect).await {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(e)) => Err(TelegramError::Connect(e.to_string())),
        Err(_) => Err(TelegramError::ConnectTimeout {
            timeout_secs: config.connect_timeout.as_secs(),
        }),
    }
}

/// Persists the client's session.
pub(crate) fn save_session(client: &Client, path: &Path) -> TelegramResult<()> {
    client
        .session()
        .save_to_file(path)
        .map_err(TelegramError::Session)
}

/// [`Transport`] backed by a `grammers` user client.
pub struct TelegramTransport {
    config: TelegramConfig,
    client: Option<Client>,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    fn client(&self) -> TelegramResult<&Client> {
        self.client.as_ref().ok_or(TelegramError::NotConnected)
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn connect(&mut self) -> TransportResult<()> {
        let client = open_client(&self.config).await?;
        let authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Invocation(e.to_string()))?;
        self.client = Some(client);
        if !authorized {
            return Err(TelegramError::NotAuthorized.into());
        }
        info!(session = %self.config.session_file.display(), "connected to telegram");
        Ok(())
    }

    async fn is_authorized(&self) -> TransportResult<bool> {
        let client = self.client()?;
        Ok(client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Invocation(e.to_string()))?)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        if let Some(client) = self.client.take() {
            save_session(&client, &self.config.session_file)?;
            debug!("telegram session saved");
        }
        Ok(())
    }

    async fn open_conversation(
        &self,
        target: &str,
        timeout: Duration,
    ) -> TransportResult<Box<dyn Conversation>> {
        let client = self.client()?.clone();
        let username = target.trim().trim_start_matches('@');
        let chat = client
            .resolve_username(username)
            .await
            .map_err(|e| TelegramError::Invocation(e.to_string()))?
            .ok_or_else(|| TelegramError::UnknownUsername(target.to_string()))?;

        Ok(Box::new(TelegramConversation {
            client,
            chat: chat.pack(),
            timeout,
            last_sent_id: 0,
        }))
    }
}

/// Private chat with one bot.
///
/// Holds only a client handle and the chat id, so dropping it without
/// `close()` releases everything.
pub struct TelegramConversation {
    client: Client,
    chat: PackedChat,
    timeout: Duration,
    /// Replies at or below this id predate our latest message and are skipped.
    last_sent_id: i32,
}

impl TelegramConversation {
    async fn next_reply(&self) -> TelegramResult<Message> {
        loop {
            let update = self
                .client
                .next_update()
                .await
                .map_err(|e| TelegramError::Invocation(e.to_string()))?;
            if let Update::NewMessage(message) = update {
                if message.outgoing()
                    || message.chat().id() != self.chat.id
                    || message.id() <= self.last_sent_id
                {
                    continue;
                }
                return Ok(convert_message(&message));
            }
        }
    }

    async fn answer_callback(&self, message_id: i64, data: &[u8]) -> TransportResult<()> {
        let msg_id = i32::try_from(message_id)
            .map_err(|_| TransportError::Protocol(format!("message id {message_id} out of range")))?;
        let request = tl::functions::messages::GetBotCallbackAnswer {
            game: false,
            peer: self.chat.to_input_peer(),
            msg_id,
            data: Some(data.to_vec()),
            password: None,
        };
        match self.client.invoke(&request).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains(BOT_RESPONSE_TIMEOUT) => {
                warn!(message_id, "bot did not answer the callback query");
                Ok(())
            }
            Err(e) => Err(TransportError::Protocol(e.to_string())),
        }
    }
}

#[async_trait]
impl Conversation for TelegramConversation {
    async fn send(&mut self, text: &str) -> TransportResult<()> {
        let sent = self
            .client
            .send_message(self.chat, text)
            .await
            .map_err(|e| TelegramError::Invocation(e.to_string()))?;
        self.last_sent_id = self.last_sent_id.max(sent.id());
        Ok(())
    }

    async fn await_reply(&mut self) -> TransportResult<Message> {
        match tokio::time::timeout(self.timeout, self.next_reply()).await {
            Ok(reply) => Ok(reply?),
            Err(_) => Err(TransportError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn click(&mut self, message: &Message, button: &Button) -> TransportResult<()> {
        match &button.payload {
            Some(data) => self.answer_callback(message.id, data).await,
            // Reply-keyboard buttons just send their label
            None => self.send(&button.label).await,
        }
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.last_sent_id = 0;
        Ok(())
    }
}

fn convert_message(message: &grammers_client::types::Message) -> Message {
    Message {
        id: i64::from(message.id()),
        text: message.text().to_string(),
        buttons: message
            .reply_markup()
            .map(|markup| buttons_from_markup(&markup))
            .unwrap_or_default(),
    }
}

/// Flattens a reply markup into labelled rows.
///
/// Inline keyboards keep only callback buttons, the ones a press can act on.
/// Reply keyboards keep plain text buttons.
fn buttons_from_markup(markup: &tl::enums::ReplyMarkup) -> Vec<Vec<Button>> {
    let (rows, inline) = match markup {
        tl::enums::ReplyMarkup::ReplyInlineMarkup(m) => (&m.rows, true),
        tl::enums::ReplyMarkup::ReplyKeyboardMarkup(m) => (&m.rows, false),
        _ => return Vec::new(),
    };

    rows.iter()
        .map(|row| {
            let tl::enums::KeyboardButtonRow::Row(row) = row;
            row.buttons
                .iter()
                .filter_map(|button| match button {
                    tl::enums::KeyboardButton::Callback(b) => {
                        Some(Button::with_payload(b.text.clone(), b.data.clone()))
                    }
                    tl::enums::KeyboardButton::Button(b) if !inline => {
                        Some(Button::new(b.text.clone()))
                    }
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}
