//! In-memory transport that replays scripted bot replies.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use botcheck_proto::{Button, Conversation, Message, Transport, TransportError, TransportResult};

/// Transport that answers every `await_reply` with the next scripted message.
///
/// Once the script is exhausted, replies time out. Clones share state, so a
/// test can keep a handle while the runner owns another.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: VecDeque<Message>,
    sent: Vec<String>,
    clicks: Vec<Click>,
    replies_consumed: usize,
    authorized: bool,
    connects: usize,
    disconnects: usize,
    opened: usize,
    closed: usize,
    released: usize,
    open_error: Option<TransportError>,
    send_error: Option<TransportError>,
}

/// Record of a button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Click {
    /// Id of the message the button belongs to.
    pub message_id: i64,
    pub label: String,
}

impl ScriptedTransport {
    /// Creates an authorized transport with scripted replies.
    pub fn new(replies: Vec<Message>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                replies: replies.into(),
                authorized: true,
                ..ScriptState::default()
            })),
        }
    }

    /// Makes `connect()` fail with [`TransportError::NotAuthorized`].
    pub fn unauthorized(self) -> Self {
        self.state.lock().unwrap().authorized = false;
        self
    }

    /// Makes every `open_conversation()` fail with `error`.
    pub fn failing_open(self, error: TransportError) -> Self {
        self.state.lock().unwrap().open_error = Some(error);
        self
    }

    /// Makes every `send()` fail with `error`.
    pub fn failing_send(self, error: TransportError) -> Self {
        self.state.lock().unwrap().send_error = Some(error);
        self
    }

    /// Appends replies to the script.
    pub fn push_replies(&self, replies: impl IntoIterator<Item = Message>) {
        self.state.lock().unwrap().replies.extend(replies);
    }

    /// Texts sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Labels of pressed buttons, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .clicks
            .iter()
            .map(|c| c.label.clone())
            .collect()
    }

    /// Full click records, in order.
    pub fn click_records(&self) -> Vec<Click> {
        self.state.lock().unwrap().clicks.clone()
    }

    /// Number of scripted replies handed out.
    pub fn replies_consumed(&self) -> usize {
        self.state.lock().unwrap().replies_consumed
    }

    /// Number of scripted replies not yet handed out.
    pub fn replies_remaining(&self) -> usize {
        self.state.lock().unwrap().replies.len()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    pub fn conversations_opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn conversations_closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    /// Conversations dropped, whether or not `close()` ran first.
    pub fn conversations_released(&self) -> usize {
        self.state.lock().unwrap().released
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if !state.authorized {
            return Err(TransportError::NotAuthorized);
        }
        Ok(())
    }

    async fn is_authorized(&self) -> TransportResult<bool> {
        Ok(self.state.lock().unwrap().authorized)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        state.disconnects += 1;
        Ok(())
    }

    async fn open_conversation(
        &self,
        _target: &str,
        timeout: Duration,
    ) -> TransportResult<Box<dyn Conversation>> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.open_error.clone() {
            return Err(error);
        }
        state.opened += 1;
        Ok(Box::new(ScriptedConversation {
            state: Arc::clone(&self.state),
            timeout,
        }))
    }
}

struct ScriptedConversation {
    state: Arc<Mutex<ScriptState>>,
    timeout: Duration,
}

#[async_trait]
impl Conversation for ScriptedConversation {
    async fn send(&mut self, text: &str) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.send_error.clone() {
            return Err(error);
        }
        state.sent.push(text.to_string());
        Ok(())
    }

    async fn await_reply(&mut self) -> TransportResult<Message> {
        let mut state = self.state.lock().unwrap();
        match state.replies.pop_front() {
            Some(message) => {
                state.replies_consumed += 1;
                Ok(message)
            }
            None => Err(TransportError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn click(&mut self, message: &Message, button: &Button) -> TransportResult<()> {
        self.state.lock().unwrap().clicks.push(Click {
            message_id: message.id,
            label: button.label.clone(),
        });
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

impl Drop for ScriptedConversation {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.released += 1;
        }
    }
}
