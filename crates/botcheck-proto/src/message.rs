use serde::{Deserialize, Serialize};

/// A single button in a message's button grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Visible label.
    pub label: String,

    /// Opaque adapter payload (e.g. inline callback data). `None` for buttons
    /// that are pressed by sending their label back as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

impl Button {
    /// Creates a text button with no payload.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: None,
        }
    }

    /// Creates a button carrying an adapter payload.
    pub fn with_payload(label: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            payload: Some(payload),
        }
    }
}

/// A message received from the conversation partner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Adapter-assigned message id.
    pub id: i64,

    /// Message text (empty for media-only messages).
    pub text: String,

    /// Button grid, row by row.
    #[serde(default)]
    pub buttons: Vec<Vec<Button>>,
}

impl Message {
    /// Creates a plain text message.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: 0,
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    /// Sets the message id.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Appends a row of buttons.
    pub fn with_row(mut self, row: Vec<Button>) -> Self {
        self.buttons.push(row);
        self
    }

    /// Returns true if the message carries at least one button.
    pub fn has_buttons(&self) -> bool {
        self.buttons.iter().any(|row| !row.is_empty())
    }

    /// Finds the first button whose label contains `needle`, ignoring case.
    ///
    /// Rows are scanned top to bottom, buttons left to right.
    pub fn find_button(&self, needle: &str) -> Option<&Button> {
        let needle = needle.to_lowercase();
        self.buttons
            .iter()
            .flatten()
            .find(|button| button.label.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Message {
        Message::new("Pick one")
            .with_row(vec![Button::new("📅 Schedule"), Button::new("Speakers")])
            .with_row(vec![Button::new("Go to schedule"), Button::new("GO")])
    }

    #[test]
    fn find_button_is_case_insensitive_substring() {
        let message = grid();
        assert_eq!(message.find_button("speak").unwrap().label, "Speakers");
        assert_eq!(message.find_button("SCHEDULE").unwrap().label, "📅 Schedule");
    }

    #[test]
    fn find_button_scans_row_major() {
        let message = grid();
        // "go" appears in row 2 col 1 and row 2 col 2; the first one wins
        assert_eq!(message.find_button("go").unwrap().label, "Go to schedule");
    }

    #[test]
    fn find_button_misses() {
        assert!(grid().find_button("Exit").is_none());
        assert!(Message::new("no buttons").find_button("Go").is_none());
    }

    #[test]
    fn has_buttons_ignores_empty_rows() {
        let message = Message::new("x").with_row(vec![]);
        assert!(!message.has_buttons());
        assert!(grid().has_buttons());
    }

    #[test]
    fn message_deserializes_without_buttons() {
        let message: Message = serde_json::from_str(r#"{"id": 7, "text": "hi"}"#).unwrap();
        assert_eq!(message.id, 7);
        assert!(message.buttons.is_empty());
    }
}
