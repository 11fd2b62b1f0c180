//! Step classification.
//!
//! A step's free-text action is a small DSL: control-flow directives, randomized
//! message choice, commands, button presses, and plain text. [`classify`] turns
//! it into a [`StepAction`] once, when the scenario is loaded.
//!
//! Precedence (first match wins):
//!
//! ```text
//! REPEAT / UNTIL_REPLY prefix  → Directive
//! random-choice marker phrase  → RandomChoice
//! leading '/'                  → Command
//! button marker phrase         → ButtonClick
//! anything else                → PlainText
//! ```

use std::sync::LazyLock;

use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::matcher::has_placeholder;

/// Keyword that starts a bounded repeat directive.
pub const REPEAT_KEYWORD: &str = "REPEAT";

/// Keyword that starts a conditional backward jump directive.
pub const UNTIL_REPLY_KEYWORD: &str = "UNTIL_REPLY";

/// Sent when a random-choice step lists no candidates.
pub const FALLBACK_MESSAGE: &str = "Test message";

static REPEAT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^REPEAT\s+(\d+)\s*-\s*(\d+)\s+(\d+)").expect("repeat pattern is valid")
});

static UNTIL_REPLY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^UNTIL_REPLY\s+(\d+)\s+["'](.*?)["']"#).expect("until-reply pattern is valid")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'](.*?)["']"#).expect("quoted pattern is valid"));

static ENUMERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("enumeration pattern is valid"));

/// Phrases that mark the non-directive action kinds.
///
/// Defaults follow the scenario tables the tool was built for, which are
/// written in Russian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionMarkers {
    /// Any of these in an action means "send one of the following lines".
    pub random_choice: Vec<String>,

    /// Any of these in an action means "press the quoted button".
    pub button: Vec<String>,

    /// Sent instead of a random candidate that still contains a `<...>` placeholder.
    pub placeholder_substitute: String,
}

impl Default for ActionMarkers {
    fn default() -> Self {
        Self {
            random_choice: vec!["Отправляет одно из".to_string()],
            button: vec!["Нажимает".to_string(), "кнопку".to_string()],
            placeholder_substitute: "Тестировщик".to_string(),
        }
    }
}

impl ActionMarkers {
    fn is_random_choice(&self, text: &str) -> bool {
        self.random_choice.iter().any(|m| text.contains(m.as_str()))
    }

    fn is_button(&self, text: &str) -> bool {
        self.button.iter().any(|m| text.contains(m.as_str()))
    }
}

/// A control-flow directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `REPEAT <start>-<end> <count>`: jump back to `start` until fired `count` times.
    ///
    /// `end` is parsed but does not bound the jump.
    Repeat { start: i64, end: i64, count: u32 },

    /// `UNTIL_REPLY <target> "<trigger>"`: jump back to `target` until the last
    /// reply matches `trigger`.
    UntilReply { target: i64, trigger: String },

    /// A directive keyword whose arguments did not parse. Skipped with a warning.
    Malformed { keyword: &'static str, text: String },
}

/// Candidates of a randomized message step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomChoice {
    candidates: Vec<String>,
}

impl RandomChoice {
    /// Creates a choice over already-cleaned candidates.
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    /// Returns the candidates.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Picks one candidate uniformly at random, or [`FALLBACK_MESSAGE`] if there are none.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.candidates
            .choose(rng)
            .map_or(FALLBACK_MESSAGE, String::as_str)
    }
}

/// What a step asks the interpreter to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Control flow; no transport I/O.
    Directive(Directive),
    /// Send one of several messages.
    RandomChoice(RandomChoice),
    /// Send a `/command` verbatim.
    Command(String),
    /// Press a button whose label contains the quoted text. `None` when the
    /// action names no quoted label.
    ButtonClick { label: Option<String> },
    /// Send the text verbatim.
    PlainText(String),
}

impl StepAction {
    /// Returns true for control-flow directives.
    pub fn is_directive(&self) -> bool {
        matches!(self, StepAction::Directive(_))
    }

    /// Short name of the action kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Directive(_) => "directive",
            StepAction::RandomChoice(_) => "random_choice",
            StepAction::Command(_) => "command",
            StepAction::ButtonClick { .. } => "button",
            StepAction::PlainText(_) => "text",
        }
    }
}

/// Classifies a step's action text. `text` should already be trimmed.
pub fn classify(text: &str, markers: &ActionMarkers) -> StepAction {
    if text.starts_with(UNTIL_REPLY_KEYWORD) {
        return StepAction::Directive(parse_until_reply(text));
    }
    if text.starts_with(REPEAT_KEYWORD) {
        return StepAction::Directive(parse_repeat(text));
    }
    if markers.is_random_choice(text) {
        return StepAction::RandomChoice(parse_random_choice(text, markers));
    }
    if text.starts_with('/') {
        return StepAction::Command(text.to_string());
    }
    if markers.is_button(text) {
        let label = QUOTED
            .captures(text)
            .map(|caps| caps[1].trim().to_string())
            .filter(|label| !label.is_empty());
        return StepAction::ButtonClick { label };
    }
    StepAction::PlainText(text.to_string())
}

fn parse_repeat(text: &str) -> Directive {
    let parsed = REPEAT_PATTERN.captures(text).and_then(|caps| {
        Some(Directive::Repeat {
            start: caps[1].parse().ok()?,
            end: caps[2].parse().ok()?,
            count: caps[3].parse().ok()?,
        })
    });
    parsed.unwrap_or_else(|| Directive::Malformed {
        keyword: REPEAT_KEYWORD,
        text: text.to_string(),
    })
}

fn parse_until_reply(text: &str) -> Directive {
    let parsed = UNTIL_REPLY_PATTERN.captures(text).and_then(|caps| {
        Some(Directive::UntilReply {
            target: caps[1].parse().ok()?,
            trigger: caps[2].to_string(),
        })
    });
    parsed.unwrap_or_else(|| Directive::Malformed {
        keyword: UNTIL_REPLY_KEYWORD,
        text: text.to_string(),
    })
}

fn parse_random_choice(text: &str, markers: &ActionMarkers) -> RandomChoice {
    let candidates = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !markers.is_random_choice(line))
        .map(|line| {
            let candidate = ENUMERATION.replace(line, "").trim().to_string();
            if has_placeholder(&candidate) {
                markers.placeholder_substitute.clone()
            } else {
                candidate
            }
        })
        .filter(|candidate| !candidate.is_empty())
        .collect();
    RandomChoice::new(candidates)
}
