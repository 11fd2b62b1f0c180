//! Run event log.
//!
//! The interpreter and runner report what they do as [`RunEvent`]s through an
//! [`EventSink`] handed to them by the caller. Sinks are opened per run and
//! flush after every entry, so a crashed run still leaves a readable log.
//!
//! Every event is also mirrored to `tracing` at its [`Level`].

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::text::truncate_chars;

/// Characters of the action text kept in step-start entries.
pub const ACTION_PREVIEW_CHARS: usize = 60;

/// Characters of a reply kept in failure entries.
pub const REPLY_PREVIEW_CHARS: usize = 200;

/// Severity of a run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARNING"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted { scenarios: usize },
    RunAborted { reason: String },
    ScenarioStarted { scenario: String },
    ScenarioNotFound { scenario: String },
    StepStarted { scenario: String, step: i64, action: String },
    MessageSent { scenario: String, step: i64, text: String },
    RandomChoice { scenario: String, step: i64, chosen: String },
    ButtonClicked { scenario: String, step: i64, label: String },
    ReplyMatched { scenario: String, step: i64 },
    RepeatIteration {
        scenario: String,
        step: i64,
        start: i64,
        iteration: u32,
        count: u32,
    },
    RepeatFinished { scenario: String, step: i64 },
    TriggerSeen { scenario: String, step: i64, trigger: String },
    TriggerMissing {
        scenario: String,
        step: i64,
        trigger: String,
        target: i64,
    },
    DirectiveSkipped { scenario: String, step: i64, text: String },
    StepFailed {
        scenario: String,
        step: Option<i64>,
        error_label: Option<String>,
        reason: String,
    },
    ScenarioFinished { scenario: String, passed: bool },
    RunFinished { passed: usize, failed: usize, missing: usize },
}

impl RunEvent {
    /// Severity. Each fatal condition has exactly one error-level event; the
    /// closing `ScenarioFinished` is informational either way.
    pub fn level(&self) -> Level {
        match self {
            RunEvent::RunAborted { .. }
            | RunEvent::ScenarioNotFound { .. }
            | RunEvent::StepFailed { .. } => Level::Error,
            RunEvent::DirectiveSkipped { .. } => Level::Warn,
            _ => Level::Info,
        }
    }

    /// Mirrors the event to `tracing`.
    pub fn trace(&self) {
        match self.level() {
            Level::Info => tracing::info!("{}", self),
            Level::Warn => tracing::warn!("{}", self),
            Level::Error => tracing::error!("{}", self),
        }
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::RunStarted { scenarios } => write!(f, "run started: {scenarios} scenario(s)"),
            RunEvent::RunAborted { reason } => write!(f, "run aborted: {reason}"),
            RunEvent::ScenarioStarted { scenario } => write!(f, "=== START: {scenario} ==="),
            RunEvent::ScenarioNotFound { scenario } => {
                write!(f, "scenario '{scenario}' not found")
            }
            RunEvent::StepStarted {
                scenario,
                step,
                action,
            } => write!(
                f,
                "[{scenario}] step {step}: '{}'",
                truncate_chars(action, ACTION_PREVIEW_CHARS)
            ),
            RunEvent::MessageSent {
                scenario,
                step,
                text,
            } => write!(f, "[{scenario}] step {step}: sent '{text}'"),
            RunEvent::RandomChoice {
                scenario,
                step,
                chosen,
            } => write!(f, "[{scenario}] step {step}: chose '{chosen}'"),
            RunEvent::ButtonClicked {
                scenario,
                step,
                label,
            } => write!(f, "[{scenario}] step {step}: pressed '{label}'"),
            RunEvent::ReplyMatched { scenario, step } => {
                write!(f, "[{scenario}] step {step}: reply ok")
            }
            RunEvent::RepeatIteration {
                scenario,
                step,
                start,
                iteration,
                count,
            } => write!(
                f,
                "[{scenario}] step {step}: REPEAT from step {start}, iteration {iteration} of {count}"
            ),
            RunEvent::RepeatFinished { scenario, step } => {
                write!(f, "[{scenario}] step {step}: REPEAT finished, moving on")
            }
            RunEvent::TriggerSeen {
                scenario,
                step,
                trigger,
            } => write!(
                f,
                "[{scenario}] step {step}: trigger '{trigger}' seen, leaving loop"
            ),
            RunEvent::TriggerMissing {
                scenario,
                step,
                trigger,
                target,
            } => write!(
                f,
                "[{scenario}] step {step}: trigger '{trigger}' not seen, jumping to step {target}"
            ),
            RunEvent::DirectiveSkipped {
                scenario,
                step,
                text,
            } => write!(
                f,
                "[{scenario}] step {step}: unrecognized directive '{text}', skipping"
            ),
            RunEvent::StepFailed {
                scenario,
                step,
                error_label,
                reason,
            } => {
                write!(f, "[{scenario}]")?;
                if let Some(step) = step {
                    write!(f, " step {step}:")?;
                }
                if let Some(label) = error_label {
                    write!(f, " {label}.")?;
                }
                write!(f, " {reason}")
            }
            RunEvent::ScenarioFinished { scenario, passed } => {
                let verdict = if *passed { "PASSED" } else { "FAILED" };
                write!(f, "=== {verdict}: {scenario} ===")
            }
            RunEvent::RunFinished {
                passed,
                failed,
                missing,
            } => write!(
                f,
                "run finished: {passed} passed, {failed} failed, {missing} not found"
            ),
        }
    }
}

/// A timestamped run event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: Level,
    pub event: RunEvent,
}

impl LogEntry {
    pub fn now(event: RunEvent) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            level: event.level(),
            event,
        }
    }
}

/// Destination for run events.
pub trait EventSink: Send {
    /// Records one entry. Write failures are reported through `tracing` and
    /// never interrupt the run.
    fn record(&mut self, entry: &LogEntry);

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stamps `event`, mirrors it to `tracing`, and records it in `sink`.
pub fn emit(sink: &mut dyn EventSink, event: RunEvent) {
    event.trace();
    sink.record(&LogEntry::now(event));
}

impl EventSink for Vec<Box<dyn EventSink>> {
    fn record(&mut self, entry: &LogEntry) {
        for sink in self.iter_mut() {
            sink.record(entry);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in self.iter_mut() {
            sink.flush()?;
        }
        Ok(())
    }
}

/// Human-readable log: `<timestamp> - <LEVEL> - <message>` per line.
///
/// Opening truncates the file; each run starts a fresh log.
pub struct TextLog {
    writer: BufWriter<File>,
}

impl TextLog {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_entry(&mut self, entry: &LogEntry) -> io::Result<()> {
        let timestamp = chrono::DateTime::parse_from_rfc3339(&entry.timestamp).map_or_else(
            |_| entry.timestamp.clone(),
            |ts| ts.format("%Y-%m-%d %H:%M:%S,%3f").to_string(),
        );
        writeln!(
            self.writer,
            "{timestamp} - {} - {}",
            entry.level, entry.event
        )?;
        self.writer.flush()
    }
}

impl EventSink for TextLog {
    fn record(&mut self, entry: &LogEntry) {
        if let Err(e) = self.write_entry(entry) {
            tracing::warn!(error = %e, "failed to write text log entry");
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// One JSON object per line, appended.
pub struct JsonlLog {
    writer: BufWriter<File>,
}

impl JsonlLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_entry(&mut self, entry: &LogEntry) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl EventSink for JsonlLog {
    fn record(&mut self, entry: &LogEntry) {
        if let Err(e) = self.write_entry(entry) {
            tracing::warn!(error = %e, "failed to write jsonl log entry");
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Keeps entries in memory. Used by tests and by callers that post-process a run.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Vec<LogEntry>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn events(&self) -> impl Iterator<Item = &RunEvent> {
        self.entries.iter().map(|e| &e.event)
    }

    /// Entries at [`Level::Error`].
    pub fn errors(&self) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.level == Level::Error)
            .collect()
    }
}

impl EventSink for MemoryLog {
    fn record(&mut self, entry: &LogEntry) {
        self.entries.push(entry.clone());
    }
}
