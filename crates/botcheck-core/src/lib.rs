//! # botcheck-core
//!
//! Scenario execution engine for conversational bot tests.
//!
//! This crate provides:
//! - The response matcher with `<placeholder>` wildcards
//! - Step classification of the action mini-language
//! - `REPEAT` / `UNTIL_REPLY` control-flow resolution
//! - The scenario interpreter and runner
//! - CSV scenario loading and run configuration
//! - Structured run logs (text and JSONL)

pub mod action;
mod config;
pub mod event_log;
pub mod flow;
mod interpreter;
pub mod matcher;
mod result;
mod runner;
pub mod scenario;
pub mod source;
pub mod testing;
mod text;

pub use action::{ActionMarkers, Directive, RandomChoice, StepAction, classify};
pub use config::{BotcheckConfig, ConfigError};
pub use event_log::{EventSink, JsonlLog, Level, LogEntry, MemoryLog, RunEvent, TextLog, emit};
pub use flow::{FlowError, FlowState, Resolution};
pub use interpreter::{Interpreter, InterpreterConfig};
pub use matcher::matches;
pub use result::{FailureKind, FailureReport, ScenarioFailure, ScenarioResult};
pub use runner::{
    ProgressCallback, ProgressEvent, RunResults, RunnerError, ScenarioRunner, Selection,
};
pub use scenario::{OrdinalLookup, Scenario, ScenarioSuite, Step};
pub use source::{ColumnMapping, SourceError, load_csv, parse_csv};
pub use text::truncate_chars;
