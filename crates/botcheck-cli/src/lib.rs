//! # botcheck-cli
//!
//! Terminal and file reporting for the `botcheck` binary.

mod reporter;

pub use reporter::{ReportWriter, ReporterError, RunReport, TerminalReporter, Verbosity};
