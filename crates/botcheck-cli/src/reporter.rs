//! Reporters for scenario runs.
//!
//! - `TerminalReporter`: colored progress and summary output
//! - `ReportWriter`: machine-readable JSON report on disk

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use botcheck_core::{ProgressEvent, RunResults, ScenarioResult};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verbosity level for terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Show only pass/fail summary.
    Quiet,
    /// Normal output with progress.
    #[default]
    Normal,
    /// Also show step counts and failure reasons as scenarios finish.
    Verbose,
}

/// Terminal reporter for scenario runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalReporter {
    verbosity: Verbosity,
}

impl TerminalReporter {
    /// Creates a reporter with the specified verbosity.
    pub fn with_verbosity(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Handles a progress event, printing appropriate output.
    pub fn handle_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { total_scenarios } => {
                if self.verbosity != Verbosity::Quiet {
                    print_run_started(*total_scenarios);
                }
            }
            ProgressEvent::ScenarioStarted { name, steps } => {
                if self.verbosity == Verbosity::Verbose {
                    print!("  {} {} ", "▶".dimmed(), name);
                    println!("{}", format!("[{steps} steps]").dimmed());
                    io::stdout().flush().ok();
                }
            }
            ProgressEvent::ScenarioCompleted { result } => {
                if self.verbosity != Verbosity::Quiet {
                    self.print_scenario_completed(result);
                }
            }
            ProgressEvent::ScenarioNotFound { name } => {
                if self.verbosity != Verbosity::Quiet {
                    println!(
                        "  {} {} {}",
                        "?".yellow(),
                        name.yellow(),
                        "(not found in scenario file)".dimmed()
                    );
                }
            }
            ProgressEvent::RunCompleted { results } => {
                // Full summary is printed separately via print_summary
                if self.verbosity == Verbosity::Quiet {
                    print_quiet_summary(results);
                }
            }
        }
    }

    fn print_scenario_completed(&self, result: &ScenarioResult) {
        let status = if result.passed { "✅" } else { "❌" };
        let duration = format_duration(result.duration).dimmed();
        println!("  {} {} {}", status, result.scenario_name, duration);

        if self.verbosity == Verbosity::Verbose
            && let Some(failure) = &result.failure
        {
            println!("     {}", failure.reason.red());
        }
    }

    /// Prints a full summary of the run.
    pub fn print_summary(&self, results: &RunResults) {
        if self.verbosity == Verbosity::Quiet {
            return;
        }
        println!("\n{}", "━".repeat(40).dimmed());

        let passed = results.passed_count();
        let failed = results.failed_count();
        let missing = results.missing.len();
        let total = results.total_count();

        let (emoji, verdict, color) = if results.all_passed() {
            ("🟢", "PASSED", colored::Color::Green)
        } else if passed > 0 {
            ("🟡", "MIXED", colored::Color::Yellow)
        } else {
            ("🔴", "FAILED", colored::Color::Red)
        };

        let mut parts = vec![];
        if passed > 0 {
            parts.push(format!("{passed} passed").green().to_string());
        }
        if failed > 0 {
            parts.push(format!("{failed} failed").red().to_string());
        }
        if missing > 0 {
            parts.push(format!("{missing} not found").yellow().to_string());
        }

        let verdict_text = format!("{verdict}: {passed} of {total} scenarios");
        println!("{} {}", emoji, verdict_text.color(color).bold());
        if !parts.is_empty() {
            println!("   {}", parts.join(", "));
        }
        println!(
            "\n   {}",
            format!("Completed in {}", format_duration(results.duration)).dimmed()
        );
    }

    /// Prints details of every failed scenario.
    pub fn print_failures(&self, results: &RunResults) {
        let failures = results.failures();
        if failures.is_empty() || self.verbosity == Verbosity::Quiet {
            return;
        }

        println!("\n{}", "Failed scenarios:".red().bold());
        for result in failures {
            println!("\n  {} {}", "❌".red(), result.scenario_name.red().bold());
            if let Some(failure) = &result.failure {
                if let Some(step) = failure.step {
                    println!("     Step:   {step}");
                }
                if let Some(label) = &failure.error_label {
                    println!("     Error:  {label}");
                }
                println!("     Reason: {}", failure.reason);
            }
        }
    }
}

fn print_run_started(total: usize) {
    println!(
        "\n{}\n",
        format!(
            "Running {} scenario{}...",
            total,
            if total == 1 { "" } else { "s" }
        )
        .bold()
    );
}

fn print_quiet_summary(results: &RunResults) {
    let total = results.total_count() + results.missing.len();
    if results.all_passed() {
        println!("{}", format!("✓ {}/{} passed", results.passed_count(), total).green());
    } else {
        let not_ok = results.failed_count() + results.missing.len();
        println!("{}", format!("✗ {not_ok}/{total} failed").red());
    }
}

fn format_duration(duration: Duration) -> String {
    format!("({:.1}s)", duration.as_secs_f64())
}

/// Errors that can occur when writing reports.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON report for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    /// Conversation target the run talked to.
    pub bot: String,
    pub passed: usize,
    pub failed: usize,
    pub all_passed: bool,
    #[serde(flatten)]
    pub results: RunResults,
}

impl RunReport {
    pub fn new(bot: impl Into<String>, results: RunResults) -> Self {
        Self {
            generated_at: Utc::now(),
            bot: bot.into(),
            passed: results.passed_count(),
            failed: results.failed_count(),
            all_passed: results.all_passed(),
            results,
        }
    }
}

/// Writes report files into an output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    /// Creates a new report writer with the given output directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Returns the output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `report.json`, replacing any previous report.
    pub fn write_json(&self, report: &RunReport) -> Result<PathBuf, ReporterError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join("report.json");
        let content = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
