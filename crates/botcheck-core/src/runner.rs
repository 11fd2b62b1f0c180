//! Scenario runner.
//!
//! Connects the transport, feeds the selected scenarios through the
//! [`Interpreter`] one at a time, and aggregates their results. Per-scenario
//! failures never stop the run; the transport is always torn down.

use std::time::{Duration, Instant};

use botcheck_proto::{Transport, TransportError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::event_log::{EventSink, RunEvent, emit};
use crate::interpreter::Interpreter;
use crate::result::{ScenarioResult, duration_serde};
use crate::scenario::{Scenario, ScenarioSuite};

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The transport has no authorized session.
    #[error("transport is not authorized; run `botcheck login` first")]
    NotAuthorized,

    /// The transport could not be brought up.
    #[error("failed to connect transport: {0}")]
    Connect(#[source] TransportError),
}

/// Which scenarios to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every scenario in source order.
    #[default]
    All,
    /// The named scenarios, in the order given.
    Named(Vec<String>),
}

impl Selection {
    /// Selects a single scenario by name.
    pub fn one(name: impl Into<String>) -> Self {
        Selection::Named(vec![name.into()])
    }
}

/// Results from a complete run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResults {
    /// One result per executed scenario.
    pub results: Vec<ScenarioResult>,

    /// Requested scenario names absent from the source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,

    /// Total duration of the run.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl RunResults {
    /// Returns the number of passed scenarios.
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Returns the number of failed scenarios.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Returns the number of executed scenarios.
    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    /// Returns true if every requested scenario was found and passed.
    pub fn all_passed(&self) -> bool {
        self.missing.is_empty() && self.results.iter().all(|r| r.passed)
    }

    /// Returns only failed results.
    pub fn failures(&self) -> Vec<&ScenarioResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

/// Progress callback for run updates.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while a run progresses.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The run has started.
    RunStarted { total_scenarios: usize },

    /// A scenario is about to execute.
    ScenarioStarted { name: String, steps: usize },

    /// A scenario has finished.
    ScenarioCompleted { result: ScenarioResult },

    /// A requested scenario is absent from the source.
    ScenarioNotFound { name: String },

    /// The run has finished.
    RunCompleted { results: RunResults },
}

/// Runs scenarios sequentially through one interpreter.
pub struct ScenarioRunner {
    interpreter: Interpreter,
    on_progress: Option<ProgressCallback>,
}

impl ScenarioRunner {
    pub fn new(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            on_progress: None,
        }
    }

    /// Sets a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.on_progress {
            callback(event);
        }
    }

    /// Runs the selected scenarios.
    ///
    /// Fails only when the transport cannot be brought up; in that case no
    /// scenario runs. The transport is disconnected and `sink` flushed on
    /// every path.
    pub async fn run(
        &mut self,
        transport: &mut dyn Transport,
        suite: &ScenarioSuite,
        selection: &Selection,
        sink: &mut dyn EventSink,
    ) -> Result<RunResults, RunnerError> {
        let started = Instant::now();

        let outcome = match prepare(transport).await {
            Ok(()) => Ok(self
                .run_selected(&*transport, suite, selection, sink, started)
                .await),
            Err(e) => {
                emit(
                    sink,
                    RunEvent::RunAborted {
                        reason: e.to_string(),
                    },
                );
                Err(e)
            }
        };

        if let Err(e) = transport.disconnect().await {
            warn!(error = %e, "failed to disconnect transport");
        }
        if let Err(e) = sink.flush() {
            warn!(error = %e, "failed to flush run log");
        }
        outcome
    }

    async fn run_selected(
        &mut self,
        transport: &dyn Transport,
        suite: &ScenarioSuite,
        selection: &Selection,
        sink: &mut dyn EventSink,
        started: Instant,
    ) -> RunResults {
        let (scenarios, missing) = select(suite, selection);

        emit(
            sink,
            RunEvent::RunStarted {
                scenarios: scenarios.len(),
            },
        );
        self.report(ProgressEvent::RunStarted {
            total_scenarios: scenarios.len(),
        });

        for name in &missing {
            emit(
                sink,
                RunEvent::ScenarioNotFound {
                    scenario: name.clone(),
                },
            );
            self.report(ProgressEvent::ScenarioNotFound { name: name.clone() });
        }

        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            self.report(ProgressEvent::ScenarioStarted {
                name: scenario.name().to_string(),
                steps: scenario.len(),
            });
            let result = self.interpreter.run(transport, scenario, sink).await;
            info!(
                scenario = %result.scenario_name,
                passed = result.passed,
                "scenario finished"
            );
            self.report(ProgressEvent::ScenarioCompleted {
                result: result.clone(),
            });
            results.push(result);
        }

        let run = RunResults {
            results,
            missing,
            duration: started.elapsed(),
        };
        emit(
            sink,
            RunEvent::RunFinished {
                passed: run.passed_count(),
                failed: run.failed_count(),
                missing: run.missing.len(),
            },
        );
        self.report(ProgressEvent::RunCompleted {
            results: run.clone(),
        });
        run
    }
}

async fn prepare(transport: &mut dyn Transport) -> Result<(), RunnerError> {
    transport.connect().await.map_err(|e| match e {
        TransportError::NotAuthorized => RunnerError::NotAuthorized,
        other => RunnerError::Connect(other),
    })?;
    match transport.is_authorized().await {
        Ok(true) => Ok(()),
        Ok(false) => Err(RunnerError::NotAuthorized),
        Err(e) => Err(RunnerError::Connect(e)),
    }
}

/// Splits a selection into scenarios to run and names that were not found.
fn select<'a>(suite: &'a ScenarioSuite, selection: &Selection) -> (Vec<&'a Scenario>, Vec<String>) {
    match selection {
        Selection::All => (suite.scenarios().iter().collect(), Vec::new()),
        Selection::Named(names) => {
            let mut found = Vec::new();
            let mut missing = Vec::new();
            for name in names {
                match suite.get(name) {
                    Some(scenario) => found.push(scenario),
                    None => missing.push(name.clone()),
                }
            }
            (found, missing)
        }
    }
}
