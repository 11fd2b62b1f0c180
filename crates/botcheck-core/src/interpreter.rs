//! Scenario interpreter.
//!
//! Walks one scenario's steps against a live conversation:
//!
//! ```text
//! ┌────────────┐  directive   ┌───────────┐
//! │  load step │─────────────▶│ FlowState │── next pc ──┐
//! └────────────┘              └───────────┘             │
//!       │ action                                        │
//!       ▼                                               │
//! ┌────────────┐  expected?   ┌───────────┐             │
//! │  perform   │─────────────▶│  verify   │── pc + 1 ───┤
//! └────────────┘   no: settle └───────────┘             │
//!       ▲                                               │
//!       └───────────────────────────────────────────────┘
//! ```
//!
//! The conversation is opened once per scenario and closed on every exit path.
//! Any failure ends the scenario; it is logged once and never propagates.

use std::time::{Duration, Instant};

use botcheck_proto::{Conversation, Message, Transport};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::action::StepAction;
use crate::event_log::{EventSink, RunEvent, emit};
use crate::flow::{FlowState, Resolution};
use crate::matcher::matches;
use crate::result::{FailureKind, FailureReport, ScenarioFailure, ScenarioResult};
use crate::scenario::{Scenario, Step};

/// Settings for scenario execution.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Who to talk to, e.g. `@my_bot`.
    pub target: String,

    /// How long to wait for each reply.
    pub reply_timeout: Duration,

    /// Pause after a step that declares no expected reply.
    pub settle_delay: Duration,

    /// Upper bound on `UNTIL_REPLY` jump-backs per scenario. `REPEAT` loops
    /// are bounded by their own count and never draw on it.
    pub max_retries: usize,
}

impl InterpreterConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reply_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(1),
            max_retries: 10_000,
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Mutable state of one scenario execution. Dropped when the scenario ends.
#[derive(Debug, Default)]
struct RunState {
    pc: usize,
    last_reply: String,
    /// Latest received message that no action has consumed yet.
    pending: Option<Message>,
    flow: FlowState,
    iterations: usize,
    /// `UNTIL_REPLY` jumps taken so far.
    retries: usize,
}

impl RunState {
    fn observe(&mut self, message: Message) {
        self.last_reply.clone_from(&message.text);
        self.pending = Some(message);
    }
}

/// Executes scenarios one at a time.
pub struct Interpreter {
    config: InterpreterConfig,
    rng: StdRng,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixes the random seed used for randomized message choice.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Runs `scenario` in a fresh conversation and reports the outcome.
    pub async fn run(
        &mut self,
        transport: &dyn Transport,
        scenario: &Scenario,
        sink: &mut dyn EventSink,
    ) -> ScenarioResult {
        let started = Instant::now();
        let name = scenario.name().to_string();
        emit(
            sink,
            RunEvent::ScenarioStarted {
                scenario: name.clone(),
            },
        );

        let mut state = RunState::default();
        let outcome = match transport
            .open_conversation(&self.config.target, self.config.reply_timeout)
            .await
        {
            Ok(mut conversation) => {
                let outcome = self
                    .drive(conversation.as_mut(), scenario, &mut state, sink)
                    .await;
                if let Err(e) = conversation.close().await {
                    warn!(scenario = %name, error = %e, "failed to close conversation");
                }
                outcome
            }
            Err(e) => Err(ScenarioFailure::before_steps(e)),
        };

        if let Err(failure) = &outcome {
            emit(
                sink,
                RunEvent::StepFailed {
                    scenario: name.clone(),
                    step: failure.step,
                    error_label: failure.error_label.clone(),
                    reason: failure.kind.to_string(),
                },
            );
        }

        let passed = outcome.is_ok();
        emit(
            sink,
            RunEvent::ScenarioFinished {
                scenario: name.clone(),
                passed,
            },
        );

        ScenarioResult {
            scenario_name: name,
            passed,
            failure: outcome.as_ref().err().map(FailureReport::from),
            steps_executed: state.iterations,
            duration: started.elapsed(),
        }
    }

    async fn drive(
        &mut self,
        conversation: &mut dyn Conversation,
        scenario: &Scenario,
        state: &mut RunState,
        sink: &mut dyn EventSink,
    ) -> Result<(), ScenarioFailure> {
        while let Some(step) = scenario.step(state.pc) {
            state.iterations += 1;

            if let StepAction::Directive(directive) = step.action() {
                let resolution = state
                    .flow
                    .resolve(scenario, state.pc, directive, &state.last_reply)
                    .map_err(|e| ScenarioFailure::at_step(step.ordinal(), step.error_label(), e))?;
                if matches!(resolution, Resolution::TriggerMissing { .. }) {
                    state.retries += 1;
                    if state.retries > self.config.max_retries {
                        return Err(ScenarioFailure::at_step(
                            step.ordinal(),
                            step.error_label(),
                            FailureKind::RetryBudgetExhausted {
                                limit: self.config.max_retries,
                            },
                        ));
                    }
                }
                emit(sink, directive_event(scenario, step, &resolution));
                state.pc = resolution.next_pc(state.pc);
                continue;
            }

            emit(
                sink,
                RunEvent::StepStarted {
                    scenario: scenario.name().to_string(),
                    step: step.ordinal(),
                    action: step.raw_action().to_string(),
                },
            );

            self.perform(conversation, scenario, step, state, sink)
                .await
                .map_err(|kind| ScenarioFailure::at_step(step.ordinal(), step.error_label(), kind))?;

            self.verify(conversation, scenario, step, state, sink)
                .await
                .map_err(|kind| ScenarioFailure::at_step(step.ordinal(), step.error_label(), kind))?;

            state.pc += 1;
        }
        Ok(())
    }

    async fn perform(
        &mut self,
        conversation: &mut dyn Conversation,
        scenario: &Scenario,
        step: &Step,
        state: &mut RunState,
        sink: &mut dyn EventSink,
    ) -> Result<(), FailureKind> {
        let text = match step.action() {
            // Directives are resolved before any I/O
            StepAction::Directive(_) => return Ok(()),
            StepAction::Command(text) | StepAction::PlainText(text) => text.clone(),
            StepAction::RandomChoice(choice) => {
                let chosen = choice.pick(&mut self.rng).to_string();
                emit(
                    sink,
                    RunEvent::RandomChoice {
                        scenario: scenario.name().to_string(),
                        step: step.ordinal(),
                        chosen: chosen.clone(),
                    },
                );
                chosen
            }
            StepAction::ButtonClick { label } => {
                let label = label.as_deref().ok_or(FailureKind::MissingButtonLabel)?;
                return Self::press(conversation, scenario, step, label, state, sink).await;
            }
        };

        conversation.send(&text).await?;
        state.pending = None;
        debug!(scenario = %scenario.name(), step = step.ordinal(), text = %text, "sent");
        emit(
            sink,
            RunEvent::MessageSent {
                scenario: scenario.name().to_string(),
                step: step.ordinal(),
                text,
            },
        );
        Ok(())
    }

    async fn press(
        conversation: &mut dyn Conversation,
        scenario: &Scenario,
        step: &Step,
        label: &str,
        state: &mut RunState,
        sink: &mut dyn EventSink,
    ) -> Result<(), FailureKind> {
        let message = match state.pending.take().filter(Message::has_buttons) {
            Some(message) => message,
            None => {
                let message = conversation.await_reply().await?;
                state.last_reply.clone_from(&message.text);
                message
            }
        };

        if !message.has_buttons() {
            return Err(FailureKind::NoButtons {
                label: label.to_string(),
            });
        }
        let button = message
            .find_button(label)
            .ok_or_else(|| FailureKind::ButtonNotFound {
                label: label.to_string(),
            })?;

        conversation.click(&message, button).await?;
        emit(
            sink,
            RunEvent::ButtonClicked {
                scenario: scenario.name().to_string(),
                step: step.ordinal(),
                label: button.label.clone(),
            },
        );
        Ok(())
    }

    async fn verify(
        &mut self,
        conversation: &mut dyn Conversation,
        scenario: &Scenario,
        step: &Step,
        state: &mut RunState,
        sink: &mut dyn EventSink,
    ) -> Result<(), FailureKind> {
        let Some(expected) = step.expected_reply() else {
            tokio::time::sleep(self.config.settle_delay).await;
            return Ok(());
        };

        let reply = conversation.await_reply().await?;
        state.observe(reply);

        if !matches(expected, &state.last_reply) {
            return Err(FailureKind::ReplyMismatch {
                expected: expected.to_string(),
                actual: state.last_reply.clone(),
            });
        }

        emit(
            sink,
            RunEvent::ReplyMatched {
                scenario: scenario.name().to_string(),
                step: step.ordinal(),
            },
        );
        Ok(())
    }
}

fn directive_event(scenario: &Scenario, step: &Step, resolution: &Resolution) -> RunEvent {
    let scenario = scenario.name().to_string();
    let ordinal = step.ordinal();
    match resolution {
        Resolution::RepeatIteration {
            start,
            iteration,
            count,
            ..
        } => RunEvent::RepeatIteration {
            scenario,
            step: ordinal,
            start: *start,
            iteration: *iteration,
            count: *count,
        },
        Resolution::RepeatFinished { .. } => RunEvent::RepeatFinished {
            scenario,
            step: ordinal,
        },
        Resolution::TriggerSeen { trigger } => RunEvent::TriggerSeen {
            scenario,
            step: ordinal,
            trigger: trigger.clone(),
        },
        Resolution::TriggerMissing {
            target_ordinal,
            trigger,
            ..
        } => RunEvent::TriggerMissing {
            scenario,
            step: ordinal,
            trigger: trigger.clone(),
            target: *target_ordinal,
        },
        Resolution::Skipped { text } => RunEvent::DirectiveSkipped {
            scenario,
            step: ordinal,
            text: text.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionMarkers;
    use crate::event_log::MemoryLog;
    use crate::testing::{Click, ScriptedTransport};
    use botcheck_proto::{Button, TransportError};

    fn step(ordinal: i64, action: &str, expected: Option<&str>) -> Step {
        Step::new(
            ordinal,
            action,
            expected,
            format!("step {ordinal} failed"),
            &ActionMarkers::default(),
        )
    }

    fn interpreter() -> Interpreter {
        Interpreter::new(
            InterpreterConfig::new("@test_bot")
                .with_settle_delay(Duration::ZERO)
                .with_max_retries(100),
        )
        .with_seed(42)
    }

    #[tokio::test]
    async fn happy_path_with_button() {
        let scenario = Scenario::new(
            "happy",
            vec![
                step(1, "/start", Some("Welcome")),
                step(2, "Нажимает кнопку 'Go'", Some("Next")),
            ],
        );
        let transport = ScriptedTransport::new(vec![
            Message::new("Welcome").with_row(vec![Button::new("Go")]),
            Message::new("Next"),
        ]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed, "failure: {:?}", result.failure);
        assert_eq!(transport.sent(), vec!["/start"]);
        assert_eq!(transport.clicks(), vec!["Go"]);
        assert_eq!(transport.conversations_closed(), 1);
    }

    #[tokio::test]
    async fn mismatch_fails_and_stops() {
        let scenario = Scenario::new(
            "negative",
            vec![
                step(1, "/start", Some("Expected")),
                step(2, "/never", Some("x")),
            ],
        );
        let transport = ScriptedTransport::new(vec![Message::new("Actual")]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(!result.passed);
        let failure = result.failure.unwrap();
        assert_eq!(failure.step, Some(1));
        assert_eq!(failure.error_label.as_deref(), Some("step 1 failed"));
        assert!(failure.reason.contains("expected: Expected | got: Actual"));
        assert_eq!(transport.sent(), vec!["/start"]);
        assert_eq!(log.errors().len(), 1);
        assert_eq!(transport.conversations_closed(), 1);
    }

    #[tokio::test]
    async fn timeout_is_fatal() {
        let scenario = Scenario::new("silent", vec![step(1, "/start", Some("Welcome"))]);
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(!result.passed);
        assert!(result.failure.unwrap().reason.contains("timed out"));
        assert_eq!(transport.conversations_closed(), 1);
    }

    #[tokio::test]
    async fn step_without_expectation_does_not_wait() {
        let scenario = Scenario::new(
            "fire-and-forget",
            vec![step(1, "hello", None), step(2, "world", None)],
        );
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed);
        assert_eq!(transport.sent(), vec!["hello", "world"]);
        assert_eq!(transport.replies_consumed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn step_without_expectation_settles() {
        let scenario = Scenario::new("settle", vec![step(1, "hello", None)]);
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();
        let mut interpreter = Interpreter::new(
            InterpreterConfig::new("@test_bot").with_settle_delay(Duration::from_secs(1)),
        );

        let started = tokio::time::Instant::now();
        let result = interpreter.run(&transport, &scenario, &mut log).await;

        assert!(result.passed);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn button_step_waits_for_buttons_when_nothing_pending() {
        let scenario = Scenario::new(
            "menu",
            vec![
                step(1, "/menu", None),
                step(2, "Нажимает кнопку 'расписание'", Some("Schedule")),
            ],
        );
        let transport = ScriptedTransport::new(vec![
            Message::new("Menu")
                .with_row(vec![Button::new("Speakers")])
                .with_row(vec![Button::new("📅 Расписание")]),
            Message::new("Schedule for today"),
        ]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed, "failure: {:?}", result.failure);
        assert_eq!(transport.clicks(), vec!["📅 Расписание"]);
    }

    #[tokio::test]
    async fn missing_button_is_fatal() {
        let scenario = Scenario::new(
            "menu",
            vec![
                step(1, "/menu", Some("Menu")),
                step(2, "Нажимает 'Exit'", Some("Bye")),
            ],
        );
        let transport = ScriptedTransport::new(vec![
            Message::new("Menu").with_row(vec![Button::new("Go")]),
        ]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        let failure = result.failure.unwrap();
        assert_eq!(failure.step, Some(2));
        assert_eq!(failure.reason, "button 'Exit' not found");
        assert!(transport.clicks().is_empty());
    }

    #[tokio::test]
    async fn button_without_label_is_fatal() {
        let scenario = Scenario::new("menu", vec![step(1, "Нажимает кнопку", None)]);
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert_eq!(
            result.failure.unwrap().reason,
            "button step names no quoted label"
        );
    }

    #[tokio::test]
    async fn repeat_replays_target_step() {
        let scenario = Scenario::new(
            "repeat",
            vec![
                step(1, "Ping", Some("Pong")),
                step(2, "REPEAT 1-1 2", None),
                step(3, "Done", Some("Ok")),
            ],
        );
        let transport = ScriptedTransport::new(vec![
            Message::new("Pong"),
            Message::new("Pong"),
            Message::new("Pong"),
            Message::new("Ok"),
        ]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed, "failure: {:?}", result.failure);
        // Initial pass plus two repeats
        assert_eq!(transport.sent(), vec!["Ping", "Ping", "Ping", "Done"]);
    }

    #[tokio::test]
    async fn until_reply_loops_until_trigger() {
        let scenario = Scenario::new(
            "until",
            vec![
                step(1, "Ping", Some("<any>")),
                step(2, "UNTIL_REPLY 1 'Ready'", None),
            ],
        );
        let transport = ScriptedTransport::new(vec![
            Message::new("Wait"),
            Message::new("Still wait"),
            Message::new("ready!"),
        ]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed, "failure: {:?}", result.failure);
        assert_eq!(transport.sent(), vec!["Ping", "Ping", "Ping"]);
        let jumps = log
            .events()
            .filter(|e| matches!(e, RunEvent::TriggerMissing { .. }))
            .count();
        assert_eq!(jumps, 2);
    }

    #[tokio::test]
    async fn unresolved_jump_target_fails_without_io() {
        let scenario = Scenario::new("broken", vec![step(1, "UNTIL_REPLY 7 'Ready'", None)]);
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(!result.passed);
        assert_eq!(
            result.failure.unwrap().reason,
            "jump target step 7 does not exist"
        );
        assert!(transport.sent().is_empty());
        assert_eq!(transport.conversations_closed(), 1);
    }

    #[tokio::test]
    async fn malformed_directive_is_skipped_with_warning() {
        let scenario = Scenario::new(
            "malformed",
            vec![step(1, "REPEAT sometimes", None), step(2, "/start", None)],
        );
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed);
        assert_eq!(transport.sent(), vec!["/start"]);
        assert!(
            log.events()
                .any(|e| matches!(e, RunEvent::DirectiveSkipped { step: 1, .. }))
        );
    }

    #[tokio::test]
    async fn retry_budget_stops_endless_until_reply() {
        let scenario = Scenario::new(
            "endless",
            vec![
                step(1, "Ping", None),
                step(2, "UNTIL_REPLY 1 'Never'", None),
            ],
        );
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();
        let mut interpreter = Interpreter::new(
            InterpreterConfig::new("@test_bot")
                .with_settle_delay(Duration::ZERO)
                .with_max_retries(5),
        );

        let result = interpreter.run(&transport, &scenario, &mut log).await;

        assert!(!result.passed);
        // Five jumps allowed, the sixth fails at the directive
        assert_eq!(result.steps_executed, 12);
        assert_eq!(transport.sent().len(), 6);
        let failure = result.failure.unwrap();
        assert_eq!(failure.step, Some(2));
        assert_eq!(failure.reason, "UNTIL_REPLY retry budget of 5 exhausted");
    }

    #[tokio::test]
    async fn repeat_is_not_limited_by_retry_budget() {
        let scenario = Scenario::new(
            "long-repeat",
            vec![step(1, "Ping", None), step(2, "REPEAT 1-1 50", None)],
        );
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();
        let mut interpreter = Interpreter::new(
            InterpreterConfig::new("@test_bot")
                .with_settle_delay(Duration::ZERO)
                .with_max_retries(3),
        );

        let result = interpreter.run(&transport, &scenario, &mut log).await;

        assert!(result.passed, "failure: {:?}", result.failure);
        assert_eq!(transport.sent().len(), 51);
    }

    #[tokio::test]
    async fn random_choice_sends_one_candidate() {
        let scenario = Scenario::new(
            "random",
            vec![step(
                1,
                "Отправляет одно из сообщений:\n1. Привет\n2. Здравствуйте",
                None,
            )],
        );
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0] == "Привет" || sent[0] == "Здравствуйте");
    }

    #[tokio::test]
    async fn open_failure_is_contained() {
        let scenario = Scenario::new("s", vec![step(1, "/start", None)]);
        let transport = ScriptedTransport::new(vec![])
            .failing_open(TransportError::TargetNotFound("@test_bot".into()));
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(!result.passed);
        let failure = result.failure.unwrap();
        assert_eq!(failure.step, None);
        assert!(failure.reason.contains("@test_bot"));
        assert_eq!(log.errors().len(), 1);
    }

    #[tokio::test]
    async fn send_fault_is_contained_and_conversation_closed() {
        let scenario = Scenario::new("s", vec![step(1, "/start", Some("Hi"))]);
        let transport = ScriptedTransport::new(vec![Message::new("Hi")])
            .failing_send(TransportError::Connection("reset by peer".into()));
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(!result.passed);
        assert_eq!(
            result.failure.unwrap().reason,
            "transport fault: connection error: reset by peer"
        );
        assert_eq!(transport.conversations_closed(), 1);
    }

    #[tokio::test]
    async fn pending_message_with_buttons_is_pressed_without_waiting() {
        let scenario = Scenario::new(
            "pending",
            vec![
                step(1, "/start", Some("Welcome")),
                step(2, "Нажимает кнопку 'Go'", None),
            ],
        );
        let transport = ScriptedTransport::new(vec![
            Message::new("Welcome")
                .with_id(5)
                .with_row(vec![Button::new("Go")]),
        ]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed, "failure: {:?}", result.failure);
        assert_eq!(
            transport.click_records(),
            vec![Click {
                message_id: 5,
                label: "Go".into()
            }]
        );
        assert_eq!(transport.replies_consumed(), 1);
    }

    #[tokio::test]
    async fn sending_text_clears_pending_message() {
        let scenario = Scenario::new(
            "stale-menu",
            vec![
                step(1, "/start", Some("Welcome")),
                step(2, "hello", None),
                step(3, "Нажимает 'Go'", None),
            ],
        );
        let transport = ScriptedTransport::new(vec![
            Message::new("Welcome")
                .with_id(1)
                .with_row(vec![Button::new("Go")]),
            Message::new("Fresh menu")
                .with_id(2)
                .with_row(vec![Button::new("Go now")]),
        ]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed, "failure: {:?}", result.failure);
        assert_eq!(
            transport.click_records(),
            vec![Click {
                message_id: 2,
                label: "Go now".into()
            }]
        );
        assert_eq!(transport.replies_consumed(), 2);
    }

    #[tokio::test]
    async fn pending_message_without_buttons_waits_for_next_reply() {
        let scenario = Scenario::new(
            "late-menu",
            vec![
                step(1, "/start", Some("Hi")),
                step(2, "Нажимает кнопку 'Go'", None),
            ],
        );
        let transport = ScriptedTransport::new(vec![
            Message::new("Hi").with_id(1),
            Message::new("Menu")
                .with_id(2)
                .with_row(vec![Button::new("Go")]),
        ]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        assert!(result.passed, "failure: {:?}", result.failure);
        assert_eq!(transport.click_records()[0].message_id, 2);
        assert_eq!(transport.replies_consumed(), 2);
    }

    #[tokio::test]
    async fn awaited_reply_without_buttons_is_fatal() {
        let scenario = Scenario::new(
            "no-menu",
            vec![step(1, "/start", None), step(2, "Нажимает кнопку 'Go'", None)],
        );
        let transport = ScriptedTransport::new(vec![Message::new("Just text")]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        let failure = result.failure.unwrap();
        assert_eq!(failure.step, Some(2));
        assert_eq!(failure.reason, "reply has no buttons to press 'Go'");
        assert!(transport.clicks().is_empty());
    }

    #[tokio::test]
    async fn button_step_times_out_waiting_for_menu() {
        let scenario = Scenario::new(
            "silent-menu",
            vec![step(1, "/start", None), step(2, "Нажимает кнопку 'Go'", None)],
        );
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();

        let result = interpreter().run(&transport, &scenario, &mut log).await;

        let failure = result.failure.unwrap();
        assert_eq!(failure.step, Some(2));
        assert!(failure.reason.contains("timed out"), "{}", failure.reason);
        assert!(transport.clicks().is_empty());
        assert_eq!(transport.conversations_closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_releases_conversation_on_drop() {
        let scenario = Scenario::new("slow", vec![step(1, "hello", None)]);
        let transport = ScriptedTransport::new(vec![]);
        let mut log = MemoryLog::new();
        let mut interpreter = Interpreter::new(
            InterpreterConfig::new("@test_bot").with_settle_delay(Duration::from_secs(60)),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            interpreter.run(&transport, &scenario, &mut log),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(transport.conversations_opened(), 1);
        assert_eq!(transport.conversations_closed(), 0);
        assert_eq!(transport.conversations_released(), 1);
    }
}
