//! Control-flow resolution.
//!
//! Directives never touch the transport. Given the program counter, the last
//! captured reply, and the per-directive loop counters, [`FlowState::resolve`]
//! decides where execution continues.
//!
//! ```text
//! REPEAT s-e n   at p:  count[p] < n  → count[p] += 1, jump to ordinal s
//!                       otherwise     → count[p] = 0, advance
//! UNTIL_REPLY t "x":    last reply matches x → advance
//!                       otherwise            → jump to ordinal t
//! malformed:            warn, advance
//! ```

use std::collections::HashMap;

use thiserror::Error;

use crate::action::Directive;
use crate::matcher::matches;
use crate::scenario::{OrdinalLookup, Scenario};

/// A directive referenced a step that cannot be resolved. Fatal to the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("jump target step {ordinal} does not exist")]
    UnresolvedTarget { ordinal: i64 },

    #[error("jump target step {ordinal} is ambiguous ({occurrences} steps share it)")]
    AmbiguousTarget { ordinal: i64, occurrences: usize },
}

/// What a directive decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A `REPEAT` loop fires again.
    RepeatIteration {
        target: usize,
        start: i64,
        iteration: u32,
        count: u32,
    },
    /// A `REPEAT` loop has fired `count` times; its counter is reset.
    RepeatFinished { count: u32 },
    /// `UNTIL_REPLY` saw its trigger.
    TriggerSeen { trigger: String },
    /// `UNTIL_REPLY` did not see its trigger and jumps back.
    TriggerMissing {
        target: usize,
        target_ordinal: i64,
        trigger: String,
    },
    /// The directive did not parse and is skipped.
    Skipped { text: String },
}

impl Resolution {
    /// The program counter after this resolution, given the directive at `pc`.
    pub fn next_pc(&self, pc: usize) -> usize {
        match self {
            Resolution::RepeatIteration { target, .. }
            | Resolution::TriggerMissing { target, .. } => *target,
            Resolution::RepeatFinished { .. }
            | Resolution::TriggerSeen { .. }
            | Resolution::Skipped { .. } => pc + 1,
        }
    }

    /// Returns true if this resolution moves the program counter backwards or sideways.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Resolution::RepeatIteration { .. } | Resolution::TriggerMissing { .. }
        )
    }
}

/// Loop counters for one scenario run, keyed by the directive's step index.
#[derive(Debug, Clone, Default)]
pub struct FlowState {
    repeat_counts: HashMap<usize, u32>,
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the `REPEAT` at `pc` has fired since it last finished.
    pub fn repeat_count(&self, pc: usize) -> u32 {
        self.repeat_counts.get(&pc).copied().unwrap_or(0)
    }

    /// Resolves `directive`, located at `pc` in `scenario`.
    pub fn resolve(
        &mut self,
        scenario: &Scenario,
        pc: usize,
        directive: &Directive,
        last_reply: &str,
    ) -> Result<Resolution, FlowError> {
        match directive {
            Directive::Repeat { start, count, .. } => {
                let fired = self.repeat_count(pc);
                if fired < *count {
                    let target = resolve_target(scenario, *start)?;
                    self.repeat_counts.insert(pc, fired + 1);
                    Ok(Resolution::RepeatIteration {
                        target,
                        start: *start,
                        iteration: fired + 1,
                        count: *count,
                    })
                } else {
                    self.repeat_counts.insert(pc, 0);
                    Ok(Resolution::RepeatFinished { count: *count })
                }
            }
            Directive::UntilReply { target, trigger } => {
                if matches(trigger, last_reply) {
                    Ok(Resolution::TriggerSeen {
                        trigger: trigger.clone(),
                    })
                } else {
                    Ok(Resolution::TriggerMissing {
                        target: resolve_target(scenario, *target)?,
                        target_ordinal: *target,
                        trigger: trigger.clone(),
                    })
                }
            }
            Directive::Malformed { text, .. } => Ok(Resolution::Skipped { text: text.clone() }),
        }
    }
}

fn resolve_target(scenario: &Scenario, ordinal: i64) -> Result<usize, FlowError> {
    match scenario.lookup(ordinal) {
        OrdinalLookup::Found(index) => Ok(index),
        OrdinalLookup::Missing => Err(FlowError::UnresolvedTarget { ordinal }),
        OrdinalLookup::Ambiguous(occurrences) => Err(FlowError::AmbiguousTarget {
            ordinal,
            occurrences,
        }),
    }
}
