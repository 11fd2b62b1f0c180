//! Scenario data model.
//!
//! Steps are immutable once loaded. Each [`Scenario`] builds its ordinal lookup
//! table once, so jump targets resolve without rescanning the steps.

use std::collections::HashMap;

use crate::action::{ActionMarkers, StepAction, classify};

/// One row of a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    ordinal: i64,
    raw_action: String,
    action: StepAction,
    expected_reply: Option<String>,
    error_label: String,
}

impl Step {
    /// Creates a step, classifying its action text with `markers`.
    ///
    /// Blank expectations become `None`.
    pub fn new(
        ordinal: i64,
        action: &str,
        expected_reply: Option<&str>,
        error_label: impl Into<String>,
        markers: &ActionMarkers,
    ) -> Self {
        let raw_action = action.trim().to_string();
        Self {
            ordinal,
            action: classify(&raw_action, markers),
            raw_action,
            expected_reply: expected_reply
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            error_label: error_label.into(),
        }
    }

    /// The logical step number.
    pub fn ordinal(&self) -> i64 {
        self.ordinal
    }

    /// The action text as written in the source.
    pub fn raw_action(&self) -> &str {
        &self.raw_action
    }

    /// The classified action.
    pub fn action(&self) -> &StepAction {
        &self.action
    }

    /// The reply pattern to verify, if any.
    pub fn expected_reply(&self) -> Option<&str> {
        self.expected_reply.as_deref()
    }

    /// Text logged when this step fails.
    pub fn error_label(&self) -> &str {
        &self.error_label
    }
}

/// Outcome of looking up a step by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdinalLookup {
    /// Exactly one step carries the ordinal.
    Found(usize),
    /// No step carries the ordinal.
    Missing,
    /// Several steps carry the ordinal.
    Ambiguous(usize),
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    name: String,
    steps: Vec<Step>,
    /// ordinal → (first index, occurrences)
    ordinals: HashMap<i64, (usize, usize)>,
}

impl Scenario {
    /// Creates a scenario and indexes its step ordinals.
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        let mut ordinals: HashMap<i64, (usize, usize)> = HashMap::new();
        for (index, step) in steps.iter().enumerate() {
            ordinals
                .entry(step.ordinal)
                .and_modify(|(_, count)| *count += 1)
                .or_insert((index, 1));
        }
        Self {
            name: name.into(),
            steps,
            ordinals,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolves a logical step number to a position in [`Self::steps`].
    pub fn lookup(&self, ordinal: i64) -> OrdinalLookup {
        match self.ordinals.get(&ordinal) {
            None => OrdinalLookup::Missing,
            Some(&(index, 1)) => OrdinalLookup::Found(index),
            Some(&(_, count)) => OrdinalLookup::Ambiguous(count),
        }
    }
}

/// All scenarios loaded from one source, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioSuite {
    scenarios: Vec<Scenario>,
}

impl ScenarioSuite {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Finds a scenario by exact name.
    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(ordinal: i64, action: &str) -> Step {
        Step::new(ordinal, action, None, "err", &ActionMarkers::default())
    }

    #[test]
    fn step_classifies_and_trims() {
        let s = Step::new(
            1,
            "  /start \n",
            Some("  "),
            "No welcome",
            &ActionMarkers::default(),
        );
        assert_eq!(s.raw_action(), "/start");
        assert_eq!(s.action(), &StepAction::Command("/start".into()));
        assert_eq!(s.expected_reply(), None);
        assert_eq!(s.error_label(), "No welcome");
    }

    #[test]
    fn lookup_by_ordinal_not_position() {
        let scenario = Scenario::new("s", vec![step(10, "a"), step(3, "b"), step(7, "c")]);
        assert_eq!(scenario.lookup(3), OrdinalLookup::Found(1));
        assert_eq!(scenario.lookup(7), OrdinalLookup::Found(2));
        assert_eq!(scenario.lookup(1), OrdinalLookup::Missing);
    }

    #[test]
    fn duplicate_ordinals_are_ambiguous() {
        let scenario = Scenario::new("s", vec![step(1, "a"), step(2, "b"), step(1, "c")]);
        assert_eq!(scenario.lookup(1), OrdinalLookup::Ambiguous(2));
        assert_eq!(scenario.lookup(2), OrdinalLookup::Found(1));
    }

    #[test]
    fn suite_lookup_by_name() {
        let suite = ScenarioSuite::new(vec![
            Scenario::new("login", vec![step(1, "/start")]),
            Scenario::new("schedule", vec![]),
        ]);
        assert_eq!(suite.len(), 2);
        assert!(suite.get("schedule").unwrap().is_empty());
        assert!(suite.get("Schedule").is_none());
        assert_eq!(suite.names().collect::<Vec<_>>(), vec!["login", "schedule"]);
    }
}
