//! Scenario source: tabular step data loaded from CSV.
//!
//! One row per step. Rows are grouped by scenario name, in order of first
//! appearance, and each action is classified once at load time.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::action::ActionMarkers;
use crate::scenario::{Scenario, ScenarioSuite, Step};

/// Errors that can occur while loading scenarios.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open scenario file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("required column '{column}' not found in header")]
    MissingColumn { column: String },

    #[error("line {line}: invalid step number '{value}'")]
    InvalidOrdinal { line: u64, value: String },
}

/// Header names of the scenario table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Scenario name (required).
    pub scenario: String,
    /// Step number. Blank cells number the step by its position.
    pub ordinal: String,
    /// User action (required).
    pub action: String,
    /// Expected bot reply.
    pub expected_reply: String,
    /// Text logged when the step fails.
    pub error_label: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            scenario: "Сценарий".to_string(),
            ordinal: "Шаги".to_string(),
            action: "Действие юзера".to_string(),
            expected_reply: "Ответ бота".to_string(),
            error_label: "Как запишем ошибку".to_string(),
        }
    }
}

/// Resolved column positions for one header row.
struct Columns {
    scenario: usize,
    action: usize,
    ordinal: Option<usize>,
    expected_reply: Option<usize>,
    error_label: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord, mapping: &ColumnMapping) -> Result<Self, SourceError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };
        let required = |name: &str| {
            find(name).ok_or_else(|| SourceError::MissingColumn {
                column: name.to_string(),
            })
        };
        Ok(Self {
            scenario: required(&mapping.scenario)?,
            action: required(&mapping.action)?,
            ordinal: find(&mapping.ordinal),
            expected_reply: find(&mapping.expected_reply),
            error_label: find(&mapping.error_label),
        })
    }
}

/// Loads scenarios from a CSV file.
pub fn load_csv(
    path: &Path,
    mapping: &ColumnMapping,
    markers: &ActionMarkers,
) -> Result<ScenarioSuite, SourceError> {
    let reader = std::fs::File::open(path).map_err(|e| SourceError::Open {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
    let suite = parse_csv(reader, mapping, markers)?;
    debug!(
        path = %path.display(),
        scenarios = suite.len(),
        "loaded scenarios"
    );
    Ok(suite)
}

/// Parses scenarios from CSV data with a header row.
pub fn parse_csv<R: Read>(
    reader: R,
    mapping: &ColumnMapping,
    markers: &ActionMarkers,
) -> Result<ScenarioSuite, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let columns = Columns::locate(&headers, mapping)?;

    let mut order: Vec<(String, Vec<Step>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in reader.records() {
        let record = record?;
        let cell = |i: usize| record.get(i).map(str::trim).unwrap_or_default();
        let optional = |i: Option<usize>| i.map(cell).filter(|s| !s.is_empty());

        let name = cell(columns.scenario);
        if name.is_empty() {
            continue;
        }

        let slot = *index.entry(name.to_string()).or_insert_with(|| {
            order.push((name.to_string(), Vec::new()));
            order.len() - 1
        });
        let steps = &mut order[slot].1;

        let ordinal = match optional(columns.ordinal) {
            Some(value) => parse_ordinal(value).ok_or_else(|| SourceError::InvalidOrdinal {
                line: record.position().map_or(0, csv::Position::line),
                value: value.to_string(),
            })?,
            None => i64::try_from(steps.len() + 1).unwrap_or(i64::MAX),
        };
        let error_label = optional(columns.error_label)
            .map_or_else(|| format!("Error at step {ordinal}"), str::to_string);

        steps.push(Step::new(
            ordinal,
            cell(columns.action),
            optional(columns.expected_reply),
            error_label,
            markers,
        ));
    }

    Ok(ScenarioSuite::new(
        order
            .into_iter()
            .map(|(name, steps)| Scenario::new(name, steps))
            .collect(),
    ))
}

/// Accepts `3` and spreadsheet-style `3.0`.
#[allow(clippy::cast_possible_truncation)]
fn parse_ordinal(value: &str) -> Option<i64> {
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    let f = value.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i64)
}
