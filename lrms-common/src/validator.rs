//! Cross-sheet learner consistency validator
//!
//! Every row of every non-profile sheet must name a learner that exists in
//! the `learner_profiles` sheet of the same dataset, with the same
//! `learner_number` and the same `name` (both compared after trimming).
//!
//! The check is pure: it never fails, it only reports. An empty result means
//! the dataset is fully consistent.
//!
//! # Ordering
//! Errors follow workbook sheet order, then row order, so the same input
//! always yields the same diagnostics.

use std::collections::HashSet;
use std::fmt;

use crate::dataset::{Dataset, Table, PROFILE_SHEET};

const LEARNER_NUMBER: &str = "learner_number";
const NAME: &str = "name";

/// A single consistency problem found in an uploaded dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// Sheet lacks a `learner_number` or `name` column; its rows were not checked
    MissingKeyColumns { sheet: String },

    /// Row names a learner absent from `learner_profiles`
    UnknownLearner {
        sheet: String,
        learner_number: String,
        name: String,
    },
}

impl ConsistencyError {
    pub fn sheet(&self) -> &str {
        match self {
            ConsistencyError::MissingKeyColumns { sheet }
            | ConsistencyError::UnknownLearner { sheet, .. } => sheet,
        }
    }
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyError::MissingKeyColumns { sheet } => {
                write!(f, "{}: missing learner_number or name column", sheet)
            }
            ConsistencyError::UnknownLearner {
                sheet,
                learner_number,
                name,
            } => write!(
                f,
                "{}: learner_number {} with name '{}' does not match learner_profiles",
                sheet, learner_number, name
            ),
        }
    }
}

impl std::error::Error for ConsistencyError {}

/// Validate that all non-profile rows reference a known learner.
///
/// A sheet missing either key column yields exactly one error and is skipped;
/// the remaining sheets are still checked.
pub fn validate(dataset: &Dataset) -> Vec<ConsistencyError> {
    let mut errors = Vec::new();

    let known = match dataset.sheet(PROFILE_SHEET) {
        Some(profiles) if has_key_columns(profiles) => learner_keys(profiles).collect(),
        Some(_) => {
            errors.push(ConsistencyError::MissingKeyColumns {
                sheet: PROFILE_SHEET.to_string(),
            });
            HashSet::new()
        }
        None => HashSet::new(),
    };

    for sheet in dataset.sheets().filter(|s| s.name != PROFILE_SHEET) {
        if !has_key_columns(&sheet.table) {
            errors.push(ConsistencyError::MissingKeyColumns {
                sheet: sheet.name.clone(),
            });
            continue;
        }

        for (learner_number, name) in learner_keys(&sheet.table) {
            if !known.contains(&(learner_number.clone(), name.clone())) {
                errors.push(ConsistencyError::UnknownLearner {
                    sheet: sheet.name.clone(),
                    learner_number,
                    name,
                });
            }
        }
    }

    errors
}

fn has_key_columns(table: &Table) -> bool {
    table.has_column(LEARNER_NUMBER) && table.has_column(NAME)
}

/// Trimmed `(learner_number, name)` pair for every row, in row order.
/// Callers must check [`has_key_columns`] first.
fn learner_keys(table: &Table) -> impl Iterator<Item = (String, String)> + '_ {
    let id_col = table.column_index(LEARNER_NUMBER).unwrap_or_default();
    let name_col = table.column_index(NAME).unwrap_or_default();

    table.rows.iter().map(move |row| {
        let text_at = |i: usize| row.get(i).map(|c| c.as_text()).unwrap_or_default();
        (
            text_at(id_col).trim().to_string(),
            text_at(name_col).trim().to_string(),
        )
    })
}
