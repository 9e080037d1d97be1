//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{Error, Region};

/// Learner identity record (`learner_profiles`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LearnerProfile {
    pub learner_number: String,
    pub name: String,
    pub gender: Option<String>,
    pub region: Option<String>,
    pub learning_hub: Option<String>,
    pub program: Option<String>,
    /// Persisted in the `class` column
    #[sqlx(rename = "class")]
    pub class_name: Option<String>,
    pub co_learner: Option<String>,
    pub grade_level: Option<String>,
}

/// Child tables holding per-learner measurements.
///
/// Each row has a surrogate `id` and a `learner_number` that cascades on
/// profile deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementTable {
    PreCompetencyEvaluation,
    PostCompetencyEvaluation,
    PreConfidenceSelfEsteem,
    PostConfidenceSelfEsteem,
    Attendance,
    WorksheetScore,
    HopeIndex,
}

impl MeasurementTable {
    pub const ALL: [MeasurementTable; 7] = [
        MeasurementTable::PreCompetencyEvaluation,
        MeasurementTable::PostCompetencyEvaluation,
        MeasurementTable::PreConfidenceSelfEsteem,
        MeasurementTable::PostConfidenceSelfEsteem,
        MeasurementTable::Attendance,
        MeasurementTable::WorksheetScore,
        MeasurementTable::HopeIndex,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            MeasurementTable::PreCompetencyEvaluation => "pre_competency_evaluation",
            MeasurementTable::PostCompetencyEvaluation => "post_competency_evaluation",
            MeasurementTable::PreConfidenceSelfEsteem => "pre_confidence_and_self_esteem",
            MeasurementTable::PostConfidenceSelfEsteem => "post_confidence_and_self_esteem",
            MeasurementTable::Attendance => "attendance",
            MeasurementTable::WorksheetScore => "worksheet_score",
            MeasurementTable::HopeIndex => "hope_index",
        }
    }

    /// Measurement columns (beyond `id` and `learner_number`)
    pub fn measurement_columns(&self) -> &'static str {
        match self {
            MeasurementTable::PreCompetencyEvaluation
            | MeasurementTable::PostCompetencyEvaluation
            | MeasurementTable::PreConfidenceSelfEsteem
            | MeasurementTable::PostConfidenceSelfEsteem => "score INTEGER",
            MeasurementTable::Attendance => "date TEXT, status TEXT",
            MeasurementTable::WorksheetScore => "ws_number INTEGER, score INTEGER",
            MeasurementTable::HopeIndex => "day_number INTEGER, am_score INTEGER, pm_score INTEGER",
        }
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Account lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(Error::Internal(format!("Invalid role in database: {}", other))),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AccountStatus::Pending),
            "active" => Ok(AccountStatus::Active),
            other => Err(Error::Internal(format!("Invalid account status in database: {}", other))),
        }
    }
}

/// Stored account, including the password hash
#[derive(Debug, Clone)]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
}

/// Account as shown on the administration page (no hash)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub username: String,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: Option<String>,
    pub approved_at: Option<String>,
}

/// Workbook uploaded for a region and awaiting commit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedUpload {
    pub region: Region,
    pub file_path: PathBuf,
    pub original_filename: Option<String>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}
