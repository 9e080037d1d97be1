//! Error types for lrms-web
//!
//! Every failure is caught at the handler boundary and turned into one or
//! more transient notices plus a redirect; nothing here terminates the
//! process.

use lrms_common::{ConsistencyError, Region};
use std::iter;
use thiserror::Error;

/// Consistency errors surfaced to the user per rejected upload
pub const MAX_REPORTED_CONSISTENCY_ERRORS: usize = 10;

/// Upload, preview and commit failures
#[derive(Debug, Error)]
pub enum IngestError {
    /// Upload carried no file (or an empty filename)
    #[error("No file selected")]
    NoFile,

    /// Filename does not declare the `.xlsx` container
    #[error("Only .xlsx files are allowed")]
    Format,

    /// Payload exceeds the upload ceiling; rejected before parsing
    #[error("Upload rejected: file exceeds the {} MiB limit", .limit / (1024 * 1024))]
    TooLarge { limit: usize },

    /// Payload is not a readable workbook
    #[error("Upload failed: {0}")]
    Parse(String),

    /// Required sheets absent; lists exactly the missing names
    #[error("Missing required sheets: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Rows reference unknown or mismatched learners
    #[error("Upload failed due to learner inconsistency across sheets")]
    Consistency(Vec<ConsistencyError>),

    /// Temporary file or staging record could not be written
    #[error("Upload failed: {0}")]
    Storage(String),

    /// Commit transaction failed and was rolled back
    #[error("Database save failed for {region}: {cause}")]
    Persistence { region: Region, cause: String },

    /// No staged upload exists for the region
    #[error("No uploaded file to save for {region}")]
    NotFound { region: Region },
}

impl IngestError {
    /// Notices to show the user, in display order.
    ///
    /// Consistency failures list the first few offending rows followed by a
    /// summary line.
    pub fn notices(&self) -> Vec<String> {
        match self {
            IngestError::Consistency(errors) => errors
                .iter()
                .take(MAX_REPORTED_CONSISTENCY_ERRORS)
                .map(|e| e.to_string())
                .chain(iter::once(self.to_string()))
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Registration and account administration failures
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username and password are required")]
    MissingCredentials,

    #[error("Username already exists or is pending approval")]
    AlreadyExists,

    #[error("No pending account named '{0}'")]
    NotPending(String),

    #[error("Account '{0}' not found")]
    NotFound(String),

    #[error("Root admin account cannot be deleted")]
    Protected,

    #[error("Account store error: {0}")]
    Store(#[from] lrms_common::Error),
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        AccountError::Store(lrms_common::Error::Database(err))
    }
}

/// Login failures
#[derive(Debug, Error)]
pub enum LoginError {
    /// Unknown username, or an account still awaiting approval
    #[error("Account does not exist or is pending approval")]
    UnknownAccount,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Login failed: {0}")]
    Store(#[from] AccountError),
}
