//! # LRMS Common Library
//!
//! Shared code for the learner records service:
//! - Error type and configuration resolution
//! - Region tags
//! - Tabular datasets read from `.xlsx` workbooks
//! - Cross-sheet learner consistency validation
//! - Password hashing and cookie signing
//! - Database schema and models

pub mod config;
pub mod credentials;
pub mod dataset;
pub mod db;
pub mod error;
pub mod region;
pub mod validator;
pub mod workbook;

pub use dataset::{Cell, Dataset, Table, REQUIRED_SHEETS};
pub use error::{Error, Result};
pub use region::Region;
pub use validator::{validate, ConsistencyError};
