//! Database access for lrms-web
//!
//! Schema creation lives in `lrms_common::db`; these modules hold the
//! queries each store needs.

pub mod accounts;
pub mod learners;
pub mod staging;
