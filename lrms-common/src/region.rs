//! Geographic regions used to scope uploads and learner counts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// One of the three fixed regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Luzon,
    Visayas,
    Mindanao,
}

impl Region {
    /// All regions in display order
    pub const ALL: [Region; 3] = [Region::Luzon, Region::Visayas, Region::Mindanao];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Luzon => "Luzon",
            Region::Visayas => "Visayas",
            Region::Mindanao => "Mindanao",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    /// Region names are matched exactly (case-sensitive), as submitted by the forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown region: {}", s)))
    }
}
