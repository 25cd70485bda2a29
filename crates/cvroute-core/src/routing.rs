//! Routing labels that select the export sheet for a record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Classification of a record, derived from its qualification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingLabel {
    Actuarial,
    General,
}

impl RoutingLabel {
    pub const ALL: [RoutingLabel; 2] = [RoutingLabel::Actuarial, RoutingLabel::General];

    /// Label assigned when nothing more specific matches.
    pub const FALLBACK: RoutingLabel = RoutingLabel::General;

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingLabel::Actuarial => "actuarial",
            RoutingLabel::General => "general",
        }
    }

    /// Environment variable that may pre-provision this label's sheet.
    pub fn sheet_env_var(&self) -> String {
        format!("SHEET_ID_{}", self.as_str().to_uppercase())
    }
}

impl fmt::Display for RoutingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RoutingLabel::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown routing label: '{}'", wanted)))
    }
}
