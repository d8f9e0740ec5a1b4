//! Data access levels: a coarse trust ceiling carried alongside scopes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Ordered from least to most trusted. Comparison operators follow that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataAccessLevel {
    None,
    Read,
    Write,
    Full,
}

impl DataAccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataAccessLevel::None => "none",
            DataAccessLevel::Read => "read",
            DataAccessLevel::Write => "write",
            DataAccessLevel::Full => "full",
        }
    }

    /// Whether a holder of `self` may perform an action needing `required`.
    pub fn allows(&self, required: DataAccessLevel) -> bool {
        *self >= required
    }

    /// Fail with 403 semantics unless `self` reaches `required`.
    pub fn require(&self, required: DataAccessLevel) -> Result<(), CoreError> {
        if self.allows(required) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "Data access level '{required}' required, session has '{self}'"
            )))
        }
    }
}

impl fmt::Display for DataAccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataAccessLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(DataAccessLevel::None),
            "read" => Ok(DataAccessLevel::Read),
            "write" => Ok(DataAccessLevel::Write),
            "full" => Ok(DataAccessLevel::Full),
            other => Err(CoreError::Validation(format!(
                "Unknown data access level: '{other}'"
            ))),
        }
    }
}

/// Resolve the level granted for a handshake against the product ceiling.
///
/// Without an explicit request the session gets `read`, lowered to the
/// ceiling when the product is capped below it. An explicit request above
/// the ceiling is refused rather than silently clamped.
pub fn resolve(
    requested: Option<DataAccessLevel>,
    ceiling: DataAccessLevel,
) -> Result<DataAccessLevel, CoreError> {
    match requested {
        Some(level) if level > ceiling => Err(CoreError::Forbidden(format!(
            "Requested data access level '{level}' exceeds product maximum '{ceiling}'"
        ))),
        Some(level) => Ok(level),
        None => Ok(DataAccessLevel::Read.min(ceiling)),
    }
}
