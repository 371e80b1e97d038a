//! Three-valued results for policy requirement rules.

use std::fmt;
use std::ops::Not;

use serde::{Deserialize, Serialize};

/// Result of evaluating a policy requirement rule.
///
/// `Fail` means the rule could not be evaluated. It is distinct from an
/// explicit `False` but is never treated as a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    True,
    False,
    Fail,
}

impl Tristate {
    #[must_use]
    pub fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    #[must_use]
    pub fn is_fail(self) -> bool {
        matches!(self, Self::Fail)
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl Not for Tristate {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Fail => Self::Fail,
        }
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Fail => "FAIL",
        })
    }
}
