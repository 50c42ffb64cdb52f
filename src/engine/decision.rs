/*!
 * Decisions
 * Successful mediation outcomes; refusals travel as errors
 */

use crate::core::errors::MediationResult;
use crate::core::types::PermMask;
use serde::{Deserialize, Serialize};

/// Outcome of a decision that lets the operation proceed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    #[default]
    Allow,
    /// Would have been denied; allowed because the profile complains
    Complain { denied: PermMask },
}

impl Decision {
    /// Allowed without any complain-mode flag
    #[inline]
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[inline]
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Complain { .. })
    }

    /// Bits that would have been denied
    pub fn denied(&self) -> PermMask {
        match self {
            Self::Allow => 0,
            Self::Complain { denied } => *denied,
        }
    }

    /// Combine two successes; any flag survives
    pub fn merge(self, other: Decision) -> Decision {
        match self.denied() | other.denied() {
            0 if self.is_clean() && other.is_clean() => Self::Allow,
            denied => Self::Complain { denied },
        }
    }
}

/// Result of one mediation call
pub type Verdict = MediationResult<Decision>;

/// Negative errno of a verdict, zero when it allows
pub fn verdict_errno(verdict: &Verdict) -> i32 {
    match verdict {
        Ok(_) => 0,
        Err(e) => e.errno(),
    }
}
