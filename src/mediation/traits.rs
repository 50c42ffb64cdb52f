/*!
 * Mediation Traits
 * Collaborators consulted by the entry points
 */

use crate::audit::Operation;
use crate::core::types::{PermMask, Uid};
use crate::engine::{Decision, Verdict};
use crate::label::Subject;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::trace;

/// Owner metadata used by conditional path rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathCond {
    pub uid: Uid,
    pub mode: u32,
}

/// A filesystem check delegated by socket mediation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRequest {
    pub op: Operation,
    pub request: PermMask,
    pub path: PathBuf,
    pub cond: PathCond,
    /// `path_flags` bits
    pub flags: u32,
}

/// Path-based mediation for filesystem-backed objects
pub trait PathMediator: Send + Sync {
    fn path_perm(&self, subject: &Subject, req: &PathRequest) -> Verdict;
}

impl<F> PathMediator for F
where
    F: Fn(&Subject, &PathRequest) -> Verdict + Send + Sync,
{
    fn path_perm(&self, subject: &Subject, req: &PathRequest) -> Verdict {
        self(subject, req)
    }
}

/// Allows every path request; used when no path mediator is attached
#[derive(Debug, Clone, Copy, Default)]
pub struct UnmediatedPaths;

impl PathMediator for UnmediatedPaths {
    fn path_perm(&self, subject: &Subject, req: &PathRequest) -> Verdict {
        trace!(
            label = subject.label().name(),
            op = req.op.as_str(),
            path = %req.path.display(),
            "path request not mediated"
        );
        Ok(Decision::Allow)
    }
}
