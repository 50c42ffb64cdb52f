/*!
 * Error Types
 * Mediation error taxonomy with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Result type for mediation operations
pub type MediationResult<T> = Result<T, MediationError>;

/// Linux errno values surfaced by [`MediationError::errno`]
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const ENOMEM: i32 = 12;
    pub const EACCES: i32 = 13;
    pub const EINVAL: i32 = 22;
    pub const ENAMETOOLONG: i32 = 36;
    pub const EAFNOSUPPORT: i32 = 97;
}

/// Mediation errors
///
/// Policy outcomes (`PolicyMismatch`, `PermissionDenied`, `Killed`) are
/// decisions, the remaining variants are failures to reach one.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum MediationError {
    #[error("Policy mismatch: {info} (denied {denied:#x})")]
    #[diagnostic(
        code(mediation::policy_mismatch),
        help("The request descriptor left the automaton. The diagnostic names the field that failed.")
    )]
    PolicyMismatch { info: &'static str, denied: u32 },

    #[error("Permission denied: {denied:#x}")]
    #[diagnostic(
        code(mediation::permission_denied),
        help("The resolved permission set lacks the listed bits. Review the profile rules.")
    )]
    PermissionDenied {
        denied: u32,
        info: Option<&'static str>,
    },

    #[error("Killed: denied {denied:#x} intersects the kill mask")]
    #[diagnostic(
        code(mediation::killed),
        help("The caller is expected to terminate the requesting task.")
    )]
    Killed { denied: u32 },

    #[error("Allocation failed: {0}")]
    #[diagnostic(
        code(mediation::allocation_failure),
        help("Audit bookkeeping could not allocate. The caller may retry.")
    )]
    AllocationFailure(&'static str),

    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(mediation::invalid_argument),
        help("The request descriptor is malformed.")
    )]
    InvalidArgument(String),

    #[error("Name too long: {0} bytes")]
    #[diagnostic(
        code(mediation::name_too_long),
        help("Canonical names are bounded by the configured path_max.")
    )]
    NameTooLong(usize),

    #[error("Address family {0} not supported")]
    #[diagnostic(
        code(mediation::af_not_supported),
        help("The address does not belong to the socket's family.")
    )]
    AddressFamilyNotSupported(u16),

    #[error("Path mediation failed: {0}")]
    #[diagnostic(
        code(mediation::path_mediation),
        help("Filesystem-backed objects are checked by the path mediator.")
    )]
    PathMediation(String),

    #[error("Invalid policy: {0}")]
    #[diagnostic(
        code(mediation::invalid_policy),
        help("The compiled policy image failed validation. Rebuild it.")
    )]
    InvalidPolicy(String),
}

impl MediationError {
    /// Negative errno equivalent
    pub fn errno(&self) -> i32 {
        -match self {
            Self::PolicyMismatch { .. } | Self::PermissionDenied { .. } | Self::Killed { .. } => {
                errno::EACCES
            }
            Self::PathMediation(_) => errno::EACCES,
            Self::AllocationFailure(_) => errno::ENOMEM,
            Self::InvalidArgument(_) | Self::InvalidPolicy(_) => errno::EINVAL,
            Self::NameTooLong(_) => errno::ENAMETOOLONG,
            Self::AddressFamilyNotSupported(_) => errno::EAFNOSUPPORT,
        }
    }

    /// True for policy decisions, false for failures to decide
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::PolicyMismatch { .. } | Self::PermissionDenied { .. } | Self::Killed { .. }
        )
    }

    /// Denied bits carried by a policy decision
    pub fn denied(&self) -> u32 {
        match self {
            Self::PolicyMismatch { denied, .. }
            | Self::PermissionDenied { denied, .. }
            | Self::Killed { denied } => *denied,
            _ => 0,
        }
    }

    /// Diagnostic string, if any
    pub fn info(&self) -> Option<&'static str> {
        match self {
            Self::PolicyMismatch { info, .. } => Some(*info),
            Self::PermissionDenied { info, .. } => *info,
            _ => None,
        }
    }
}
