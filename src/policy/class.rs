/*!
 * Mediation Classes
 * Resource class numbers used as the first byte of every policy walk
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource class
///
/// The discriminant is the byte consumed from the root state to reach the
/// class start state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MediationClass {
    None = 0,
    Unknown = 1,
    File = 2,
    Cap = 3,
    Net = 4,
    Rlimits = 5,
    Domain = 6,
    Mount = 7,
    Ptrace = 9,
    Signal = 10,
    Xmatch = 11,
    Label = 16,
    PosixMqueue = 17,
    IoUring = 18,
    Module = 19,
    Lsm = 20,
    Namespace = 21,
    X = 31,
    Dbus = 32,
}

impl MediationClass {
    /// Highest class number
    pub const LAST: u8 = 32;

    pub const ALL: [MediationClass; 19] = [
        Self::None,
        Self::Unknown,
        Self::File,
        Self::Cap,
        Self::Net,
        Self::Rlimits,
        Self::Domain,
        Self::Mount,
        Self::Ptrace,
        Self::Signal,
        Self::Xmatch,
        Self::Label,
        Self::PosixMqueue,
        Self::IoUring,
        Self::Module,
        Self::Lsm,
        Self::Namespace,
        Self::X,
        Self::Dbus,
    ];

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Name used in audit output
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Unknown => "unknown",
            Self::File => "file",
            Self::Cap => "cap",
            Self::Net => "net",
            Self::Rlimits => "rlimits",
            Self::Domain => "domain",
            Self::Mount => "mount",
            Self::Ptrace => "ptrace",
            Self::Signal => "signal",
            Self::Xmatch => "xmatch",
            Self::Label => "label",
            Self::PosixMqueue => "posix_mqueue",
            Self::IoUring => "io_uring",
            Self::Module => "module",
            Self::Lsm => "lsm",
            Self::Namespace => "namespace",
            Self::X => "X",
            Self::Dbus => "dbus",
        }
    }
}

impl fmt::Display for MediationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
