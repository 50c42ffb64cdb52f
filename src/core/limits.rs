/*!
 * Limits and Constants
 *
 * Encoding tokens, signal mapping bounds and audit defaults shared across
 * the matcher, the mediation entry points and the audit pipeline.
 *
 * Values that must agree with compiled policy images are marked [ABI].
 */

use crate::core::types::StateId;

// =============================================================================
// AUTOMATON
// =============================================================================

/// The dead state. Every transition out of it stays in it.
/// [ABI]
pub const DFA_NOMATCH: StateId = 0;

/// Root state of a non-empty automaton
/// [ABI]
pub const DFA_START: StateId = 1;

/// Byte consumed between logical descriptor fields
/// [ABI]
pub const NULL_TRANSITION: u8 = 0;

/// Stand-in for an unbound or anonymous socket address.
/// Distinct from any zero-length name.
/// [ABI]
pub const ANONYMOUS_ADDR_TOKEN: u8 = 0x01;

// =============================================================================
// COMMAND SELECTORS
// =============================================================================

/// Address pairing selector (peer interaction)
/// [ABI]
pub const CMD_ADDR: u8 = 1;

/// Listen selector, followed by a be16 backlog
/// [ABI]
pub const CMD_LISTEN: u8 = 2;

/// Socket option selector, followed by a be16 option number
/// [ABI]
pub const CMD_OPT: u8 = 4;

// =============================================================================
// SIGNALS
// =============================================================================

/// Sentinel for signals with no mapping
pub const SIGUNKNOWN: u32 = 0;

/// Size of the static signal table (signal 0 maps to the last slot)
pub const MAXMAPPED_SIG: i32 = 35;

/// Number of entries in the signal name table
pub const MAXMAPPED_SIGNAME: u32 = (MAXMAPPED_SIG as u32) + 1;

/// Policy encoding of each classic signal, indexed by signal number.
/// Signal 0 takes the slot past the table.
/// [ABI]
pub const SIG_MAP: [u32; MAXMAPPED_SIG as usize] = [
    MAXMAPPED_SIG as u32,
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17,
    18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34,
];

/// First real-time signal
/// [LINUX-COMPAT]
pub const SIGRTMIN: i32 = 32;

/// Last real-time signal
/// [LINUX-COMPAT]
pub const SIGRTMAX: i32 = 64;

/// Compact offset real-time signals are remapped onto
/// [ABI]
pub const SIGRT_BASE: u32 = 128;

// =============================================================================
// NETWORK
// =============================================================================

/// Ports below this bind as the privileged local address type
/// [LINUX-COMPAT]
pub const PROT_SOCK: u16 = 1024;

/// Upper bound on address family numbers
/// [LINUX-COMPAT]
pub const AF_MAX: u16 = 46;

/// Longest unix socket path, including the abstract leading nul
/// [LINUX-COMPAT]
pub const UNIX_PATH_MAX: usize = 108;

// =============================================================================
// NAMES AND AUDIT
// =============================================================================

/// Default upper bound on canonical object names
pub const DEFAULT_PATH_MAX: usize = 4096;

/// Name of the root policy namespace
pub const ROOT_NAMESPACE: &str = "root";

/// Name carried by the unconfined profile
pub const UNCONFINED_NAME: &str = "unconfined";

/// Events retained by the in-memory sink ring buffer
pub const MAX_SINK_EVENTS: usize = 4096;

/// Events retained per subject label in the in-memory sink
pub const MAX_SINK_EVENTS_PER_LABEL: usize = 256;
