/*!
 * Permission Sets
 * Bitmask layout, per-state permission sets and the permission table
 */

use crate::core::types::{PermMask, StateId};
use serde::{Deserialize, Serialize};

/// Permission bits
pub mod mask {
    use crate::core::types::PermMask;

    pub const EXEC: PermMask = 0x0000_0001;
    pub const WRITE: PermMask = 0x0000_0002;
    pub const READ: PermMask = 0x0000_0004;
    pub const APPEND: PermMask = 0x0000_0008;
    pub const CREATE: PermMask = 0x0000_0010;
    pub const DELETE: PermMask = 0x0000_0020;
    pub const OPEN: PermMask = 0x0000_0040;
    pub const RENAME: PermMask = 0x0000_0080;
    pub const SETATTR: PermMask = 0x0000_0100;
    pub const GETATTR: PermMask = 0x0000_0200;
    pub const SETCRED: PermMask = 0x0000_0400;
    pub const GETCRED: PermMask = 0x0000_0800;
    pub const CHMOD: PermMask = 0x0000_1000;
    pub const CHOWN: PermMask = 0x0000_2000;
    pub const CHGRP: PermMask = 0x0000_4000;
    pub const LOCK: PermMask = 0x0000_8000;
    pub const MMAP: PermMask = 0x0001_0000;
    pub const MPROT: PermMask = 0x0002_0000;
    pub const ACCEPT: PermMask = 0x0010_0000;
    pub const BIND: PermMask = 0x0020_0000;
    pub const LISTEN: PermMask = 0x0040_0000;
    pub const SETOPT: PermMask = 0x0100_0000;
    pub const GETOPT: PermMask = 0x0200_0000;
    pub const CONT_MATCH: PermMask = 0x0800_0000;

    // network aliases
    pub const SEND: PermMask = WRITE;
    pub const RECEIVE: PermMask = READ;
    pub const SHUTDOWN: PermMask = DELETE;
    pub const CONNECT: PermMask = OPEN;

    /// Bits that only make sense against a peer
    pub const NET_PEER_MASK: PermMask = SEND | RECEIVE | CONNECT | ACCEPT;

    /// Bits a filesystem-bound socket forwards to path mediation
    pub const NET_FS_PERMS: PermMask = SEND
        | RECEIVE
        | CREATE
        | SHUTDOWN
        | CONNECT
        | RENAME
        | SETATTR
        | GETATTR
        | CHMOD
        | CHOWN
        | CHGRP
        | LOCK
        | MPROT;

    pub const ALL: PermMask = 0xffff_ffff;
}

/// Resolved permissions for one automaton state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionSet {
    pub allow: PermMask,
    pub deny: PermMask,
    pub audit: PermMask,
    pub quiet: PermMask,
    pub kill: PermMask,
    pub complain: PermMask,
}

impl PermissionSet {
    /// Grants nothing
    pub const NONE: Self = Self {
        allow: 0,
        deny: 0,
        audit: 0,
        quiet: 0,
        kill: 0,
        complain: 0,
    };

    /// Identity for [`PermissionSet::accumulate`]
    pub const ALL: Self = Self {
        allow: mask::ALL,
        deny: 0,
        audit: 0,
        quiet: mask::ALL,
        kill: 0,
        complain: 0,
    };

    pub const fn allowing(allow: PermMask) -> Self {
        Self {
            allow,
            ..Self::NONE
        }
    }

    pub const fn with_audit(mut self, audit: PermMask) -> Self {
        self.audit = audit;
        self
    }

    pub const fn with_quiet(mut self, quiet: PermMask) -> Self {
        self.quiet = quiet;
        self
    }

    pub const fn with_deny(mut self, deny: PermMask) -> Self {
        self.deny = deny;
        self
    }

    pub const fn with_kill(mut self, kill: PermMask) -> Self {
        self.kill = kill;
        self
    }

    /// Requested bits this set refuses
    #[inline]
    pub const fn denied(&self, request: PermMask) -> PermMask {
        request & (!self.allow | self.deny)
    }

    /// Fold another component's permissions into this one.
    ///
    /// Allow and quiet narrow, deny and kill widen.
    pub fn accumulate(&mut self, addend: &PermissionSet) {
        self.deny |= addend.deny;
        self.allow &= addend.allow & !self.deny;
        self.audit |= addend.audit & addend.allow;
        self.quiet &= addend.quiet & !addend.allow;
        self.kill |= addend.kill & !addend.allow;
        self.complain |= addend.complain & !addend.allow & !addend.deny;
    }

    /// Union of grants, used when a secondary check widens a primary one
    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        PermissionSet {
            allow: self.allow | other.allow,
            deny: self.deny | other.deny,
            audit: self.audit | other.audit,
            quiet: self.quiet & other.quiet,
            kill: self.kill | other.kill,
            complain: self.complain | other.complain,
        }
    }
}

/// State-indexed permission table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTable {
    entries: Vec<PermissionSet>,
}

impl PermissionTable {
    pub fn new(entries: Vec<PermissionSet>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw lookup. The dead state and states past the table grant nothing.
    #[inline]
    pub fn lookup(&self, state: StateId) -> PermissionSet {
        if state == crate::core::limits::DFA_NOMATCH {
            return PermissionSet::NONE;
        }
        self.entries
            .get(state as usize)
            .copied()
            .unwrap_or(PermissionSet::NONE)
    }
}

/// Network permission names, indexed by bit position
const NET_MASK_NAMES: [&str; 32] = [
    "", "send", "receive", "", "create", "shutdown", "connect", "", "setattr", "getattr",
    "setcred", "getcred", "chmod", "chown", "chgrp", "lock", "mmap", "mprot", "", "",
    "accept", "bind", "listen", "", "setopt", "getopt", "", "", "", "", "", "",
];

/// Render a mask with the network permission names, space separated
pub fn net_mask_names(perms: PermMask) -> String {
    let mut out = String::new();
    for (bit, name) in NET_MASK_NAMES.iter().enumerate() {
        if name.is_empty() || perms & (1 << bit) == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(name);
    }
    out
}
