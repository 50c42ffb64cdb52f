/*!
 * Audit Records
 * Decision records with a tagged per-class payload
 */

use crate::core::errors::{MediationError, MediationResult};
use crate::core::types::{Family, PermMask, Uid};
use crate::label::{Label, Profile};
use crate::net::UnixAddr;
use crate::policy::MediationClass;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};
use smartstring::alias::String as InlineString;
use std::net::SocketAddr;
use std::time::SystemTime;

/// Kind of audit message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AuditType {
    Audit = 0,
    Allowed,
    Denied,
    Hint,
    Status,
    Error,
    Kill,
    User,
    /// Resolved from the error and profile mode at emission time
    Auto,
}

impl AuditType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Audit => "AUDIT",
            Self::Allowed => "ALLOWED",
            Self::Denied => "DENIED",
            Self::Hint => "HINT",
            Self::Status => "STATUS",
            Self::Error => "ERROR",
            Self::Kill => "KILLED",
            Self::User => "USER",
            Self::Auto => "AUTO",
        }
    }

    /// Types that report a refusal
    pub const fn is_denial(self) -> bool {
        matches!(self, Self::Denied | Self::Kill)
    }
}

/// Per-profile audit verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    #[default]
    Normal,
    QuietDenied,
    Quiet,
    NoQuiet,
    All,
}

impl AuditMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::QuietDenied => "quiet_denied",
            Self::Quiet => "quiet",
            Self::NoQuiet => "noquiet",
            Self::All => "all",
        }
    }
}

/// Operation tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    PostCreate,
    Bind,
    Connect,
    Listen,
    Accept,
    Sendmsg,
    Recvmsg,
    Getsockname,
    Getpeername,
    Getsockopt,
    Setsockopt,
    Shutdown,
    FilePerm,
    FileReceive,
    FileInherit,
    Signal,
    Open,
    Unlink,
    Getattr,
    Setattr,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::PostCreate => "post_create",
            Self::Bind => "bind",
            Self::Connect => "connect",
            Self::Listen => "listen",
            Self::Accept => "accept",
            Self::Sendmsg => "sendmsg",
            Self::Recvmsg => "recvmsg",
            Self::Getsockname => "getsockname",
            Self::Getpeername => "getpeername",
            Self::Getsockopt => "getsockopt",
            Self::Setsockopt => "setsockopt",
            Self::Shutdown => "socket_shutdown",
            Self::FilePerm => "file_perm",
            Self::FileReceive => "file_receive",
            Self::FileInherit => "file_inherit",
            Self::Signal => "signal",
            Self::Open => "open",
            Self::Unlink => "unlink",
            Self::Getattr => "getattr",
            Self::Setattr => "setattr",
        }
    }
}

/// Socket address as reported in audit output
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "addr", rename_all = "snake_case")]
pub enum AuditAddr {
    Unix(UnixAddr),
    Inet(SocketAddr),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetAudit {
    pub family: Family,
    pub sock_type: u16,
    pub protocol: u16,
    pub addr: Option<AuditAddr>,
    pub peer_addr: Option<AuditAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignalAudit {
    /// Mapped signal number
    pub signal: u32,
    /// Signal number as requested
    pub unmapped: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MqueueAudit {
    pub fsuid: Uid,
    pub ouid: Uid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileAudit {
    pub fsuid: Uid,
    pub ouid: Uid,
}

/// Class-specific audit fields
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "snake_case")]
pub enum AuditPayload {
    #[default]
    None,
    Net(NetAudit),
    Signal(SignalAudit),
    Mqueue(MqueueAudit),
    File(FileAudit),
}

pub(crate) static NO_PAYLOAD: AuditPayload = AuditPayload::None;

/// Borrowed decision context assembled by an entry point
///
/// Cheap to copy so per-profile and per-peer variations can be derived
/// without touching the original.
#[derive(Debug, Clone, Copy)]
pub struct AuditData<'a> {
    pub class: MediationClass,
    pub op: Operation,
    pub info: Option<&'static str>,
    pub name: Option<&'a str>,
    pub peer: Option<&'a Label>,
    pub payload: &'a AuditPayload,
}

impl<'a> AuditData<'a> {
    pub fn new(class: MediationClass, op: Operation) -> Self {
        Self {
            class,
            op,
            info: None,
            name: None,
            peer: None,
            payload: &NO_PAYLOAD,
        }
    }

    pub fn with_payload(mut self, payload: &'a AuditPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_peer(mut self, peer: &'a Label) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_info(mut self, info: Option<&'static str>) -> Self {
        self.info = info;
        self
    }
}

/// A fully populated decision record
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_type: AuditType,
    pub class: MediationClass,
    pub op: Operation,
    pub profile: InlineString,
    pub namespace: InlineString,
    pub name: Option<String>,
    pub peer: Option<String>,
    pub info: Option<InlineString>,
    /// Negative errno, zero for allowed decisions
    pub error: i32,
    pub request: PermMask,
    pub denied: PermMask,
    pub payload: AuditPayload,
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub logged_at: SystemTime,
}

fn try_dup(source: &str, what: &'static str) -> MediationResult<String> {
    let mut copy = String::new();
    copy.try_reserve_exact(source.len())
        .map_err(|_| MediationError::AllocationFailure(what))?;
    copy.push_str(source);
    Ok(copy)
}

impl AuditRecord {
    /// Copy a decision context into an owned record.
    ///
    /// Name copies are fallible so allocation pressure surfaces as
    /// [`MediationError::AllocationFailure`].
    pub fn from_data(
        audit_type: AuditType,
        profile: &Profile,
        ad: &AuditData<'_>,
        request: PermMask,
        denied: PermMask,
        error: i32,
    ) -> MediationResult<Self> {
        let name = ad.name.map(|n| try_dup(n, "audit name")).transpose()?;
        let peer = ad
            .peer
            .map(|p| try_dup(p.name(), "audit peer label"))
            .transpose()?;

        Ok(Self {
            audit_type,
            class: ad.class,
            op: ad.op,
            profile: profile.name().into(),
            namespace: profile.namespace().into(),
            name,
            peer,
            info: ad.info.map(Into::into),
            error,
            request,
            denied,
            payload: ad.payload.clone(),
            logged_at: SystemTime::now(),
        })
    }

    /// Comparator key: records with equal keys are duplicates
    pub fn key(&self) -> AuditKey {
        AuditKey {
            audit_type: self.audit_type,
            class: self.class,
            op: self.op,
            name: self.name.clone(),
            profile: self.profile.clone(),
            namespace: self.namespace.clone(),
            peer: self.peer.clone(),
            error: self.error,
            payload: self.payload.clone(),
        }
    }

    /// Total order used for deduplication
    pub fn compare(&self, other: &AuditRecord) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }

    pub fn is_denial(&self) -> bool {
        self.audit_type.is_denial()
    }

    pub fn to_json(&self) -> MediationResult<String> {
        serde_json::to_string(self)
            .map_err(|e| MediationError::InvalidArgument(format!("audit record json: {}", e)))
    }
}

/// Comparator fields of an [`AuditRecord`] in comparison order.
///
/// Request and denied masks are aggregated by the cache, not compared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuditKey {
    audit_type: AuditType,
    class: MediationClass,
    op: Operation,
    name: Option<String>,
    profile: InlineString,
    namespace: InlineString,
    peer: Option<String>,
    error: i32,
    payload: AuditPayload,
}
