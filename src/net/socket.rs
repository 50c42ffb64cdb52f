/*!
 * Socket Model
 * Addresses, socket objects and the consistent snapshots mediation reads
 */

use crate::core::errors::{MediationError, MediationResult};
use crate::core::id::ObjectId;
use crate::core::limits::{PROT_SOCK, UNIX_PATH_MAX};
use crate::core::types::{Family, Uid};
use crate::label::{Cred, Label};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

/// Address families
pub mod family {
    use crate::core::types::Family;

    pub const AF_UNSPEC: Family = 0;
    pub const AF_UNIX: Family = 1;
    pub const AF_INET: Family = 2;
    pub const AF_INET6: Family = 10;
    pub const AF_NETLINK: Family = 16;
    pub const AF_PACKET: Family = 17;
}

/// Socket types
pub mod sock_type {
    pub const SOCK_STREAM: u16 = 1;
    pub const SOCK_DGRAM: u16 = 2;
    pub const SOCK_RAW: u16 = 3;
    pub const SOCK_RDM: u16 = 4;
    pub const SOCK_SEQPACKET: u16 = 5;
    pub const SOCK_DCCP: u16 = 6;
    pub const SOCK_PACKET: u16 = 10;
}

/// Unix socket address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnixAddr {
    /// Abstract namespace name, without the leading nul
    Abstract(Vec<u8>),
    /// Filesystem path
    Path(PathBuf),
}

impl UnixAddr {
    pub fn abstract_name(name: impl Into<Vec<u8>>) -> Self {
        Self::Abstract(name.into())
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Parse raw `sun_path` bytes; an empty buffer is an unnamed socket
    pub fn from_sun_path(raw: &[u8]) -> MediationResult<Option<Self>> {
        if raw.len() > UNIX_PATH_MAX {
            return Err(MediationError::InvalidArgument(format!(
                "sun_path of {} bytes",
                raw.len()
            )));
        }
        match raw.split_first() {
            None => Ok(None),
            Some((0, name)) => Ok(Some(Self::Abstract(name.to_vec()))),
            Some(_) => {
                let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
                let path = String::from_utf8_lossy(&raw[..end]).into_owned();
                Ok(Some(Self::Path(PathBuf::from(path))))
            }
        }
    }

    /// Bound in the filesystem rather than the abstract namespace
    #[inline]
    pub fn is_fs(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    /// Bytes fed to the automaton; abstract names keep their leading nul
    pub fn match_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Abstract(name) => {
                let mut bytes = Vec::with_capacity(name.len() + 1);
                bytes.push(0);
                bytes.extend_from_slice(name);
                Cow::Owned(bytes)
            }
            Self::Path(path) => Cow::Borrowed(path.as_os_str().as_encoded_bytes()),
        }
    }
}

/// Any socket address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SockAddr {
    Unix(UnixAddr),
    Inet(SocketAddr),
}

impl SockAddr {
    pub fn family(&self) -> Family {
        match self {
            Self::Unix(_) => family::AF_UNIX,
            Self::Inet(SocketAddr::V4(_)) => family::AF_INET,
            Self::Inet(SocketAddr::V6(_)) => family::AF_INET6,
        }
    }

    pub fn as_unix(&self) -> Option<&UnixAddr> {
        match self {
            Self::Unix(addr) => Some(addr),
            Self::Inet(_) => None,
        }
    }

    pub fn as_inet(&self) -> Option<SocketAddr> {
        match self {
            Self::Inet(addr) => Some(*addr),
            Self::Unix(_) => None,
        }
    }
}

/// Inode metadata of a filesystem-bound socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsBinding {
    /// Cleared while the socket shuts down
    pub path: Option<PathBuf>,
    pub uid: Uid,
    pub mode: u32,
}

/// Mutable socket state, guarded by the socket's lock
#[derive(Debug, Clone, Default)]
pub struct SocketState {
    pub local: Option<SockAddr>,
    pub remote: Option<SockAddr>,
    pub peer: Weak<Socket>,
    pub fs: Option<FsBinding>,
    /// Path recorded at bind time, kept after the live path is cleared
    pub bound_path: Option<PathBuf>,
}

impl SocketState {
    pub fn peer(&self) -> Option<Arc<Socket>> {
        self.peer.upgrade()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.peer.strong_count() > 0 || self.remote.is_some()
    }
}

/// A socket as seen by mediation
pub struct Socket {
    id: ObjectId,
    family: Family,
    sock_type: u16,
    protocol: u16,
    kernel: bool,
    owner: Cred,
    label: ArcSwap<Label>,
    state: Mutex<SocketState>,
}

impl Socket {
    pub fn new(family: Family, sock_type: u16, protocol: u16, label: Arc<Label>) -> Self {
        Self {
            id: ObjectId::next(),
            family,
            sock_type,
            protocol,
            kernel: false,
            owner: Cred::default(),
            label: ArcSwap::new(label),
            state: Mutex::new(SocketState::default()),
        }
    }

    pub fn unix(sock_type: u16, label: Arc<Label>) -> Self {
        Self::new(family::AF_UNIX, sock_type, 0, label)
    }

    pub fn inet(family: Family, sock_type: u16, protocol: u16, label: Arc<Label>) -> Self {
        Self::new(family, sock_type, protocol, label)
    }

    /// Kernel-internal sockets are never mediated
    pub fn kernel(mut self) -> Self {
        self.kernel = true;
        self
    }

    pub fn with_owner(mut self, owner: Cred) -> Self {
        self.owner = owner;
        self
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn family(&self) -> Family {
        self.family
    }

    #[inline]
    pub fn sock_type(&self) -> u16 {
        self.sock_type
    }

    #[inline]
    pub fn protocol(&self) -> u16 {
        self.protocol
    }

    #[inline]
    pub fn is_kernel(&self) -> bool {
        self.kernel
    }

    #[inline]
    pub fn owner(&self) -> Cred {
        self.owner
    }

    /// Label recorded on the socket when it was created
    pub fn label(&self) -> Arc<Label> {
        self.label.load_full()
    }

    pub fn set_label(&self, label: Arc<Label>) {
        self.label.store(label);
    }

    pub fn lock(&self) -> MutexGuard<'_, SocketState> {
        self.state.lock()
    }

    /// Record a local address. Filesystem binds also record inode metadata.
    pub fn bind(&self, addr: SockAddr, fs_meta: Option<(Uid, u32)>) {
        let mut state = self.state.lock();
        if let SockAddr::Unix(UnixAddr::Path(path)) = &addr {
            let (uid, mode) = fs_meta.unwrap_or((self.owner.fsuid, 0o777));
            state.fs = Some(FsBinding {
                path: Some(path.clone()),
                uid,
                mode,
            });
            state.bound_path = Some(path.clone());
        }
        state.local = Some(addr);
    }

    /// Drop the live filesystem path, as happens during shutdown
    pub fn clear_fs_path(&self) {
        if let Some(fs) = self.state.lock().fs.as_mut() {
            fs.path = None;
        }
    }

    /// Forget the recorded bind path as well; only the address name remains
    pub fn release_bound_path(&self) {
        let mut state = self.state.lock();
        if let Some(fs) = state.fs.as_mut() {
            fs.path = None;
        }
        state.bound_path = None;
    }

    /// Record an inet remote address
    pub fn set_remote(&self, addr: Option<SockAddr>) {
        self.state.lock().remote = addr;
    }

    /// Link two sockets as peers under the ordered double lock
    pub fn connect_pair(a: &Arc<Socket>, b: &Arc<Socket>) {
        let mut guard = super::lock::lock_pair(a, b);
        guard.local_mut().peer = Arc::downgrade(b);
        guard.peer_mut().peer = Arc::downgrade(a);
    }

    pub fn peer(&self) -> Option<Arc<Socket>> {
        self.state.lock().peer()
    }

    /// Consistent view taken under the socket's own lock
    pub fn snapshot(&self) -> SockSnapshot {
        let state = self.state.lock();
        self.snapshot_with(&state)
    }

    /// View built from state the caller already holds locked
    pub fn snapshot_with(&self, state: &SocketState) -> SockSnapshot {
        SockSnapshot {
            id: self.id,
            family: self.family,
            sock_type: self.sock_type,
            protocol: self.protocol,
            kernel: self.kernel,
            owner: self.owner,
            label: self.label(),
            local: state.local.clone(),
            remote: state.remote.clone(),
            fs: state.fs.clone(),
            bound_path: state.bound_path.clone(),
            connected: state.is_connected(),
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("sock_type", &self.sock_type)
            .field("protocol", &self.protocol)
            .field("label", &self.label().name())
            .finish()
    }
}

/// Immutable copy of everything one decision reads from a socket
#[derive(Debug, Clone)]
pub struct SockSnapshot {
    pub id: ObjectId,
    pub family: Family,
    pub sock_type: u16,
    pub protocol: u16,
    pub kernel: bool,
    pub owner: Cred,
    pub label: Arc<Label>,
    pub local: Option<SockAddr>,
    pub remote: Option<SockAddr>,
    pub fs: Option<FsBinding>,
    pub bound_path: Option<PathBuf>,
    pub connected: bool,
}

impl SockSnapshot {
    pub fn unix_addr(&self) -> Option<&UnixAddr> {
        self.local.as_ref().and_then(SockAddr::as_unix)
    }

    /// Bound to a filesystem path
    pub fn is_unix_fs(&self) -> bool {
        self.unix_addr().is_some_and(UnixAddr::is_fs)
    }

    pub fn inet_local(&self) -> Option<SocketAddr> {
        self.local.as_ref().and_then(SockAddr::as_inet)
    }

    pub fn inet_remote(&self) -> Option<SocketAddr> {
        self.remote.as_ref().and_then(SockAddr::as_inet)
    }
}

/// Ports below [`PROT_SOCK`] need the privileged local address type
#[inline]
pub fn is_privileged_port(port: u16) -> bool {
    port != 0 && port < PROT_SOCK
}
