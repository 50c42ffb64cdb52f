/*!
 * Network Objects
 * Socket model, address types and pair locking
 */

pub mod lock;
pub mod names;
pub mod sockaddr;
pub mod socket;

pub use lock::{lock_pair, PairGuard};
pub use names::{family_name, sock_type_name};
pub use sockaddr::RawSockAddr;
pub use socket::{
    family, is_privileged_port, sock_type, FsBinding, SockAddr, SockSnapshot, Socket, SocketState,
    UnixAddr,
};
