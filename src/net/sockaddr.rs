/*!
 * Raw Socket Addresses
 * Decoding of the sockaddr buffers handed to bind, connect and sendmsg
 */

use super::socket::family;
use crate::core::errors::{MediationError, MediationResult};
use crate::core::types::Family;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Size of `sa_family`
const FAMILY_LEN: usize = 2;
/// `sizeof(struct sockaddr_in)`
pub const SOCKADDR_IN_LEN: usize = 16;
/// `sizeof(struct sockaddr_in6)` without the scope id
pub const SIN6_LEN_RFC2133: usize = 24;
/// `sizeof(struct sockaddr_in6)`
pub const SOCKADDR_IN6_LEN: usize = 28;

/// A sockaddr buffer as passed in by the caller.
///
/// The family sits in native byte order, port and address in network order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawSockAddr {
    bytes: Vec<u8>,
}

impl RawSockAddr {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// AF_UNSPEC with an all-zero `sockaddr_in` body
    pub fn unspec() -> Self {
        let mut bytes = vec![0u8; SOCKADDR_IN_LEN];
        bytes[..FAMILY_LEN].copy_from_slice(&family::AF_UNSPEC.to_ne_bytes());
        Self { bytes }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `sa_family`, if the buffer is long enough to hold it
    pub fn family(&self) -> Option<Family> {
        let raw = self.bytes.get(..FAMILY_LEN)?;
        Some(Family::from_ne_bytes([raw[0], raw[1]]))
    }

    /// Decode an AF_INET or AF_INET6 address
    pub fn to_inet(&self) -> MediationResult<SocketAddr> {
        match self.family() {
            None => Err(short(self.len())),
            Some(family::AF_INET) => self.decode_v4(),
            Some(family::AF_INET6) => self.decode_v6(),
            Some(other) => Err(MediationError::AddressFamilyNotSupported(other)),
        }
    }

    /// Decode a bind address for a socket of `sock_family`.
    ///
    /// AF_UNSPEC binds are only accepted on IPv4 sockets and only for
    /// INADDR_ANY; IPv6 sockets reject them after the length check.
    pub fn to_bind_inet(&self, sock_family: Family) -> MediationResult<SocketAddr> {
        match self.family() {
            None => Err(short(self.len())),
            Some(family::AF_UNSPEC) => {
                if sock_family == family::AF_INET6 {
                    if self.len() < SIN6_LEN_RFC2133 {
                        return Err(short(self.len()));
                    }
                    return Err(MediationError::AddressFamilyNotSupported(family::AF_UNSPEC));
                }
                let v4 = self.decode_v4()?;
                if !v4.ip().is_unspecified() {
                    return Err(MediationError::AddressFamilyNotSupported(family::AF_UNSPEC));
                }
                Ok(v4)
            }
            Some(_) => self.to_inet(),
        }
    }

    fn decode_v4(&self) -> MediationResult<SocketAddr> {
        let b = &self.bytes;
        if b.len() < SOCKADDR_IN_LEN {
            return Err(short(b.len()));
        }
        let port = u16::from_be_bytes([b[2], b[3]]);
        let ip = Ipv4Addr::new(b[4], b[5], b[6], b[7]);
        Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
    }

    fn decode_v6(&self) -> MediationResult<SocketAddr> {
        let b = &self.bytes;
        if b.len() < SIN6_LEN_RFC2133 {
            return Err(short(b.len()));
        }
        let port = u16::from_be_bytes([b[2], b[3]]);
        let flowinfo = u32::from_be_bytes([b[4], b[5], b[6], b[7]]);
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&b[8..24]);
        let scope_id = match b.get(24..SOCKADDR_IN6_LEN) {
            Some(s) => u32::from_ne_bytes([s[0], s[1], s[2], s[3]]),
            None => 0,
        };
        Ok(SocketAddr::V6(SocketAddrV6::new(
            Ipv6Addr::from(octets),
            port,
            flowinfo,
            scope_id,
        )))
    }
}

impl From<SocketAddr> for RawSockAddr {
    fn from(addr: SocketAddr) -> Self {
        let bytes = match addr {
            SocketAddr::V4(v4) => {
                let mut bytes = vec![0u8; SOCKADDR_IN_LEN];
                bytes[..2].copy_from_slice(&family::AF_INET.to_ne_bytes());
                bytes[2..4].copy_from_slice(&v4.port().to_be_bytes());
                bytes[4..8].copy_from_slice(&v4.ip().octets());
                bytes
            }
            SocketAddr::V6(v6) => {
                let mut bytes = vec![0u8; SOCKADDR_IN6_LEN];
                bytes[..2].copy_from_slice(&family::AF_INET6.to_ne_bytes());
                bytes[2..4].copy_from_slice(&v6.port().to_be_bytes());
                bytes[4..8].copy_from_slice(&v6.flowinfo().to_be_bytes());
                bytes[8..24].copy_from_slice(&v6.ip().octets());
                bytes[24..28].copy_from_slice(&v6.scope_id().to_ne_bytes());
                bytes
            }
        };
        Self { bytes }
    }
}

fn short(len: usize) -> MediationError {
    MediationError::InvalidArgument(format!("sockaddr of {} bytes", len))
}
