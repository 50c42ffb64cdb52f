/*!
 * Inet Mediation Tests
 */

use super::common::{mediator, profile, subject_of};
use labelgate::audit::Operation;
use labelgate::core::errors::errno;
use labelgate::core::limits::CMD_ADDR;
use labelgate::core::types::StateId;
use labelgate::mediation::inet::addr_type;
use labelgate::net::{family, sock_type};
use labelgate::policy::mask;
use labelgate::{PermissionSet, PolicyBuilder, RawSockAddr, SockAddr, Socket};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

const UDP: u16 = 17;

fn cont() -> PermissionSet {
    PermissionSet::allowing(mask::CONT_MATCH)
}

fn udp(b: &mut PolicyBuilder, fam: u16) -> StateId {
    let af = b.family(fam);
    let t = b.be16(af, sock_type::SOCK_DGRAM);
    b.grant(t, cont());
    let p = b.be16(t, UDP);
    b.grant(p, cont());
    p
}

fn encoded(b: &mut PolicyBuilder, from: StateId, ty: u8, port: u16, ip: IpAddr) -> StateId {
    let s = b.step(from, ty);
    let s = b.be16(s, port);
    let s = match ip {
        IpAddr::V4(v4) => {
            let s = b.step(s, 1);
            b.literal(s, &v4.octets())
        }
        IpAddr::V6(v6) => {
            let s = b.step(s, 2);
            b.literal(s, &v6.octets())
        }
    };
    let s = b.null(s);
    b.grant(s, cont());
    let s = b.null(s);
    b.grant(s, cont());
    s
}

fn raw(addr: &str) -> RawSockAddr {
    RawSockAddr::from(addr.parse::<SocketAddr>().unwrap())
}

#[test]
fn test_ipv6_sendmsg_explicit_destination() {
    let (_, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    let p = udp(&mut b, family::AF_INET6);
    let remote = encoded(&mut b, p, addr_type::REMOTE, 53, "2001:db8::53".parse().unwrap());
    let cmd = b.step(remote, CMD_ADDR);
    b.grant(cmd, cont());
    let local = encoded(&mut b, cmd, addr_type::LOCAL, 0, "::".parse().unwrap());
    b.grant(local, PermissionSet::allowing(mask::SEND));
    let subject = subject_of(&profile("resolver", b.build().unwrap()));
    let sock = Socket::inet(family::AF_INET6, sock_type::SOCK_DGRAM, UDP, subject.label.clone());

    let dns = raw("[2001:db8::53]:53");
    assert!(mediator
        .inet_msg(&subject, Operation::Sendmsg, mask::SEND, &sock, Some(&dns))
        .is_ok());

    let elsewhere = raw("[2001:db8::54]:53");
    let err = mediator
        .inet_msg(&subject, Operation::Sendmsg, mask::SEND, &sock, Some(&elsewhere))
        .unwrap_err();
    assert_eq!(err.info(), Some("failed remote addr match"));
}

#[test]
fn test_msg_without_address_uses_connected_remote() {
    let (_, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    let p = udp(&mut b, family::AF_INET);
    let remote = encoded(&mut b, p, addr_type::REMOTE, 514, "10.0.0.9".parse().unwrap());
    let cmd = b.step(remote, CMD_ADDR);
    b.grant(cmd, cont());
    let local = encoded(&mut b, cmd, addr_type::LOCAL, 0, "0.0.0.0".parse().unwrap());
    b.grant(local, PermissionSet::allowing(mask::SEND));
    let subject = subject_of(&profile("syslog", b.build().unwrap()));
    let sock = Socket::inet(family::AF_INET, sock_type::SOCK_DGRAM, UDP, subject.label.clone());

    assert!(mediator
        .inet_msg(&subject, Operation::Sendmsg, mask::SEND, &sock, None)
        .is_err());
    sock.set_remote(Some(SockAddr::Inet("10.0.0.9:514".parse().unwrap())));
    assert!(mediator
        .inet_msg(&subject, Operation::Sendmsg, mask::SEND, &sock, None)
        .is_ok());
}

#[test]
fn test_kernel_sockets_skipped() {
    let (sink, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    udp(&mut b, family::AF_INET);
    let subject = subject_of(&profile("p", b.build().unwrap()));
    let sock = Socket::inet(family::AF_INET, sock_type::SOCK_DGRAM, UDP, subject.label.clone()).kernel();

    assert!(mediator.inet_bind(&subject, &sock, &raw("0.0.0.0:99")).is_ok());
    assert!(mediator.inet_accept(&subject, &sock).is_ok());
    assert!(sink.is_empty());
}

#[test]
fn test_unspec_bind_needs_any_address() {
    let (_, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    udp(&mut b, family::AF_INET);
    let subject = subject_of(&profile("p", b.build().unwrap()));
    let sock = Socket::inet(family::AF_INET, sock_type::SOCK_DGRAM, UDP, subject.label.clone());

    let mut bytes = RawSockAddr::unspec().as_bytes().to_vec();
    bytes[4..8].copy_from_slice(&[127, 0, 0, 1]);
    let err = mediator
        .inet_bind(&subject, &sock, &RawSockAddr::new(bytes))
        .unwrap_err();
    assert_eq!(err.errno(), -errno::EAFNOSUPPORT);
}

#[test]
fn test_socket_create_and_file_perm_dispatch() {
    let (_, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    let af = b.family(family::AF_INET);
    let t = b.be16(af, sock_type::SOCK_DGRAM);
    b.grant(t, PermissionSet::allowing(mask::CREATE | mask::GETATTR));
    let subject = subject_of(&profile("p", b.build().unwrap()));

    assert!(mediator
        .socket_create(&subject, family::AF_INET, sock_type::SOCK_DGRAM, UDP, false)
        .is_ok());
    assert!(mediator
        .socket_create(&subject, family::AF_INET, sock_type::SOCK_STREAM, 6, false)
        .is_err());

    let sock = Arc::new(Socket::inet(family::AF_INET, sock_type::SOCK_DGRAM, UDP, subject.label.clone()));
    assert!(mediator
        .sock_file_perm(&subject, Operation::FilePerm, mask::GETATTR, &sock)
        .is_ok());
}

#[test]
fn test_denial_audit_carries_addresses() {
    let (sink, mediator) = mediator();
    let mut b = PolicyBuilder::new();
    udp(&mut b, family::AF_INET);
    let subject = subject_of(&profile("p", b.build().unwrap()));
    let sock = Socket::inet(family::AF_INET, sock_type::SOCK_DGRAM, UDP, subject.label.clone());
    sock.bind(SockAddr::Inet("192.168.1.2:5000".parse().unwrap()), None);

    assert!(mediator
        .inet_connect(&subject, &sock, &raw("192.168.1.1:53"))
        .is_err());
    let message = &sink.recent(1)[0].message;
    assert!(message.contains("laddr=192.168.1.2 lport=5000"));
    assert!(message.contains("faddr=192.168.1.1 fport=53"));
}
