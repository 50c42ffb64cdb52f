/*!
 * Audit Formatting
 * Common message prefix followed by a per-class field callback
 */

use super::record::{AuditAddr, AuditPayload, AuditRecord, MqueueAudit, NetAudit, SignalAudit};
use crate::core::limits::{MAXMAPPED_SIGNAME, ROOT_NAMESPACE, SIGRT_BASE, SIGUNKNOWN};
use crate::core::types::PermMask;
use crate::net::{family, family_name, sock_type_name, UnixAddr};
use crate::policy::{mask, net_mask_names, MediationClass};
use std::fmt::Write;

/// Signal names indexed by mapped signal number
pub const SIG_NAMES: [&str; MAXMAPPED_SIGNAME as usize] = [
    "unknown", "hup", "int", "quit", "ill", "trap", "abrt", "bus", "fpe", "kill", "usr1", "segv",
    "usr2", "pipe", "alrm", "term", "stkflt", "chld", "cont", "stop", "stp", "ttin", "ttou",
    "urg", "xcpu", "xfsz", "vtalrm", "prof", "winch", "io", "pwr", "sys", "emt", "lost",
    "unused", "exists",
];

const MQUEUE_MASK_NAMES: [(PermMask, &str); 7] = [
    (mask::WRITE, "write"),
    (mask::READ, "read"),
    (mask::CREATE, "create"),
    (mask::DELETE, "delete"),
    (mask::OPEN, "open"),
    (mask::SETATTR, "setattr"),
    (mask::GETATTR, "getattr"),
];

const FILE_MASK_CHARS: [(PermMask, char); 12] = [
    (mask::EXEC, 'x'),
    (mask::WRITE, 'w'),
    (mask::READ, 'r'),
    (mask::APPEND, 'a'),
    (mask::CREATE, 'c'),
    (mask::DELETE, 'd'),
    (mask::OPEN, 'o'),
    (mask::RENAME, 'n'),
    (mask::SETATTR, 'S'),
    (mask::GETATTR, 'G'),
    (mask::LOCK, 'k'),
    (mask::MMAP, 'm'),
];

/// Render a record as one audit line
pub fn format_record(record: &AuditRecord, header: bool) -> String {
    let mut out = String::with_capacity(192);
    audit_prefix(&mut out, record, header);
    match &record.payload {
        AuditPayload::None => {}
        AuditPayload::Net(net) => net_fields(&mut out, record, net),
        AuditPayload::Signal(sig) => signal_fields(&mut out, record, sig),
        AuditPayload::Mqueue(mq) => mqueue_fields(&mut out, record, mq),
        AuditPayload::File(file) => {
            mask_pair(&mut out, record, "requested_mask", "denied_mask", file_mask_chars);
            let _ = write!(out, " fsuid={} ouid={}", file.fsuid, file.ouid);
        }
    }
    out
}

fn audit_prefix(out: &mut String, record: &AuditRecord, header: bool) {
    if header {
        let _ = write!(out, "apparmor=\"{}\"", record.audit_type.name());
    }
    let _ = write!(out, " operation=\"{}\"", record.op.as_str());
    if record.class != MediationClass::None {
        let _ = write!(out, " class=\"{}\"", record.class.name());
    }
    if let Some(info) = &record.info {
        let _ = write!(out, " info=\"{}\"", info);
        if record.error != 0 {
            let _ = write!(out, " error={}", record.error);
        }
    }
    if record.namespace.as_str() != ROOT_NAMESPACE {
        out.push_str(" namespace=");
        push_untrusted(out, record.namespace.as_bytes());
    }
    out.push_str(" profile=");
    push_untrusted(out, record.profile.as_bytes());
    if let Some(name) = &record.name {
        out.push_str(" name=");
        push_untrusted(out, name.as_bytes());
    }
}

fn net_fields(out: &mut String, record: &AuditRecord, net: &NetAudit) {
    match family_name(net.family) {
        Some(name) => {
            let _ = write!(out, " family=\"{}\"", name);
        }
        None => {
            let _ = write!(out, " family=\"unknown({})\"", net.family);
        }
    }
    match sock_type_name(net.sock_type) {
        Some(name) => {
            let _ = write!(out, " sock_type=\"{}\"", name);
        }
        None => {
            let _ = write!(out, " sock_type=\"unknown({})\"", net.sock_type);
        }
    }
    let _ = write!(out, " protocol={}", net.protocol);

    mask_pair(out, record, "requested", "denied", net_mask_names);

    match net.family {
        family::AF_UNIX => {
            unix_addr_field(out, "addr", net.addr.as_ref());
            if record.request & mask::NET_PEER_MASK != 0 {
                unix_addr_field(out, "peer_addr", net.peer_addr.as_ref());
            }
        }
        family::AF_INET | family::AF_INET6 => {
            if let Some(AuditAddr::Inet(local)) = &net.addr {
                let _ = write!(out, " laddr={} lport={}", local.ip(), local.port());
            }
            if let Some(AuditAddr::Inet(remote)) = &net.peer_addr {
                let _ = write!(out, " faddr={} fport={}", remote.ip(), remote.port());
            }
        }
        _ => {}
    }
    peer_field(out, record);
}

fn unix_addr_field(out: &mut String, key: &str, addr: Option<&AuditAddr>) {
    match addr {
        Some(AuditAddr::Unix(UnixAddr::Path(path))) => {
            let _ = write!(out, " {}=", key);
            push_untrusted(out, path.as_os_str().as_encoded_bytes());
        }
        Some(AuditAddr::Unix(UnixAddr::Abstract(name))) if !name.is_empty() => {
            let _ = write!(out, " {}=\"@", key);
            if contains_control(name) {
                push_hex(out, name);
            } else {
                out.push_str(&String::from_utf8_lossy(name));
            }
            out.push('"');
        }
        _ => {
            let _ = write!(out, " {}=none", key);
        }
    }
}

fn signal_fields(out: &mut String, record: &AuditRecord, sig: &SignalAudit) {
    if record.request & (mask::READ | mask::WRITE) != 0 {
        let _ = write!(out, " requested_mask=\"{}\"", signal_mask(record.request));
        if record.denied & (mask::READ | mask::WRITE) != 0 {
            let _ = write!(out, " denied_mask=\"{}\"", signal_mask(record.denied));
        }
    }
    if sig.signal == SIGUNKNOWN {
        let _ = write!(out, " signal=unknown({})", sig.unmapped);
    } else if sig.signal < MAXMAPPED_SIGNAME {
        let _ = write!(out, " signal={}", SIG_NAMES[sig.signal as usize]);
    } else {
        let _ = write!(out, " signal=rtmin+{}", sig.signal - SIGRT_BASE);
    }
    peer_field(out, record);
}

fn signal_mask(perms: PermMask) -> &'static str {
    if perms & mask::READ != 0 {
        "receive"
    } else if perms & mask::WRITE != 0 {
        "send"
    } else {
        ""
    }
}

fn mqueue_fields(out: &mut String, record: &AuditRecord, mq: &MqueueAudit) {
    mask_pair(out, record, "requested", "denied", mqueue_mask_names);
    let _ = write!(out, " fsuid={} ouid={}", mq.fsuid, mq.ouid);
    if let Some(peer) = &record.peer {
        out.push_str(" olabel=");
        push_untrusted(out, peer.as_bytes());
    }
}

fn mask_pair(
    out: &mut String,
    record: &AuditRecord,
    requested_key: &str,
    denied_key: &str,
    render: fn(PermMask) -> String,
) {
    let requested = render(record.request);
    if requested.is_empty() {
        return;
    }
    let _ = write!(out, " {}=\"{}\"", requested_key, requested);
    let denied = render(record.denied);
    if !denied.is_empty() {
        let _ = write!(out, " {}=\"{}\"", denied_key, denied);
    }
}

fn peer_field(out: &mut String, record: &AuditRecord) {
    if let Some(peer) = &record.peer {
        out.push_str(" peer=");
        push_untrusted(out, peer.as_bytes());
    }
}

/// Mqueue permission names, space separated
pub fn mqueue_mask_names(perms: PermMask) -> String {
    MQUEUE_MASK_NAMES
        .iter()
        .filter(|(bit, _)| perms & bit != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(" ")
}

fn file_mask_chars(perms: PermMask) -> String {
    FILE_MASK_CHARS
        .iter()
        .filter(|(bit, _)| perms & bit != 0)
        .map(|(_, c)| *c)
        .collect()
}

fn contains_control(bytes: &[u8]) -> bool {
    bytes.iter().any(|b| *b == b'"' || *b < 0x21 || *b > 0x7e)
}

/// Quoted when printable, upper-case hex otherwise
fn push_untrusted(out: &mut String, bytes: &[u8]) {
    if contains_control(bytes) {
        push_hex(out, bytes);
    } else {
        out.push('"');
        out.push_str(&String::from_utf8_lossy(bytes));
        out.push('"');
    }
}

fn push_hex(out: &mut String, bytes: &[u8]) {
    for b in bytes {
        let _ = write!(out, "{:02X}", b);
    }
}
