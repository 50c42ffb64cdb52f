/*!
 * Network Names
 * Family and socket type names used in audit output
 */

use crate::core::types::Family;

const FAMILY_NAMES: [&str; 46] = [
    "unspec", "unix", "inet", "ax25", "ipx", "appletalk", "netrom", "bridge", "atmpvc", "x25",
    "inet6", "rose", "decnet", "netbeui", "security", "key", "netlink", "packet", "ash",
    "econet", "atmsvc", "rds", "sna", "irda", "pppox", "wanpipe", "llc", "ib", "mpls", "can",
    "tipc", "bluetooth", "iucv", "rxrpc", "isdn", "phonet", "ieee802154", "caif", "alg", "nfc",
    "vsock", "kcm", "qipcrtr", "smc", "xdp", "mctp",
];

const SOCK_TYPE_NAMES: [&str; 11] = [
    "", "stream", "dgram", "raw", "rdm", "seqpacket", "dccp", "", "", "", "packet",
];

/// Family name, `None` for numbers without one
pub fn family_name(family: Family) -> Option<&'static str> {
    FAMILY_NAMES.get(family as usize).copied()
}

pub fn sock_type_name(sock_type: u16) -> Option<&'static str> {
    SOCK_TYPE_NAMES
        .get(sock_type as usize)
        .copied()
        .filter(|name| !name.is_empty())
}
