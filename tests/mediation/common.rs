/*!
 * Shared helpers for mediation tests
 */

#![allow(dead_code)]

use labelgate::core::limits::ANONYMOUS_ADDR_TOKEN;
use labelgate::core::types::StateId;
use labelgate::net::family;
use labelgate::{Label, MediationConfig, Mediator, MemorySink, Policy, PolicyBuilder, Profile, ProfileMode, Subject};
use std::sync::Arc;

pub const ANONYMOUS: &[u8] = &[ANONYMOUS_ADDR_TOKEN];

pub fn mediator() -> (Arc<MemorySink>, Mediator) {
    let sink = Arc::new(MemorySink::new());
    let mediator = Mediator::with_sink(sink.clone(), MediationConfig::default());
    (sink, mediator)
}

pub fn profile(name: &str, policy: Policy) -> Arc<Profile> {
    Arc::new(Profile::new(name, policy))
}

pub fn profile_in_mode(name: &str, policy: Policy, mode: ProfileMode) -> Arc<Profile> {
    Arc::new(Profile::new(name, policy).with_mode(mode))
}

pub fn label_of(profile: &Arc<Profile>) -> Arc<Label> {
    Arc::new(Label::single(Arc::clone(profile)))
}

pub fn subject_of(profile: &Arc<Profile>) -> Subject {
    Subject::new(label_of(profile))
}

/// State after the local descriptor of a unix socket of type `ty` bound to
/// `addr` (match bytes)
pub fn unix_local(b: &mut PolicyBuilder, ty: u16, addr: &[u8]) -> StateId {
    let af = b.family(family::AF_UNIX);
    let t = b.be16(af, ty);
    let p = b.be16(t, 0);
    let a = b.literal(p, addr);
    let n = b.null(a);
    b.null(n)
}

/// State after `local`, the address selector and the peer address, ready
/// for the peer label
pub fn unix_peer(b: &mut PolicyBuilder, ty: u16, local: &[u8], peer: &[u8]) -> StateId {
    let s = unix_local(b, ty, local);
    let cmd = b.step(s, labelgate::core::limits::CMD_ADDR);
    let a = b.literal(cmd, peer);
    b.null(a)
}
