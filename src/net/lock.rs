/*!
 * Ordered Double Lock
 * Locks a socket and its peer in a global order so two sides checking each
 * other at once cannot deadlock
 */

use super::socket::{Socket, SocketState};
use parking_lot::MutexGuard;

/// Both socket states held at once
///
/// When both sides are the same socket only one lock is taken and
/// [`PairGuard::peer`] aliases the local state.
pub struct PairGuard<'a> {
    local: MutexGuard<'a, SocketState>,
    peer: Option<MutexGuard<'a, SocketState>>,
}

impl<'a> PairGuard<'a> {
    pub fn local(&self) -> &SocketState {
        &self.local
    }

    pub fn peer(&self) -> &SocketState {
        self.peer.as_deref().unwrap_or(&self.local)
    }

    pub fn local_mut(&mut self) -> &mut SocketState {
        &mut self.local
    }

    pub fn peer_mut(&mut self) -> &mut SocketState {
        match self.peer.as_deref_mut() {
            Some(peer) => peer,
            None => &mut self.local,
        }
    }

    pub fn is_self_pair(&self) -> bool {
        self.peer.is_none()
    }
}

/// Lock `local` and `peer`, lower object id first
pub fn lock_pair<'a>(local: &'a Socket, peer: &'a Socket) -> PairGuard<'a> {
    if local.id() == peer.id() {
        return PairGuard {
            local: local.lock(),
            peer: None,
        };
    }

    if local.id() < peer.id() {
        let local_guard = local.lock();
        let peer_guard = peer.lock();
        PairGuard {
            local: local_guard,
            peer: Some(peer_guard),
        }
    } else {
        let peer_guard = peer.lock();
        let local_guard = local.lock();
        PairGuard {
            local: local_guard,
            peer: Some(peer_guard),
        }
    }
}
