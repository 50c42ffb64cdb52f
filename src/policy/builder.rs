/*!
 * Policy Builder
 * Assembles small automata in code for embedders, tests and benches
 */

use super::class::MediationClass;
use super::compiled::{NetCompat, Policy, PolicyImage};
use super::dfa::{Dfa, DfaState};
use super::perms::{PermissionSet, PermissionTable};
use crate::core::errors::MediationResult;
use crate::core::limits::{DFA_NOMATCH, DFA_START, NULL_TRANSITION};
use crate::core::types::{be16, Family, StateId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct PendingState {
    edges: BTreeMap<u8, StateId>,
    default: StateId,
    perms: PermissionSet,
}

/// Incremental automaton construction
///
/// Literal paths share prefixes: stepping over a byte that already has an
/// explicit edge follows it instead of creating a new state.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    states: Vec<PendingState>,
    fine_grained: Vec<Family>,
    net_compat: Option<NetCompat>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self {
            states: vec![PendingState::default(), PendingState::default()],
            fine_grained: Vec::new(),
            net_compat: None,
        }
    }

    #[inline]
    pub fn root(&self) -> StateId {
        DFA_START
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.push(PendingState::default());
        (self.states.len() - 1) as StateId
    }

    /// Explicit edge; edges out of the dead state are ignored
    pub fn edge(&mut self, from: StateId, byte: u8, to: StateId) -> &mut Self {
        if from != DFA_NOMATCH {
            if let Some(state) = self.states.get_mut(from as usize) {
                state.edges.insert(byte, to);
            }
        }
        self
    }

    pub fn default_edge(&mut self, from: StateId, to: StateId) -> &mut Self {
        if from != DFA_NOMATCH {
            if let Some(state) = self.states.get_mut(from as usize) {
                state.default = to;
            }
        }
        self
    }

    /// Follow or create the explicit edge for `byte`
    pub fn step(&mut self, from: StateId, byte: u8) -> StateId {
        if let Some(to) = self
            .states
            .get(from as usize)
            .and_then(|s| s.edges.get(&byte).copied())
        {
            return to;
        }
        let to = self.add_state();
        self.edge(from, byte, to);
        to
    }

    pub fn literal(&mut self, from: StateId, bytes: &[u8]) -> StateId {
        bytes.iter().fold(from, |state, byte| self.step(state, *byte))
    }

    pub fn be16(&mut self, from: StateId, value: u16) -> StateId {
        self.literal(from, &be16(value))
    }

    pub fn null(&mut self, from: StateId) -> StateId {
        self.step(from, NULL_TRANSITION)
    }

    /// Loop state reached by any non-empty run of non-nul bytes that have
    /// no explicit edge out of `from`
    pub fn any_string(&mut self, from: StateId) -> StateId {
        let looping = self.add_state();
        self.default_edge(from, looping);
        self.default_edge(looping, looping);
        self.edge(looping, NULL_TRANSITION, DFA_NOMATCH);
        looping
    }

    pub fn class(&mut self, class: MediationClass) -> StateId {
        let root = self.root();
        self.step(root, class.as_u8())
    }

    /// NET class start followed by the family; declares the family fine grained
    pub fn family(&mut self, family: Family) -> StateId {
        if !self.fine_grained.contains(&family) {
            self.fine_grained.push(family);
        }
        let net = self.class(MediationClass::Net);
        self.be16(net, family)
    }

    /// Attach permissions to a state; grants widen what is already there
    pub fn grant(&mut self, state: StateId, perms: PermissionSet) -> &mut Self {
        if state != DFA_NOMATCH {
            if let Some(pending) = self.states.get_mut(state as usize) {
                pending.perms = pending.perms.union(&perms);
            }
        }
        self
    }

    pub fn net_compat(&mut self, compat: NetCompat) -> &mut Self {
        self.net_compat = Some(compat);
        self
    }

    pub fn build(self) -> MediationResult<Policy> {
        let mut states = Vec::with_capacity(self.states.len());
        let mut perms = Vec::with_capacity(self.states.len());
        for pending in self.states {
            states.push(DfaState::new(
                pending.edges.into_iter().collect(),
                pending.default,
            ));
            perms.push(pending.perms);
        }

        Policy::new(PolicyImage {
            dfa: Dfa::new(states)?,
            perms: PermissionTable::new(perms),
            fine_grained: self.fine_grained,
            net_compat: self.net_compat,
        })
    }
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
