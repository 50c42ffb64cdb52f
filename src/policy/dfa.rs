/*!
 * Automaton
 * Immutable compiled state machine walked one input byte at a time
 */

use crate::core::errors::{MediationError, MediationResult};
use crate::core::limits::{DFA_NOMATCH, DFA_START, NULL_TRANSITION};
use crate::core::types::{be16, StateId};
use serde::{Deserialize, Serialize};

/// One automaton state: sorted explicit edges plus a default edge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfaState {
    edges: Vec<(u8, StateId)>,
    default: StateId,
}

impl DfaState {
    /// Build a state; edges are sorted and deduplicated (last write wins)
    pub fn new(mut edges: Vec<(u8, StateId)>, default: StateId) -> Self {
        edges.reverse();
        edges.sort_by_key(|(byte, _)| *byte);
        edges.dedup_by_key(|(byte, _)| *byte);
        Self { edges, default }
    }

    #[inline]
    fn next(&self, byte: u8) -> StateId {
        match self.edges.binary_search_by_key(&byte, |(b, _)| *b) {
            Ok(idx) => self.edges[idx].1,
            Err(_) => self.default,
        }
    }

    fn targets(&self) -> impl Iterator<Item = StateId> + '_ {
        self.edges
            .iter()
            .map(|(_, to)| *to)
            .chain(std::iter::once(self.default))
    }
}

/// Compiled automaton
///
/// State 0 is the dead state and state 1 the root. A walk that reaches the
/// dead state never leaves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dfa {
    states: Vec<DfaState>,
}

impl Dfa {
    /// Validate and wrap a state list
    pub fn new(states: Vec<DfaState>) -> MediationResult<Self> {
        let dead = states.first().ok_or_else(|| {
            MediationError::InvalidPolicy("automaton has no dead state".into())
        })?;
        if dead.targets().any(|to| to != DFA_NOMATCH) {
            return Err(MediationError::InvalidPolicy(
                "dead state has outgoing transitions".into(),
            ));
        }

        let count = states.len();
        for (idx, state) in states.iter().enumerate() {
            if let Some(bad) = state.targets().find(|to| *to as usize >= count) {
                return Err(MediationError::InvalidPolicy(format!(
                    "state {} targets missing state {}",
                    idx, bad
                )));
            }
        }

        Ok(Self { states })
    }

    /// Automaton that matches nothing
    pub fn empty() -> Self {
        Self {
            states: vec![DfaState::default(), DfaState::default()],
        }
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Root state, or the dead state for an automaton without one
    #[inline]
    pub fn start(&self) -> StateId {
        if self.states.len() > DFA_START as usize {
            DFA_START
        } else {
            DFA_NOMATCH
        }
    }

    /// Single transition
    #[inline]
    pub fn next(&self, state: StateId, byte: u8) -> StateId {
        if state == DFA_NOMATCH {
            return DFA_NOMATCH;
        }
        self.states
            .get(state as usize)
            .map_or(DFA_NOMATCH, |s| s.next(byte))
    }

    /// Consume `input` left to right from `state`
    #[inline]
    pub fn advance(&self, mut state: StateId, input: &[u8]) -> StateId {
        for &byte in input {
            if state == DFA_NOMATCH {
                break;
            }
            state = self.next(state, byte);
        }
        state
    }

    #[inline]
    pub fn advance_str(&self, state: StateId, input: &str) -> StateId {
        self.advance(state, input.as_bytes())
    }

    #[inline]
    pub fn advance_be16(&self, state: StateId, value: u16) -> StateId {
        self.advance(state, &be16(value))
    }

    /// Field separator transition
    #[inline]
    pub fn null_transition(&self, state: StateId) -> StateId {
        self.next(state, NULL_TRANSITION)
    }
}

/// Field-by-field walk that remembers which field failed first
#[derive(Debug, Clone, Copy)]
pub struct Walk<'a> {
    dfa: &'a Dfa,
    state: StateId,
    info: Option<&'static str>,
}

impl<'a> Walk<'a> {
    pub fn new(dfa: &'a Dfa, state: StateId) -> Self {
        Self {
            dfa,
            state,
            info: None,
        }
    }

    fn step(mut self, to: impl FnOnce(&Dfa, StateId) -> StateId, on_fail: &'static str) -> Self {
        if self.state != DFA_NOMATCH {
            self.state = to(self.dfa, self.state);
            if self.state == DFA_NOMATCH {
                self.info = Some(on_fail);
            }
        }
        self
    }

    pub fn bytes(self, input: &[u8], on_fail: &'static str) -> Self {
        self.step(|dfa, s| dfa.advance(s, input), on_fail)
    }

    pub fn byte(self, input: u8, on_fail: &'static str) -> Self {
        self.step(|dfa, s| dfa.next(s, input), on_fail)
    }

    pub fn be16(self, value: u16, on_fail: &'static str) -> Self {
        self.step(|dfa, s| dfa.advance_be16(s, value), on_fail)
    }

    pub fn str(self, input: &str, on_fail: &'static str) -> Self {
        self.step(|dfa, s| dfa.advance_str(s, input), on_fail)
    }

    pub fn null(self, on_fail: &'static str) -> Self {
        self.step(|dfa, s| dfa.null_transition(s), on_fail)
    }

    #[inline]
    pub fn state(&self) -> StateId {
        self.state
    }

    #[inline]
    pub fn info(&self) -> Option<&'static str> {
        self.info
    }

    #[inline]
    pub fn matched(&self) -> bool {
        self.state != DFA_NOMATCH
    }
}
