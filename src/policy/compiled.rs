/*!
 * Compiled Policy
 * Automaton, permission table and derived per-class start states
 */

use super::class::MediationClass;
use super::dfa::Dfa;
use super::perms::{mask, PermissionSet, PermissionTable};
use crate::core::errors::{MediationError, MediationResult};
use crate::core::limits::DFA_NOMATCH;
use crate::core::types::{Family, StateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const CLASS_SLOTS: usize = MediationClass::LAST as usize + 1;

/// Legacy per-family socket type table, used by policies without NET rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetCompat {
    allow: BTreeMap<Family, u16>,
    audit: BTreeMap<Family, u16>,
    quiet: BTreeMap<Family, u16>,
}

impl NetCompat {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(table: &mut BTreeMap<Family, u16>, family: Family, sock_type: u16) {
        if sock_type < 16 {
            *table.entry(family).or_insert(0) |= 1 << sock_type;
        }
    }

    pub fn allow(mut self, family: Family, sock_type: u16) -> Self {
        Self::set(&mut self.allow, family, sock_type);
        self
    }

    pub fn audit(mut self, family: Family, sock_type: u16) -> Self {
        Self::set(&mut self.audit, family, sock_type);
        self
    }

    pub fn quiet(mut self, family: Family, sock_type: u16) -> Self {
        Self::set(&mut self.quiet, family, sock_type);
        self
    }

    /// All-or-nothing permissions for a family/type pair
    pub fn perms(&self, family: Family, sock_type: u16) -> PermissionSet {
        let bit = if sock_type < 16 { 1u16 << sock_type } else { 0 };
        let all_if = |table: &BTreeMap<Family, u16>| {
            if table.get(&family).copied().unwrap_or(0) & bit != 0 {
                mask::ALL
            } else {
                0
            }
        };
        PermissionSet {
            allow: all_if(&self.allow),
            audit: all_if(&self.audit),
            quiet: all_if(&self.quiet),
            ..PermissionSet::NONE
        }
    }
}

/// Serializable policy artifact as handed over by a loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyImage {
    pub dfa: Dfa,
    pub perms: PermissionTable,
    /// Families with fine-grained rules under the NET class
    pub fine_grained: Vec<Family>,
    pub net_compat: Option<NetCompat>,
}

/// Published, immutable policy
#[derive(Debug, Clone)]
pub struct Policy {
    dfa: Dfa,
    perms: PermissionTable,
    net_compat: Option<NetCompat>,
    starts: [StateId; CLASS_SLOTS],
    af_starts: Vec<(Family, StateId)>,
}

impl Policy {
    /// Validate an image and derive its start states
    pub fn new(image: PolicyImage) -> MediationResult<Self> {
        let PolicyImage {
            dfa,
            perms,
            mut fine_grained,
            net_compat,
        } = image;

        if perms.len() > dfa.state_count() {
            return Err(MediationError::InvalidPolicy(format!(
                "{} permission entries for {} states",
                perms.len(),
                dfa.state_count()
            )));
        }

        let root = dfa.start();
        let mut starts = [DFA_NOMATCH; CLASS_SLOTS];
        for class in MediationClass::ALL {
            if class != MediationClass::None {
                starts[class.as_u8() as usize] = dfa.next(root, class.as_u8());
            }
        }

        fine_grained.sort_unstable();
        fine_grained.dedup();
        let net = starts[MediationClass::Net.as_u8() as usize];
        let af_starts = fine_grained
            .into_iter()
            .map(|family| (family, dfa.advance_be16(net, family)))
            .filter(|(_, state)| *state != DFA_NOMATCH)
            .collect();

        Ok(Self {
            dfa,
            perms,
            net_compat,
            starts,
            af_starts,
        })
    }

    /// Policy that mediates nothing
    pub fn empty() -> Self {
        Self {
            dfa: Dfa::empty(),
            perms: PermissionTable::default(),
            net_compat: None,
            starts: [DFA_NOMATCH; CLASS_SLOTS],
            af_starts: Vec::new(),
        }
    }

    pub fn image(&self) -> PolicyImage {
        PolicyImage {
            dfa: self.dfa.clone(),
            perms: self.perms.clone(),
            fine_grained: self.af_starts.iter().map(|(family, _)| *family).collect(),
            net_compat: self.net_compat.clone(),
        }
    }

    pub fn to_bytes(&self) -> MediationResult<Vec<u8>> {
        bincode::serialize(&self.image())
            .map_err(|e| MediationError::InvalidPolicy(format!("encode: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> MediationResult<Self> {
        let image: PolicyImage = bincode::deserialize(bytes)
            .map_err(|e| MediationError::InvalidPolicy(format!("decode: {}", e)))?;
        Self::new(image)
    }

    #[inline]
    pub fn dfa(&self) -> &Dfa {
        &self.dfa
    }

    /// Start state for a class; zero when the class is not mediated
    #[inline]
    pub fn class_start(&self, class: MediationClass) -> StateId {
        self.starts[class.as_u8() as usize]
    }

    pub fn mediates(&self, class: MediationClass) -> bool {
        match class {
            MediationClass::Net => {
                self.class_start(class) != DFA_NOMATCH || self.net_compat.is_some()
            }
            _ => self.class_start(class) != DFA_NOMATCH,
        }
    }

    /// Start state for fine-grained rules of one address family
    pub fn af_start(&self, family: Family) -> StateId {
        self.af_starts
            .iter()
            .find(|(f, _)| *f == family)
            .map_or(DFA_NOMATCH, |(_, state)| *state)
    }

    pub fn net_compat(&self) -> Option<&NetCompat> {
        self.net_compat.as_ref()
    }

    /// Raw table lookup, before profile modes are applied
    #[inline]
    pub(crate) fn lookup(&self, state: StateId) -> PermissionSet {
        self.perms.lookup(state)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::empty()
    }
}
