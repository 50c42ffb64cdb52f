/*!
 * Label Types
 * Labels, credentials and acting subjects
 */

use super::profile::Profile;
use super::traits::LabelResolver;
use crate::core::limits::ROOT_NAMESPACE;
use crate::core::types::{SubjectId, Uid};
use crate::policy::MediationClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Separator between profile names in a compound label
pub const LABEL_SEPARATOR: &str = "//&";

/// Identity of an acting principal: an ordered set of candidate profiles
#[derive(Debug)]
pub struct Label {
    profiles: Vec<Arc<Profile>>,
    name: String,
}

impl Label {
    /// A label with no profiles is the unconfined label
    pub fn new(profiles: Vec<Arc<Profile>>) -> Self {
        if profiles.is_empty() {
            return Self::new(vec![Arc::new(Profile::unconfined())]);
        }
        let name = profiles
            .iter()
            .map(|p| render_profile(p))
            .collect::<Vec<_>>()
            .join(LABEL_SEPARATOR);
        Self { profiles, name }
    }

    pub fn single(profile: Arc<Profile>) -> Self {
        Self::new(vec![profile])
    }

    /// Shared unconfined label
    pub fn unconfined() -> Arc<Label> {
        static UNCONFINED: OnceLock<Arc<Label>> = OnceLock::new();
        Arc::clone(UNCONFINED.get_or_init(|| Arc::new(Label::new(Vec::new()))))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn profiles(&self) -> &[Arc<Profile>] {
        &self.profiles
    }

    /// Profiles that carry policy
    pub fn confined(&self) -> impl Iterator<Item = &Arc<Profile>> {
        self.profiles.iter().filter(|p| !p.is_unconfined())
    }

    pub fn is_unconfined(&self) -> bool {
        self.profiles.iter().all(|p| p.is_unconfined())
    }

    pub fn is_compound(&self) -> bool {
        self.profiles.len() > 1
    }

    /// Whether any confined profile has rules for `class`
    pub fn mediates(&self, class: MediationClass) -> bool {
        self.confined().any(|p| p.mediates(class))
    }

    /// Namespace of the first profile
    pub fn namespace(&self) -> &str {
        self.profiles
            .first()
            .map_or(ROOT_NAMESPACE, |p| p.namespace())
    }
}

fn render_profile(profile: &Profile) -> String {
    if profile.namespace() == ROOT_NAMESPACE {
        profile.name().to_string()
    } else {
        format!(":{}:{}", profile.namespace(), profile.name())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Task credentials consulted by path and queue checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cred {
    pub uid: Uid,
    pub fsuid: Uid,
}

impl Cred {
    pub const fn new(uid: Uid) -> Self {
        Self { uid, fsuid: uid }
    }
}

/// Acting principal: label plus credentials
#[derive(Debug, Clone)]
pub struct Subject {
    pub label: Arc<Label>,
    pub cred: Cred,
}

impl Subject {
    pub fn new(label: Arc<Label>) -> Self {
        Self {
            label,
            cred: Cred::default(),
        }
    }

    pub fn with_cred(mut self, cred: Cred) -> Self {
        self.cred = cred;
        self
    }

    pub fn unconfined() -> Self {
        Self::new(Label::unconfined())
    }

    /// Subject for principal `id`; principals without a label are unconfined
    pub fn resolve(resolver: &dyn LabelResolver, id: SubjectId, cred: Cred) -> Self {
        let label = resolver.resolve(id).unwrap_or_else(Label::unconfined);
        Self { label, cred }
    }

    #[inline]
    pub fn label(&self) -> &Label {
        &self.label
    }
}
