/*!
 * Policy Module
 * Compiled automata, permission tables and mediation classes
 *
 * A policy is published once and then only read. Reloading replaces the
 * whole artifact.
 */

pub mod builder;
pub mod class;
pub mod compiled;
pub mod dfa;
pub mod perms;

pub use builder::PolicyBuilder;
pub use class::MediationClass;
pub use compiled::{NetCompat, Policy, PolicyImage};
pub use dfa::{Dfa, DfaState, Walk};
pub use perms::{mask, net_mask_names, PermissionSet, PermissionTable};
