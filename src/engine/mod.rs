/*!
 * Decision Engine
 * Permission resolution, verdicts and cross-checking
 */

pub mod decision;
pub mod resolver;
pub mod xcheck;

pub use decision::{verdict_errno, Decision, Verdict};
pub use resolver::{
    apply_modes, check_perms, do_perms, early_match, label_match, match_component, match_label,
    resolve, resolve_perms, resolve_set, Resolution,
};
pub use xcheck::{for_each_confined, for_each_pair, for_each_profile, last_error, xcheck, xcheck_labels};
