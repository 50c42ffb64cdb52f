/*!
 * Cross-Check Evaluator
 * Combining verdicts across profiles, labels and the two sides of an
 * interaction
 */

use super::decision::{Decision, Verdict};
use crate::label::{Label, Profile};
use std::sync::Arc;

/// Fold a later verdict into an earlier one.
///
/// A later failure replaces the earlier result; a later success never
/// clears an earlier failure.
pub fn last_error(earlier: Verdict, later: Verdict) -> Verdict {
    match (earlier, later) {
        (_, Err(e)) => Err(e),
        (Err(e), Ok(_)) => Err(e),
        (Ok(a), Ok(b)) => Ok(a.merge(b)),
    }
}

/// Both sides must allow.
///
/// `first` runs first and a failure there is returned without running
/// `second`, so the first side's diagnostic is the one reported.
pub fn xcheck<A, B>(first: A, second: B) -> Verdict
where
    A: FnOnce() -> Verdict,
    B: FnOnce() -> Verdict,
{
    let a = first()?;
    let b = second()?;
    Ok(a.merge(b))
}

/// Run `check` for every confined profile of `label`.
///
/// Every profile is visited so each records its own audit decision;
/// failures combine with [`last_error`]. An unconfined label allows.
pub fn for_each_confined<F>(label: &Label, mut check: F) -> Verdict
where
    F: FnMut(&Arc<Profile>) -> Verdict,
{
    label
        .confined()
        .fold(Ok(Decision::Allow), |acc, profile| last_error(acc, check(profile)))
}

/// Run `check` for every profile of `label`, unconfined ones included
pub fn for_each_profile<F>(label: &Label, mut check: F) -> Verdict
where
    F: FnMut(&Arc<Profile>) -> Verdict,
{
    label
        .profiles()
        .iter()
        .fold(Ok(Decision::Allow), |acc, profile| last_error(acc, check(profile)))
}

/// Nested iteration: every confined profile of `subject` against every
/// profile of `peer`
pub fn for_each_pair<F>(subject: &Label, peer: &Label, mut check: F) -> Verdict
where
    F: FnMut(&Arc<Profile>, &Arc<Profile>) -> Verdict,
{
    for_each_confined(subject, |profile| {
        for_each_profile(peer, |peer_profile| check(profile, peer_profile))
    })
}

/// Cross-check two labels: each confined profile of `a` against `b`,
/// then each confined profile of `b` against `a`
pub fn xcheck_labels<FA, FB>(a: &Label, b: &Label, mut check_a: FA, mut check_b: FB) -> Verdict
where
    FA: FnMut(&Arc<Profile>, &Label) -> Verdict,
    FB: FnMut(&Arc<Profile>, &Label) -> Verdict,
{
    xcheck(
        || for_each_confined(a, |profile| check_a(profile, b)),
        || for_each_confined(b, |profile| check_b(profile, a)),
    )
}
