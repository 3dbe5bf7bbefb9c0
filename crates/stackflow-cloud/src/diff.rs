//! Diff engine
//!
//! Field-level helpers used by every task's `diff`. A field of the changes
//! record is set only when the desired value is set and the actual value is
//! absent or different.

use crate::task::{Resource, TaskRef};
use std::collections::{BTreeMap, BTreeSet};

/// A desired-state field that can be "unset"
pub trait Field: Clone + PartialEq + Default {
    fn is_unset(&self) -> bool;
}

impl<T: Clone + PartialEq> Field for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl<T: Clone + PartialEq> Field for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl<K: Clone + Ord, V: Clone + PartialEq> Field for BTreeMap<K, V> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Changed value for one field, or the unset value when nothing changes
///
/// `actual` is `None` when the resource does not exist yet.
pub fn diff_field<F: Field>(actual: Option<&F>, desired: &F) -> F {
    if desired.is_unset() {
        return F::default();
    }
    match actual {
        Some(actual) if actual == desired => F::default(),
        _ => desired.clone(),
    }
}

/// Changed map where the desired map is the whole truth
///
/// Unlike [`diff_field`], an empty desired map is a value: it differs from
/// an actual map that still holds entries.
pub fn diff_map<K: Clone + Ord, V: Clone + PartialEq>(
    actual: Option<&BTreeMap<K, V>>,
    desired: &BTreeMap<K, V>,
) -> Option<BTreeMap<K, V>> {
    match actual {
        None if desired.is_empty() => None,
        Some(actual) if actual == desired => None,
        _ => Some(desired.clone()),
    }
}

/// Changed reference list, compared as sets of resolved ids
///
/// A reference whose id is not known yet never matches, so a list holding
/// one is always a change.
pub fn diff_refs<T: Resource>(
    actual: Option<&[TaskRef<T>]>,
    desired: &[TaskRef<T>],
) -> Vec<TaskRef<T>> {
    if desired.is_empty() {
        return Vec::new();
    }
    let Some(actual) = actual else {
        return desired.to_vec();
    };

    match (id_set(actual), id_set(desired)) {
        (Some(a), Some(d)) if a == d => Vec::new(),
        _ => desired.to_vec(),
    }
}

/// Resolved ids, or `None` when any reference is unresolved
fn id_set<T: Resource>(refs: &[TaskRef<T>]) -> Option<BTreeSet<String>> {
    refs.iter().map(TaskRef::id).collect()
}

/// Sorted elements of `left` that are not in `right`
pub fn difference(left: &[String], right: &[String]) -> Vec<String> {
    let right: BTreeSet<&String> = right.iter().collect();
    let out: BTreeSet<&String> = left.iter().filter(|s| !right.contains(s)).collect();
    out.into_iter().cloned().collect()
}
