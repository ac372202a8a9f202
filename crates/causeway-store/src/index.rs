//! Indexing rules shared by every store backend.

use causeway_core::{Change, Cid, HlcTimestamp, Iri};

use crate::error::Result;
use crate::traits::InsertResult;

/// What a backend knows about a would-be dependency.
pub(crate) struct DepInfo {
    /// The blob is indexed as a change.
    pub is_change: bool,
    pub resource: Option<Iri>,
    pub ts: HlcTimestamp,
}

/// Check every dependency of `change`, returning the rejection if any.
///
/// Missing dependencies are collected so the caller learns about all of
/// them at once; a structurally invalid one fails fast.
pub(crate) fn check_dependencies<F>(change: &Change, mut lookup: F) -> Result<Option<InsertResult>>
where
    F: FnMut(&Cid) -> Result<Option<DepInfo>>,
{
    let mut missing = Vec::new();
    for dep in &change.deps {
        let Some(info) = lookup(dep)? else {
            missing.push(*dep);
            continue;
        };
        let reason = if !info.is_change {
            Some("dependency is not a change")
        } else if info.resource.as_ref() != Some(&change.resource) {
            Some("dependency belongs to another resource")
        } else if info.ts >= change.hlc {
            Some("timestamp does not follow dependency")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Ok(Some(InsertResult::InvalidDependency {
                dep: *dep,
                reason: reason.to_owned(),
            }));
        }
    }
    if missing.is_empty() {
        Ok(None)
    } else {
        Ok(Some(InsertResult::MissingDependencies(missing)))
    }
}

/// The root change that defines a resource's owner and creation time: the
/// one with the smallest `(ts, CID string)`.
pub(crate) fn earliest_root<T>(roots: Vec<(HlcTimestamp, Cid, T)>) -> Option<(HlcTimestamp, Cid, T)> {
    roots
        .into_iter()
        .map(|(ts, cid, extra)| (ts, cid.to_string(), cid, extra))
        .min_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)))
        .map(|(ts, _, cid, extra)| (ts, cid, extra))
}
