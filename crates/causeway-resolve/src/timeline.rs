//! Entity timelines: heads, versions and canonical order of a change set.
//!
//! Resolution is a pure function of the change summaries and their trust
//! flags. Every walk uses an explicit worklist and visited set.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use causeway_core::{ChangeSummary, Cid, HlcTimestamp, Iri, PublicKey, Version};
use causeway_store::Store;
use tracing::debug;

use crate::error::{ResolveError, Result};

/// The resolved view of one entity's change graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub resource: Iri,

    /// Every visible change.
    pub changes: BTreeMap<Cid, ChangeSummary>,

    /// Visible changes ordered by `(hlc, CID string)`.
    pub changes_by_time: Vec<Cid>,

    /// Changes no other visible change depends on.
    pub public_version: Version,

    /// The nearest trusted-authored changes at or behind the public heads.
    pub trusted_version: Version,

    /// Changes without dependencies, in time order.
    pub roots: Vec<Cid>,

    pub owner: Option<PublicKey>,

    /// Per author: the author's changes that no later change by the same
    /// author descends from.
    pub author_versions: BTreeMap<PublicKey, Version>,

    /// Changes excluded by re-verification, plus everything built on them.
    pub quarantined: BTreeSet<Cid>,
}

impl Timeline {
    /// Resolve a timeline from the full change set of `resource`.
    pub fn resolve(resource: Iri, changes: Vec<ChangeSummary>) -> Self {
        Self::resolve_excluding(resource, changes, &BTreeSet::new())
    }

    /// Resolve, treating `excluded` and all their descendants as absent.
    pub fn resolve_excluding(
        resource: Iri,
        changes: Vec<ChangeSummary>,
        excluded: &BTreeSet<Cid>,
    ) -> Self {
        let mut ordered = changes;
        ordered.sort_by_key(|c| (c.create_time, c.id));

        // Deps precede dependents in time order, so one forward pass finds
        // every descendant of an excluded change.
        let mut quarantined = BTreeSet::new();
        let mut visible = Vec::with_capacity(ordered.len());
        for change in ordered {
            if excluded.contains(&change.id) || change.deps.iter().any(|d| quarantined.contains(d)) {
                quarantined.insert(change.id);
            } else {
                visible.push(change);
            }
        }

        let changes_by_time: Vec<Cid> = visible.iter().map(|c| c.id).collect();
        let roots: Vec<Cid> = visible
            .iter()
            .filter(|c| c.deps.is_empty())
            .map(|c| c.id)
            .collect();
        let owner = resource.account_key().or_else(|| {
            roots
                .first()
                .and_then(|root| visible.iter().find(|c| c.id == *root))
                .map(|c| c.author)
        });
        let changes: BTreeMap<Cid, ChangeSummary> =
            visible.into_iter().map(|c| (c.id, c)).collect();

        let public_version = public_heads(&changes);
        let trusted_version = trusted_heads(&changes, &public_version);
        let author_versions = author_heads(&changes);

        debug!(
            resource = %resource,
            changes = changes.len(),
            quarantined = quarantined.len(),
            public = %public_version,
            trusted = %trusted_version,
            "resolved timeline"
        );

        Self {
            resource,
            changes,
            changes_by_time,
            public_version,
            trusted_version,
            roots,
            owner,
            author_versions,
            quarantined,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, cid: &Cid) -> Option<&ChangeSummary> {
        self.changes.get(cid)
    }

    /// Timestamp of the newest visible change.
    pub fn latest_time(&self) -> Option<HlcTimestamp> {
        self.changes_by_time
            .last()
            .and_then(|cid| self.changes.get(cid))
            .map(|c| c.create_time)
    }
}

/// Changes that no change in the set names as a dependency.
pub fn public_heads(changes: &BTreeMap<Cid, ChangeSummary>) -> Version {
    let referenced: HashSet<&Cid> = changes.values().flat_map(|c| c.deps.iter()).collect();
    changes
        .keys()
        .filter(|cid| !referenced.contains(cid))
        .copied()
        .collect()
}

/// Walk back from the public heads until each path reaches a trusted
/// author. Dependencies outside the set are ignored.
pub fn trusted_heads(changes: &BTreeMap<Cid, ChangeSummary>, public: &Version) -> Version {
    let mut queue: VecDeque<Cid> = public.iter().copied().collect();
    let mut visited: HashSet<Cid> = HashSet::new();
    let mut trusted = Vec::new();

    while let Some(cid) = queue.pop_front() {
        if !visited.insert(cid) {
            continue;
        }
        let Some(change) = changes.get(&cid) else {
            continue;
        };
        if change.is_trusted {
            trusted.push(cid);
        } else {
            queue.extend(change.deps.iter().copied());
        }
    }

    Version::new(trusted)
}

/// For each author, the author's changes that are not ancestors of another
/// change by the same author.
pub fn author_heads(changes: &BTreeMap<Cid, ChangeSummary>) -> BTreeMap<PublicKey, Version> {
    let mut by_author: HashMap<PublicKey, Vec<Cid>> = HashMap::new();
    for change in changes.values() {
        by_author.entry(change.author).or_default().push(change.id);
    }

    by_author
        .into_iter()
        .map(|(author, own)| {
            let mut superseded: HashSet<Cid> = HashSet::new();
            let mut queue: VecDeque<Cid> = own
                .iter()
                .filter_map(|cid| changes.get(cid))
                .flat_map(|c| c.deps.iter().copied())
                .collect();
            while let Some(cid) = queue.pop_front() {
                if !superseded.insert(cid) {
                    continue;
                }
                if let Some(change) = changes.get(&cid) {
                    queue.extend(change.deps.iter().copied());
                }
            }
            let heads = own.into_iter().filter(|cid| !superseded.contains(cid));
            (author, Version::new(heads))
        })
        .collect()
}

/// Load and resolve the timeline of `resource` from a store.
pub async fn resolve_timeline<S: Store + ?Sized>(store: &S, resource: &Iri) -> Result<Timeline> {
    resolve_timeline_excluding(store, resource, &BTreeSet::new()).await
}

/// Like [`resolve_timeline`], quarantining `excluded` and its descendants.
pub async fn resolve_timeline_excluding<S: Store + ?Sized>(
    store: &S,
    resource: &Iri,
    excluded: &BTreeSet<Cid>,
) -> Result<Timeline> {
    if store.get_resource(resource).await?.is_none() {
        return Err(ResolveError::NotFound(resource.to_string()));
    }
    let changes = store.changes_for_resource(resource).await?;
    Ok(Timeline::resolve_excluding(
        resource.clone(),
        changes,
        excluded,
    ))
}
