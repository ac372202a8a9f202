//! Deterministic replay of a change closure into entity state.
//!
//! The projector never interprets payloads. A caller-supplied [`Applier`]
//! folds them, one implementation per entity type.

use std::collections::{HashMap, HashSet, VecDeque};
use std::marker::PhantomData;

use bytes::Bytes;
use causeway_core::{Change, Cid, Digest, HlcTimestamp, Iri, PublicKey, Version};
use causeway_store::{Store, StoreExt};
use tracing::debug;

use crate::error::{BoxError, ResolveError, Result};

const REPLAY_DIGEST_DOMAIN: &[u8] = b"causeway:replay:v1\0";

/// One change as seen by an [`Applier`].
#[derive(Debug, Clone, Copy)]
pub struct ReplayEvent<'a> {
    pub cid: &'a Cid,
    pub author: &'a PublicKey,
    pub time: HlcTimestamp,
    pub payload: &'a Bytes,
    pub hint: Option<&'a str>,
}

/// Folds change payloads into state.
pub trait Applier {
    type State: Default + Send;

    fn apply(
        &self,
        state: Self::State,
        event: &ReplayEvent<'_>,
    ) -> std::result::Result<Self::State, BoxError>;
}

/// An [`Applier`] backed by a closure.
pub struct FoldFn<S, F> {
    fold: F,
    _state: PhantomData<fn() -> S>,
}

impl<S, F> FoldFn<S, F>
where
    S: Default + Send,
    F: Fn(S, &ReplayEvent<'_>) -> std::result::Result<S, BoxError>,
{
    pub fn new(fold: F) -> Self {
        Self {
            fold,
            _state: PhantomData,
        }
    }
}

impl<S, F> Applier for FoldFn<S, F>
where
    S: Default + Send,
    F: Fn(S, &ReplayEvent<'_>) -> std::result::Result<S, BoxError>,
{
    type State = S;

    fn apply(&self, state: S, event: &ReplayEvent<'_>) -> std::result::Result<S, BoxError> {
        (self.fold)(state, event)
    }
}

/// Materialized state plus what was replayed to get it.
#[derive(Debug, Clone)]
pub struct Projection<T> {
    pub state: T,
    pub version: Version,
    /// Replayed changes, in replay order.
    pub applied: Vec<Cid>,
    /// Blake3 over the applied CIDs. Equal digests mean equal replays.
    pub digest: Digest,
}

/// The dependency closure of `heads`, in canonical replay order.
///
/// Unknown heads are `NotFound`; a dependency missing from `changes` is a
/// `ReferentialGap`.
pub fn replay_order(heads: &Version, changes: &HashMap<Cid, Change>) -> Result<Vec<Cid>> {
    for head in heads.iter() {
        if !changes.contains_key(head) {
            return Err(ResolveError::NotFound(head.to_string()));
        }
    }

    let mut queue: VecDeque<Cid> = heads.iter().copied().collect();
    let mut visited: HashSet<Cid> = HashSet::new();
    while let Some(cid) = queue.pop_front() {
        if !visited.insert(cid) {
            continue;
        }
        let change = changes
            .get(&cid)
            .ok_or_else(|| ResolveError::NotFound(cid.to_string()))?;
        for dep in &change.deps {
            if !changes.contains_key(dep) {
                return Err(ResolveError::ReferentialGap {
                    change: cid,
                    missing: *dep,
                });
            }
            queue.push_back(*dep);
        }
    }

    let mut order: Vec<(HlcTimestamp, Cid)> = visited
        .into_iter()
        .filter_map(|cid| changes.get(&cid).map(|c| (c.hlc, cid)))
        .collect();
    order.sort();
    Ok(order.into_iter().map(|(_, cid)| cid).collect())
}

/// Replay the closure of `version` through `applier`.
pub fn project<A: Applier>(
    applier: &A,
    version: &Version,
    changes: &HashMap<Cid, Change>,
) -> Result<Projection<A::State>> {
    let order = replay_order(version, changes)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(REPLAY_DIGEST_DOMAIN);

    let mut state = A::State::default();
    for cid in &order {
        let Some(change) = changes.get(cid) else {
            continue;
        };
        let event = ReplayEvent {
            cid,
            author: &change.author,
            time: change.hlc,
            payload: &change.payload,
            hint: change.hint.as_deref(),
        };
        state = applier
            .apply(state, &event)
            .map_err(|source| ResolveError::Apply { cid: *cid, source })?;
        hasher.update(&cid.to_bytes());
    }

    Ok(Projection {
        state,
        version: version.clone(),
        applied: order,
        digest: Digest(*hasher.finalize().as_bytes()),
    })
}

/// Load the dependency closure of `heads` from a store.
///
/// Heads must be changes of `resource`.
pub async fn load_closure<S: Store + ?Sized>(
    store: &S,
    resource: &Iri,
    heads: &Version,
) -> Result<HashMap<Cid, Change>> {
    let mut closure: HashMap<Cid, Change> = HashMap::new();
    let mut queue: VecDeque<(Cid, Option<Cid>)> = heads.iter().map(|h| (*h, None)).collect();

    while let Some((cid, dependent)) = queue.pop_front() {
        if closure.contains_key(&cid) {
            continue;
        }
        let change = match (store.load_change(&cid).await?, dependent) {
            (Some(change), _) => change,
            (None, None) => return Err(ResolveError::NotFound(cid.to_string())),
            (None, Some(change)) => {
                return Err(ResolveError::ReferentialGap {
                    change,
                    missing: cid,
                })
            }
        };
        if &change.resource != resource {
            return Err(ResolveError::NotFound(format!("{cid} in {resource}")));
        }
        queue.extend(change.deps.iter().map(|d| (*d, Some(cid))));
        closure.insert(cid, change);
    }

    Ok(closure)
}

/// Materialize `resource` at `version` from a store.
pub async fn materialize<S, A>(
    store: &S,
    resource: &Iri,
    version: &Version,
    applier: &A,
) -> Result<Projection<A::State>>
where
    S: Store + ?Sized,
    A: Applier,
{
    let closure = load_closure(store, resource, version).await?;
    let projection = project(applier, version, &closure)?;
    debug!(
        resource = %resource,
        version = %version,
        applied = projection.applied.len(),
        digest = %projection.digest.to_hex(),
        "materialized"
    );
    Ok(projection)
}
