//! Proptest generators for property-based testing.
//!
//! DAG strategies produce valid change graphs in creation order: every
//! change depends only on earlier ones and has a strictly greater HLC.

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use proptest::sample::Index;

use causeway_core::{Change, ChangeBuilder, Cid, HlcTimestamp, Iri, Keypair, PublicKey};

use crate::fixtures::doc_iri;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

pub fn public_key() -> impl Strategy<Value = PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a document IRI.
pub fn doc() -> impl Strategy<Value = Iri> {
    "[a-z][a-z0-9-]{0,15}".prop_map(|name| doc_iri(&name))
}

/// Deterministic author keys for DAG generation.
pub fn authors(count: usize) -> Vec<Keypair> {
    (0..count)
        .map(|i| Keypair::from_seed(&[i as u8 + 1; 32]))
        .collect()
}

/// One change of a generated DAG: author index, picks among earlier
/// changes, payload.
pub type NodeShape = (usize, Vec<Index>, Vec<u8>);

/// Build a DAG from node shapes. Change `i` has HLC `i + 1`; the first change is
/// always a root.
pub fn build_dag(resource: &Iri, keys: &[Keypair], shapes: &[NodeShape]) -> Vec<Change> {
    let mut changes: Vec<Change> = Vec::with_capacity(shapes.len());
    let mut cids: Vec<Cid> = Vec::with_capacity(shapes.len());

    for (i, (author, picks, payload)) in shapes.iter().enumerate() {
        let deps: BTreeSet<Cid> = if i == 0 {
            BTreeSet::new()
        } else {
            picks.iter().map(|p| cids[p.index(i)]).collect()
        };
        let kp = &keys[author % keys.len()];
        let change = ChangeBuilder::new(kp.public_key(), resource.clone())
            .hlc(HlcTimestamp::new(i as u64 + 1, 0))
            .deps(deps)
            .payload(payload.clone())
            .sign(kp);
        cids.push(change.cid());
        changes.push(change);
    }
    changes
}

/// A DAG of 1..=`max_len` changes by up to `author_count` authors, on
/// the shared fixture document.
pub fn change_dag(max_len: usize, author_count: usize) -> impl Strategy<Value = Vec<Change>> {
    let keys = authors(author_count.max(1));
    let resource = doc_iri("fixture");
    prop::collection::vec(
        (
            0..keys.len(),
            prop::collection::vec(any::<Index>(), 0..3),
            payload(16),
        ),
        1..=max_len,
    )
    .prop_map(move |shapes| build_dag(&resource, &keys, &shapes))
}

/// Order `changes` so that dependencies come first, breaking ties among
/// ready changes by the lowest priority.
pub fn causal_order(changes: &[Change], priorities: &[u32]) -> Vec<Change> {
    let known: HashSet<Cid> = changes.iter().map(Change::cid).collect();
    let mut emitted: HashSet<Cid> = HashSet::new();
    let mut pending: Vec<(u32, &Change)> = changes
        .iter()
        .enumerate()
        .map(|(i, c)| (priorities.get(i).copied().unwrap_or(0), c))
        .collect();
    let mut order = Vec::with_capacity(changes.len());

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .enumerate()
            .filter(|(_, (_, c))| {
                c.deps
                    .iter()
                    .all(|d| emitted.contains(d) || !known.contains(d))
            })
            .min_by_key(|(_, (priority, _))| *priority)
            .map(|(i, _)| i);
        // Creation order is always a valid fallback.
        let next = ready.unwrap_or(0);
        let (_, change) = pending.remove(next);
        emitted.insert(change.cid());
        order.push(change.clone());
    }
    order
}

/// A DAG together with a random dependency-respecting delivery order.
pub fn dag_with_causal_order(
    max_len: usize,
    author_count: usize,
) -> impl Strategy<Value = (Vec<Change>, Vec<Change>)> {
    change_dag(max_len, author_count)
        .prop_flat_map(|dag| {
            let n = dag.len();
            (Just(dag), prop::collection::vec(any::<u32>(), n))
        })
        .prop_map(|(dag, priorities)| {
            let order = causal_order(&dag, &priorities);
            (dag, order)
        })
}

/// A DAG together with an arbitrary delivery order.
pub fn dag_with_shuffle(
    max_len: usize,
    author_count: usize,
) -> impl Strategy<Value = (Vec<Change>, Vec<Change>)> {
    change_dag(max_len, author_count)
        .prop_flat_map(|dag| (Just(dag.clone()), Just(dag).prop_shuffle()))
}
