//! Bounded buffer for blobs that arrived before their dependencies.

use std::collections::{BTreeSet, HashMap, VecDeque};

use causeway_core::{Blob, Cid};

struct Orphan {
    blob: Blob,
    missing: BTreeSet<Cid>,
}

/// Orphaned blobs keyed by the CIDs they wait for.
///
/// When full, the oldest orphan is evicted.
pub(crate) struct OrphanBuffer {
    capacity: usize,
    orphans: HashMap<Cid, Orphan>,
    /// missing CID -> orphans waiting on it
    waiting: HashMap<Cid, BTreeSet<Cid>>,
    /// Insertion order, for eviction.
    order: VecDeque<Cid>,
}

impl OrphanBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            orphans: HashMap::new(),
            waiting: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.orphans.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, cid: &Cid) -> bool {
        self.orphans.contains_key(cid)
    }

    /// Buffer `blob` until every CID in `missing` arrives. Returns the
    /// evicted orphan, if any.
    pub(crate) fn insert(&mut self, blob: Blob, missing: impl IntoIterator<Item = Cid>) -> Option<Cid> {
        let cid = *blob.cid();
        self.remove(&cid);
        if self.capacity == 0 {
            return Some(cid);
        }

        let mut evicted = None;
        if self.orphans.len() >= self.capacity {
            while let Some(oldest) = self.order.pop_front() {
                if self.remove(&oldest).is_some() {
                    evicted = Some(oldest);
                    break;
                }
            }
        }

        let missing: BTreeSet<Cid> = missing.into_iter().collect();
        for dep in &missing {
            self.waiting.entry(*dep).or_default().insert(cid);
        }
        self.orphans.insert(cid, Orphan { blob, missing });
        self.order.push_back(cid);
        evicted
    }

    /// Take every orphan that was waiting on `arrived`. They go back through
    /// ingest, which re-buffers any that still miss something.
    pub(crate) fn release(&mut self, arrived: &Cid) -> Vec<Blob> {
        let Some(waiters) = self.waiting.remove(arrived) else {
            return Vec::new();
        };
        waiters
            .into_iter()
            .filter_map(|cid| self.remove(&cid))
            .collect()
    }

    fn remove(&mut self, cid: &Cid) -> Option<Blob> {
        let orphan = self.orphans.remove(cid)?;
        for dep in &orphan.missing {
            if let Some(set) = self.waiting.get_mut(dep) {
                set.remove(cid);
                if set.is_empty() {
                    self.waiting.remove(dep);
                }
            }
        }
        self.order.retain(|c| c != cid);
        Some(orphan.blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_core::Codec;

    fn blob(tag: &str) -> Blob {
        Blob::new(Codec::DagCbor, tag.as_bytes().to_vec())
    }

    fn cid(tag: &str) -> Cid {
        Cid::new(Codec::DagCbor, tag.as_bytes())
    }

    #[test]
    fn test_release_on_arrival() {
        let mut buffer = OrphanBuffer::new(8);
        let child = blob("child");
        buffer.insert(child.clone(), [cid("a"), cid("b")]);
        assert!(buffer.contains(child.cid()));

        let released = buffer.release(&cid("a"));
        assert_eq!(released, vec![child.clone()]);
        assert_eq!(buffer.len(), 0);
        // The other edge is gone too.
        assert!(buffer.release(&cid("b")).is_empty());
    }

    #[test]
    fn test_evicts_oldest() {
        let mut buffer = OrphanBuffer::new(2);
        let first = blob("1");
        buffer.insert(first.clone(), [cid("x")]);
        buffer.insert(blob("2"), [cid("x")]);
        let evicted = buffer.insert(blob("3"), [cid("y")]);

        assert_eq!(evicted, Some(*first.cid()));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.release(&cid("x")), vec![blob("2")]);
    }

    #[test]
    fn test_reinsert_replaces() {
        let mut buffer = OrphanBuffer::new(4);
        let orphan = blob("o");
        buffer.insert(orphan.clone(), [cid("a")]);
        buffer.insert(orphan.clone(), [cid("b")]);

        assert_eq!(buffer.len(), 1);
        assert!(buffer.release(&cid("a")).is_empty());
        assert_eq!(buffer.release(&cid("b")), vec![orphan]);
    }

    #[test]
    fn test_zero_capacity_buffers_nothing() {
        let mut buffer = OrphanBuffer::new(0);
        let orphan = blob("o");
        assert_eq!(buffer.insert(orphan.clone(), [cid("a")]), Some(*orphan.cid()));
        assert_eq!(buffer.len(), 0);
    }
}
