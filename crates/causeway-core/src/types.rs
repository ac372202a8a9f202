//! Index-level views of changes and resources.

use crate::change::Change;
use crate::cid::Cid;
use crate::crypto::PublicKey;
use crate::hlc::HlcTimestamp;
use crate::iri::Iri;

/// What the change index knows about one change, without its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSummary {
    pub id: Cid,
    pub author: PublicKey,
    pub resource: Iri,
    pub create_time: HlcTimestamp,
    pub deps: Vec<Cid>,
    /// Whether the author is currently in the trusted set.
    pub is_trusted: bool,
}

impl ChangeSummary {
    pub fn from_change(id: Cid, change: &Change, is_trusted: bool) -> Self {
        Self {
            id,
            author: change.author,
            resource: change.resource.clone(),
            create_time: change.hlc,
            deps: change.deps.clone(),
            is_trusted,
        }
    }
}

/// An addressable mutable entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub iri: Iri,
    pub owner: Option<PublicKey>,
    pub create_time: Option<HlcTimestamp>,
}
