//! Node configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What to do with a change whose dependencies have not arrived yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Fail with a referential gap; the sync layer retries later.
    #[default]
    Reject,
    /// Hold the blob in memory and index it once its dependencies land.
    Buffer,
}

/// Configuration for a [`Node`](crate::Node).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Check change signatures and signer authority on ingest. When off,
    /// the checks run whenever an entity is resolved or materialized, and
    /// failing changes are quarantined instead of refused.
    pub verify_signatures: bool,
    pub orphan_policy: OrphanPolicy,
    /// Buffer capacity under [`OrphanPolicy::Buffer`]. Oldest entries are
    /// evicted first.
    pub max_orphans: usize,
    /// Longest delegation chain accepted between author and signer.
    pub max_delegation_depth: usize,
    /// Namespace of the named version local writers advance.
    pub default_namespace: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            verify_signatures: true,
            orphan_policy: OrphanPolicy::Reject,
            max_orphans: 1024,
            max_delegation_depth: causeway_identity::DEFAULT_MAX_DEPTH,
            default_namespace: "main".to_string(),
        }
    }
}

impl NodeConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
