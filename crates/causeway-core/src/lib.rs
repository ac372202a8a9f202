//! # Causeway Core
//!
//! Pure primitives for Causeway: content identifiers, signed changes, key
//! delegations, versions and canonical encoding.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Cid`] - Content identifier (CIDv1, Blake3 multihash, base32 string form)
//! - [`Change`] - A signed mutation of one resource, with causal deps
//! - [`KeyDelegation`] - An account authorizing another key
//! - [`Version`] - A canonical set of head CIDs
//! - [`HlcTimestamp`] - Hybrid logical clock timestamp
//! - [`Iri`] - Resource identifier
//!
//! ## Canonicalization
//!
//! Typed blobs are deterministic CBOR. See the [`canonical`] module.

pub mod blob;
pub mod canonical;
pub mod change;
pub mod cid;
pub mod crypto;
pub mod delegation;
pub mod error;
pub mod hlc;
pub mod iri;
pub mod types;
pub mod validation;
pub mod version;

pub use blob::{decode_blob, Blob, BlobType, DecodedBlob};
pub use change::{Change, ChangeBuilder};
pub use cid::{Cid, Codec};
pub use crypto::{Digest, Keypair, PublicKey, Signature};
pub use delegation::{DelegationPurpose, KeyDelegation};
pub use error::{CoreError, ValidationError};
pub use hlc::{HlcTimestamp, HybridClock, MAX_PHYSICAL_MS};
pub use iri::{EntityKind, Iri};
pub use types::{ChangeSummary, Resource};
pub use validation::{validate_change, validate_change_structure, validate_delegation};
pub use version::{Version, VERSION_SEPARATOR};
