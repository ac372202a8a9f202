//! # Causeway Identity
//!
//! Key delegation and signer authority.
//!
//! ## Overview
//!
//! A change is attributed to an account (its author) but may be signed by a
//! different key, typically a device. That is legitimate only when a chain
//! of KeyDelegation blobs leads from the author to the signer. This crate
//! answers that question, either over an in-memory [`DelegationGraph`] or
//! over any [`DelegationSource`] such as a store's delegation index.
//!
//! Delegations never expire and there is no revocation; the graph only
//! grows.

pub mod authority;
pub mod error;
pub mod graph;

pub use authority::{resolve_authority, AuthorityChain, DelegationSource, DEFAULT_MAX_DEPTH};
pub use error::{IdentityError, Result};
pub use graph::DelegationGraph;
