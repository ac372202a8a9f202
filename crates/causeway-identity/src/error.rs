//! Error types for the identity module.

use causeway_core::{PublicKey, ValidationError};
use thiserror::Error;

/// Errors that can occur while checking identity and delegation.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No delegation chain connects the author to the signer.
    #[error("signer {signer} is not authorized to act for {author}")]
    Unauthorized { author: PublicKey, signer: PublicKey },

    /// The delegation itself is invalid.
    #[error("invalid delegation: {0}")]
    InvalidDelegation(#[from] ValidationError),

    /// The backing delegation source failed.
    #[error("delegation source error: {0}")]
    Source(String),
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
