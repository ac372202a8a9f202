//! Error types for Causeway core.

use thiserror::Error;

/// Errors raised while decoding, parsing or verifying core data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid CID: {0}")]
    InvalidCid(String),

    #[error("invalid IRI: {0}")]
    InvalidIri(String),

    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    #[error("blob hash does not match CID {0}")]
    HashMismatch(String),

    #[error("malformed blob: {0}")]
    MalformedBlob(String),

    #[error("blob is not in canonical encoding")]
    NonCanonical,

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation errors for change and delegation structure and signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("signature verification failed")]
    SignatureFailed,

    #[error("dependencies must be sorted and unique")]
    UnsortedDependencies,

    #[error("timestamp must be non-zero")]
    ZeroTimestamp,

    #[error("timestamp {0} out of range")]
    TimestampOutOfRange(u64),

    #[error("self-signed change must not carry a delegation proof")]
    UnexpectedDelegation,

    #[error("key cannot delegate to itself")]
    SelfDelegation,

    #[error("unsupported delegation purpose: {0}")]
    UnsupportedPurpose(String),

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            other => ValidationError::StructuralError(other.to_string()),
        }
    }
}
