//! Blobs and typed blob decoding.

use bytes::Bytes;

use crate::canonical::{change_from_fields, decode_value, delegation_from_fields, fields};
use crate::change::Change;
use crate::cid::{Cid, Codec};
use crate::delegation::KeyDelegation;
use crate::error::CoreError;

/// Immutable bytes addressed by their CID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    cid: Cid,
    data: Bytes,
}

impl Blob {
    pub fn new(codec: Codec, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            cid: Cid::new(codec, &data),
            data,
        }
    }

    /// Pair bytes with a claimed CID, checking the hash.
    pub fn with_cid(cid: Cid, data: impl Into<Bytes>) -> Result<Self, CoreError> {
        let data = data.into();
        if !cid.matches(&data) {
            return Err(CoreError::HashMismatch(cid.to_string()));
        }
        Ok(Self { cid, data })
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn codec(&self) -> Codec {
        self.cid.codec()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Types of structurally indexed blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobType {
    Change,
    KeyDelegation,
}

impl BlobType {
    pub const fn as_str(self) -> &'static str {
        match self {
            BlobType::Change => "Change",
            BlobType::KeyDelegation => "KeyDelegation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Change" => Some(BlobType::Change),
            "KeyDelegation" => Some(BlobType::KeyDelegation),
            _ => None,
        }
    }
}

/// A blob after type dispatch.
#[derive(Debug, Clone)]
pub enum DecodedBlob {
    Change(Change),
    KeyDelegation(KeyDelegation),
    /// Raw bytes, or dag-cbor without a known type tag. Stored, not indexed.
    Opaque,
}

/// Decode a blob into its typed form.
///
/// Raw blobs and dag-cbor values that are not typed maps are `Opaque`. A
/// blob that claims a known type must decode completely and must be in
/// canonical form, otherwise it is rejected.
pub fn decode_blob(blob: &Blob) -> Result<DecodedBlob, CoreError> {
    if blob.codec() != Codec::DagCbor {
        return Ok(DecodedBlob::Opaque);
    }

    let value = match decode_value(blob.data()) {
        Ok(value) => value,
        Err(_) => return Ok(DecodedBlob::Opaque),
    };
    let Some(fields) = fields(&value) else {
        return Ok(DecodedBlob::Opaque);
    };

    let decoded = match fields.blob_type().and_then(BlobType::parse) {
        Some(BlobType::Change) => {
            let change = change_from_fields(&fields)?;
            if change.to_bytes() != blob.data().as_ref() {
                return Err(CoreError::NonCanonical);
            }
            DecodedBlob::Change(change)
        }
        Some(BlobType::KeyDelegation) => {
            let delegation = delegation_from_fields(&fields)?;
            if delegation.to_bytes() != blob.data().as_ref() {
                return Err(CoreError::NonCanonical);
            }
            DecodedBlob::KeyDelegation(delegation)
        }
        None => DecodedBlob::Opaque,
    };
    Ok(decoded)
}
