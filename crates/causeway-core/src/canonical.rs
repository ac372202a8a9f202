//! Canonical CBOR encoding for typed blobs.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are packed HLC integers)
//!
//! Typed blobs are maps with small integer keys. Key 0 always holds the blob
//! type as text. Decoding re-encodes the parsed value and compares bytes, so
//! a blob accepted here has exactly one encoding and therefore one CID.

use ciborium::value::{Integer, Value};

use crate::blob::BlobType;
use crate::change::Change;
use crate::cid::Cid;
use crate::crypto::{PublicKey, Signature};
use crate::delegation::{DelegationPurpose, KeyDelegation};
use crate::error::CoreError;
use crate::hlc::HlcTimestamp;
use crate::iri::Iri;

/// Domain prefix for change signatures.
pub const CHANGE_SIGN_DOMAIN: &[u8] = b"causeway:change:v1\0";

/// Domain prefix for key delegation signatures.
pub const DELEGATION_SIGN_DOMAIN: &[u8] = b"causeway:delegation:v1\0";

/// Field keys. Keys 0-23 encode as single bytes.
mod keys {
    pub const TYPE: u64 = 0;

    pub const AUTHOR: u64 = 1;
    pub const SIGNER: u64 = 2;
    pub const RESOURCE: u64 = 3;
    pub const HLC: u64 = 4;
    pub const DEPS: u64 = 5;
    pub const PAYLOAD: u64 = 6;
    pub const HINT: u64 = 7;
    pub const DELEGATION: u64 = 8;

    pub const ISSUER: u64 = 1;
    pub const DELEGATE: u64 = 2;
    pub const PURPOSE: u64 = 3;
    pub const ISSUE_TIME: u64 = 4;

    pub const SIGNATURE: u64 = 9;
}

// ─────────────────────────────────────────────────────────────────────────────
// Changes
// ─────────────────────────────────────────────────────────────────────────────

/// Full canonical encoding of a signed change.
pub fn change_bytes(change: &Change) -> Vec<u8> {
    encode(&change_to_value(change, true))
}

/// The message a change signature covers.
pub fn change_signed_message(change: &Change) -> Vec<u8> {
    let mut buf = CHANGE_SIGN_DOMAIN.to_vec();
    encode_value_to(&mut buf, &change_to_value(change, false));
    buf
}

fn change_to_value(change: &Change, with_signature: bool) -> Value {
    let mut entries = vec![
        entry(keys::TYPE, Value::Text(BlobType::Change.as_str().into())),
        entry(keys::AUTHOR, Value::Bytes(change.author.0.to_vec())),
        entry(keys::SIGNER, Value::Bytes(change.signer.0.to_vec())),
        entry(keys::RESOURCE, Value::Text(change.resource.as_str().into())),
        entry(keys::HLC, Value::Integer(change.hlc.as_u64().into())),
        entry(
            keys::DEPS,
            Value::Array(change.deps.iter().map(|d| Value::Bytes(d.to_bytes())).collect()),
        ),
        entry(keys::PAYLOAD, Value::Bytes(change.payload.to_vec())),
    ];
    // Absent optionals are omitted rather than encoded as null.
    if let Some(hint) = &change.hint {
        entries.push(entry(keys::HINT, Value::Text(hint.clone())));
    }
    if let Some(delegation) = &change.delegation {
        entries.push(entry(keys::DELEGATION, Value::Bytes(delegation.to_bytes())));
    }
    if with_signature {
        entries.push(entry(keys::SIGNATURE, Value::Bytes(change.signature.0.to_vec())));
    }
    Value::Map(entries)
}

pub(crate) fn change_from_fields(fields: &Fields<'_>) -> Result<Change, CoreError> {
    let deps = match fields.get(keys::DEPS) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Bytes(b) => Cid::from_bytes(b),
                _ => Err(CoreError::MalformedBlob("dependency is not a CID".into())),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(CoreError::MalformedBlob("missing deps".into())),
    };

    let delegation = match fields.get(keys::DELEGATION) {
        Some(Value::Bytes(b)) => Some(Cid::from_bytes(b)?),
        None => None,
        _ => return Err(CoreError::MalformedBlob("invalid delegation".into())),
    };

    let hint = match fields.get(keys::HINT) {
        Some(Value::Text(s)) => Some(s.clone()),
        None => None,
        _ => return Err(CoreError::MalformedBlob("invalid hint".into())),
    };

    Ok(Change {
        author: fields.public_key(keys::AUTHOR, "author")?,
        signer: fields.public_key(keys::SIGNER, "signer")?,
        resource: Iri::parse(fields.text(keys::RESOURCE, "resource")?)?,
        hlc: HlcTimestamp::from_raw(fields.uint(keys::HLC, "hlc")?),
        deps,
        payload: fields.bytes(keys::PAYLOAD, "payload")?.to_vec().into(),
        hint,
        delegation,
        signature: fields.signature()?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Key delegations
// ─────────────────────────────────────────────────────────────────────────────

/// Full canonical encoding of a signed key delegation.
pub fn delegation_bytes(delegation: &KeyDelegation) -> Vec<u8> {
    encode(&delegation_to_value(delegation, true))
}

/// The message a delegation signature covers.
pub fn delegation_signed_message(delegation: &KeyDelegation) -> Vec<u8> {
    let mut buf = DELEGATION_SIGN_DOMAIN.to_vec();
    encode_value_to(&mut buf, &delegation_to_value(delegation, false));
    buf
}

fn delegation_to_value(delegation: &KeyDelegation, with_signature: bool) -> Value {
    let mut entries = vec![
        entry(keys::TYPE, Value::Text(BlobType::KeyDelegation.as_str().into())),
        entry(keys::ISSUER, Value::Bytes(delegation.issuer.0.to_vec())),
        entry(keys::DELEGATE, Value::Bytes(delegation.delegate.0.to_vec())),
        entry(keys::PURPOSE, Value::Text(delegation.purpose.as_str().into())),
        entry(keys::ISSUE_TIME, Value::Integer(delegation.issue_time.into())),
    ];
    if with_signature {
        entries.push(entry(keys::SIGNATURE, Value::Bytes(delegation.signature.0.to_vec())));
    }
    Value::Map(entries)
}

pub(crate) fn delegation_from_fields(fields: &Fields<'_>) -> Result<KeyDelegation, CoreError> {
    Ok(KeyDelegation {
        issuer: fields.public_key(keys::ISSUER, "issuer")?,
        delegate: fields.public_key(keys::DELEGATE, "delegate")?,
        purpose: DelegationPurpose::parse(fields.text(keys::PURPOSE, "purpose")?),
        issue_time: fields.uint(keys::ISSUE_TIME, "issue_time")?,
        signature: fields.signature()?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Integer-keyed map entries of a decoded typed blob.
pub(crate) struct Fields<'a> {
    entries: &'a [(Value, Value)],
}

impl<'a> Fields<'a> {
    fn get(&self, key: u64) -> Option<&'a Value> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if u64::try_from(*i).ok() == Some(key)))
            .map(|(_, v)| v)
    }

    /// The blob type tag, if this map carries one.
    pub(crate) fn blob_type(&self) -> Option<&'a str> {
        match self.get(keys::TYPE) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn bytes(&self, key: u64, name: &str) -> Result<&'a [u8], CoreError> {
        match self.get(key) {
            Some(Value::Bytes(b)) => Ok(b),
            _ => Err(CoreError::MalformedBlob(format!("missing or invalid {name}"))),
        }
    }

    fn text(&self, key: u64, name: &str) -> Result<&'a str, CoreError> {
        match self.get(key) {
            Some(Value::Text(s)) => Ok(s),
            _ => Err(CoreError::MalformedBlob(format!("missing or invalid {name}"))),
        }
    }

    fn uint(&self, key: u64, name: &str) -> Result<u64, CoreError> {
        match self.get(key) {
            Some(Value::Integer(i)) => u64::try_from(*i)
                .map_err(|_| CoreError::MalformedBlob(format!("{name} out of range"))),
            _ => Err(CoreError::MalformedBlob(format!("missing or invalid {name}"))),
        }
    }

    fn public_key(&self, key: u64, name: &str) -> Result<PublicKey, CoreError> {
        PublicKey::try_from(self.bytes(key, name)?)
            .map_err(|_| CoreError::MalformedBlob(format!("invalid {name}")))
    }

    fn signature(&self) -> Result<Signature, CoreError> {
        Signature::try_from(self.bytes(keys::SIGNATURE, "signature")?)
            .map_err(|_| CoreError::MalformedBlob("invalid signature".into()))
    }
}

/// Parse CBOR bytes into a generic value.
pub(crate) fn decode_value(bytes: &[u8]) -> Result<Value, CoreError> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

/// View a decoded value as typed-blob fields, if it is a map.
pub(crate) fn fields(value: &Value) -> Option<Fields<'_>> {
    match value {
        Value::Map(entries) => Some(Fields { entries }),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

fn entry(key: u64, value: Value) -> (Value, Value) {
    (Value::Integer(key.into()), value)
}

fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a CBOR value.
///
/// Only the value shapes built in this module reach the encoder; floats,
/// tags and other shapes are never produced.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            encode_uint(buf, 4, items.len() as u64);
            for item in items {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        other => unreachable!("unsupported CBOR value in canonical encoding: {other:?}"),
    }
}

fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Keys are sorted by their encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| (encode(k), v))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
