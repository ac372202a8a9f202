//! Content identifiers.
//!
//! A [`Cid`] is a CIDv1 over a Blake3-256 multihash:
//!
//! ```text
//! 0x01 || varint(codec) || 0x1e || 0x20 || digest[32]
//! ```
//!
//! The string form is multibase base32 (lowercase, unpadded) with the `b`
//! prefix. Ordering between CIDs is the ordering of their string forms, which
//! is what version strings and replay order are defined over. It is computed
//! on the binary form by ranking each base32 symbol, since the alphabet's
//! digits sort before its letters.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::crypto::Digest;
use crate::error::CoreError;

const CID_VERSION: u64 = 1;
const BLAKE3_MULTIHASH: u64 = 0x1e;
const DIGEST_LEN: u64 = 32;
const MULTIBASE_BASE32: char = 'b';
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";
/// Every CID here is exactly this long in binary: both codec codes are
/// single-byte varints.
const CID_LEN: usize = 36;
/// Base32 symbols in the string form of a binary CID, prefix excluded.
const CID_SYMBOLS: usize = (CID_LEN * 8 + 4) / 5;

/// Codec tag of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Codec {
    /// Uninterpreted bytes.
    Raw,
    /// Deterministic CBOR; typed blobs use this codec.
    DagCbor,
}

impl Codec {
    pub const fn code(self) -> u64 {
        match self {
            Codec::Raw => 0x55,
            Codec::DagCbor => 0x71,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x55 => Some(Codec::Raw),
            0x71 => Some(Codec::DagCbor),
            _ => None,
        }
    }
}

/// A content identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cid {
    codec: Codec,
    digest: Digest,
}

impl Cid {
    /// Hash `data` and build its CID.
    pub fn new(codec: Codec, data: &[u8]) -> Self {
        Self {
            codec,
            digest: Digest::hash(data),
        }
    }

    pub const fn from_parts(codec: Codec, digest: Digest) -> Self {
        Self { codec, digest }
    }

    pub const fn codec(&self) -> Codec {
        self.codec
    }

    pub const fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Whether `data` hashes to this CID.
    pub fn matches(&self, data: &[u8]) -> bool {
        Digest::hash(data) == self.digest
    }

    /// The multihash part: `0x1e || 0x20 || digest`.
    pub fn multihash(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(34);
        write_varint(&mut buf, BLAKE3_MULTIHASH);
        write_varint(&mut buf, DIGEST_LEN);
        buf.extend_from_slice(self.digest.as_bytes());
        buf
    }

    /// Rebuild a CID from its codec code and multihash bytes.
    pub fn from_multihash(codec: u64, multihash: &[u8]) -> Result<Self, CoreError> {
        let codec = Codec::from_code(codec)
            .ok_or_else(|| CoreError::InvalidCid(format!("unknown codec 0x{codec:x}")))?;
        let mut cursor = multihash;
        let digest = read_multihash(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(CoreError::InvalidCid("trailing bytes".into()));
        }
        Ok(Self { codec, digest })
    }

    /// Binary CIDv1 encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(36);
        write_varint(&mut buf, CID_VERSION);
        write_varint(&mut buf, self.codec.code());
        buf.extend_from_slice(&self.multihash());
        buf
    }

    /// The binary form on the stack, for comparisons.
    fn packed(&self) -> [u8; CID_LEN] {
        let mut buf = [0u8; CID_LEN];
        buf[0] = CID_VERSION as u8;
        buf[1] = self.codec.code() as u8;
        buf[2] = BLAKE3_MULTIHASH as u8;
        buf[3] = DIGEST_LEN as u8;
        buf[4..].copy_from_slice(self.digest.as_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut cursor = bytes;
        let version = read_varint(&mut cursor)?;
        if version != CID_VERSION {
            return Err(CoreError::InvalidCid(format!("unsupported version {version}")));
        }
        let codec = read_varint(&mut cursor)?;
        Self::from_multihash(codec, cursor)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MULTIBASE_BASE32, base32_encode(&self.to_bytes()))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({self})")
    }
}

impl FromStr for Cid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(MULTIBASE_BASE32)
            .ok_or_else(|| CoreError::InvalidCid(format!("unsupported multibase in {s:?}")))?;
        let bytes = base32_decode(body)
            .ok_or_else(|| CoreError::InvalidCid(format!("bad base32 in {s:?}")))?;
        Self::from_bytes(&bytes)
    }
}

impl Ord for Cid {
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }
        let (a, b) = (self.packed(), other.packed());
        (0..CID_SYMBOLS)
            .map(|i| symbol_rank(&a, i).cmp(&symbol_rank(&b, i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Cid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn read_multihash(cursor: &mut &[u8]) -> Result<Digest, CoreError> {
    let code = read_varint(cursor)?;
    if code != BLAKE3_MULTIHASH {
        return Err(CoreError::InvalidCid(format!("unsupported multihash 0x{code:x}")));
    }
    let len = read_varint(cursor)?;
    if len != DIGEST_LEN || cursor.len() < DIGEST_LEN as usize {
        return Err(CoreError::InvalidCid("bad digest length".into()));
    }
    let (digest, rest) = cursor.split_at(DIGEST_LEN as usize);
    let mut arr = [0u8; 32];
    arr.copy_from_slice(digest);
    *cursor = rest;
    Ok(Digest(arr))
}

fn write_varint(buf: &mut Vec<u8>, mut n: u64) {
    while n >= 0x80 {
        buf.push((n as u8) | 0x80);
        n >>= 7;
    }
    buf.push(n as u8);
}

fn read_varint(cursor: &mut &[u8]) -> Result<u64, CoreError> {
    let mut value: u64 = 0;
    for (i, &byte) in cursor.iter().enumerate().take(9) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            *cursor = &cursor[i + 1..];
            return Ok(value);
        }
    }
    Err(CoreError::InvalidCid("truncated varint".into()))
}

/// ASCII rank of the `i`-th base32 symbol of `data`: `2..7` come before
/// `a..z`.
fn symbol_rank(data: &[u8], i: usize) -> u8 {
    let bit = i * 5;
    let byte = bit / 8;
    let window = (u16::from(data[byte]) << 8) | u16::from(data.get(byte + 1).copied().unwrap_or(0));
    let value = ((window >> (11 - bit % 8)) & 0x1f) as u8;
    if value >= 26 {
        value - 26
    } else {
        value + 6
    }
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(s: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for c in s.bytes() {
        let v = match c {
            b'a'..=b'z' => c - b'a',
            b'2'..=b'7' => c - b'2' + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | u32::from(v);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    // Leftover padding bits must be fewer than one symbol and all zero.
    if bits >= 5 || buffer != 0 {
        return None;
    }
    Some(out)
}
