//! Content-derived identifiers (CDID).
//!
//! A CDID is 16 bytes: the first 10 bytes of the Keccak-256 hash of the
//! raw signed payload, followed by the document's `signedAt` as a 48-bit
//! big-endian millisecond timestamp. The string form is unpadded base32
//! over the alphabet `0123456789abcdefghjkmnpqrstvwxyz` (26 characters).
//!
//! Identical payload bytes with an identical timestamp always produce the
//! same identifier, which is what makes re-indexing idempotent.

use std::fmt;
use std::sync::OnceLock;

use data_encoding::{Encoding, Specification};
use sha3::{Digest, Keccak256};

/// Number of hash bytes kept in a CDID
pub const CDID_HASH_LEN: usize = 10;

const CDID_LEN: usize = 16;
const CDID_ALPHABET: &str = "0123456789abcdefghjkmnpqrstvwxyz";
const TIMESTAMP_MASK: u64 = 0xFFFF_FFFF_FFFF;

fn cdid_encoding() -> &'static Encoding {
    static ENCODING: OnceLock<Encoding> = OnceLock::new();
    ENCODING.get_or_init(|| {
        let mut spec = Specification::new();
        spec.symbols.push_str(CDID_ALPHABET);
        spec.encoding()
            .expect("CDID alphabet is a valid 32-symbol base32 specification")
    })
}

/// A content-derived identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cdid([u8; CDID_LEN]);

impl Cdid {
    /// Build a CDID from a truncated hash and a millisecond timestamp.
    pub fn new(hash: [u8; CDID_HASH_LEN], signed_at_ms: i64) -> Self {
        let mut bytes = [0u8; CDID_LEN];
        bytes[..CDID_HASH_LEN].copy_from_slice(&hash);
        // Two's complement keeps pre-epoch timestamps deterministic.
        let time = (signed_at_ms as u64) & TIMESTAMP_MASK;
        bytes[CDID_HASH_LEN..].copy_from_slice(&time.to_be_bytes()[2..]);
        Self(bytes)
    }

    /// Hash `payload` with Keccak-256 and combine the first 10 bytes with
    /// the timestamp.
    pub fn from_payload(payload: &[u8], signed_at_ms: i64) -> Self {
        let digest = Keccak256::digest(payload);
        let mut hash = [0u8; CDID_HASH_LEN];
        hash.copy_from_slice(&digest[..CDID_HASH_LEN]);
        Self::new(hash, signed_at_ms)
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; CDID_LEN] {
        &self.0
    }

    /// The 48-bit timestamp portion, in milliseconds.
    pub fn timestamp_ms(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf[2..].copy_from_slice(&self.0[CDID_HASH_LEN..]);
        u64::from_be_bytes(buf)
    }
}

impl fmt::Display for Cdid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&cdid_encoding().encode(&self.0))
    }
}

/// Derive the string identifier for a payload signed at `signed_at_ms`.
pub fn derive_cdid(payload: &[u8], signed_at_ms: i64) -> String {
    Cdid::from_payload(payload, signed_at_ms).to_string()
}
