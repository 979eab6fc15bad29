//! Fixed 32-byte authenticated echo packet.
//!
//! Layout (big-endian): magic `LATO` (4B) | version u32 (4B) |
//! send-time monotonic nanoseconds u64 (8B) | sequence u32 (4B) |
//! nonce u64 (8B) | tag u32 (4B). The tag is the leading 32 bits of
//! HMAC-SHA256 over the first 28 bytes, keyed by the shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Total wire size of a LATTICE probe/echo packet.
pub const PACKET_LEN: usize = 32;

const MAGIC: [u8; 4] = *b"LATO";
const TAG_LEN: usize = 4;
const SIGNED_LEN: usize = PACKET_LEN - TAG_LEN; // first 28 bytes

/// Current wire version. Read but not currently validated beyond being
/// representable in a u32, per spec.
pub const WIRE_VERSION: u32 = 1;

/// Minimum accepted shared-secret length.
pub const MIN_SECRET_LEN: usize = 16;

/// A decoded/encoded LATTICE packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub version: u32,
    pub send_ns: u64,
    pub sequence: u32,
    pub nonce: u64,
}

/// Outcome of validating a received datagram against the shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Accept(Packet),
    RejectLength,
    RejectMagic,
    RejectTag,
}

impl Packet {
    /// Encode this packet to its 32-byte wire form, computing and
    /// appending the HMAC tag over the first 28 bytes.
    pub fn encode(&self, secret: &[u8]) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_be_bytes());
        buf[8..16].copy_from_slice(&self.send_ns.to_be_bytes());
        buf[16..20].copy_from_slice(&self.sequence.to_be_bytes());
        buf[20..28].copy_from_slice(&self.nonce.to_be_bytes());
        let tag = compute_tag(&buf[..SIGNED_LEN], secret);
        buf[28..32].copy_from_slice(&tag);
        buf
    }

    /// Build a fresh probe packet with the given sequence number and a
    /// cryptographically random nonce, stamped with `send_ns`.
    pub fn new_probe(sequence: u32, send_ns: u64, nonce: u64) -> Self {
        Self {
            version: WIRE_VERSION,
            send_ns,
            sequence,
            nonce,
        }
    }
}

/// Compute the 4-byte truncated HMAC-SHA256 tag over `signed` using `secret`.
fn compute_tag(signed: &[u8], secret: &[u8]) -> [u8; TAG_LEN] {
    // `Hmac::new_from_slice` accepts any key length; the >=16 byte minimum
    // is enforced by the caller (secret loading), not here.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(signed);
    let full = mac.finalize().into_bytes();
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&full[..TAG_LEN]);
    tag
}

/// Validate a received datagram against the shared secret. Rejects on
/// wrong length or magic before touching the secret; the tag comparison
/// itself is constant-time.
pub fn validate(bytes: &[u8], secret: &[u8]) -> Validation {
    if bytes.len() != PACKET_LEN {
        return Validation::RejectLength;
    }
    if bytes[0..4] != MAGIC {
        return Validation::RejectMagic;
    }
    let expected = compute_tag(&bytes[..SIGNED_LEN], secret);
    let received = &bytes[28..32];
    if expected.ct_eq(received).unwrap_u8() != 1 {
        return Validation::RejectTag;
    }
    let version = u32::from_be_bytes(bytes[4..8].try_into().expect("4 byte slice"));
    let send_ns = u64::from_be_bytes(bytes[8..16].try_into().expect("8 byte slice"));
    let sequence = u32::from_be_bytes(bytes[16..20].try_into().expect("4 byte slice"));
    let nonce = u64::from_be_bytes(bytes[20..28].try_into().expect("8 byte slice"));
    Validation::Accept(Packet {
        version,
        send_ns,
        sequence,
        nonce,
    })
}
