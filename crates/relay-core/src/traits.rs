//! Collaborator trait seams.
//!
//! These traits fix the interface of the components §1 declares out of
//! scope for this crate — the directory protocol, the bottom-half TLS
//! transport, the low-level cryptographic primitives, and the
//! router-selection heuristic — the way `gvthread_core::traits` fixes
//! `PlatformMemory`/`PlatformSignal`/`PlatformThread`/`PlatformTime` for
//! code the scheduler core does not itself implement.

use crate::id::{ExtendInfo, RouterId};
use std::collections::HashSet;

/// Outcome of a single non-blocking transport read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOutcome {
    /// `n` bytes were transferred.
    Progress(usize),
    /// The operation would have blocked; try again once readiness fires.
    WouldBlock,
    /// End of stream (read side only).
    Eof,
}

/// The bottom-half transport: an opaque non-blocking byte stream with a
/// pending-bytes side channel (§4.1 "TLS variants").
pub trait TlsTransport {
    /// Read up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> relay_error::Result<IoOutcome>;

    /// Write up to `buf.len()` bytes.
    fn write(&mut self, buf: &[u8]) -> relay_error::Result<IoOutcome>;

    /// Bytes already buffered inside the transport that a socket-level
    /// readability check would not reveal.
    fn pending_bytes(&self) -> usize {
        0
    }

    /// Minimum bytes a resumed partial TLS record requires the next write
    /// to cover, or 0 if no partial record is outstanding.
    fn forced_write_len(&self) -> usize {
        0
    }
}

/// An opaque RSA key handle. The crate never inspects the bytes; only the
/// `CryptoProvider` implementation understands them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyHandle(pub Vec<u8>);

/// An opaque Diffie-Hellman private key handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhPrivate(pub Vec<u8>);

/// The low-level cryptographic primitives, out of scope per §1: hybrid
/// public-key encryption, DH, RSA signing, digest.
pub trait CryptoProvider {
    /// 20-byte digest (SHA-1 in the original protocol).
    fn digest(&self, data: &[u8]) -> [u8; 20];

    /// Generate a fresh RSA key pair, returning an opaque handle.
    fn generate_rsa_key(&self) -> RsaKeyHandle;

    /// DER-encode the public half of an RSA key.
    fn rsa_public_der(&self, key: &RsaKeyHandle) -> Vec<u8>;

    /// Sign `data` with the private half of `key`.
    fn rsa_sign(&self, key: &RsaKeyHandle, data: &[u8]) -> Vec<u8>;

    /// Verify a signature produced by `rsa_sign` against a DER public key.
    fn rsa_verify(&self, public_der: &[u8], data: &[u8], signature: &[u8]) -> bool;

    /// Hybrid public-key decrypt (ESTABLISH_INTRO/INTRODUCE2 payloads are
    /// hybrid-encrypted to the intro point's or service's RSA key).
    fn hybrid_decrypt(&self, key: &RsaKeyHandle, ciphertext: &[u8]) -> relay_error::Result<Vec<u8>>;

    /// Generate a fresh DH key pair; returns `(private, public)`.
    fn dh_generate(&self) -> (DhPrivate, Vec<u8>);

    /// Compute a DH shared secret given our private key and the peer's
    /// public value.
    fn dh_shared_secret(&self, sk: &DhPrivate, peer_public: &[u8]) -> relay_error::Result<Vec<u8>>;

    /// Derive `len` bytes of keying material from a DH shared secret.
    fn kdf(&self, secret: &[u8], len: usize) -> Vec<u8>;
}

/// The router-selection heuristic, out of scope per §1: an opaque
/// "choose a random router excluding this set" oracle.
pub trait RouterOracle {
    /// Pick a relay not present in `exclude`, or `None` if none qualifies.
    fn pick_relay(&self, exclude: &HashSet<RouterId>) -> Option<ExtendInfo>;

    /// Whether the oracle still knows about this relay (used by
    /// `introduce()`'s intro-point survivor check, §4.2 step 3).
    fn is_known(&self, id: &RouterId) -> bool;
}

/// The directory protocol, out of scope per §1: an opaque "publish this
/// descriptor" / "look up router by digest or nickname" service.
pub trait DirectoryClient {
    /// Publish a descriptor body under the given key (digest or service
    /// identifier, depending on descriptor kind).
    fn publish(&self, key: &str, body: &str) -> relay_error::Result<()>;

    /// Look up a previously published document.
    fn lookup(&self, key: &str) -> Option<String>;
}
