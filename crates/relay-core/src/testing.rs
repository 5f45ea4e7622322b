//! Test doubles for the collaborator traits.
//!
//! Deterministic, non-cryptographic stand-ins — not fit for any real
//! security purpose, only for exercising the protocol state machines in
//! §8's property and scenario tests.

use crate::id::{ExtendInfo, RouterId};
use crate::traits::{CryptoProvider, DhPrivate, DirectoryClient, IoOutcome, RouterOracle, RsaKeyHandle, TlsTransport};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A deterministic, insecure stand-in for the real crypto primitives.
///
/// `digest` is FNV-1a (not SHA-1) so tests get a stable, dependency-free
/// hash; `hybrid_decrypt` simply strips a key-tagged prefix that
/// `hybrid_encrypt_for_test` prepended, standing in for real hybrid
/// decryption.
#[derive(Debug, Default)]
pub struct FakeCrypto {
    next_key_id: AtomicU64,
}

impl FakeCrypto {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-only helper mirroring what a real hybrid-encrypt to `key`
    /// would produce: tags the plaintext with the key id so
    /// `hybrid_decrypt` can "decrypt" it back out.
    pub fn hybrid_encrypt_for_test(&self, key: &RsaKeyHandle, plaintext: &[u8]) -> Vec<u8> {
        let mut out = key.0.clone();
        out.extend_from_slice(plaintext);
        out
    }
}

fn fnv1a(data: &[u8]) -> [u8; 20] {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    let mut out = [0u8; 20];
    out[0..8].copy_from_slice(&hash.to_be_bytes());
    // Mix a second round into the tail so distinct inputs of the same
    // 8-byte prefix still diverge across the full 20 bytes.
    let hash2 = hash.rotate_left(17).wrapping_add(data.len() as u64);
    out[8..16].copy_from_slice(&hash2.to_be_bytes());
    out[16..20].copy_from_slice(&(hash2 as u32).to_be_bytes());
    out
}

impl CryptoProvider for FakeCrypto {
    fn digest(&self, data: &[u8]) -> [u8; 20] {
        fnv1a(data)
    }

    fn generate_rsa_key(&self) -> RsaKeyHandle {
        let id = self.next_key_id.fetch_add(1, Ordering::Relaxed);
        RsaKeyHandle(format!("fake-key-{id}").into_bytes())
    }

    fn rsa_public_der(&self, key: &RsaKeyHandle) -> Vec<u8> {
        let mut out = b"fake-der:".to_vec();
        out.extend_from_slice(&key.0);
        out
    }

    fn rsa_sign(&self, key: &RsaKeyHandle, data: &[u8]) -> Vec<u8> {
        let mut buf = key.0.clone();
        buf.extend_from_slice(data);
        self.digest(&buf).to_vec()
    }

    fn rsa_verify(&self, public_der: &[u8], data: &[u8], signature: &[u8]) -> bool {
        // Recover the key id embedded by rsa_public_der/generate_rsa_key and
        // recompute the expected signature the same way rsa_sign would.
        let Some(key_tag) = public_der.strip_prefix(b"fake-der:") else {
            return false;
        };
        let mut buf = key_tag.to_vec();
        buf.extend_from_slice(data);
        self.digest(&buf).to_vec() == signature
    }

    fn hybrid_decrypt(&self, key: &RsaKeyHandle, ciphertext: &[u8]) -> relay_error::Result<Vec<u8>> {
        ciphertext
            .strip_prefix(key.0.as_slice())
            .map(|rest| rest.to_vec())
            .ok_or(relay_error::Error::Crypto("fake hybrid_decrypt: key mismatch"))
    }

    fn dh_generate(&self) -> (DhPrivate, Vec<u8>) {
        let id = self.next_key_id.fetch_add(1, Ordering::Relaxed);
        let sk = format!("fake-dh-sk-{id}").into_bytes();
        let pk = format!("fake-dh-pk-{id}").into_bytes();
        (DhPrivate(sk), pk)
    }

    fn dh_shared_secret(&self, sk: &DhPrivate, peer_public: &[u8]) -> relay_error::Result<Vec<u8>> {
        let mut buf = sk.0.clone();
        buf.extend_from_slice(peer_public);
        Ok(self.digest(&buf).to_vec())
    }

    fn kdf(&self, secret: &[u8], len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut counter: u32 = 0;
        while out.len() < len {
            let mut buf = secret.to_vec();
            buf.extend_from_slice(&counter.to_be_bytes());
            out.extend_from_slice(&self.digest(&buf));
            counter += 1;
        }
        out.truncate(len);
        out
    }
}

/// A fixed pool of relays handed out round-robin, excluding the caller's
/// exclusion set.
#[derive(Debug, Default)]
pub struct FakeRouterOracle {
    relays: Vec<ExtendInfo>,
    cursor: std::sync::atomic::AtomicUsize,
}

impl FakeRouterOracle {
    pub fn new(relays: Vec<ExtendInfo>) -> Self {
        Self {
            relays,
            cursor: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

impl RouterOracle for FakeRouterOracle {
    fn pick_relay(&self, exclude: &HashSet<RouterId>) -> Option<ExtendInfo> {
        let n = self.relays.len();
        for _ in 0..n {
            let i = self.cursor.fetch_add(1, Ordering::Relaxed) % n.max(1);
            if let Some(candidate) = self.relays.get(i) {
                if !exclude.contains(&candidate.id) {
                    return Some(candidate.clone());
                }
            }
        }
        None
    }

    fn is_known(&self, id: &RouterId) -> bool {
        self.relays.iter().any(|r| &r.id == id)
    }
}

/// An in-memory directory that just remembers the last published body per
/// key.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    published: Mutex<HashMap<String, String>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

impl DirectoryClient for FakeDirectory {
    fn publish(&self, key: &str, body: &str) -> relay_error::Result<()> {
        self.published
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_string());
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.published.lock().unwrap().get(key).cloned()
    }
}

/// An in-memory byte pipe standing in for the TLS bottom half, with an
/// injectable would-block/EOF schedule.
#[derive(Debug, Default)]
pub struct FakeTransport {
    pub inbound: std::collections::VecDeque<u8>,
    pub outbound: Vec<u8>,
    pub eof: bool,
    pub block_reads: bool,
    pub block_writes: bool,
}

impl TlsTransport for FakeTransport {
    fn read(&mut self, buf: &mut [u8]) -> relay_error::Result<IoOutcome> {
        if self.block_reads {
            return Ok(IoOutcome::WouldBlock);
        }
        if self.inbound.is_empty() {
            return if self.eof {
                Ok(IoOutcome::Eof)
            } else {
                Ok(IoOutcome::WouldBlock)
            };
        }
        let n = buf.len().min(self.inbound.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.inbound.pop_front().unwrap();
        }
        Ok(IoOutcome::Progress(n))
    }

    fn write(&mut self, buf: &[u8]) -> relay_error::Result<IoOutcome> {
        if self.block_writes {
            return Ok(IoOutcome::WouldBlock);
        }
        self.outbound.extend_from_slice(buf);
        Ok(IoOutcome::Progress(buf.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_crypto_round_trip() {
        let crypto = FakeCrypto::new();
        let key = crypto.generate_rsa_key();
        let der = crypto.rsa_public_der(&key);
        let sig = crypto.rsa_sign(&key, b"hello");
        assert!(crypto.rsa_verify(&der, b"hello", &sig));
        assert!(!crypto.rsa_verify(&der, b"other", &sig));
    }

    #[test]
    fn test_fake_hybrid_round_trip() {
        let crypto = FakeCrypto::new();
        let key = crypto.generate_rsa_key();
        let ciphertext = crypto.hybrid_encrypt_for_test(&key, b"payload");
        let plaintext = crypto.hybrid_decrypt(&key, &ciphertext).unwrap();
        assert_eq!(plaintext, b"payload");
    }

    #[test]
    fn test_fake_oracle_excludes() {
        let relay_a = ExtendInfo {
            nickname: "a".into(),
            id: RouterId([1; 20]),
            addr: "127.0.0.1".parse().unwrap(),
            port: 9001,
            onion_key_der: vec![],
        };
        let oracle = FakeRouterOracle::new(vec![relay_a.clone()]);
        let mut exclude = HashSet::new();
        exclude.insert(relay_a.id);
        assert!(oracle.pick_relay(&exclude).is_none());
    }
}
