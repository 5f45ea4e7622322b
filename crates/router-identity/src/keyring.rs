//! Mutex-protected onion-key rotation.
//!
//! The event loop owns everything else in this crate, but the onion key
//! pair is also touched by off-loop decrypt workers (see `relay-runtime`'s
//! worker pool). Per §5, only `rotate_onion_key`, `dup_onion_keys`, and
//! `set_onion_key` enter the lock — grounded on
//! `gvthread_core::mutex::SchedMutex`'s "named methods only" critical
//! section discipline.

use relay_core::traits::{CryptoProvider, RsaKeyHandle};
use std::sync::Mutex;

struct Keys {
    identity: RsaKeyHandle,
    current: RsaKeyHandle,
    previous: Option<RsaKeyHandle>,
    set_at: u64,
}

/// The identity key (fixed for the relay's lifetime) plus the rotating
/// onion key pair (current + previous, for decrypting in-flight
/// handshakes encrypted under a just-rotated-out key).
pub struct KeyRing {
    keys: Mutex<Keys>,
}

impl KeyRing {
    /// Generate a fresh identity key and onion key pair.
    pub fn new<C: CryptoProvider>(crypto: &C, now: u64) -> Self {
        KeyRing {
            keys: Mutex::new(Keys {
                identity: crypto.generate_rsa_key(),
                current: crypto.generate_rsa_key(),
                previous: None,
                set_at: now,
            }),
        }
    }

    /// Generate a new onion key, demoting the current one to `previous`.
    /// Disk persistence of the outgoing key under a `.old` suffix is a
    /// caller concern (out of scope per §1 filesystem access) — this
    /// returns the demoted key so the caller can write it out.
    pub fn rotate_onion_key<C: CryptoProvider>(&self, crypto: &C, now: u64) -> RsaKeyHandle {
        let mut keys = self.keys.lock().unwrap();
        let new_key = crypto.generate_rsa_key();
        let demoted = std::mem::replace(&mut keys.current, new_key);
        keys.previous = Some(demoted.clone());
        keys.set_at = now;
        demoted
    }

    /// Clone out the current onion-key triple without holding the lock
    /// past this call. Off-loop decrypt workers call this once per job
    /// and then operate on owned clones.
    pub fn dup_onion_keys(&self) -> (RsaKeyHandle, Option<RsaKeyHandle>) {
        let keys = self.keys.lock().unwrap();
        (keys.current.clone(), keys.previous.clone())
    }

    /// Install an externally-supplied onion key pair (used when loading
    /// persisted keys at startup).
    pub fn set_onion_key(&self, current: RsaKeyHandle, previous: Option<RsaKeyHandle>, now: u64) {
        let mut keys = self.keys.lock().unwrap();
        keys.current = current;
        keys.previous = previous;
        keys.set_at = now;
    }

    pub fn identity_key(&self) -> RsaKeyHandle {
        self.keys.lock().unwrap().identity.clone()
    }

    pub fn set_at(&self) -> u64 {
        self.keys.lock().unwrap().set_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::testing::FakeCrypto;

    #[test]
    fn test_rotate_twice_tracks_previous() {
        let crypto = FakeCrypto::new();
        let ring = KeyRing::new(&crypto, 0);
        let (first_current, _) = ring.dup_onion_keys();

        let demoted_first = ring.rotate_onion_key(&crypto, 10);
        assert_eq!(demoted_first, first_current);
        let (second_current, previous_after_first) = ring.dup_onion_keys();
        assert_eq!(previous_after_first, Some(first_current.clone()));

        let demoted_second = ring.rotate_onion_key(&crypto, 20);
        assert_eq!(demoted_second, second_current);
        let (_, previous_after_second) = ring.dup_onion_keys();
        // `previous` now equals the key that was `current` between the
        // two rotate calls.
        assert_eq!(previous_after_second, Some(second_current));
        assert_eq!(ring.set_at(), 20);
    }

    #[test]
    fn test_set_onion_key_installs_pair() {
        let crypto = FakeCrypto::new();
        let ring = KeyRing::new(&crypto, 0);
        let loaded_current = crypto.generate_rsa_key();
        let loaded_previous = crypto.generate_rsa_key();
        ring.set_onion_key(loaded_current.clone(), Some(loaded_previous.clone()), 5);
        let (current, previous) = ring.dup_onion_keys();
        assert_eq!(current, loaded_current);
        assert_eq!(previous, Some(loaded_previous));
    }
}
