//! Router identity digests and extend-info.

use std::fmt;

/// A 20-byte router identity digest (SHA-1 of the router's identity key).
///
/// The all-zero digest is a reserved sentinel — §4.3 link history rejects
/// it outright ("the all-zero digest is rejected, no record created").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouterId(pub [u8; 20]);

impl RouterId {
    /// The reserved all-zero sentinel.
    pub const ZERO: RouterId = RouterId([0u8; 20]);

    /// Whether this is the reserved all-zero sentinel.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        let mut i = 0;
        while i < 20 {
            if self.0[i] != 0 {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Lowercase hex encoding, the form used as a `HistoryMap` key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a lowercase (or uppercase) hex digest. `None` if the length or
    /// alphabet is wrong.
    pub fn from_hex(s: &str) -> Option<RouterId> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != 20 {
            return None;
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Some(RouterId(out))
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The minimal tuple needed to extend a circuit to a relay: address, port,
/// identity digest, and onion key (DER-encoded public key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendInfo {
    pub nickname: String,
    pub id: RouterId,
    pub addr: std::net::IpAddr,
    pub port: u16,
    pub onion_key_der: Vec<u8>,
}
