//! OR connection history and per-peer-pair link history.
//!
//! Keyed by 20-byte identity digests kept binary internally (Design Note
//! 4, "bounded slices") — hex encoding only happens at the descriptor
//! serialization boundary in `router-identity`.

use std::collections::HashMap;

/// A 20-byte router identity digest (SHA-1 of the RSA identity key, in
/// the original protocol).
pub type RouterDigest = [u8; 20];

/// The all-zero digest is never a valid router identity; lookups and
/// inserts against it are rejected outright.
pub const ZERO_DIGEST: RouterDigest = [0u8; 20];

/// Entries untouched for longer than this are eligible for GC.
pub const STALE_AFTER_SECS: u64 = 24 * 60 * 60;

/// Extend-attempt counters between one specific ordered pair of relays.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkHistory {
    pub extend_ok: u64,
    pub extend_fail: u64,
    pub last_change: u64,
}

impl LinkHistory {
    pub fn record_ok(&mut self, now: u64) {
        self.extend_ok += 1;
        self.last_change = now;
    }

    pub fn record_fail(&mut self, now: u64) {
        self.extend_fail += 1;
        self.last_change = now;
    }
}

/// Uptime/downtime bookkeeping for one relay's OR connection, plus a
/// sub-map of link history keyed by the peer relay's digest.
#[derive(Debug, Clone, Default)]
pub struct OrHistory {
    pub record_start: u64,
    pub last_change: u64,
    pub success_count: u64,
    pub fail_count: u64,
    pub uptime_secs: u64,
    pub downtime_secs: u64,
    up_since: Option<u64>,
    down_since: Option<u64>,
    links: HashMap<RouterDigest, LinkHistory>,
}

impl OrHistory {
    pub fn new(now: u64) -> Self {
        OrHistory {
            record_start: now,
            last_change: now,
            ..Default::default()
        }
    }

    pub fn is_up(&self) -> bool {
        self.up_since.is_some()
    }

    pub fn is_down(&self) -> bool {
        self.down_since.is_some()
    }

    /// A connection attempt to this relay failed.
    pub fn note_connect_failed(&mut self, now: u64) {
        self.fail_count += 1;
        if let Some(since) = self.up_since.take() {
            self.uptime_secs += now.saturating_sub(since);
        }
        if self.down_since.is_none() {
            self.down_since = Some(now);
        }
        self.last_change = now;
    }

    /// A connection attempt to this relay succeeded.
    pub fn note_connected(&mut self, now: u64) {
        self.success_count += 1;
        if let Some(since) = self.down_since.take() {
            self.downtime_secs += now.saturating_sub(since);
        }
        if self.up_since.is_none() {
            self.up_since = Some(now);
        }
        self.last_change = now;
    }

    /// We closed an established connection on purpose; no down interval is
    /// opened.
    pub fn note_disconnected(&mut self, now: u64) {
        if let Some(since) = self.up_since.take() {
            self.uptime_secs += now.saturating_sub(since);
        }
        self.last_change = now;
    }

    /// The connection died unexpectedly.
    pub fn note_connection_died(&mut self, now: u64) {
        if let Some(since) = self.up_since.take() {
            self.uptime_secs += now.saturating_sub(since);
        }
        if self.down_since.is_none() {
            self.down_since = Some(now);
        }
        self.last_change = now;
    }

    fn link_entry(&mut self, peer: RouterDigest) -> Option<&mut LinkHistory> {
        if peer == ZERO_DIGEST {
            return None;
        }
        Some(self.links.entry(peer).or_default())
    }

    pub fn record_extend_ok(&mut self, peer: RouterDigest, now: u64) {
        if let Some(link) = self.link_entry(peer) {
            link.record_ok(now);
        }
    }

    pub fn record_extend_fail(&mut self, peer: RouterDigest, now: u64) {
        if let Some(link) = self.link_entry(peer) {
            link.record_fail(now);
        }
    }

    pub fn link(&self, peer: &RouterDigest) -> Option<&LinkHistory> {
        self.links.get(peer)
    }
}

/// Process-wide (well, `Runtime`-wide) map of `OrHistory` keyed by relay
/// identity digest.
#[derive(Debug, Clone, Default)]
pub struct HistoryMap {
    entries: HashMap<RouterDigest, OrHistory>,
}

impl HistoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, digest: RouterDigest, now: u64) -> &mut OrHistory {
        self.entries.entry(digest).or_insert_with(|| OrHistory::new(now))
    }

    pub fn get(&self, digest: &RouterDigest) -> Option<&OrHistory> {
        self.entries.get(digest)
    }

    /// Drop entries whose most recent change is older than
    /// `STALE_AFTER_SECS`.
    pub fn gc(&mut self, now: u64) {
        self.entries
            .retain(|_, hist| now.saturating_sub(hist.last_change) <= STALE_AFTER_SECS);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_digest_rejected() {
        let mut hist = OrHistory::new(0);
        hist.record_extend_ok(ZERO_DIGEST, 10);
        assert!(hist.link(&ZERO_DIGEST).is_none());
    }

    #[test]
    fn test_connect_failed_then_connected_toggles_intervals() {
        let mut hist = OrHistory::new(0);
        hist.note_connect_failed(5);
        assert!(hist.is_down());
        assert_eq!(hist.fail_count, 1);

        hist.note_connected(15);
        assert!(hist.is_up());
        assert!(!hist.is_down());
        assert_eq!(hist.downtime_secs, 10);
        assert_eq!(hist.success_count, 1);
    }

    #[test]
    fn test_disconnect_does_not_open_down_interval() {
        let mut hist = OrHistory::new(0);
        hist.note_connected(0);
        hist.note_disconnected(20);
        assert!(!hist.is_up());
        assert!(!hist.is_down());
        assert_eq!(hist.uptime_secs, 20);
    }

    #[test]
    fn test_connection_died_opens_down_interval() {
        let mut hist = OrHistory::new(0);
        hist.note_connected(0);
        hist.note_connection_died(30);
        assert!(hist.is_down());
        assert_eq!(hist.uptime_secs, 30);
    }

    #[test]
    fn test_history_map_gc_drops_stale_entries() {
        let mut map = HistoryMap::new();
        let digest = [1u8; 20];
        map.entry(digest, 0);
        map.gc(STALE_AFTER_SECS + 1);
        assert!(map.get(&digest).is_none());
    }

    #[test]
    fn test_history_map_keeps_fresh_entries() {
        let mut map = HistoryMap::new();
        let digest = [2u8; 20];
        map.entry(digest, 100);
        map.gc(100 + STALE_AFTER_SECS);
        assert!(map.get(&digest).is_some());
    }
}
