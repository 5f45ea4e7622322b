//! Predicted-port and predicted-internal-usage tracking, used to decide
//! whether circuits should be pre-built for likely future traffic.

use std::collections::HashMap;

/// Entries older than this are considered no longer predictive.
pub const PREDICTED_RELEVANCE: u64 = 3600;

/// Tracks the most recent time each destination port was requested.
#[derive(Debug, Clone, Default)]
pub struct PredictedPortTable {
    last_seen: HashMap<u16, u64>,
}

impl PredictedPortTable {
    /// A fresh table seeded with "port 80 was just asked for", matching
    /// the original implementation's startup assumption that web traffic
    /// is always imminent.
    pub fn new(now: u64) -> Self {
        let mut table = PredictedPortTable::default();
        table.note_used(80, now);
        table
    }

    pub fn note_used(&mut self, port: u16, now: u64) {
        self.last_seen.insert(port, now);
    }

    /// Ports still considered relevant as of `now`.
    pub fn active_ports(&self, now: u64) -> Vec<u16> {
        self.last_seen
            .iter()
            .filter(|&(_, &seen)| now.saturating_sub(seen) <= PREDICTED_RELEVANCE)
            .map(|(&port, _)| port)
            .collect()
    }

    pub fn is_active(&self, port: u16, now: u64) -> bool {
        self.last_seen
            .get(&port)
            .is_some_and(|&seen| now.saturating_sub(seen) <= PREDICTED_RELEVANCE)
    }
}

/// Tracks whether the relay has recently needed to act as the client end
/// of a hidden-service-style "internal" circuit (as opposed to a plain
/// exit circuit), at three granularities.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictedInternalUsage {
    any: Option<u64>,
    uptime: Option<u64>,
    capacity: Option<u64>,
}

impl PredictedInternalUsage {
    pub fn note_used(&mut self, now: u64, needs_uptime: bool, needs_capacity: bool) {
        self.any = Some(now);
        if needs_uptime {
            self.uptime = Some(now);
        }
        if needs_capacity {
            self.capacity = Some(now);
        }
    }

    fn is_relevant(stamp: Option<u64>, now: u64) -> bool {
        stamp.is_some_and(|t| now.saturating_sub(t) <= PREDICTED_RELEVANCE)
    }

    pub fn needs_internal(&self, now: u64) -> bool {
        Self::is_relevant(self.any, now)
    }

    pub fn needs_uptime(&self, now: u64) -> bool {
        Self::is_relevant(self.uptime, now)
    }

    pub fn needs_capacity(&self, now: u64) -> bool {
        Self::is_relevant(self.capacity, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_80_seeded_at_init() {
        let table = PredictedPortTable::new(0);
        assert!(table.is_active(80, 0));
    }

    #[test]
    fn test_port_expires_after_relevance_window() {
        let mut table = PredictedPortTable::default();
        table.note_used(443, 0);
        assert!(table.is_active(443, PREDICTED_RELEVANCE));
        assert!(!table.is_active(443, PREDICTED_RELEVANCE + 1));
    }

    #[test]
    fn test_internal_usage_sub_flags() {
        let mut usage = PredictedInternalUsage::default();
        usage.note_used(0, true, false);
        assert!(usage.needs_internal(0));
        assert!(usage.needs_uptime(0));
        assert!(!usage.needs_capacity(0));
        assert!(!usage.needs_internal(PREDICTED_RELEVANCE + 1));
    }
}
