//! Rolling-window and per-interval bandwidth bookkeeping.
//!
//! Grounded on `gvthread_runtime::timer::registry`'s fixed-capacity slot
//! ring with a cursor and wraparound, adapted from timer-wheel bucketing
//! to a bytes-per-second accumulator.

/// Rolling-window length, in seconds.
pub const WINDOW: usize = 900;

/// Per-interval bucket length, in seconds.
pub const INTERVAL: u64 = 900;

/// History horizon, in seconds.
pub const DAY: u64 = 86_400;

/// Number of interval slots retained (`DAY / INTERVAL`).
pub const NUM_SLOTS: usize = (DAY / INTERVAL) as usize;

/// One direction's worth of rolling-window and per-interval bookkeeping.
#[derive(Debug, Clone)]
struct Direction {
    obs: Vec<u64>,
    cur_obs_idx: usize,
    cur_obs_time: u64,
    started: bool,
    rolling_sum_accum: u64,
    interval_max_accum: u64,
    interval_total: u64,
    next_period: u64,
    maxima: [u64; NUM_SLOTS],
    totals: [u64; NUM_SLOTS],
    next_max_idx: usize,
    num_maxima_set: usize,
}

impl Default for Direction {
    fn default() -> Self {
        Direction {
            obs: vec![0u64; WINDOW],
            cur_obs_idx: 0,
            cur_obs_time: 0,
            started: false,
            rolling_sum_accum: 0,
            interval_max_accum: 0,
            interval_total: 0,
            next_period: 0,
            maxima: [0u64; NUM_SLOTS],
            totals: [0u64; NUM_SLOTS],
            next_max_idx: 0,
            num_maxima_set: 0,
        }
    }
}

impl Direction {
    fn advance_one_second(&mut self) {
        self.rolling_sum_accum += self.obs[self.cur_obs_idx];
        if self.rolling_sum_accum > self.interval_max_accum {
            self.interval_max_accum = self.rolling_sum_accum;
        }
        self.cur_obs_idx = (self.cur_obs_idx + 1) % WINDOW;
        self.rolling_sum_accum = self.rolling_sum_accum.saturating_sub(self.obs[self.cur_obs_idx]);
        self.obs[self.cur_obs_idx] = 0;
        self.cur_obs_time += 1;

        if self.cur_obs_time >= self.next_period {
            self.totals[self.next_max_idx] = self.interval_total;
            self.maxima[self.next_max_idx] = self.interval_max();
            self.next_max_idx = (self.next_max_idx + 1) % NUM_SLOTS;
            self.num_maxima_set = (self.num_maxima_set + 1).min(NUM_SLOTS);
            self.next_period += INTERVAL;
            self.interval_total = 0;
            self.interval_max_accum = 0;
        }
    }

    fn record(&mut self, now: u64, n: u64) {
        if !self.started {
            self.cur_obs_time = now;
            self.next_period = now + INTERVAL;
            self.started = true;
        }
        if now < self.cur_obs_time {
            return;
        }
        while self.cur_obs_time < now {
            self.advance_one_second();
        }
        self.obs[self.cur_obs_idx] += n;
        self.interval_total += n;
    }

    /// The rolling sum over the trailing `WINDOW` seconds, including
    /// whatever has landed in the currently-accumulating second.
    fn rolling_sum(&self) -> u64 {
        self.rolling_sum_accum + self.obs[self.cur_obs_idx]
    }

    /// The largest rolling sum observed so far this interval, including
    /// the not-yet-finalized current second.
    fn interval_max(&self) -> u64 {
        self.interval_max_accum.max(self.rolling_sum())
    }

    fn max_of_maxima(&self) -> u64 {
        self.maxima[..self.num_maxima_set].iter().copied().max().unwrap_or(0)
    }

    /// Ring contents in time order, oldest first: starting at
    /// `next_max_idx` once the ring has fully wrapped, otherwise from
    /// index 0.
    fn ordered(&self, ring: &[u64; NUM_SLOTS]) -> Vec<u64> {
        if self.num_maxima_set < NUM_SLOTS {
            ring[..self.num_maxima_set].to_vec()
        } else {
            let mut out = Vec::with_capacity(NUM_SLOTS);
            out.extend_from_slice(&ring[self.next_max_idx..]);
            out.extend_from_slice(&ring[..self.next_max_idx]);
            out
        }
    }

    /// End-of-interval timestamp of the most recently completed bucket.
    fn last_completed_interval_end(&self) -> u64 {
        if self.num_maxima_set == 0 {
            0
        } else {
            self.next_period.saturating_sub(INTERVAL)
        }
    }

    fn history_line(&self, label: &str, ring: &[u64; NUM_SLOTS]) -> String {
        let ts = self.last_completed_interval_end();
        let iso = chrono::DateTime::from_timestamp(ts as i64, 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string());
        let values = self
            .ordered(ring)
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("opt {label}-history {iso} ({INTERVAL} s) {values}")
    }
}

/// Per-second and per-interval bandwidth history for one relay, tracked
/// separately for the read and write directions.
#[derive(Debug, Clone, Default)]
pub struct BandwidthArray {
    read: Direction,
    write: Direction,
}

impl BandwidthArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&mut self, now: u64, n: u64) {
        self.read.record(now, n);
    }

    pub fn record_write(&mut self, now: u64, n: u64) {
        self.write.record(now, n);
    }

    pub fn read_rolling_sum(&self) -> u64 {
        self.read.rolling_sum()
    }

    pub fn write_rolling_sum(&self) -> u64 {
        self.write.rolling_sum()
    }

    pub fn read_interval_max(&self) -> u64 {
        self.read.interval_max()
    }

    pub fn write_interval_max(&self) -> u64 {
        self.write.interval_max()
    }

    pub fn read_maxima(&self) -> &[u64] {
        &self.read.maxima[..self.read.num_maxima_set]
    }

    pub fn write_maxima(&self) -> &[u64] {
        &self.write.maxima[..self.write.num_maxima_set]
    }

    pub fn read_totals(&self) -> &[u64] {
        &self.read.totals[..self.read.num_maxima_set]
    }

    pub fn write_totals(&self) -> &[u64] {
        &self.write.totals[..self.write.num_maxima_set]
    }

    pub fn read_next_max_idx(&self) -> usize {
        self.read.next_max_idx
    }

    pub fn write_next_max_idx(&self) -> usize {
        self.write.next_max_idx
    }

    /// Serialized `opt read-history <ISO time> (INTERVAL s) v1,v2,...`
    /// descriptor line.
    pub fn read_history_line(&self) -> String {
        self.read.history_line("read", &self.read.totals)
    }

    /// Serialized `opt write-history <ISO time> (INTERVAL s) v1,v2,...`
    /// descriptor line.
    pub fn write_history_line(&self) -> String {
        self.write.history_line("write", &self.write.totals)
    }

    /// The conservative steady-state rate sustained in some short window
    /// during the past day: `min(max(read.maxima), max(write.maxima)) /
    /// WINDOW`.
    pub fn estimated_bandwidth(&self) -> u64 {
        let read_max = self.read.max_of_maxima().max(self.read.interval_max());
        let write_max = self.write.max_of_maxima().max(self.write.interval_max());
        read_max.min(write_max) / WINDOW as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_sum_reaches_full_window() {
        let mut dir = Direction::default();
        for t in 0..WINDOW as u64 {
            dir.record(t, 1000);
        }
        assert_eq!(dir.rolling_sum(), 1000 * WINDOW as u64);
        assert!(dir.interval_max() >= 1000 * WINDOW as u64);

        // Stop for one second: no new bytes, time still advances.
        dir.record(WINDOW as u64, 0);
        assert!(dir.interval_max() >= 1000 * WINDOW as u64);
    }

    #[test]
    fn test_ring_wraps_after_day_plus_interval() {
        let mut dir = Direction::default();
        for t in 0..(DAY + INTERVAL) {
            dir.record(t, 1);
        }
        assert_eq!(dir.num_maxima_set, NUM_SLOTS);
        assert_eq!(dir.maxima.len(), NUM_SLOTS);
        assert_eq!(dir.totals.len(), NUM_SLOTS);
        // The ring has fully wrapped at least once; next_max_idx marks
        // the oldest slot.
        assert!(dir.next_max_idx < NUM_SLOTS);
    }

    #[test]
    fn test_estimated_bandwidth() {
        let mut bw = BandwidthArray::new();
        for t in 0..WINDOW as u64 {
            bw.record_read(t, 2000);
            bw.record_write(t, 1000);
        }
        // min(read_max, write_max) / WINDOW == min(2000*WINDOW,
        // 1000*WINDOW) / WINDOW == 1000.
        assert_eq!(bw.estimated_bandwidth(), 1000);
    }

    #[test]
    fn test_late_event_is_dropped() {
        let mut dir = Direction::default();
        dir.record(10, 500);
        dir.record(5, 999); // older than cur_obs_time, dropped
        assert_eq!(dir.obs[dir.cur_obs_idx], 500);
    }

    #[test]
    fn test_history_line_format() {
        let mut bw = BandwidthArray::new();
        for t in 0..=INTERVAL {
            bw.record_read(t, 10);
        }
        let line = bw.read_history_line();
        assert!(line.starts_with("opt read-history "));
        assert!(line.contains(&format!("({INTERVAL} s)")));
        assert!(line.ends_with(&(10 * INTERVAL).to_string()));
    }
}
