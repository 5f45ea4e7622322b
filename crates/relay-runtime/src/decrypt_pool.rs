//! Onion-skin decrypt worker pool.
//!
//! Adapted from `ksvc_gvthread::reactor`'s io_uring completion poller:
//! a fixed pool of OS threads drains an `ArrayQueue<Job>` request queue and
//! writes results the event loop polls once per tick. The reactor's result
//! is a single `i64` (an io_uring completion is just an errno/length); a
//! decrypt job's result is a variable-length plaintext or a typed error, so
//! the results side is a mutex-protected map keyed by request id rather
//! than the reactor's fixed atomic slab — everything else (fixed worker
//! count, lock-free submit queue, poll-once-per-tick) mirrors it directly.

use relay_core::traits::CryptoProvider;
use router_identity::KeyRing;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One onion-skin decrypt request.
pub struct Job {
    pub id: u64,
    pub ciphertext: Vec<u8>,
}

type ResultsMap = Mutex<HashMap<u64, relay_error::Result<Vec<u8>>>>;

/// A fixed pool of decrypt workers, started once and shared for the
/// runtime's lifetime.
pub struct DecryptPool {
    queue: Arc<crossbeam_queue::ArrayQueue<Job>>,
    results: Arc<ResultsMap>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl DecryptPool {
    /// `available_parallelism()` clamped to `[1, 8]`, mirroring the
    /// teacher's `num_cpus.min(MAX_WORKERS)` default worker count.
    pub fn default_worker_count() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .clamp(1, 8)
    }

    /// Start the pool. `worker_count == 0` means "use `default_worker_count`".
    pub fn start<C>(crypto: Arc<C>, keyring: Arc<KeyRing>, worker_count: usize, queue_capacity: usize) -> DecryptPool
    where
        C: CryptoProvider + Send + Sync + 'static,
    {
        let worker_count = if worker_count == 0 {
            Self::default_worker_count()
        } else {
            worker_count.clamp(1, 8)
        };

        let queue = Arc::new(crossbeam_queue::ArrayQueue::new(queue_capacity));
        let results: Arc<ResultsMap> = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for idx in 0..worker_count {
            let queue = queue.clone();
            let results = results.clone();
            let shutdown = shutdown.clone();
            let crypto = crypto.clone();
            let keyring = keyring.clone();
            let handle = thread::Builder::new()
                .name(format!("relay-decrypt-{idx}"))
                .spawn(move || worker_loop(queue, results, shutdown, crypto, keyring))
                .expect("failed to spawn decrypt worker");
            workers.push(handle);
        }

        DecryptPool { queue, results, shutdown, workers }
    }

    /// Submit a job. Returns the job back on a full queue (mirroring
    /// `ArrayQueue::push`'s own `Result<(), T>`).
    pub fn submit(&self, job: Job) -> Result<(), Job> {
        self.queue.push(job)
    }

    /// Drain every result that has arrived since the last poll. Call once
    /// per event-loop tick.
    pub fn poll(&self) -> Vec<(u64, relay_error::Result<Vec<u8>>)> {
        let mut results = self.results.lock().unwrap();
        results.drain().collect()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for DecryptPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<C: CryptoProvider>(
    queue: Arc<crossbeam_queue::ArrayQueue<Job>>,
    results: Arc<ResultsMap>,
    shutdown: Arc<AtomicBool>,
    crypto: Arc<C>,
    keyring: Arc<KeyRing>,
) {
    while !shutdown.load(Ordering::Acquire) {
        let Some(job) = queue.pop() else {
            thread::sleep(Duration::from_millis(1));
            continue;
        };

        let (current, previous) = keyring.dup_onion_keys();
        let outcome = crypto.hybrid_decrypt(&current, &job.ciphertext).or_else(|_| match &previous {
            Some(prev) => crypto.hybrid_decrypt(prev, &job.ciphertext),
            None => Err(relay_error::Error::Crypto("no onion key matched this ciphertext")),
        });
        results.lock().unwrap().insert(job.id, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::testing::FakeCrypto;
    use std::time::Instant;

    fn poll_until(pool: &DecryptPool, id: u64, timeout: Duration) -> relay_error::Result<Vec<u8>> {
        let start = Instant::now();
        loop {
            for (got_id, result) in pool.poll() {
                if got_id == id {
                    return result;
                }
            }
            if start.elapsed() > timeout {
                panic!("decrypt job {id} did not complete within {timeout:?}");
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_decrypts_with_current_key() {
        let crypto = Arc::new(FakeCrypto::new());
        let keyring = Arc::new(KeyRing::new(crypto.as_ref(), 0));
        let pool = DecryptPool::start(crypto.clone(), keyring.clone(), 2, 16);

        let (current, _) = keyring.dup_onion_keys();
        let ciphertext = crypto.hybrid_encrypt_for_test(&current, b"onion-skin");
        pool.submit(Job { id: 1, ciphertext }).map_err(|_| ()).unwrap();

        let plaintext = poll_until(&pool, 1, Duration::from_secs(2)).unwrap();
        assert_eq!(plaintext, b"onion-skin");
    }

    #[test]
    fn test_falls_back_to_previous_key_after_rotation() {
        let crypto = Arc::new(FakeCrypto::new());
        let keyring = Arc::new(KeyRing::new(crypto.as_ref(), 0));
        let (old_current, _) = keyring.dup_onion_keys();
        keyring.rotate_onion_key(crypto.as_ref(), 10);

        let pool = DecryptPool::start(crypto.clone(), keyring.clone(), 1, 16);
        let ciphertext = crypto.hybrid_encrypt_for_test(&old_current, b"stale-skin");
        pool.submit(Job { id: 7, ciphertext }).map_err(|_| ()).unwrap();

        let plaintext = poll_until(&pool, 7, Duration::from_secs(2)).unwrap();
        assert_eq!(plaintext, b"stale-skin");
    }

    #[test]
    fn test_default_worker_count_is_clamped() {
        let n = DecryptPool::default_worker_count();
        assert!((1..=8).contains(&n));
    }
}
