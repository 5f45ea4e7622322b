//! Per-size freelists of recycled backing storage.
//!
//! `CellBuf` returns storage here when it drains to zero length (or is
//! dropped) and its capacity matches one of `SIZE_CLASSES`. This mirrors
//! `ksvc_module::fixed_pool::FixedPool`'s fixed worker count and
//! `ksvc_core::buffer::BufferProvider`'s acquire/release contract, adapted
//! from a syscall worker pool to a plain memory pool: no raw
//! pointer-into-first-word intrusive list (per Design Note 1), just a
//! `Vec<Vec<u8>>` stack per size class guarded by a mutex.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

/// Allocation sizes the freelist pools. Buffers of any other capacity are
/// allocated and dropped normally, bypassing the pool.
pub const SIZE_CLASSES: [usize; 3] = [4096, 8192, 16384];

/// Maximum idle blocks retained per size class before `release` just drops
/// the excess.
pub const DEFAULT_MAX_PER_CLASS: usize = 64;

/// Blocks kept around after a `sweep()` even if they sat idle the whole
/// tracking period.
pub const DEFAULT_SLACK: usize = 4;

struct Freelist {
    size: usize,
    blocks: Mutex<Vec<Vec<u8>>>,
    max: usize,
    slack: usize,
    /// Minimum length observed since the last sweep.
    lowwater: AtomicUsize,
}

impl Freelist {
    fn new(size: usize) -> Self {
        Freelist {
            size,
            blocks: Mutex::new(Vec::new()),
            max: DEFAULT_MAX_PER_CLASS,
            slack: DEFAULT_SLACK,
            lowwater: AtomicUsize::new(0),
        }
    }

    fn acquire(&self) -> Option<Vec<u8>> {
        let mut blocks = self.blocks.lock().unwrap();
        let block = blocks.pop();
        self.lowwater.fetch_min(blocks.len(), Ordering::Relaxed);
        block
    }

    fn release(&self, block: Vec<u8>) {
        debug_assert_eq!(block.len(), self.size);
        let mut blocks = self.blocks.lock().unwrap();
        if blocks.len() < self.max {
            blocks.push(block);
        }
        // Beyond `max` the block is simply dropped — the pool does not
        // grow without bound.
    }

    /// Release all but `slack` of the unused excess observed since the
    /// last sweep.
    fn sweep(&self) {
        let mut blocks = self.blocks.lock().unwrap();
        let low = self.lowwater.swap(blocks.len(), Ordering::Relaxed);
        let release_count = low.saturating_sub(self.slack);
        for _ in 0..release_count.min(blocks.len()) {
            blocks.pop();
        }
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }
}

struct Registry {
    lists: [Freelist; SIZE_CLASSES.len()],
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry {
        lists: std::array::from_fn(|i| Freelist::new(SIZE_CLASSES[i])),
    })
}

fn find(size: usize) -> Option<&'static Freelist> {
    registry().lists.iter().find(|f| f.size == size)
}

/// Take a block of exactly `size` bytes from the matching freelist, if one
/// exists and has idle storage. Callers fall back to a fresh allocation on
/// `None`.
pub fn acquire(size: usize) -> Option<Vec<u8>> {
    find(size).and_then(Freelist::acquire)
}

/// Return a block to its size class's freelist. A no-op (the block is
/// simply dropped) if `size` is not one of `SIZE_CLASSES`.
pub fn release(size: usize, block: Vec<u8>) {
    if let Some(fl) = find(size) {
        fl.release(block);
    }
}

/// Sweep every size class, trimming idle stock down to `slack` wherever it
/// sat unused for the whole tracking period. The event loop calls this
/// periodically (§5 "sweeping is invoked on the loop thread").
pub fn sweep_all() {
    for fl in &registry().lists {
        fl.sweep();
    }
}
