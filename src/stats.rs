use std::cell::RefCell;

#[cfg(feature = "global")]
use lazy_static::lazy_static;
#[cfg(feature = "global")]
use parking_lot::Mutex;

/// Heap accounting for payloads and count cells, for diagnosing leaks and
/// double frees.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats
{
    /// Payloads placed on the heap, by `adopt`, `wrap_raw` or `detach`.
    pub payloads_allocated: usize,

    /// Payloads dropped and deallocated.
    pub payloads_released: usize,

    /// Count cells allocated.
    pub counters_allocated: usize,

    /// Count cells deallocated.
    pub counters_released: usize,

    /// Allocations that failed, injected or real.
    pub failed_allocations: usize,

    /// Successful copy-on-write detaches.
    pub detaches: usize,
}

#[allow(dead_code)]
impl Stats
{
    /// Payloads currently owned by some handle.
    pub fn live_payloads(&self) -> usize { self.payloads_allocated - self.payloads_released }

    /// Count cells currently owned by some handle.
    pub fn live_counters(&self) -> usize { self.counters_allocated - self.counters_released }

    /// Every allocation has been matched by exactly one release.
    pub fn is_balanced(&self) -> bool
    {
        self.live_payloads() == 0 && self.live_counters() == 0
    }

    fn merge(&mut self, other: &Stats)
    {
        self.payloads_allocated += other.payloads_allocated;
        self.payloads_released += other.payloads_released;
        self.counters_allocated += other.counters_allocated;
        self.counters_released += other.counters_released;
        self.failed_allocations += other.failed_allocations;
        self.detaches += other.detaches;
    }
}

struct LocalLedger(Stats);

thread_local! {
    static LOCAL_LEDGER: RefCell<LocalLedger> = RefCell::new(LocalLedger(Stats::default()));
}

#[cfg(feature = "global")]
lazy_static! {
    static ref GLOBAL_LEDGER: Mutex<Stats> = Mutex::new(Stats::default());
}

#[cfg(feature = "global")]
impl Drop for LocalLedger
{
    fn drop(&mut self) { GLOBAL_LEDGER.lock().merge(&self.0) }
}

/// Statistics for handles operated on by the current thread.
pub fn get_stats() -> Stats { LOCAL_LEDGER.with_borrow(|l| l.0) }

/// Statistics folded in from every thread that has exited.
#[cfg(feature = "global")]
pub fn get_global_stats() -> Stats { *GLOBAL_LEDGER.lock() }

// Handles stored in other thread-locals may be released after the ledger is
// gone; those events are not recorded.
pub(crate) fn record(f: impl FnOnce(&mut Stats))
{
    let _ = LOCAL_LEDGER.try_with(|l| f(&mut l.borrow_mut().0));
}
