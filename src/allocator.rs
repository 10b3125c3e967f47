use std::{
    alloc::{self, Layout},
    ptr::NonNull,
};

use log::{debug, trace, warn};

use crate::{
    counter::Counter,
    error::{Allocation, Error, Result},
    stats::record,
};

/// Heap allocation that reports failure instead of aborting.
///
/// The layout matches what `Box<T>` uses, so every pointer handed out here is
/// released through `Box::from_raw`.
fn try_allocate<T>(what: Allocation) -> Result<NonNull<T>>
{
    let layout = Layout::new::<T>();
    let failed = Error::AllocationFailed {
        what,
        size: layout.size(),
    };

    if injection::trip() {
        debug!("injected allocation failure for {}", what);
        record(|s| s.failed_allocations += 1);
        return Err(failed);
    }

    if layout.size() == 0 {
        return Ok(NonNull::dangling());
    }

    match NonNull::new(unsafe { alloc::alloc(layout) } as *mut T) {
        Some(ptr) => Ok(ptr),
        None => {
            warn!("{}", failed);
            record(|s| s.failed_allocations += 1);
            Err(failed)
        }
    }
}

/// Move `value` onto the heap. On failure `value` is dropped.
pub(crate) fn allocate<T>(value: T) -> Result<NonNull<T>>
{
    let ptr = try_allocate::<T>(Allocation::Payload)?;
    unsafe { ptr.as_ptr().write(value) };
    record(|s| s.payloads_allocated += 1);
    trace!("allocate payload {:p}", ptr);
    Ok(ptr)
}

/// Take over a payload the caller already placed on the heap.
pub(crate) fn register<T>(ptr: NonNull<T>) -> NonNull<T>
{
    record(|s| s.payloads_allocated += 1);
    trace!("register payload {:p}", ptr);
    ptr
}

/// Allocate a fresh count cell holding one reference.
pub(crate) fn allocate_counter() -> Result<NonNull<Counter>>
{
    let ptr = try_allocate::<Counter>(Allocation::Counter)?;
    unsafe { ptr.as_ptr().write(Counter::new()) };
    record(|s| s.counters_allocated += 1);
    trace!("allocate counter {:p}", ptr);
    Ok(ptr)
}

/// Drop and deallocate a payload.
///
/// # Safety
/// `ptr` must come from `allocate`, `register` or `Box::into_raw` and must not
/// be used again.
pub(crate) unsafe fn release<T>(ptr: NonNull<T>)
{
    trace!("release payload {:p}", ptr);
    drop(Box::from_raw(ptr.as_ptr()));
    record(|s| s.payloads_released += 1);
}

/// Deallocate a payload and hand back its value.
///
/// # Safety
/// Same as `release`.
pub(crate) unsafe fn take<T>(ptr: NonNull<T>) -> T
{
    trace!("take payload {:p}", ptr);
    let it = *Box::from_raw(ptr.as_ptr());
    record(|s| s.payloads_released += 1);
    it
}

/// Deallocate a count cell.
///
/// # Safety
/// `ptr` must come from `allocate_counter` and must not be used again.
pub(crate) unsafe fn release_counter(ptr: NonNull<Counter>)
{
    trace!("release counter {:p}", ptr);
    drop(Box::from_raw(ptr.as_ptr()));
    record(|s| s.counters_released += 1);
}

#[cfg(any(test, feature = "fault-injection"))]
pub mod injection
{
    //! Deterministic allocation failures for exercising error paths.

    use std::cell::Cell;

    thread_local! {
        static COUNTDOWN: Cell<Option<usize>> = Cell::new(None);
    }

    /// Let `n` allocations on this thread succeed, then fail the next one.
    ///
    /// The trap is one-shot; it disarms itself after firing.
    pub fn fail_after(n: usize) { COUNTDOWN.with(|c| c.set(Some(n))) }

    /// Clear a pending trap.
    pub fn disarm() { COUNTDOWN.with(|c| c.set(None)) }

    /// Whether a trap is still waiting to fire.
    pub fn is_armed() -> bool { COUNTDOWN.with(Cell::get).is_some() }

    pub(crate) fn trip() -> bool
    {
        COUNTDOWN.with(|c| match c.get() {
            None => false,
            Some(0) => {
                c.set(None);
                true
            }
            Some(n) => {
                c.set(Some(n - 1));
                false
            }
        })
    }
}

#[cfg(not(any(test, feature = "fault-injection")))]
mod injection
{
    #[inline(always)]
    pub(crate) fn trip() -> bool { false }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::stats::get_stats;

    #[test]
    fn allocate_and_release()
    {
        let before = get_stats();
        let p = allocate(String::from("payload")).unwrap();
        assert_eq!(unsafe { p.as_ref() }, "payload");
        assert_eq!(get_stats().live_payloads(), before.live_payloads() + 1);
        unsafe { release(p) };
        assert_eq!(get_stats().live_payloads(), before.live_payloads());
    }

    #[test]
    fn zero_sized_payload()
    {
        let p = allocate(()).unwrap();
        unsafe { release(p) };
    }

    #[test]
    fn injected_failure_fires_once()
    {
        injection::fail_after(1);
        let first = allocate(1u64).unwrap();
        assert_eq!(
            allocate_counter().unwrap_err(),
            Error::AllocationFailed {
                what: Allocation::Counter,
                size: Layout::new::<Counter>().size(),
            }
        );
        assert!(!injection::is_armed());
        let second = allocate_counter().unwrap();
        unsafe {
            release(first);
            release_counter(second);
        }
    }
}
