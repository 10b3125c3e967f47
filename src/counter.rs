use std::cell::Cell;

pub(crate) const COUNTER_INIT: usize = 1;

pub(crate) trait ReferenceCounting
{
    fn count(&self) -> usize;
    fn increment(&self);
    fn decrement(&self) -> usize;
}

pub(crate) trait AccessControl
{
    fn try_lock_shared(&self) -> bool;
    fn try_lock_exclusive(&self) -> bool;
    unsafe fn unlock_shared(&self);
    unsafe fn unlock_exclusive(&self);
}

/// The count cell shared by every handle aliasing one payload.
///
/// `access` tracks live guards: `0` is unborrowed, a positive number is the
/// number of readers, `-1` is a single writer.
#[derive(Debug)]
pub(crate) struct Counter
{
    count: Cell<usize>,
    access: Cell<isize>,
}

impl Counter
{
    pub(crate) fn new() -> Self
    {
        Self {
            count: Cell::new(COUNTER_INIT),
            access: Cell::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_unlocked(&self) -> bool { self.access.get() == 0 }
}

impl ReferenceCounting for Counter
{
    fn count(&self) -> usize { self.count.get() }

    fn increment(&self)
    {
        // Same policy as `Rc`: wrapping the count would free a live payload.
        match self.count.get().checked_add(1) {
            Some(n) => self.count.set(n),
            None => std::process::abort(),
        }
    }

    fn decrement(&self) -> usize
    {
        let n = self.count.get();
        if n == 0 {
            panic!("decrement on dead reference counter");
        }
        self.count.set(n - 1);
        n - 1
    }
}

impl AccessControl for Counter
{
    fn try_lock_shared(&self) -> bool
    {
        let n = self.access.get();
        if n >= 0 && n < isize::MAX {
            self.access.set(n + 1);
            true
        } else {
            false
        }
    }

    fn try_lock_exclusive(&self) -> bool
    {
        if self.access.get() == 0 {
            self.access.set(-1);
            true
        } else {
            false
        }
    }

    unsafe fn unlock_shared(&self)
    {
        if self.access.get() < 0 {
            panic!("unlock_shared on exclusive-locked counter");
        } else if self.access.get() == 0 {
            panic!("unlock_shared on unlocked counter");
        }
        self.access.set(self.access.get() - 1);
    }

    unsafe fn unlock_exclusive(&self)
    {
        if self.access.get() >= 1 {
            panic!("unlock_exclusive on share-locked counter");
        } else if self.access.get() == 0 {
            panic!("unlock_exclusive on unlocked counter");
        }
        self.access.set(0);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn counting()
    {
        let c = Counter::new();
        assert_eq!(c.count(), 1);
        c.increment();
        c.increment();
        assert_eq!(c.count(), 3);
        assert_eq!(c.decrement(), 2);
        assert_eq!(c.count(), 2);
    }

    #[test]
    fn readers_exclude_writer()
    {
        let c = Counter::new();
        assert!(c.try_lock_shared());
        assert!(c.try_lock_shared());
        assert!(!c.try_lock_exclusive());
        unsafe {
            c.unlock_shared();
            c.unlock_shared();
        }
        assert!(c.try_lock_exclusive());
        assert!(!c.try_lock_shared());
        assert!(!c.try_lock_exclusive());
        unsafe { c.unlock_exclusive() }
        assert!(c.is_unlocked());
    }

    #[test]
    #[should_panic(expected = "unlock_shared on unlocked counter")]
    fn unbalanced_unlock()
    {
        let c = Counter::new();
        unsafe { c.unlock_shared() }
    }
}
