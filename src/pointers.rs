use std::{
    cell::Cell,
    fmt,
    marker::PhantomData,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use log::debug;

use crate::{
    allocator,
    counter::{AccessControl, Counter, ReferenceCounting},
    error::{Access, Error, Result},
    stats::record,
};

/// The payload and its count cell. Always created and released together.
struct RawShared<T>
{
    payload: NonNull<T>,
    counter: NonNull<Counter>,
    // Every alias can write, so `T` must be invariant.
    _marker: PhantomData<Cell<T>>,
}

impl<T> Clone for RawShared<T>
{
    fn clone(&self) -> Self { *self }
}
impl<T> Copy for RawShared<T> {}

impl<T> RawShared<T>
{
    fn new(payload: NonNull<T>, counter: NonNull<Counter>) -> Self
    {
        Self {
            payload,
            counter,
            _marker: PhantomData,
        }
    }

    fn counter(&self) -> &Counter { unsafe { self.counter.as_ref() } }

    /// Give up one reference, freeing payload and counter if it was the last.
    ///
    /// # Safety
    /// The caller must own one of the counted references and not use it again.
    unsafe fn release(self)
    {
        if self.counter().count() == 1 {
            allocator::release_counter(self.counter);
            allocator::release(self.payload);
        } else {
            self.counter().decrement();
        }
    }
}

/// Shared, reference counted ownership of one heap allocated value.
///
/// Every handle aliasing the same value shares one count cell; the handle
/// that brings the count to zero frees both. Handles can be empty, in which
/// case accessors fail with `Error::NullAccess`.
///
/// Access is shared rather than copy-on-write: a `Writing` guard obtained
/// through any alias mutates the value every alias sees. Call `detach` to opt
/// out of sharing.
///
/// The count is not synchronized, so handles are neither `Send` nor `Sync`.
///
/// `Shared<T>` is invariant in `T`: a handle to a `'static` borrow cannot be
/// viewed as a handle to a shorter one, since writes through it would be
/// visible to the original.
///
/// ```compile_fail
/// use sharedref::Shared;
///
/// let a: Shared<&'static str> = Shared::new("static").unwrap();
/// {
///     let s = String::from("short-lived");
///     let b: Shared<&str> = a.clone();
///     *b.write().unwrap() = s.as_str();
/// }
/// println!("{}", *a.read().unwrap());
/// ```
pub struct Shared<T>
{
    raw: Option<RawShared<T>>,
}

#[allow(dead_code)]
impl<T> Shared<T>
{
    /// An empty handle.
    pub const fn null() -> Self { Self { raw: None } }

    /// Move `value` onto the heap and share it.
    pub fn new(value: T) -> Result<Self>
    {
        let payload = allocator::allocate(value)?;
        Self::guard_counter(payload)
    }

    /// Take ownership of an existing heap allocation.
    ///
    /// If the count cell cannot be allocated, `it` is dropped before the
    /// error is returned.
    pub fn adopt(it: Box<T>) -> Result<Self>
    {
        let payload = allocator::register(NonNull::from(Box::leak(it)));
        Self::guard_counter(payload)
    }

    fn guard_counter(payload: NonNull<T>) -> Result<Self>
    {
        match allocator::allocate_counter() {
            Ok(counter) => Ok(Self {
                raw: Some(RawShared::new(payload, counter)),
            }),
            Err(e) => {
                unsafe { allocator::release(payload) };
                Err(e)
            }
        }
    }

    /// Share a heap allocation the caller still holds a pointer to.
    ///
    /// `ptr` is left untouched. If the count cell cannot be allocated
    /// nothing is released and the caller keeps ownership of `ptr`.
    ///
    /// # Safety
    /// `ptr` must come from `Box::into_raw`. On success ownership passes to
    /// the handle: the caller must not free `ptr`, wrap it a second time, or
    /// access it while a guard of the handle is alive.
    pub unsafe fn wrap_raw(ptr: NonNull<T>) -> Result<Self>
    {
        let counter = allocator::allocate_counter()?;
        Ok(Self {
            raw: Some(RawShared::new(allocator::register(ptr), counter)),
        })
    }

    /// Move out of this handle, leaving it empty. The count is unchanged.
    pub fn take(&mut self) -> Self { Self { raw: self.raw.take() } }

    /// Make this handle alias `source`.
    ///
    /// No-op if both already share a count cell. Otherwise the current
    /// binding is released first, exactly as `drop` would.
    pub fn copy_from(&mut self, source: &Self) -> &mut Self
    {
        if !self.ptr_eq(source) {
            self.reset();
            if let Some(raw) = source.raw {
                raw.counter().increment();
                self.raw = Some(raw);
            }
        }
        self
    }

    /// Steal the binding of `source`, leaving it empty.
    ///
    /// No-op if both already share a count cell. Otherwise the current
    /// binding is released first, exactly as `drop` would.
    pub fn take_from(&mut self, source: &mut Self) -> &mut Self
    {
        if !self.ptr_eq(source) {
            self.reset();
            self.raw = source.raw.take();
        }
        self
    }

    /// Release the binding and become empty.
    pub fn reset(&mut self)
    {
        if let Some(raw) = self.raw.take() {
            unsafe { raw.release() }
        }
    }

    /// Number of handles sharing the count cell, or zero if empty.
    pub fn ref_count(&self) -> usize { self.raw.map_or(0, |raw| raw.counter().count()) }

    pub fn is_null(&self) -> bool { self.raw.is_none() }

    /// Whether both handles share a count cell. Two empty handles compare
    /// equal.
    pub fn ptr_eq(&self, other: &Self) -> bool
    {
        self.raw.map(|raw| raw.counter) == other.raw.map(|raw| raw.counter)
    }

    /// Borrow the value for reading.
    pub fn read(&self) -> Result<Reading<'_, T>>
    {
        let raw = self.raw.ok_or(Error::NullAccess(Access::Dereference))?;
        if raw.counter().try_lock_shared() {
            Ok(Reading {
                raw,
                _phantom: PhantomData,
            })
        } else {
            Err(Error::Borrowed)
        }
    }

    /// Borrow the value for writing. The change is visible through every
    /// alias.
    pub fn write(&self) -> Result<Writing<'_, T>>
    {
        let raw = self.raw.ok_or(Error::NullAccess(Access::Dereference))?;
        if raw.counter().try_lock_exclusive() {
            Ok(Writing {
                raw,
                _phantom: PhantomData,
            })
        } else {
            Err(Error::Borrowed)
        }
    }

    /// Address of the value, for member access.
    ///
    /// Dereferencing the pointer is only sound while no `Writing` guard of
    /// any alias is alive, and only until the last alias is released.
    pub fn as_ptr(&self) -> Result<NonNull<T>>
    {
        self.raw
            .map(|raw| raw.payload)
            .ok_or(Error::NullAccess(Access::Member))
    }

    /// Take the value out if this is the only handle. Returns the handle
    /// unchanged if it is empty or aliased.
    pub fn try_unwrap(mut self) -> std::result::Result<T, Self>
    {
        match self.raw {
            Some(raw) if raw.counter().count() == 1 => {
                self.raw = None;
                unsafe {
                    allocator::release_counter(raw.counter);
                    Ok(allocator::take(raw.payload))
                }
            }
            _ => Err(self),
        }
    }
}

impl<T: Clone> Shared<T>
{
    /// Copy-on-write detach.
    ///
    /// If this handle is empty or already the sole owner, nothing happens and
    /// `Ok(false)` is returned. Otherwise the value is deep-copied into a new
    /// allocation with its own count of one, this handle is rebound to it,
    /// and the old count drops by one.
    ///
    /// On error the handle and the old count are left as they were.
    pub fn detach(&mut self) -> Result<bool>
    {
        let raw = match self.raw {
            Some(raw) if raw.counter().count() > 1 => raw,
            _ => return Ok(false),
        };

        let copy = T::clone(&*self.read()?);
        let payload = allocator::allocate(copy)?;
        let counter = match allocator::allocate_counter() {
            Ok(counter) => counter,
            Err(e) => {
                unsafe { allocator::release(payload) };
                return Err(e);
            }
        };

        let left = raw.counter().decrement();
        self.raw = Some(RawShared::new(payload, counter));
        record(|s| s.detaches += 1);
        debug!("detached {:p} from {:p}, {} aliases left", payload, raw.payload, left);
        Ok(true)
    }
}

impl<T> Default for Shared<T>
{
    fn default() -> Self { Self::null() }
}

impl<T> Clone for Shared<T>
{
    /// Another handle to the same value. Increments the count.
    fn clone(&self) -> Self
    {
        if let Some(raw) = self.raw {
            raw.counter().increment();
        }
        Self { raw: self.raw }
    }
}

impl<T> Drop for Shared<T>
{
    fn drop(&mut self) { self.reset() }
}

impl<T> fmt::Debug for Shared<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Shared")
            .field("payload", &self.raw.map(|raw| raw.payload))
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Shared borrow of the value behind a `Shared`.
///
/// While any `Reading` is alive, `write` fails on every alias.
pub struct Reading<'a, T>
{
    raw: RawShared<T>,
    _phantom: PhantomData<&'a T>,
}

impl<'a, T> Deref for Reading<'a, T>
{
    type Target = T;

    fn deref(&self) -> &Self::Target { unsafe { self.raw.payload.as_ref() } }
}

impl<'a, T> Clone for Reading<'a, T>
{
    /// Another shared borrow of the same value.
    ///
    /// # Panics
    /// If the number of live readers would overflow `isize`.
    fn clone(&self) -> Self
    {
        if !self.raw.counter().try_lock_shared() {
            panic!("too many readers")
        }
        Reading {
            raw: self.raw,
            _phantom: PhantomData,
        }
    }
}

impl<'a, T> Drop for Reading<'a, T>
{
    fn drop(&mut self) { unsafe { self.raw.counter().unlock_shared() } }
}

impl<'a, T> fmt::Debug for Reading<'a, T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_tuple("Reading").field(&self.raw.payload).finish()
    }
}

/// Exclusive borrow of the value behind a `Shared`.
///
/// While a `Writing` is alive, `read`, `write` and `detach` fail on every
/// alias.
pub struct Writing<'a, T>
{
    raw: RawShared<T>,
    _phantom: PhantomData<&'a mut T>,
}

impl<'a, T> Deref for Writing<'a, T>
{
    type Target = T;

    fn deref(&self) -> &Self::Target { unsafe { self.raw.payload.as_ref() } }
}

impl<'a, T> DerefMut for Writing<'a, T>
{
    fn deref_mut(&mut self) -> &mut Self::Target { unsafe { self.raw.payload.as_mut() } }
}

impl<'a, T> Drop for Writing<'a, T>
{
    fn drop(&mut self) { unsafe { self.raw.counter().unlock_exclusive() } }
}

impl<'a, T> fmt::Debug for Writing<'a, T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_tuple("Writing").field(&self.raw.payload).finish()
    }
}
