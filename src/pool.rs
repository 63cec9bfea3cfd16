// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Where a [`PooledSmallList`](crate::PooledSmallList) gets memory from once its inline region
//! is full: a [`BufferPool`] for rented buffers, and the global allocator for raw ones.

use alloc::alloc::Layout;
use alloc::vec::Vec;

use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::{align_of, size_of, ManuallyDrop};
use core::ptr::NonNull;

#[cfg(target_has_atomic = "ptr")]
use alloc::sync::Arc;

#[cfg(feature = "std")]
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::CollectionAllocErr;

/// A source of reusable buffers.
///
/// Implementations must be safe to share between threads if the lists using them are; a single
/// list never calls into its pool concurrently.
pub trait BufferPool<T> {
    /// Returns an empty buffer whose capacity is at least `min_capacity`.
    fn rent(&self, min_capacity: usize) -> Vec<T>;

    /// Takes back a buffer obtained from [`rent`](Self::rent). The buffer is empty.
    fn give_back(&self, buffer: Vec<T>);
}

impl<T, P: BufferPool<T> + ?Sized> BufferPool<T> for &P {
    #[inline]
    fn rent(&self, min_capacity: usize) -> Vec<T> {
        (**self).rent(min_capacity)
    }

    #[inline]
    fn give_back(&self, buffer: Vec<T>) {
        (**self).give_back(buffer)
    }
}

#[cfg(target_has_atomic = "ptr")]
impl<T, P: BufferPool<T> + ?Sized> BufferPool<T> for Arc<P> {
    #[inline]
    fn rent(&self, min_capacity: usize) -> Vec<T> {
        (**self).rent(min_capacity)
    }

    #[inline]
    fn give_back(&self, buffer: Vec<T>) {
        (**self).give_back(buffer)
    }
}

/// A pool that allocates every buffer fresh and frees it when it comes back.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Unpooled;

impl<T> BufferPool<T> for Unpooled {
    #[inline]
    fn rent(&self, min_capacity: usize) -> Vec<T> {
        Vec::with_capacity(min_capacity)
    }

    #[inline]
    fn give_back(&self, buffer: Vec<T>) {
        drop(buffer);
    }
}

/// Counters kept by an [`ArrayPool`].
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Calls to `rent`.
    pub rents: u64,
    /// Rents served from a retained buffer.
    pub hits: u64,
    /// Buffers handed back and kept.
    pub returns: u64,
    /// Buffers handed back and freed because their bucket was full.
    pub discarded: u64,
}

#[cfg(feature = "std")]
struct PoolInner<T> {
    /// `buckets[k]` holds buffers whose capacity is at least `1 << k`.
    buckets: Vec<Vec<Vec<T>>>,
    stats: PoolStats,
}

/// A thread-safe pool of power-of-two sized buffers.
///
/// Buffers are rented with their capacity rounded up to the next power of two, so a buffer that
/// comes back can serve any later request of the same size class.
#[cfg(feature = "std")]
pub struct ArrayPool<T> {
    inner: Mutex<PoolInner<T>>,
    max_retained: usize,
}

#[cfg(feature = "std")]
impl<T> ArrayPool<T> {
    /// Buffers kept per size class by [`ArrayPool::new`].
    pub const DEFAULT_MAX_RETAINED: usize = 32;

    pub fn new() -> Self {
        Self::with_max_retained(Self::DEFAULT_MAX_RETAINED)
    }

    /// Creates a pool that keeps at most `max_retained` idle buffers per size class.
    pub fn with_max_retained(max_retained: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                buckets: Vec::new(),
                stats: PoolStats::default(),
            }),
            max_retained,
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, PoolInner<T>> {
        // The pool holds no invariant a panicking thread could have broken halfway.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> PoolStats {
        self.lock().stats
    }

    /// Number of idle buffers currently held.
    pub fn retained(&self) -> usize {
        self.lock().buckets.iter().map(Vec::len).sum()
    }

    /// Frees every idle buffer.
    pub fn trim(&self) {
        self.lock().buckets.clear();
    }
}

#[cfg(feature = "std")]
impl<T> Default for ArrayPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl<T> Debug for ArrayPool<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ArrayPool")
            .field("max_retained", &self.max_retained)
            .field("retained", &inner.buckets.iter().map(Vec::len).sum::<usize>())
            .field("stats", &inner.stats)
            .finish()
    }
}

#[cfg(feature = "std")]
impl<T> BufferPool<T> for ArrayPool<T> {
    fn rent(&self, min_capacity: usize) -> Vec<T> {
        let Some(capacity) = min_capacity.max(1).checked_next_power_of_two() else {
            // Too large for any size class; let `Vec` report the overflow.
            return Vec::with_capacity(min_capacity);
        };
        let bucket = capacity.trailing_zeros() as usize;
        {
            let mut inner = self.lock();
            inner.stats.rents += 1;
            if let Some(buffer) = inner.buckets.get_mut(bucket).and_then(Vec::pop) {
                inner.stats.hits += 1;
                trace_event!(target: "smalllist::pool", capacity = buffer.capacity(), "rent (hit)");
                return buffer;
            }
        }
        trace_event!(target: "smalllist::pool", capacity, "rent (miss)");
        Vec::with_capacity(capacity)
    }

    fn give_back(&self, mut buffer: Vec<T>) {
        buffer.clear();
        let capacity = buffer.capacity();
        if capacity == 0 || size_of::<T>() == 0 {
            return;
        }
        // floor(log2(capacity)): every buffer in bucket k can hold `1 << k` elements
        let bucket = (usize::BITS - 1 - capacity.leading_zeros()) as usize;
        let mut inner = self.lock();
        if inner.buckets.len() <= bucket {
            inner.buckets.resize_with(bucket + 1, Vec::new);
        }
        if inner.buckets[bucket].len() < self.max_retained {
            inner.buckets[bucket].push(buffer);
            inner.stats.returns += 1;
            trace_event!(target: "smalllist::pool", capacity, "return");
        } else {
            inner.stats.discarded += 1;
            trace_event!(target: "smalllist::pool", capacity, "return (discarded)");
        }
    }
}

/// Allocates uninitialized room for `capacity` values of `T` from the global allocator.
///
/// `T` must not be zero-sized and `capacity` must be non zero.
pub(crate) fn alloc_array<T>(capacity: usize) -> Result<NonNull<T>, CollectionAllocErr> {
    debug_assert!(size_of::<T>() != 0 && capacity != 0);
    let layout = Layout::array::<T>(capacity).map_err(|_| CollectionAllocErr::CapacityOverflow)?;
    if layout.size() > isize::MAX as usize {
        return Err(CollectionAllocErr::CapacityOverflow);
    }
    // SAFETY: `layout` has a non zero size
    let ptr = unsafe { alloc::alloc::alloc(layout) } as *mut T;
    trace_event!(target: "smalllist::pool", bytes = layout.size(), "alloc");
    NonNull::new(ptr).ok_or(CollectionAllocErr::AllocErr { layout })
}

/// Frees memory obtained from [`alloc_array`].
///
/// # Safety
///
/// `ptr` must come from `alloc_array::<T>(capacity)` with the same `capacity`, and must not be
/// used afterwards.
pub(crate) unsafe fn free_array<T>(ptr: NonNull<T>, capacity: usize) {
    let size = capacity * size_of::<T>();
    trace_event!(target: "smalllist::pool", bytes = size, "free");
    // SAFETY: the layout matches the one used by `alloc_array`
    unsafe {
        alloc::alloc::dealloc(
            ptr.cast().as_ptr(),
            Layout::from_size_align_unchecked(size, align_of::<T>()),
        );
    }
}

/// A raw allocation handed out by
/// [`PooledSmallList::transfer_ownership_unmanaged`](crate::PooledSmallList::transfer_ownership_unmanaged).
///
/// It owns its elements and frees the allocation when dropped. Call
/// [`into_raw_parts`](Self::into_raw_parts) to take over the release obligation yourself.
pub struct UnmanagedBuffer<T> {
    ptr: NonNull<T>,
    len: usize,
    capacity: usize,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for UnmanagedBuffer<T> {}
unsafe impl<T: Sync> Sync for UnmanagedBuffer<T> {}

impl<T> UnmanagedBuffer<T> {
    /// Reassembles a buffer from the parts returned by [`into_raw_parts`](Self::into_raw_parts).
    ///
    /// # Safety
    ///
    /// The parts must come from `into_raw_parts` (or from a `PooledSmallList` in the unmanaged
    /// heap regime), `len <= capacity`, and the first `len` elements must be initialized.
    #[inline]
    pub unsafe fn from_raw_parts(ptr: NonNull<T>, len: usize, capacity: usize) -> Self {
        debug_assert!(len <= capacity);
        Self {
            ptr,
            len,
            capacity,
            _marker: PhantomData,
        }
    }

    /// Gives up ownership, returning `(ptr, len, capacity)`.
    ///
    /// The allocation must be released by passing the parts back to
    /// [`from_raw_parts`](Self::from_raw_parts) and dropping the result.
    #[inline]
    pub fn into_raw_parts(self) -> (NonNull<T>, usize, usize) {
        let this = ManuallyDrop::new(self);
        (this.ptr, this.len, this.capacity)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` elements are initialized
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: see above
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> Drop for UnmanagedBuffer<T> {
    fn drop(&mut self) {
        // SAFETY: we own the elements and the allocation
        unsafe {
            core::ptr::drop_in_place(self.as_mut_slice());
            free_array(self.ptr, self.capacity);
        }
    }
}

impl<T> core::ops::Deref for UnmanagedBuffer<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> core::ops::DerefMut for UnmanagedBuffer<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Debug> Debug for UnmanagedBuffer<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("UnmanagedBuffer").field(&self.as_slice()).finish()
    }
}
