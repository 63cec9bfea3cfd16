// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A contiguous list that starts in an inline region and grows into raw or pooled memory.

use alloc::vec::Vec;

use core::fmt::Debug;
use core::hash::{Hash, Hasher};
use core::mem::{self, needs_drop, size_of, MaybeUninit};
use core::ptr::{self, copy, copy_nonoverlapping, NonNull};

#[cfg(feature = "bytes")]
use bytes::{buf::UninitSlice, BufMut};
#[cfg(feature = "malloc_size_of")]
use malloc_size_of::{MallocShallowSizeOf, MallocSizeOf, MallocSizeOfOps};
#[cfg(feature = "std")]
use std::io;

use crate::pool::{alloc_array, free_array};
use crate::{infallible, BufferPool, CollectionAllocErr, ListError, UnmanagedBuffer, Unpooled};

/// Largest allocation, in bytes, served from the raw heap. Anything bigger is rented from the
/// pool instead.
pub const MAX_UNMANAGED_BYTES: usize = i32::MAX as usize;

/// Which memory currently backs a [`PooledSmallList`].
///
/// A list only moves forward through these under growth (`Inlined` first); it returns to
/// `Inlined` through [`dispose`](PooledSmallList::dispose) or an ownership transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    /// The inline region embedded in the list.
    Inlined,
    /// A raw allocation from the global allocator. Only used for element types without drop
    /// glue.
    UnmanagedHeap,
    /// A buffer rented from the list's [`BufferPool`].
    ArrayPool,
}

enum Rental<T> {
    Inlined,
    Unmanaged { ptr: NonNull<T>, capacity: usize },
    // The elements live in the spare capacity; the vector's own length stays 0 until the buffer
    // is handed out.
    Pooled(Vec<T>),
}

/// A list with one contiguous view over an inline region of `N` elements, a raw allocation,
/// or a buffer rented from `P`.
///
/// When the view is full the capacity is rounded up to the next power of two. Element types
/// without drop glue get a raw allocation while it stays under [`MAX_UNMANAGED_BYTES`];
/// everything else rents from the pool, and the buffer it replaces is handed back.
///
/// Whatever backs the list is released exactly once: by [`dispose`](Self::dispose), by drop, or
/// by the caller of [`transfer_ownership`](Self::transfer_ownership) /
/// [`transfer_ownership_unmanaged`](Self::transfer_ownership_unmanaged). Disposing resets the
/// list to an empty inline state, so disposing again is harmless.
///
/// ```
/// use smalllist::{PooledSmallList, Regime};
///
/// let mut list: PooledSmallList<u32, 4> = PooledSmallList::new();
/// list.extend_from_slice(&[1, 2, 3, 4]);
/// assert_eq!(list.regime(), Regime::Inlined);
///
/// list.push(5);
/// assert_eq!(list.regime(), Regime::UnmanagedHeap);
/// assert_eq!(list.capacity(), 8);
/// assert_eq!(&*list, &[1, 2, 3, 4, 5]);
///
/// list.dispose();
/// assert!(list.is_empty());
/// assert_eq!(list.regime(), Regime::Inlined);
/// ```
pub struct PooledSmallList<T, const N: usize, P: BufferPool<T> = Unpooled> {
    len: usize,
    inline: MaybeUninit<[T; N]>,
    rental: Rental<T>,
    pool: P,
}

unsafe impl<T: Send, const N: usize, P: BufferPool<T> + Send> Send for PooledSmallList<T, N, P> {}
unsafe impl<T: Sync, const N: usize, P: BufferPool<T> + Sync> Sync for PooledSmallList<T, N, P> {}

impl<T, const N: usize, P: BufferPool<T> + Default> PooledSmallList<T, N, P> {
    #[inline]
    pub fn new() -> Self {
        Self::new_in(P::default())
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, P::default())
    }
}

impl<T, const N: usize, P: BufferPool<T>> PooledSmallList<T, N, P> {
    #[inline]
    pub const fn new_in(pool: P) -> Self {
        Self {
            len: 0,
            inline: MaybeUninit::uninit(),
            rental: Rental::Inlined,
            pool,
        }
    }

    pub fn with_capacity_in(capacity: usize, pool: P) -> Self {
        let mut this = Self::new_in(pool);
        if capacity > Self::inline_size() {
            infallible(this.try_grow(capacity, 0, 0));
        }
        this
    }

    pub fn from_iter_in<I: IntoIterator<Item = T>>(iterable: I, pool: P) -> Self {
        let mut this = Self::new_in(pool);
        this.extend(iterable);
        this
    }

    #[inline]
    const fn is_zst() -> bool {
        size_of::<T>() == 0
    }

    #[inline]
    pub const fn inline_size() -> usize {
        if Self::is_zst() {
            usize::MAX
        } else {
            N
        }
    }

    /// Whether growing to `capacity` elements should use a raw allocation.
    #[inline]
    pub(crate) fn fits_unmanaged(capacity: usize) -> bool {
        !needs_drop::<T>()
            && capacity
                .checked_mul(size_of::<T>())
                .is_some_and(|bytes| bytes <= MAX_UNMANAGED_BYTES)
    }

    #[inline]
    pub fn pool(&self) -> &P {
        &self.pool
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        match &self.rental {
            Rental::Inlined => Self::inline_size(),
            Rental::Unmanaged { capacity, .. } => *capacity,
            Rental::Pooled(buffer) => buffer.capacity(),
        }
    }

    #[inline]
    pub fn regime(&self) -> Regime {
        Self::regime_of(&self.rental)
    }

    #[inline]
    fn regime_of(rental: &Rental<T>) -> Regime {
        match rental {
            Rental::Inlined => Regime::Inlined,
            Rental::Unmanaged { .. } => Regime::UnmanagedHeap,
            Rental::Pooled(_) => Regime::ArrayPool,
        }
    }

    #[inline]
    pub fn is_inlined(&self) -> bool {
        matches!(self.rental, Rental::Inlined)
    }

    #[inline]
    pub fn is_unmanaged_heap(&self) -> bool {
        matches!(self.rental, Rental::Unmanaged { .. })
    }

    #[inline]
    pub fn is_array_pool(&self) -> bool {
        matches!(self.rental, Rental::Pooled(_))
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        match &self.rental {
            Rental::Inlined => self.inline.as_ptr() as *const T,
            Rental::Unmanaged { ptr, .. } => ptr.as_ptr(),
            Rental::Pooled(buffer) => buffer.as_ptr(),
        }
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        match &mut self.rental {
            Rental::Inlined => self.inline.as_mut_ptr() as *mut T,
            Rental::Unmanaged { ptr, .. } => ptr.as_ptr(),
            Rental::Pooled(buffer) => buffer.as_mut_ptr(),
        }
    }

    /// The active view, `len` elements long.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: all the elements in `..len` are initialized
        unsafe { core::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len;
        // SAFETY: see above
        unsafe { core::slice::from_raw_parts_mut(self.as_mut_ptr(), len) }
    }

    /// Hands storage that no longer holds any live element back to where it came from.
    fn release(&self, rental: Rental<T>) {
        match rental {
            Rental::Inlined => {}
            // SAFETY: the allocation came from `alloc_array` with this capacity
            Rental::Unmanaged { ptr, capacity } => unsafe { free_array(ptr, capacity) },
            Rental::Pooled(buffer) => {
                debug_assert!(buffer.is_empty());
                self.pool.give_back(buffer);
            }
        }
    }

    /// Moves the contents to storage for at least `required` elements, leaving `gap`
    /// uninitialized slots at `offset`. `len` is not changed.
    #[cold]
    fn try_grow(&mut self, required: usize, offset: usize, gap: usize) -> Result<(), CollectionAllocErr> {
        let len = self.len;
        debug_assert!(offset <= len);
        debug_assert!(required >= len + gap);
        let new_capacity = required
            .checked_next_power_of_two()
            .ok_or(CollectionAllocErr::CapacityOverflow)?;

        let (new_rental, dst) = if Self::fits_unmanaged(new_capacity) {
            let ptr = alloc_array::<T>(new_capacity)?;
            (
                Rental::Unmanaged {
                    ptr,
                    capacity: new_capacity,
                },
                ptr.as_ptr(),
            )
        } else {
            let mut buffer = self.pool.rent(new_capacity);
            buffer.clear();
            if buffer.capacity() < new_capacity {
                buffer.reserve_exact(new_capacity);
            }
            let dst = buffer.as_mut_ptr();
            (Rental::Pooled(buffer), dst)
        };

        let src = self.as_mut_ptr();
        // SAFETY: the old and new storage are distinct allocations; the new one has room for
        // `len + gap` elements. The moved elements are owned by the new storage from here on.
        unsafe {
            copy_nonoverlapping(src, dst, offset);
            copy_nonoverlapping(src.add(offset), dst.add(offset + gap), len - offset);
        }
        let old = mem::replace(&mut self.rental, new_rental);
        trace_event!(
            target: "smalllist::pooled",
            new_capacity,
            from = ?Self::regime_of(&old),
            to = ?self.regime(),
            "grew"
        );
        self.release(old);
        Ok(())
    }

    #[inline]
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), CollectionAllocErr> {
        // can't overflow since len <= capacity
        if additional > self.capacity() - self.len {
            let required = self
                .len
                .checked_add(additional)
                .ok_or(CollectionAllocErr::CapacityOverflow)?;
            self.try_grow(required, self.len, 0)
        } else {
            Ok(())
        }
    }

    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        infallible(self.try_reserve(additional));
    }

    /// Makes `count` uninitialized slots at `offset`, shifting the tail right. `len` is not
    /// changed; the caller fills the slots and then bumps it.
    fn open_gap(&mut self, offset: usize, count: usize) -> *mut T {
        let len = self.len;
        debug_assert!(offset <= len);
        if count > self.capacity() - len {
            let required = infallible(
                len.checked_add(count)
                    .ok_or(CollectionAllocErr::CapacityOverflow),
            );
            infallible(self.try_grow(required, offset, count));
        } else if offset < len {
            // SAFETY: `len + count <= capacity`
            unsafe {
                let ptr = self.as_mut_ptr().add(offset);
                copy(ptr, ptr.add(count), len - offset);
            }
        }
        // SAFETY: `offset <= len <= capacity`
        unsafe { self.as_mut_ptr().add(offset) }
    }

    /// Appends `value`, growing the view if it is full.
    #[inline]
    pub fn push(&mut self, value: T) {
        let len = self.len;
        if len == self.capacity() {
            self.reserve(1);
        }
        // SAFETY: there is room for one more element at `len`
        unsafe { self.as_mut_ptr().add(len).write(value) };
        self.len = len + 1;
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            None
        } else {
            self.len -= 1;
            // SAFETY: this element was initialized and we just gave up ownership of it
            Some(unsafe { self.as_mut_ptr().add(self.len).read() })
        }
    }

    /// Inserts `value` at `index`, shifting the tail right.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        let len = self.len;
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
        let ptr = self.open_gap(index, 1);
        // SAFETY: `open_gap` left one writable slot at `ptr`
        unsafe { ptr.write(value) };
        self.len = len + 1;
    }

    #[inline]
    pub fn prepend(&mut self, value: T) {
        self.insert(0, value);
    }

    /// Removes and returns the element at `index`, shifting the tail left.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len;
        assert!(index < len, "removal index (is {index}) should be < len (is {len})");
        self.len = len - 1;
        // SAFETY: `index < len`; the element is read out before the tail closes over it
        unsafe {
            let ptr = self.as_mut_ptr().add(index);
            let value = ptr.read();
            copy(ptr.add(1), ptr, len - index - 1);
            value
        }
    }

    /// Drops `count` elements starting at `offset` and closes the gap. Capacity is kept.
    pub fn try_remove_range(&mut self, offset: usize, count: usize) -> Result<(), ListError> {
        let len = self.len;
        if offset > len {
            return Err(ListError::OutOfRange {
                index: offset,
                bound: len + 1,
            });
        }
        if count > len - offset {
            return Err(ListError::OutOfRange {
                index: offset.saturating_add(count) - 1,
                bound: len,
            });
        }
        if count == 0 {
            return Ok(());
        }
        // Only the prefix is counted while the removed elements drop; a panic leaks the tail
        // rather than dropping anything twice.
        self.len = offset;
        // SAFETY: `offset + count <= len`
        unsafe {
            let ptr = self.as_mut_ptr().add(offset);
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(ptr, count));
            copy(ptr.add(count), ptr, len - offset - count);
        }
        self.len = len - count;
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if `offset + count > len`.
    pub fn remove_range(&mut self, offset: usize, count: usize) {
        if let Err(err) = self.try_remove_range(offset, count) {
            panic!("remove_range({offset}, {count}) on a list of len {}: {err}", self.len);
        }
    }

    pub fn truncate(&mut self, len: usize) {
        let old_len = self.len;
        if len < old_len {
            // SAFETY: we set `len` to a smaller value
            // then we drop the previously initialized elements
            unsafe {
                self.len = len;
                ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                    self.as_mut_ptr().add(len),
                    old_len - len,
                ));
            }
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Drops every element and releases the backing storage, leaving an empty inline list.
    ///
    /// Calling it again, or dropping the list afterwards, does nothing more.
    pub fn dispose(&mut self) {
        self.clear();
        let rental = mem::replace(&mut self.rental, Rental::Inlined);
        trace_event!(target: "smalllist::pooled", regime = ?Self::regime_of(&rental), "dispose");
        self.release(rental);
    }

    /// Hands the rented buffer, with the elements in it, to the caller.
    ///
    /// Returns `None` and leaves the list untouched unless it is in the
    /// [`ArrayPool`](Regime::ArrayPool) regime. Otherwise the list is reset to an empty inline
    /// state, and returning the buffer to the pool becomes the caller's job.
    pub fn transfer_ownership(&mut self) -> Option<Vec<T>> {
        match mem::replace(&mut self.rental, Rental::Inlined) {
            Rental::Pooled(mut buffer) => {
                // SAFETY: the first `len` slots of the buffer hold our elements
                unsafe { buffer.set_len(self.len) };
                self.len = 0;
                trace_event!(target: "smalllist::pooled", len = buffer.len(), "transfer pooled buffer");
                Some(buffer)
            }
            other => {
                self.rental = other;
                None
            }
        }
    }

    /// Hands the raw allocation, with the elements in it, to the caller.
    ///
    /// Returns `None` and leaves the list untouched unless it is in the
    /// [`UnmanagedHeap`](Regime::UnmanagedHeap) regime.
    pub fn transfer_ownership_unmanaged(&mut self) -> Option<UnmanagedBuffer<T>> {
        match mem::replace(&mut self.rental, Rental::Inlined) {
            Rental::Unmanaged { ptr, capacity } => {
                let len = mem::replace(&mut self.len, 0);
                trace_event!(target: "smalllist::pooled", len, capacity, "transfer unmanaged buffer");
                // SAFETY: the allocation came from `alloc_array` and holds `len` elements
                Some(unsafe { UnmanagedBuffer::from_raw_parts(ptr, len, capacity) })
            }
            other => {
                self.rental = other;
                None
            }
        }
    }
}

impl<T: Copy, const N: usize, P: BufferPool<T>> PooledSmallList<T, N, P> {
    pub fn from_slice_in(slice: &[T], pool: P) -> Self {
        let mut this = Self::with_capacity_in(slice.len(), pool);
        this.extend_from_slice(slice);
        this
    }

    #[inline]
    pub fn extend_from_slice(&mut self, slice: &[T]) {
        self.insert_from_slice(self.len, slice);
    }

    pub fn insert_from_slice(&mut self, index: usize, slice: &[T]) {
        let len = self.len;
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
        let ptr = self.open_gap(index, slice.len());
        // SAFETY: `open_gap` left `slice.len()` writable slots at `ptr`
        unsafe { copy_nonoverlapping(slice.as_ptr(), ptr, slice.len()) };
        self.len = len + slice.len();
    }
}

impl<T: Copy, const N: usize, P: BufferPool<T> + Default> PooledSmallList<T, N, P> {
    #[inline]
    pub fn from_slice(slice: &[T]) -> Self {
        Self::from_slice_in(slice, P::default())
    }
}

impl<T, const N: usize, P: BufferPool<T>> Drop for PooledSmallList<T, N, P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T, const N: usize, P: BufferPool<T> + Default> Default for PooledSmallList<T, N, P> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, const N: usize, P: BufferPool<T> + Clone> Clone for PooledSmallList<T, N, P> {
    fn clone(&self) -> Self {
        let mut out = Self::with_capacity_in(self.len, self.pool.clone());
        out.extend(self.iter().cloned());
        out
    }
}

impl<T, const N: usize, P: BufferPool<T>> core::ops::Deref for PooledSmallList<T, N, P> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, const N: usize, P: BufferPool<T>> core::ops::DerefMut for PooledSmallList<T, N, P> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, const N: usize, P: BufferPool<T>> AsRef<[T]> for PooledSmallList<T, N, P> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, const N: usize, P: BufferPool<T>> Extend<T> for PooledSmallList<T, N, P> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iterable: I) {
        let iter = iterable.into_iter();
        let (lower_bound, _) = iter.size_hint();
        self.reserve(lower_bound);
        for value in iter {
            self.push(value);
        }
    }
}

impl<T, const N: usize, P: BufferPool<T> + Default> core::iter::FromIterator<T>
    for PooledSmallList<T, N, P>
{
    fn from_iter<I: IntoIterator<Item = T>>(iterable: I) -> Self {
        Self::from_iter_in(iterable, P::default())
    }
}

impl<T, U, const N: usize, const M: usize, P, Q> PartialEq<PooledSmallList<U, M, Q>>
    for PooledSmallList<T, N, P>
where
    T: PartialEq<U>,
    P: BufferPool<T>,
    Q: BufferPool<U>,
{
    #[inline]
    fn eq(&self, other: &PooledSmallList<U, M, Q>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, const N: usize, P: BufferPool<T>> Eq for PooledSmallList<T, N, P> {}

impl<T, U, const N: usize, P> PartialEq<[U]> for PooledSmallList<T, N, P>
where
    T: PartialEq<U>,
    P: BufferPool<T>,
{
    #[inline]
    fn eq(&self, other: &[U]) -> bool {
        self.as_slice() == other
    }
}

impl<T, U, const N: usize, const M: usize, P> PartialEq<[U; M]> for PooledSmallList<T, N, P>
where
    T: PartialEq<U>,
    P: BufferPool<T>,
{
    #[inline]
    fn eq(&self, other: &[U; M]) -> bool {
        self.as_slice() == &other[..]
    }
}

impl<T: Hash, const N: usize, P: BufferPool<T>> Hash for PooledSmallList<T, N, P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state)
    }
}

impl<T: Debug, const N: usize, P: BufferPool<T>> Debug for PooledSmallList<T, N, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(feature = "malloc_size_of")]
impl<T, const N: usize, P: BufferPool<T>> MallocShallowSizeOf for PooledSmallList<T, N, P> {
    fn shallow_size_of(&self, ops: &mut MallocSizeOfOps) -> usize {
        if self.is_inlined() {
            0
        } else {
            unsafe { ops.malloc_size_of(self.as_ptr()) }
        }
    }
}

#[cfg(feature = "malloc_size_of")]
impl<T: MallocSizeOf, const N: usize, P: BufferPool<T>> MallocSizeOf for PooledSmallList<T, N, P> {
    fn size_of(&self, ops: &mut MallocSizeOfOps) -> usize {
        let mut n = self.shallow_size_of(ops);
        for elem in self.iter() {
            n += elem.size_of(ops);
        }
        n
    }
}

#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
impl<const N: usize, P: BufferPool<u8>> io::Write for PooledSmallList<u8, N, P> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "bytes")]
unsafe impl<const N: usize, P: BufferPool<u8>> BufMut for PooledSmallList<u8, N, P> {
    #[inline]
    fn remaining_mut(&self) -> usize {
        // A list can never have more than isize::MAX bytes
        isize::MAX as usize - self.len()
    }

    #[inline]
    unsafe fn advance_mut(&mut self, cnt: usize) {
        let len = self.len();
        let remaining = self.capacity() - len;

        if remaining < cnt {
            panic!("advance out of bounds: the len is {remaining} but advancing by {cnt}");
        }

        // Addition will not overflow since the sum is at most the capacity.
        self.len = len + cnt;
    }

    #[inline]
    fn chunk_mut(&mut self) -> &mut UninitSlice {
        if self.capacity() == self.len() {
            self.reserve(64);
        }

        let cap = self.capacity();
        let len = self.len();

        let ptr = self.as_mut_ptr();
        // SAFETY: `ptr` is valid for `cap` bytes, so `ptr.add(len)` is valid for `cap - len`
        unsafe { UninitSlice::from_raw_parts_mut(ptr.add(len), cap - len) }
    }

    #[inline]
    fn put_slice(&mut self, src: &[u8]) {
        self.extend_from_slice(src);
    }
}
