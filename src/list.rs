// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A list whose first three elements live inside the value itself.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use core::cmp::Ordering;
use core::fmt::Debug;
use core::hash::{Hash, Hasher};
use core::iter::{Chain, FusedIterator};
use core::mem::{self, ManuallyDrop, MaybeUninit};
use core::ops::{Index, IndexMut};
use core::ptr::{self, copy, copy_nonoverlapping};
use core::slice;

#[cfg(feature = "malloc_size_of")]
use malloc_size_of::{MallocShallowSizeOf, MallocSizeOf, MallocSizeOfOps};

use crate::ListError;

/// Number of elements a [`SmallList`] stores without allocating.
pub const INLINE_CAPACITY: usize = 3;

/// Capacity the overflow is created with when a list is promoted.
pub const OVERFLOW_INITIAL_CAPACITY: usize = 4;

/// Says how many inline slots are filled, or holds the elements past the inline cell.
///
/// `Overflow` is only ever observed holding at least one element: the removal that empties it
/// also demotes the list back to `Three`.
enum Rest<T> {
    Empty,
    One,
    Two,
    Three,
    Overflow(VecDeque<T>),
}

impl<T> Rest<T> {
    #[inline]
    fn inline(len: usize) -> Self {
        match len {
            0 => Rest::Empty,
            1 => Rest::One,
            2 => Rest::Two,
            _ => {
                debug_assert_eq!(len, INLINE_CAPACITY);
                Rest::Three
            }
        }
    }

    #[inline]
    fn inline_len(&self) -> usize {
        match self {
            Rest::Empty => 0,
            Rest::One => 1,
            Rest::Two => 2,
            Rest::Three | Rest::Overflow(_) => INLINE_CAPACITY,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        match self {
            Rest::Overflow(overflow) => INLINE_CAPACITY + overflow.len(),
            inline => inline.inline_len(),
        }
    }
}

/// A growable list that stores its first [`INLINE_CAPACITY`] elements inline.
///
/// Indices below `INLINE_CAPACITY` always resolve to the inline cell. Once a fourth element
/// arrives the list is *promoted*: elements from index 3 onwards are kept in a [`VecDeque`],
/// which makes the shuffle across the inline boundary (pop-front on removal, push-front on
/// insertion) constant time. The inline elements never move to the overflow as a block.
///
/// Cloning copies every element, inline and overflow alike.
pub struct SmallList<T> {
    inline: MaybeUninit<[T; INLINE_CAPACITY]>,
    rest: Rest<T>,
}

impl<T> SmallList<T> {
    #[inline]
    pub const fn new() -> Self {
        Self {
            inline: MaybeUninit::uninit(),
            rest: Rest::Empty,
        }
    }

    #[inline]
    pub fn from_one(a: T) -> Self {
        let mut this = Self::new();
        // SAFETY: slot 0 is in bounds and currently unoccupied
        unsafe { this.inline_mut_ptr().write(a) };
        this.rest = Rest::One;
        this
    }

    #[inline]
    pub fn from_two(a: T, b: T) -> Self {
        let mut this = Self::new();
        // SAFETY: see above
        unsafe {
            let ptr = this.inline_mut_ptr();
            ptr.write(a);
            ptr.add(1).write(b);
        }
        this.rest = Rest::Two;
        this
    }

    #[inline]
    pub fn from_three(a: T, b: T, c: T) -> Self {
        Self {
            inline: MaybeUninit::new([a, b, c]),
            rest: Rest::Three,
        }
    }

    #[inline]
    fn inline_ptr(&self) -> *const T {
        self.inline.as_ptr() as *const T
    }

    #[inline]
    fn inline_mut_ptr(&mut self) -> *mut T {
        self.inline.as_mut_ptr() as *mut T
    }

    /// Number of elements, inline and overflow together.
    #[inline]
    pub fn len(&self) -> usize {
        self.rest.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.rest, Rest::Empty)
    }

    /// Number of occupied inline slots, `min(len, INLINE_CAPACITY)`.
    #[inline]
    pub fn inline_len(&self) -> usize {
        self.rest.inline_len()
    }

    /// Whether elements past the inline cell exist.
    #[inline]
    pub fn is_spilled(&self) -> bool {
        matches!(self.rest, Rest::Overflow(_))
    }

    /// The inline portion of the list as one contiguous slice.
    ///
    /// This never touches the overflow, so it can be handed to APIs that need contiguous memory
    /// without materialising the whole list.
    #[inline]
    pub fn inline_slice(&self) -> &[T] {
        // SAFETY: the first `inline_len` slots are initialized
        unsafe { slice::from_raw_parts(self.inline_ptr(), self.inline_len()) }
    }

    #[inline]
    pub fn inline_slice_mut(&mut self) -> &mut [T] {
        let len = self.inline_len();
        // SAFETY: see above
        unsafe { slice::from_raw_parts_mut(self.inline_mut_ptr(), len) }
    }

    /// The elements past the inline cell, as the two halves of the overflow ring buffer.
    ///
    /// Both halves are empty unless the list [`is_spilled`](Self::is_spilled).
    #[inline]
    pub fn overflow_slices(&self) -> (&[T], &[T]) {
        match &self.rest {
            Rest::Overflow(overflow) => overflow.as_slices(),
            _ => (&[], &[]),
        }
    }

    #[inline]
    fn parts_mut(&mut self) -> (&mut [T], Option<&mut VecDeque<T>>) {
        let len = self.rest.inline_len();
        // SAFETY: the first `len` slots are initialized, and `inline` and `rest` are disjoint
        let inline = unsafe { slice::from_raw_parts_mut(self.inline.as_mut_ptr() as *mut T, len) };
        match &mut self.rest {
            Rest::Overflow(overflow) => (inline, Some(overflow)),
            _ => (inline, None),
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index < INLINE_CAPACITY {
            self.inline_slice().get(index)
        } else if let Rest::Overflow(overflow) = &self.rest {
            overflow.get(index - INLINE_CAPACITY)
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let (inline, overflow) = self.parts_mut();
        if index < INLINE_CAPACITY {
            inline.get_mut(index)
        } else {
            overflow?.get_mut(index - INLINE_CAPACITY)
        }
    }

    /// Like [`get`](Self::get), but reports the index and the valid bound on failure.
    #[inline]
    pub fn try_get(&self, index: usize) -> Result<&T, ListError> {
        let len = self.len();
        self.get(index)
            .ok_or(ListError::OutOfRange { index, bound: len })
    }

    /// Replaces the element at `index`, returning the previous one.
    pub fn set(&mut self, index: usize, value: T) -> Result<T, ListError> {
        let len = self.len();
        match self.get_mut(index) {
            Some(slot) => Ok(mem::replace(slot, value)),
            None => Err(ListError::OutOfRange { index, bound: len }),
        }
    }

    #[inline]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }

    /// Returns the overflow, creating it when the inline cell is exactly full.
    fn promote(&mut self) -> &mut VecDeque<T> {
        if let Rest::Three = self.rest {
            self.rest = Rest::Overflow(VecDeque::with_capacity(OVERFLOW_INITIAL_CAPACITY));
        }
        match &mut self.rest {
            Rest::Overflow(overflow) => overflow,
            _ => unreachable!("promoting a list whose inline cell is not full"),
        }
    }

    /// Drops an overflow that no longer holds anything.
    #[inline]
    fn demote_if_possible(&mut self) {
        if matches!(&self.rest, Rest::Overflow(overflow) if overflow.is_empty()) {
            self.rest = Rest::Three;
        }
    }

    #[inline]
    pub fn push(&mut self, value: T) {
        let len = self.len();
        if len < INLINE_CAPACITY {
            // SAFETY: slot `len` is in bounds and unoccupied
            unsafe { self.inline_mut_ptr().add(len).write(value) };
            self.rest = Rest::inline(len + 1);
        } else {
            self.promote().push_back(value);
        }
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let len = self.len();
        if len == 0 {
            None
        } else {
            Some(self.remove_in_bounds(len - 1))
        }
    }

    /// Inserts `value` at `index`, shifting everything after it one place to the right.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    #[inline]
    pub fn insert(&mut self, index: usize, value: T) {
        let len = self.len();
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
        self.insert_in_bounds(index, value);
    }

    pub fn try_insert(&mut self, index: usize, value: T) -> Result<(), ListError> {
        let len = self.len();
        if index > len {
            return Err(ListError::OutOfRange {
                index,
                bound: len + 1,
            });
        }
        self.insert_in_bounds(index, value);
        Ok(())
    }

    fn insert_in_bounds(&mut self, index: usize, value: T) {
        let len = self.len();
        debug_assert!(index <= len);
        if len < INLINE_CAPACITY {
            // SAFETY: `index..len` is initialized and `len + 1 <= INLINE_CAPACITY`
            unsafe {
                let ptr = self.inline_mut_ptr().add(index);
                copy(ptr, ptr.add(1), len - index);
                ptr.write(value);
            }
            self.rest = Rest::inline(len + 1);
        } else if index >= INLINE_CAPACITY {
            self.promote().insert(index - INLINE_CAPACITY, value);
        } else {
            // The last inline element is pushed out to the front of the overflow.
            // Reserve first so nothing below can fail halfway through the shuffle.
            self.promote().reserve(1);
            // SAFETY: the inline cell is full; the last slot is read out before the shift
            // overwrites it, and the hole at `index` is filled straight away.
            let third = unsafe {
                let base = self.inline_mut_ptr();
                let third = base.add(INLINE_CAPACITY - 1).read();
                let ptr = base.add(index);
                copy(ptr, ptr.add(1), INLINE_CAPACITY - 1 - index);
                ptr.write(value);
                third
            };
            self.promote().push_front(third);
        }
    }

    /// Removes and returns the element at `index`, shifting everything after it to the left.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len();
        assert!(index < len, "removal index (is {index}) should be < len (is {len})");
        self.remove_in_bounds(index)
    }

    pub fn try_remove(&mut self, index: usize) -> Result<T, ListError> {
        let len = self.len();
        if index >= len {
            return Err(ListError::OutOfRange { index, bound: len });
        }
        Ok(self.remove_in_bounds(index))
    }

    fn remove_in_bounds(&mut self, index: usize) -> T {
        let len = self.len();
        debug_assert!(index < len);
        if len <= INLINE_CAPACITY {
            self.rest = Rest::inline(len - 1);
            // SAFETY: `index < len`, so the slot is initialized. We gave up ownership of it by
            // shrinking the length above.
            unsafe {
                let ptr = self.inline_mut_ptr().add(index);
                let value = ptr.read();
                copy(ptr.add(1), ptr, len - index - 1);
                value
            }
        } else {
            let Rest::Overflow(overflow) = &mut self.rest else {
                unreachable!("a list longer than its inline cell has an overflow")
            };
            let value = if index >= INLINE_CAPACITY {
                match overflow.remove(index - INLINE_CAPACITY) {
                    Some(value) => value,
                    None => unreachable!(),
                }
            } else {
                // The front of the overflow moves into the last inline slot.
                let Some(front) = overflow.pop_front() else {
                    unreachable!()
                };
                // SAFETY: the inline cell is full; the removed slot is read out before the
                // shift, and the last slot is refilled from the overflow.
                unsafe {
                    let base = self.inline.as_mut_ptr() as *mut T;
                    let ptr = base.add(index);
                    let value = ptr.read();
                    copy(ptr.add(1), ptr, INLINE_CAPACITY - 1 - index);
                    base.add(INLINE_CAPACITY - 1).write(front);
                    value
                }
            };
            self.demote_if_possible();
            value
        }
    }

    /// Removes the first element equal to `value`. Returns whether one was found.
    pub fn remove_item(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.index_of(value) {
            Some(index) => {
                self.remove_in_bounds(index);
                true
            }
            None => false,
        }
    }

    pub fn index_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.iter().position(|x| x == value)
    }

    #[inline]
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.index_of(value).is_some()
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        let len = self.len();
        assert!(a < len, "swap index (is {a}) should be < len (is {len})");
        assert!(b < len, "swap index (is {b}) should be < len (is {len})");
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        match self.parts_mut() {
            (inline, Some(overflow)) if hi >= INLINE_CAPACITY => {
                if lo >= INLINE_CAPACITY {
                    overflow.swap(lo - INLINE_CAPACITY, hi - INLINE_CAPACITY);
                } else {
                    mem::swap(&mut inline[lo], &mut overflow[hi - INLINE_CAPACITY]);
                }
            }
            (inline, _) => inline.swap(lo, hi),
        }
    }

    /// Shortens the list to `len` elements, dropping the rest.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len() {
            return;
        }
        if let Rest::Overflow(overflow) = &mut self.rest {
            overflow.truncate(len.saturating_sub(INLINE_CAPACITY));
        }
        self.demote_if_possible();
        let inline_len = self.inline_len();
        if len < inline_len {
            self.rest = Rest::inline(len);
            // SAFETY: `len..inline_len` was initialized and is no longer counted
            unsafe {
                ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                    self.inline_mut_ptr().add(len),
                    inline_len - len,
                ));
            }
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut f: F) {
        let old = mem::take(self);
        *self = old.into_iter().filter(|x| f(x)).collect();
    }

    /// Maps a signed position onto `0..len`, wrapping around in both directions.
    pub fn wrap_index(&self, index: isize) -> Result<usize, ListError> {
        let len = self.len();
        if len == 0 {
            return Err(ListError::Empty);
        }
        // `len` fits in an isize: no allocation is larger than isize::MAX bytes
        Ok(index.rem_euclid(len as isize) as usize)
    }

    /// Maps a signed position onto `0..len`, saturating at either end.
    pub fn clamp_index(&self, index: isize) -> Result<usize, ListError> {
        let len = self.len();
        if len == 0 {
            return Err(ListError::Empty);
        }
        Ok(index.clamp(0, len as isize - 1) as usize)
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Iterates from the last element to the first.
    #[inline]
    pub fn iter_rev(&self) -> core::iter::Rev<Iter<'_, T>> {
        self.iter().rev()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        let (inline, overflow) = self.parts_mut();
        let (front, back): (&mut [T], &mut [T]) = match overflow {
            Some(overflow) => overflow.as_mut_slices(),
            None => (&mut [], &mut []),
        };
        IterMut {
            inner: inline.iter_mut().chain(front.iter_mut()).chain(back.iter_mut()),
        }
    }

    /// Calls `f` with every element in one contiguous slice.
    ///
    /// When the list is not spilled this borrows the inline cell directly; otherwise the
    /// elements are cloned into a temporary `Vec` first.
    pub fn with_contiguous<R, F>(&self, f: F) -> R
    where
        T: Clone,
        F: FnOnce(&[T]) -> R,
    {
        if self.is_spilled() {
            let all: Vec<T> = self.iter().cloned().collect();
            f(&all)
        } else {
            f(self.inline_slice())
        }
    }

    /// Clones every element into the front of `dest`.
    pub fn copy_to(&self, dest: &mut [T]) -> Result<(), ListError>
    where
        T: Clone,
    {
        let len = self.len();
        if dest.len() < len {
            return Err(ListError::DestinationTooShort {
                needed: len,
                available: dest.len(),
            });
        }
        let inline = self.inline_slice();
        let (front, back) = self.overflow_slices();
        let (dest_inline, dest) = dest.split_at_mut(inline.len());
        dest_inline.clone_from_slice(inline);
        let (dest_front, dest) = dest.split_at_mut(front.len());
        dest_front.clone_from_slice(front);
        dest[..back.len()].clone_from_slice(back);
        Ok(())
    }

    pub fn into_vec(self) -> Vec<T> {
        let mut vec = Vec::with_capacity(self.len());
        vec.extend(self);
        vec
    }

    /// Fills the inline cell first and promotes only once a fourth element shows up.
    fn extend_impl<I: Iterator<Item = T>>(&mut self, iter: I) {
        let mut iter = iter.fuse();
        while self.len() < INLINE_CAPACITY {
            match iter.next() {
                Some(value) => self.push(value),
                None => return,
            }
        }
        let (lower_bound, _) = iter.size_hint();
        if let Some(value) = iter.next() {
            let overflow = self.promote();
            overflow.reserve(lower_bound);
            overflow.push_back(value);
            overflow.extend(iter);
        }
    }
}

impl<T: Default> SmallList<T> {
    /// A list of `len` default values.
    pub fn zeroed(len: usize) -> Self {
        core::iter::repeat_with(T::default).take(len).collect()
    }
}

impl<T: Clone> SmallList<T> {
    pub fn from_elem(elem: T, n: usize) -> Self {
        core::iter::repeat_n(elem, n).collect()
    }
}

impl<T: Copy> SmallList<T> {
    /// Creates a list of `len` elements without initializing them.
    ///
    /// The inline slots are left as they are and the overflow, if any, is allocated at its
    /// final size. This is the cheapest destination for a bulk copy.
    ///
    /// # Safety
    ///
    /// Every element in `0..len` must be written before it is read.
    pub unsafe fn uninit(len: usize) -> Self {
        let rest = if len <= INLINE_CAPACITY {
            Rest::inline(len)
        } else {
            let overflow_len = len - INLINE_CAPACITY;
            let mut buf = Vec::with_capacity(overflow_len);
            // SAFETY: `T: Copy` has no drop glue, and the caller writes before reading
            unsafe { buf.set_len(overflow_len) };
            Rest::Overflow(VecDeque::from(buf))
        };
        Self {
            inline: MaybeUninit::uninit(),
            rest,
        }
    }

    pub fn from_slice(slice: &[T]) -> Self {
        // SAFETY: every element is written below
        let mut this = unsafe { Self::uninit(slice.len()) };
        let (inline, tail) = slice.split_at(this.inline_len());
        // SAFETY: `inline.len()` slots are reserved in the inline cell
        unsafe { copy_nonoverlapping(inline.as_ptr(), this.inline_mut_ptr(), inline.len()) };
        if let Rest::Overflow(overflow) = &mut this.rest {
            let (front, back) = overflow.as_mut_slices();
            let (tail_front, tail_back) = tail.split_at(front.len());
            front.copy_from_slice(tail_front);
            back.copy_from_slice(tail_back);
        }
        this
    }

    pub fn extend_from_slice(&mut self, slice: &[T]) {
        self.extend_impl(slice.iter().copied());
    }
}

impl<T> Drop for SmallList<T> {
    fn drop(&mut self) {
        // The overflow is dropped with `rest`.
        // SAFETY: the inline slots are initialized and dropped exactly once here
        unsafe { ptr::drop_in_place(self.inline_slice_mut()) };
    }
}

impl<T> Default for SmallList<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for SmallList<T> {
    fn clone(&self) -> Self {
        let mut out = Self::new();
        for value in self.inline_slice() {
            out.push(value.clone());
        }
        if let Rest::Overflow(overflow) = &self.rest {
            let mut cloned = VecDeque::with_capacity(overflow.len());
            cloned.extend(overflow.iter().cloned());
            out.rest = Rest::Overflow(cloned);
        }
        out
    }
}

impl<T> Index<usize> for SmallList<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("index (is {index}) should be < len (is {})", self.len()),
        }
    }
}

impl<T> IndexMut<usize> for SmallList<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len();
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("index (is {index}) should be < len (is {len})"),
        }
    }
}

impl<T> Extend<T> for SmallList<T> {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iterable: I) {
        self.extend_impl(iterable.into_iter());
    }
}

impl<'a, T: Copy + 'a> Extend<&'a T> for SmallList<T> {
    #[inline]
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iterable: I) {
        self.extend_impl(iterable.into_iter().copied());
    }
}

impl<T> core::iter::FromIterator<T> for SmallList<T> {
    #[inline]
    fn from_iter<I: IntoIterator<Item = T>>(iterable: I) -> Self {
        let mut list = Self::new();
        list.extend_impl(iterable.into_iter());
        list
    }
}

impl<T, const M: usize> From<[T; M]> for SmallList<T> {
    fn from(array: [T; M]) -> Self {
        IntoIterator::into_iter(array).collect()
    }
}

impl<T> From<Vec<T>> for SmallList<T> {
    /// Reuses the vector's allocation as the overflow when it is long enough to need one.
    fn from(vec: Vec<T>) -> Self {
        if vec.len() <= INLINE_CAPACITY {
            return vec.into_iter().collect();
        }
        let mut overflow = VecDeque::from(vec);
        let mut this = Self::new();
        while this.len() < INLINE_CAPACITY {
            match overflow.pop_front() {
                Some(value) => this.push(value),
                None => unreachable!(),
            }
        }
        this.rest = Rest::Overflow(overflow);
        this
    }
}

impl<T, U> PartialEq<SmallList<U>> for SmallList<T>
where
    T: PartialEq<U>,
{
    #[inline]
    fn eq(&self, other: &SmallList<U>) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for SmallList<T> {}

impl<T, U> PartialEq<[U]> for SmallList<T>
where
    T: PartialEq<U>,
{
    #[inline]
    fn eq(&self, other: &[U]) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T, U> PartialEq<&[U]> for SmallList<T>
where
    T: PartialEq<U>,
{
    #[inline]
    fn eq(&self, other: &&[U]) -> bool {
        *self == **other
    }
}

impl<T, U, const M: usize> PartialEq<[U; M]> for SmallList<T>
where
    T: PartialEq<U>,
{
    #[inline]
    fn eq(&self, other: &[U; M]) -> bool {
        *self == other[..]
    }
}

impl<T, U> PartialEq<Vec<U>> for SmallList<T>
where
    T: PartialEq<U>,
{
    #[inline]
    fn eq(&self, other: &Vec<U>) -> bool {
        *self == other[..]
    }
}

impl<T: PartialOrd> PartialOrd for SmallList<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord> Ord for SmallList<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: Hash> Hash for SmallList<T> {
    /// Hashes the length, the inline part, and each non-empty overflow half with
    /// [`Hash::hash_slice`].
    ///
    /// An unspilled list feeds the hasher exactly what the equivalent slice would. A spilled
    /// one splits the elements over up to three chunks, which only hashes like the slice for
    /// hashers that treat their input as one stream.
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        T::hash_slice(self.inline_slice(), state);
        let (front, back) = self.overflow_slices();
        for half in [front, back] {
            if !half.is_empty() {
                T::hash_slice(half, state);
            }
        }
    }
}

impl<T: Debug> Debug for SmallList<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(feature = "malloc_size_of")]
impl<T> MallocShallowSizeOf for SmallList<T> {
    fn shallow_size_of(&self, _ops: &mut MallocSizeOfOps) -> usize {
        // The ring buffer's head is not its allocation start, so count the capacity instead.
        match &self.rest {
            Rest::Overflow(overflow) => overflow.capacity() * mem::size_of::<T>(),
            _ => 0,
        }
    }
}

#[cfg(feature = "malloc_size_of")]
impl<T: MallocSizeOf> MallocSizeOf for SmallList<T> {
    fn size_of(&self, ops: &mut MallocSizeOfOps) -> usize {
        let mut n = self.shallow_size_of(ops);
        for elem in self.iter() {
            n += elem.size_of(ops);
        }
        n
    }
}

/// A borrowing cursor over a [`SmallList`], inline slots first.
///
/// The length is captured when the cursor is created. [`rewind`](Iter::rewind) moves both ends
/// back to where they started.
pub struct Iter<'a, T> {
    inline: &'a [T],
    overflow: (&'a [T], &'a [T]),
    len: usize,
    front: usize,
    back: usize,
}

impl<'a, T> Iter<'a, T> {
    fn new(list: &'a SmallList<T>) -> Self {
        let len = list.len();
        Self {
            inline: list.inline_slice(),
            overflow: list.overflow_slices(),
            len,
            front: 0,
            back: len,
        }
    }

    /// Resolves a logical index the same way [`SmallList::get`] does.
    #[inline]
    fn resolve(&self, index: usize) -> &'a T {
        let inline = self.inline;
        if index < inline.len() {
            &inline[index]
        } else {
            let index = index - inline.len();
            let (front, back) = self.overflow;
            if index < front.len() {
                &front[index]
            } else {
                &back[index - front.len()]
            }
        }
    }

    /// Starts the iteration over from the beginning.
    pub fn rewind(&mut self) {
        self.front = 0;
        self.back = self.len;
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        if self.front == self.back {
            return None;
        }
        let item = self.resolve(self.front);
        self.front += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    #[inline]
    fn next_back(&mut self) -> Option<&'a T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.resolve(self.back))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            inline: self.inline,
            overflow: self.overflow,
            len: self.len,
            front: self.front,
            back: self.back,
        }
    }
}

impl<T: Debug> Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

type SliceChain<'a, T> = Chain<Chain<slice::IterMut<'a, T>, slice::IterMut<'a, T>>, slice::IterMut<'a, T>>;

/// A mutable iterator over a [`SmallList`].
pub struct IterMut<'a, T> {
    inner: SliceChain<'a, T>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<&'a mut T> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, T> DoubleEndedIterator for IterMut<'a, T> {
    #[inline]
    fn next_back(&mut self) -> Option<&'a mut T> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}

/// An iterator that consumes a [`SmallList`] and yields its items by value.
pub struct IntoIter<T> {
    // # Safety
    //
    // The inline members in front..back are initialized
    inline: MaybeUninit<[T; INLINE_CAPACITY]>,
    front: usize,
    back: usize,
    overflow: alloc::collections::vec_deque::IntoIter<T>,
}

impl<T> IntoIter<T> {
    #[inline]
    fn inline_mut_ptr(&mut self) -> *mut T {
        self.inline.as_mut_ptr() as *mut T
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        if self.front < self.back {
            // SAFETY: see above; `front` is moved past the slot we read
            let value = unsafe { self.inline_mut_ptr().add(self.front).read() };
            self.front += 1;
            Some(value)
        } else {
            self.overflow.next()
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let size = self.back - self.front + self.overflow.len();
        (size, Some(size))
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        if let Some(value) = self.overflow.next_back() {
            return Some(value);
        }
        if self.front < self.back {
            self.back -= 1;
            // SAFETY: see above
            Some(unsafe { self.inline_mut_ptr().add(self.back).read() })
        } else {
            None
        }
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}

impl<T> Drop for IntoIter<T> {
    fn drop(&mut self) {
        let (front, back) = (self.front, self.back);
        self.front = back;
        // SAFETY: front..back were still owned by the iterator
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.inline_mut_ptr().add(front),
                back - front,
            ));
        }
    }
}

impl<T> IntoIterator for SmallList<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        let mut this = ManuallyDrop::new(self);
        let back = this.inline_len();
        let overflow = match mem::replace(&mut this.rest, Rest::Empty) {
            Rest::Overflow(overflow) => overflow,
            _ => VecDeque::new(),
        };
        IntoIter {
            // SAFETY: `this` is never dropped, so the inline elements are moved exactly once
            inline: unsafe { ptr::read(&this.inline) },
            front: 0,
            back,
            overflow: overflow.into_iter(),
        }
    }
}

impl<'a, T> IntoIterator for &'a SmallList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut SmallList<T> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> IterMut<'a, T> {
        self.iter_mut()
    }
}
