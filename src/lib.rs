// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lists that keep their first few elements inline, and only reach for other storage once
//! they outgrow it.
//!
//! Two shapes are provided:
//!
//! * [`SmallList`] stores its first three elements directly inside the value. A fourth element
//!   promotes the list: elements at index 3 and beyond live in a [`VecDeque`] overflow, while
//!   indices 0..3 stay where they are. Removing back down to three elements demotes the list and
//!   drops the overflow.
//! * [`PooledSmallList`] keeps a single contiguous view. It starts in an inline region of `N`
//!   elements and, when that is exhausted, grows into either a raw allocation (for element types
//!   without drop glue) or a buffer rented from a [`BufferPool`]. The rental is released exactly
//!   once: on [`dispose`](PooledSmallList::dispose), on drop, or by whoever received it through
//!   [`transfer_ownership`](PooledSmallList::transfer_ownership).
//!
//! There is no separate two-slot list; `PooledSmallList<T, 2>` covers a smaller inline region.
//!
//! ```
//! use smalllist::{smalllist, SmallList};
//!
//! let mut list: SmallList<i32> = smalllist![10, 20, 30];
//! assert!(!list.is_spilled());
//!
//! list.push(40);
//! assert!(list.is_spilled());
//! assert_eq!(list.inline_slice(), &[10, 20, 30]);
//! assert_eq!(list[3], 40);
//!
//! list.remove(0);
//! assert!(!list.is_spilled());
//! assert_eq!(list, [20, 30, 40]);
//! ```
//!
//! ## Optional features
//!
//! ### `std` (default)
//!
//! Enables [`ArrayPool`], a thread-safe pool of power-of-two buffers, and implements
//! [`std::io::Write`] for `PooledSmallList<u8, N, P>`.
//!
//! ### `tracing`
//!
//! Emits `trace`-level events whenever a [`PooledSmallList`] allocates, frees, rents, returns or
//! hands over a buffer.
//!
//! ### `malloc_size_of`
//!
//! Implements `MallocSizeOf` for both list shapes.
//!
//! ### `bytes`
//!
//! Implements `bytes::BufMut` for `PooledSmallList<u8, N, P>`.

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[doc(hidden)]
pub extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(test)]
mod tests;

use alloc::alloc::Layout;

#[cfg(doc)]
use alloc::collections::VecDeque;

/// Expands to a `tracing::trace!` event when the `tracing` feature is enabled, and to nothing
/// otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_event {
    ($($arg:tt)*) => { ::tracing::trace!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_event {
    ($($arg:tt)*) => {};
}

mod list;
mod pool;
mod pooled;

pub use list::{IntoIter, Iter, IterMut, SmallList, INLINE_CAPACITY, OVERFLOW_INITIAL_CAPACITY};
#[cfg(feature = "std")]
pub use pool::{ArrayPool, PoolStats};
pub use pool::{BufferPool, UnmanagedBuffer, Unpooled};
pub use pooled::{PooledSmallList, Regime, MAX_UNMANAGED_BYTES};

/// Error type for APIs with fallible heap allocation
#[derive(Debug)]
pub enum CollectionAllocErr {
    /// Overflow `usize::MAX` or other error during size computation
    CapacityOverflow,
    /// The allocator return an error
    AllocErr {
        /// The layout that was passed to the allocator
        layout: Layout,
    },
}

impl core::fmt::Display for CollectionAllocErr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Allocation error: {:?}", self)
    }
}

impl core::error::Error for CollectionAllocErr {}

/// A precondition of a list operation was violated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListError {
    /// `index` was outside the valid range `0..bound`.
    OutOfRange {
        /// The index that was asked for.
        index: usize,
        /// The exclusive upper bound at the time of the call: the length for reads and
        /// removals, one past it for insertions.
        bound: usize,
    },
    /// The operation needs at least one element.
    Empty,
    /// A copy destination cannot hold every element.
    DestinationTooShort {
        /// Number of elements that had to be copied.
        needed: usize,
        /// Length of the destination.
        available: usize,
    },
}

impl core::fmt::Display for ListError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            ListError::OutOfRange { index, bound } => {
                write!(f, "index (is {index}) should be < {bound}")
            }
            ListError::Empty => f.write_str("collection cannot be empty"),
            ListError::DestinationTooShort { needed, available } => write!(
                f,
                "destination (len {available}) is too short to hold {needed} elements"
            ),
        }
    }
}

impl core::error::Error for ListError {}

#[inline]
fn infallible<T>(result: Result<T, CollectionAllocErr>) -> T {
    match result {
        Ok(x) => x,
        Err(CollectionAllocErr::CapacityOverflow) => panic!("capacity overflow"),
        Err(CollectionAllocErr::AllocErr { layout }) => alloc::alloc::handle_alloc_error(layout),
    }
}

/// Creates a [`SmallList`] containing the arguments.
///
/// Up to three values are written straight into the inline cell; a longer list is built in one
/// pass with its overflow sized up front.
///
/// ```
/// use smalllist::{smalllist, SmallList};
///
/// let empty: SmallList<u8> = smalllist![];
/// assert!(empty.is_empty());
///
/// let three: SmallList<u8> = smalllist![1, 2, 3];
/// assert!(!three.is_spilled());
///
/// let zeros: SmallList<u8> = smalllist![0; 5];
/// assert_eq!(zeros, [0, 0, 0, 0, 0]);
/// ```
#[macro_export]
macro_rules! smalllist {
    () => (
        $crate::SmallList::new()
    );
    ($elem:expr; $n:expr) => ({
        $crate::SmallList::from_elem($elem, $n)
    });
    ($a:expr $(,)?) => (
        $crate::SmallList::from_one($a)
    );
    ($a:expr, $b:expr $(,)?) => (
        $crate::SmallList::from_two($a, $b)
    );
    ($a:expr, $b:expr, $c:expr $(,)?) => (
        $crate::SmallList::from_three($a, $b, $c)
    );
    ($($x:expr),+ $(,)?) => ({
        $crate::SmallList::from($crate::alloc::vec![$($x,)+])
    });
}
