use crate::{smalllist, ListError, PooledSmallList, Regime, SmallList, MAX_UNMANAGED_BYTES};

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::{format, vec, vec::Vec};
use core::cell::Cell;

/// Bumps a shared counter when dropped.
#[derive(Debug)]
struct Counted {
    value: u32,
    drops: Rc<Cell<usize>>,
}

impl Counted {
    fn new(value: u32, drops: &Rc<Cell<usize>>) -> Self {
        Counted {
            value,
            drops: Rc::clone(drops),
        }
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

fn overflow_vec<T: Clone>(list: &SmallList<T>) -> Vec<T> {
    let (front, back) = list.overflow_slices();
    front.iter().chain(back).cloned().collect()
}

#[test]
fn push_fills_inline_then_promotes() {
    let mut list = SmallList::new();
    assert_eq!(list.len(), 0);
    list.push(10);
    assert_eq!(list, [10]);
    list.push(20);
    assert_eq!(list, [10, 20]);
    list.push(30);
    assert_eq!(list, [10, 20, 30]);
    assert!(!list.is_spilled());

    list.push(40);
    assert_eq!(list, [10, 20, 30, 40]);
    assert_eq!(list.len(), 4);
    assert_eq!(list[3], 40);
    assert!(list.is_spilled());
    assert_eq!(list.inline_slice(), &[10, 20, 30]);
    assert_eq!(overflow_vec(&list), [40]);
}

#[test]
fn removal_demotes_back_to_inline() {
    let mut list: SmallList<i32> = smalllist![10, 20, 30, 40, 50];
    assert_eq!(list.remove(1), 20);
    assert_eq!(list, [10, 30, 40, 50]);
    assert_eq!(list.len(), 4);
    assert!(list.is_spilled());

    assert_eq!(list.remove(3), 50);
    assert_eq!(list, [10, 30, 40]);
    assert_eq!(list.len(), 3);
    assert!(!list.is_spilled());

    list.push(99);
    assert_eq!(list, [10, 30, 40, 99]);
}

#[test]
fn insert_at_front_pushes_third_inline_into_overflow() {
    let mut list = SmallList::from_three(10, 20, 30);
    list.insert(0, 5);
    assert_eq!(list, [5, 10, 20, 30]);
    assert_eq!(list.len(), 4);
    assert_eq!(list.inline_slice(), &[5, 10, 20]);
    assert_eq!(overflow_vec(&list), [30]);

    list.insert(2, 7);
    assert_eq!(list, [5, 10, 7, 20, 30]);
    assert_eq!(overflow_vec(&list), [20, 30]);

    list.insert(5, 40);
    list.insert(4, 25);
    assert_eq!(list, [5, 10, 7, 20, 25, 30, 40]);
}

#[test]
fn insert_into_partial_inline() {
    let mut list = SmallList::from_two(1, 3);
    list.insert(1, 2);
    assert_eq!(list, [1, 2, 3]);
    assert!(!list.is_spilled());

    let mut list = SmallList::new();
    list.insert(0, 'a');
    list.insert(0, 'b');
    assert_eq!(list, ['b', 'a']);
}

#[test]
fn remove_from_inline_pulls_overflow_front() {
    let mut list: SmallList<u8> = smalllist![1, 2, 3, 4, 5, 6];
    assert_eq!(list.remove(0), 1);
    assert_eq!(list.inline_slice(), &[2, 3, 4]);
    assert_eq!(overflow_vec(&list), [5, 6]);
    assert_eq!(list.remove(2), 4);
    assert_eq!(list.inline_slice(), &[2, 3, 5]);
    assert_eq!(list.remove(3), 6);
    assert!(!list.is_spilled());
    assert_eq!(list.remove(0), 2);
    assert_eq!(list, [3, 5]);
}

#[test]
fn pop_demotes() {
    let mut list: SmallList<u8> = smalllist![1, 2, 3, 4];
    assert_eq!(list.pop(), Some(4));
    assert!(!list.is_spilled());
    assert_eq!(list.pop(), Some(3));
    assert_eq!(list.pop(), Some(2));
    assert_eq!(list.pop(), Some(1));
    assert_eq!(list.pop(), None);
    assert!(list.is_empty());
}

#[test]
fn clones_are_independent() {
    let mut original: SmallList<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
    let copy = original.clone();
    original.push("f".into());
    original[0].push('!');
    original.remove(4);

    assert_eq!(copy, ["a", "b", "c", "d", "e"]);
    assert_eq!(original, ["a!", "b", "c", "d", "f"]);
}

#[test]
fn out_of_range_reports_index_and_bound() {
    let mut list: SmallList<u8> = smalllist![1, 2, 3, 4];
    assert_eq!(list.try_get(4), Err(ListError::OutOfRange { index: 4, bound: 4 }));
    assert_eq!(
        list.try_get(usize::MAX),
        Err(ListError::OutOfRange { index: usize::MAX, bound: 4 })
    );
    assert_eq!(list.try_remove(7), Err(ListError::OutOfRange { index: 7, bound: 4 }));
    assert_eq!(list.try_insert(6, 0), Err(ListError::OutOfRange { index: 6, bound: 5 }));
    assert_eq!(list.set(9, 0), Err(ListError::OutOfRange { index: 9, bound: 4 }));
    assert_eq!(list, [1, 2, 3, 4]);

    assert_eq!(list.set(3, 8), Ok(4));
    assert_eq!(list.try_insert(4, 9), Ok(()));
    assert_eq!(list.try_remove(0), Ok(1));
    assert_eq!(list, [2, 3, 8, 9]);
}

#[test]
fn error_messages() {
    let err = ListError::OutOfRange { index: 5, bound: 2 };
    assert_eq!(err.to_string(), "index (is 5) should be < 2");
    assert_eq!(ListError::Empty.to_string(), "collection cannot be empty");
    assert_eq!(
        ListError::DestinationTooShort { needed: 4, available: 1 }.to_string(),
        "destination (len 1) is too short to hold 4 elements"
    );
}

#[test]
#[should_panic(expected = "removal index (is 3) should be < len (is 3)")]
fn remove_past_end_panics() {
    let mut list = SmallList::from_three(1, 2, 3);
    list.remove(3);
}

#[test]
#[should_panic(expected = "insertion index (is 2) should be <= len (is 1)")]
fn insert_past_end_panics() {
    let mut list = SmallList::from_one(1);
    list.insert(2, 0);
}

#[test]
#[should_panic(expected = "index (is 4) should be < len (is 4)")]
fn index_past_end_panics() {
    let list: SmallList<u8> = smalllist![1, 2, 3, 4];
    let _ = list[4];
}

#[test]
fn wrap_and_clamp_index() {
    let empty: SmallList<u8> = SmallList::new();
    assert_eq!(empty.wrap_index(0), Err(ListError::Empty));
    assert_eq!(empty.clamp_index(-1), Err(ListError::Empty));

    let list: SmallList<u8> = smalllist![1, 2, 3, 4, 5];
    assert_eq!(list.wrap_index(-1), Ok(4));
    assert_eq!(list.wrap_index(7), Ok(2));
    assert_eq!(list.wrap_index(-6), Ok(4));
    assert_eq!(list.clamp_index(-3), Ok(0));
    assert_eq!(list.clamp_index(100), Ok(4));
    assert_eq!(list.clamp_index(2), Ok(2));
}

#[test]
fn factories() {
    assert!(SmallList::<u8>::new().is_empty());
    assert_eq!(SmallList::from_one(1), [1]);
    assert_eq!(SmallList::from_two(1, 2), [1, 2]);
    assert_eq!(SmallList::<u32>::zeroed(5), [0, 0, 0, 0, 0]);
    assert_eq!(SmallList::from_elem('x', 2), ['x', 'x']);
    assert_eq!(SmallList::from_slice(&[1, 2, 3, 4, 5, 6, 7]), [1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(SmallList::from_slice(&[1, 2]), [1, 2]);
    assert_eq!(SmallList::from(vec![1, 2, 3, 4, 5]), [1, 2, 3, 4, 5]);
    assert_eq!(SmallList::from([9, 8, 7, 6]), [9, 8, 7, 6]);

    let list: SmallList<u8> = smalllist![0; 4];
    assert!(list.is_spilled());

    // SAFETY: every slot is written before the list is read
    let mut list = unsafe { SmallList::<u16>::uninit(6) };
    assert_eq!(list.len(), 6);
    for (i, slot) in list.iter_mut().enumerate() {
        *slot = i as u16 * 2;
    }
    assert_eq!(list, [0, 2, 4, 6, 8, 10]);
}

#[test]
fn extend_promotes_only_when_needed() {
    let mut list: SmallList<i32> = SmallList::new();
    list.extend(1..=3);
    assert!(!list.is_spilled());
    list.extend(core::iter::empty::<i32>());
    assert!(!list.is_spilled());
    list.extend(&[4, 5]);
    assert_eq!(list, [1, 2, 3, 4, 5]);
    list.extend_from_slice(&[6]);
    assert_eq!(list.len(), 6);
}

#[test]
fn search_and_edit() {
    let mut list: SmallList<u8> = smalllist![5, 6, 7, 8, 6];
    assert_eq!(list.index_of(&6), Some(1));
    assert_eq!(list.index_of(&9), None);
    assert!(list.contains(&8));
    assert!(list.remove_item(&6));
    assert!(!list.remove_item(&42));
    assert_eq!(list, [5, 7, 8, 6]);

    list.swap(0, 3);
    assert_eq!(list, [6, 7, 8, 5]);
    list.swap(3, 3);
    list.swap(1, 2);
    assert_eq!(list, [6, 8, 7, 5]);
    assert_eq!(list.first(), Some(&6));
    assert_eq!(list.last(), Some(&5));

    list.retain(|&x| x % 2 == 1);
    assert_eq!(list, [7, 5]);
    assert!(!list.is_spilled());
}

#[test]
fn truncate_and_clear() {
    let mut list: SmallList<u8> = (0..10).collect();
    list.truncate(12);
    assert_eq!(list.len(), 10);
    list.truncate(5);
    assert_eq!(list, [0, 1, 2, 3, 4]);
    list.truncate(3);
    assert!(!list.is_spilled());
    list.truncate(1);
    assert_eq!(list, [0]);
    list.clear();
    assert!(list.is_empty());
    assert_eq!(list.first(), None);
}

#[test]
fn drops_each_element_once() {
    let drops = Rc::new(Cell::new(0));
    let mut list: SmallList<Counted> = (0..6).map(|i| Counted::new(i, &drops)).collect();
    assert_eq!(list.remove(1).value, 1);
    assert_eq!(drops.get(), 1);
    list.truncate(2);
    assert_eq!(drops.get(), 4);
    assert_eq!(list.iter().map(|c| c.value).collect::<Vec<_>>(), [0, 2]);
    drop(list);
    assert_eq!(drops.get(), 6);

    drops.set(0);
    let list: SmallList<Counted> = (0..7).map(|i| Counted::new(i, &drops)).collect();
    let mut iter = list.into_iter();
    assert_eq!(iter.next().map(|c| c.value), Some(0));
    assert_eq!(iter.next_back().map(|c| c.value), Some(6));
    assert_eq!(drops.get(), 2);
    drop(iter);
    assert_eq!(drops.get(), 7);
}

#[test]
fn iteration() {
    let list: SmallList<u8> = smalllist![1, 2, 3, 4, 5];
    let mut iter = list.iter();
    assert_eq!(iter.len(), 5);
    assert_eq!(iter.next(), Some(&1));
    assert_eq!(iter.next_back(), Some(&5));
    assert_eq!(iter.clone().collect::<Vec<_>>(), [&2, &3, &4]);
    iter.rewind();
    assert_eq!(iter.copied().collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
    assert_eq!(list.iter_rev().copied().collect::<Vec<_>>(), [5, 4, 3, 2, 1]);
    assert_eq!(format!("{:?}", list.iter()), "[1, 2, 3, 4, 5]");

    let mut list = list;
    for x in &mut list {
        *x *= 10;
    }
    assert_eq!(list.into_iter().rev().collect::<Vec<_>>(), [50, 40, 30, 20, 10]);
}

#[test]
fn overflow_wraps_after_front_operations() {
    // Inserting at the inline boundary moves the overflow head backwards, so the deque wraps.
    let mut list: SmallList<u32> = (0..8).collect();
    for i in 0..3 {
        list.insert(1, 100 + i);
    }
    let expected = [0, 102, 101, 100, 1, 2, 3, 4, 5, 6, 7];
    assert_eq!(list, expected);
    assert_eq!(list.iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(list.iter().rev().count(), expected.len());

    let mut dest = [0; 12];
    assert_eq!(list.copy_to(&mut dest), Ok(()));
    assert_eq!(&dest[..11], &expected);
    assert_eq!(
        list.copy_to(&mut [0; 4]),
        Err(ListError::DestinationTooShort { needed: 11, available: 4 })
    );
    assert_eq!(list.with_contiguous(|all| all.to_vec()), expected);
    assert_eq!(list.into_vec(), expected);
}

#[test]
fn with_contiguous_borrows_inline() {
    let list = SmallList::from_two(String::from("a"), String::from("b"));
    let ptr = list.with_contiguous(|all| all.as_ptr());
    assert_eq!(ptr, list.inline_slice().as_ptr());
}

#[test]
fn comparisons_and_hash() {
    use core::hash::{Hash, Hasher};
    use std::collections::hash_map::DefaultHasher;

    let a: SmallList<u8> = smalllist![1, 2, 3, 4];
    let b = SmallList::from(vec![1, 2, 3, 4]);
    let c: SmallList<u8> = smalllist![1, 2, 4];
    assert_eq!(a, b);
    assert!(a < c);
    assert_eq!(a, vec![1, 2, 3, 4]);
    assert_eq!(a, &[1, 2, 3, 4][..]);

    let hash = |list: &SmallList<u8>| {
        let mut hasher = DefaultHasher::new();
        list.hash(&mut hasher);
        hasher.finish()
    };
    assert_eq!(hash(&a), hash(&b));
    assert_eq!(format!("{a:?}"), "[1, 2, 3, 4]");
}

/// Keeps every `write` call separately.
#[derive(Default)]
struct RecordingHasher {
    writes: Vec<Vec<u8>>,
}

impl core::hash::Hasher for RecordingHasher {
    fn finish(&self) -> u64 {
        self.writes.len() as u64
    }

    fn write(&mut self, bytes: &[u8]) {
        self.writes.push(bytes.to_vec());
    }
}

#[test]
fn unspilled_hash_writes_match_slice() {
    use core::hash::{Hash, Hasher};

    let writes = |value: &dyn Fn(&mut RecordingHasher)| {
        let mut hasher = RecordingHasher::default();
        value(&mut hasher);
        hasher.writes
    };
    for len in 0..=3u8 {
        let values: Vec<u8> = (1..=len).collect();
        let list = SmallList::from_slice(&values);
        assert_eq!(
            writes(&|h| list.hash(h)),
            writes(&|h| values[..].hash(h)),
            "len {len}"
        );
    }

    // A spilled list hashes its inline part and the overflow as separate chunks.
    let list: SmallList<u8> = smalllist![1, 2, 3, 4];
    let recorded = writes(&|h| list.hash(h));
    assert_eq!(&recorded[1..], &[vec![1u8, 2, 3], vec![4u8]]);
    assert_eq!(recorded[0], writes(&|h| h.write_usize(4))[0]);
}

#[test]
fn clone_round_trip_at_every_size() {
    for len in 0..=5 {
        let values: Vec<String> = (0..len).map(|i| i.to_string()).collect();

        let original: SmallList<String> = values.iter().cloned().collect();
        let mut copy = original.clone();
        assert_eq!(copy.len(), original.len());
        assert_eq!(copy, values);
        assert_eq!(copy.is_spilled(), original.is_spilled());
        let original_overflow = overflow_vec(&original);

        copy.push("pushed".into());
        assert_eq!(copy.remove(len), "pushed");
        copy.push("again".into());
        if copy.len() > 3 {
            copy.remove(3);
        }
        assert_eq!(original, values, "len {len}");
        assert_eq!(overflow_vec(&original), original_overflow, "len {len}");

        let original: PooledSmallList<String, 2> = values.iter().cloned().collect();
        let mut copy = original.clone();
        assert_eq!(copy, values[..]);
        assert_eq!(copy.regime(), original.regime());

        copy.push("pushed".into());
        copy.remove(0);
        copy[0].push('!');
        assert_eq!(original, values[..], "len {len}");
    }
}

#[test]
fn macro_forms() {
    let empty: SmallList<u8> = smalllist![];
    assert!(empty.is_empty());
    let one: SmallList<u8> = smalllist![1,];
    assert_eq!(one, [1]);
    let many: SmallList<u8> = smalllist![1, 2, 3, 4, 5, 6];
    assert_eq!(many.inline_slice(), &[1, 2, 3]);
    assert_eq!(overflow_vec(&many), [4, 5, 6]);
}

// PooledSmallList

#[test]
fn pooled_grows_into_unmanaged_heap() {
    let mut list: PooledSmallList<u32, 4> = PooledSmallList::new();
    for i in 0..4 {
        list.push(i);
    }
    assert!(list.is_inlined());
    assert_eq!(list.capacity(), 4);

    list.push(4);
    assert!(list.is_unmanaged_heap());
    assert_eq!(list.capacity(), 8);
    list.extend_from_slice(&[5, 6, 7, 8]);
    assert_eq!(list.capacity(), 16);
    assert_eq!(&*list, &[0, 1, 2, 3, 4, 5, 6, 7, 8]);

    list.dispose();
    assert!(list.is_empty());
    assert_eq!(list.regime(), Regime::Inlined);
    list.dispose();
    assert!(list.is_inlined());
}

#[test]
fn pooled_types_with_drop_glue_rent() {
    let drops = Rc::new(Cell::new(0));
    let mut list: PooledSmallList<Counted, 2> = PooledSmallList::new();
    for i in 0..5 {
        list.push(Counted::new(i, &drops));
    }
    assert_eq!(list.regime(), Regime::ArrayPool);
    assert_eq!(drops.get(), 0);
    assert_eq!(list.iter().map(|c| c.value).collect::<Vec<_>>(), [0, 1, 2, 3, 4]);

    drop(list.remove(0));
    assert_eq!(drops.get(), 1);
    list.dispose();
    assert_eq!(drops.get(), 5);
    drop(list);
    assert_eq!(drops.get(), 5);
}

#[test]
fn pooled_insert_and_remove() {
    let mut list: PooledSmallList<u8, 3> = PooledSmallList::from_slice(&[1, 2, 3]);
    list.prepend(0);
    assert!(list.is_unmanaged_heap());
    list.insert(4, 4);
    list.insert_from_slice(2, &[10, 11]);
    assert_eq!(list, [0, 1, 10, 11, 2, 3, 4]);

    assert_eq!(list.remove(2), 10);
    list.remove_range(1, 2);
    assert_eq!(list, [0, 2, 3, 4]);
    list.remove_range(4, 0);
    assert_eq!(list.pop(), Some(4));
    assert_eq!(list.capacity(), 8);

    assert_eq!(list.try_remove_range(5, 0), Err(ListError::OutOfRange { index: 5, bound: 4 }));
    assert_eq!(list.try_remove_range(1, 3), Err(ListError::OutOfRange { index: 3, bound: 3 }));
    assert_eq!(
        list.try_remove_range(1, usize::MAX),
        Err(ListError::OutOfRange { index: usize::MAX - 1, bound: 3 })
    );
    assert_eq!(list, [0, 2, 3]);
}

#[test]
fn pooled_remove_range_drops_removed() {
    let drops = Rc::new(Cell::new(0));
    let mut list: PooledSmallList<Counted, 2> = (0..6).map(|i| Counted::new(i, &drops)).collect();
    list.remove_range(1, 3);
    assert_eq!(drops.get(), 3);
    assert_eq!(list.iter().map(|c| c.value).collect::<Vec<_>>(), [0, 4, 5]);
    list.truncate(1);
    assert_eq!(drops.get(), 5);
}

#[test]
#[should_panic(expected = "removal index (is 2) should be < len (is 2)")]
fn pooled_remove_past_end_panics() {
    let mut list: PooledSmallList<u8, 4> = PooledSmallList::from_slice(&[1, 2]);
    list.remove(2);
}

#[test]
fn pooled_with_capacity_skips_regrowth() {
    let list: PooledSmallList<u64, 2> = PooledSmallList::with_capacity(5);
    assert!(list.is_unmanaged_heap());
    assert_eq!(list.capacity(), 8);
    assert!(list.is_empty());

    let list: PooledSmallList<u64, 8> = PooledSmallList::with_capacity(5);
    assert!(list.is_inlined());
}

#[test]
fn pooled_zero_sized_never_grows() {
    let mut list: PooledSmallList<(), 2> = PooledSmallList::new();
    for _ in 0..100 {
        list.push(());
    }
    assert_eq!(list.len(), 100);
    assert!(list.is_inlined());
    assert_eq!(list.capacity(), usize::MAX);
}

#[test]
fn unmanaged_threshold() {
    type Bytes = PooledSmallList<u8, 4>;
    type Words = PooledSmallList<u32, 4>;
    assert!(Bytes::fits_unmanaged(MAX_UNMANAGED_BYTES));
    assert!(!Bytes::fits_unmanaged(MAX_UNMANAGED_BYTES + 1));
    assert!(Words::fits_unmanaged(MAX_UNMANAGED_BYTES / 4));
    assert!(!Words::fits_unmanaged(MAX_UNMANAGED_BYTES / 4 + 1));
    assert!(!Words::fits_unmanaged(usize::MAX));
    assert!(!PooledSmallList::<String, 4>::fits_unmanaged(1));
}

#[test]
fn transfer_unmanaged_hands_over_allocation() {
    let mut list: PooledSmallList<u64, 2> = PooledSmallList::from_slice(&[7, 8, 9]);
    assert_eq!(list.transfer_ownership(), None);
    assert_eq!(list.len(), 3);

    let buffer = list.transfer_ownership_unmanaged();
    assert!(list.is_empty());
    assert!(list.is_inlined());
    list.dispose();
    let buffer = buffer.unwrap();
    assert_eq!(&*buffer, &[7, 8, 9]);
    assert_eq!(buffer.capacity(), 4);

    let (ptr, len, capacity) = buffer.into_raw_parts();
    // SAFETY: the parts come straight from `into_raw_parts`
    let buffer = unsafe { crate::UnmanagedBuffer::from_raw_parts(ptr, len, capacity) };
    assert_eq!(buffer.len(), 3);
}

#[test]
fn transfer_is_refused_while_inlined() {
    let mut list: PooledSmallList<u64, 4> = PooledSmallList::from_slice(&[1, 2]);
    assert!(list.transfer_ownership().is_none());
    assert!(list.transfer_ownership_unmanaged().is_none());
    assert_eq!(list, [1, 2]);
}

#[test]
fn pooled_clone_and_compare() {
    let a: PooledSmallList<String, 2> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
    let mut b = a.clone();
    assert_eq!(a, b);
    b[0].push('!');
    assert_ne!(a, b);
    assert_eq!(a, ["x", "y", "z"]);
    assert_eq!(format!("{b:?}"), r#"["x!", "y", "z"]"#);

    let c: PooledSmallList<String, 8> = a.iter().cloned().collect();
    assert_eq!(a, c);
}

#[cfg(feature = "std")]
#[test]
fn pooled_io_write() {
    use std::io::Write;

    let mut list: PooledSmallList<u8, 4> = PooledSmallList::new();
    write!(list, "hello {}", 42).unwrap();
    list.flush().unwrap();
    assert_eq!(&*list, b"hello 42");
    assert!(list.is_unmanaged_heap());
}

#[cfg(feature = "std")]
mod pool {
    use super::*;
    use crate::{ArrayPool, BufferPool, PoolStats};
    use alloc::sync::Arc;

    #[test]
    fn buffers_are_reused_by_size_class() {
        let pool: ArrayPool<String> = ArrayPool::new();
        {
            let mut list = PooledSmallList::<String, 2, _>::new_in(&pool);
            for i in 0..5 {
                list.push(i.to_string());
            }
            assert!(list.is_array_pool());
            assert!(list.capacity() >= 8);
            // The 4-slot buffer went back when the list outgrew it.
            assert_eq!(pool.retained(), 1);
        }
        assert_eq!(pool.retained(), 2);

        let mut list = PooledSmallList::<String, 2, _>::new_in(&pool);
        list.extend((0..3).map(|i| i.to_string()));
        assert_eq!(
            pool.stats(),
            PoolStats {
                rents: 3,
                hits: 1,
                returns: 2,
                discarded: 0,
            }
        );
        assert_eq!(pool.retained(), 1);
    }

    #[test]
    fn transferred_buffer_is_not_returned_twice() {
        let pool: ArrayPool<String> = ArrayPool::new();
        let mut list = PooledSmallList::<String, 1, _>::new_in(&pool);
        list.push("a".into());
        list.push("b".into());
        let returns = pool.stats().returns;

        let buffer = list.transfer_ownership().unwrap();
        assert_eq!(buffer, ["a", "b"]);
        assert!(list.is_empty());
        assert_eq!(list.regime(), Regime::Inlined);
        list.dispose();
        drop(list);
        assert_eq!(pool.stats().returns, returns);

        pool.give_back(buffer);
        assert_eq!(pool.stats().returns, returns + 1);
    }

    #[test]
    fn full_buckets_discard() {
        let pool: ArrayPool<u8> = ArrayPool::with_max_retained(1);
        pool.give_back(Vec::with_capacity(16));
        pool.give_back(Vec::with_capacity(16));
        pool.give_back(Vec::new());
        let stats = pool.stats();
        assert_eq!(stats.returns, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(pool.retained(), 1);

        let buffer = pool.rent(9);
        assert!(buffer.capacity() >= 16);
        assert!(buffer.is_empty());
        assert_eq!(pool.stats().hits, 1);

        pool.give_back(buffer);
        pool.trim();
        assert_eq!(pool.retained(), 0);
    }

    #[test]
    fn rented_buffers_cover_request() {
        let pool: ArrayPool<u32> = ArrayPool::new();
        for min in [0, 1, 3, 4, 5, 100] {
            let buffer = pool.rent(min);
            assert!(buffer.capacity() >= min);
            pool.give_back(buffer);
        }
    }

    #[test]
    fn shared_pool_across_threads() {
        let pool = Arc::new(ArrayPool::<String>::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let mut list = PooledSmallList::<String, 2, _>::new_in(Arc::clone(&pool));
                        for i in 0..(round % 9) {
                            list.push(format!("{t}-{i}"));
                        }
                        assert_eq!(list.len(), round % 9);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.rents, stats.returns + stats.discarded);
    }
}

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Push(u8),
        Pop,
        Insert(usize, u8),
        Remove(usize),
        Set(usize, u8),
        Truncate(usize),
        Clear,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => any::<u8>().prop_map(Op::Push),
            1 => Just(Op::Pop),
            2 => (0usize..12, any::<u8>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (0usize..12).prop_map(Op::Remove),
            1 => (0usize..12, any::<u8>()).prop_map(|(i, v)| Op::Set(i, v)),
            1 => (0usize..12).prop_map(Op::Truncate),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn small_list_matches_vec(ops in proptest::collection::vec(op(), 0..64)) {
            let mut list = SmallList::new();
            let mut model: Vec<u8> = Vec::new();
            for op in ops {
                match op {
                    Op::Push(v) => {
                        list.push(v);
                        model.push(v);
                    }
                    Op::Pop => prop_assert_eq!(list.pop(), model.pop()),
                    Op::Insert(i, v) => {
                        let result = list.try_insert(i, v);
                        if i <= model.len() {
                            prop_assert_eq!(result, Ok(()));
                            model.insert(i, v);
                        } else {
                            prop_assert_eq!(result, Err(ListError::OutOfRange { index: i, bound: model.len() + 1 }));
                        }
                    }
                    Op::Remove(i) => {
                        let result = list.try_remove(i);
                        if i < model.len() {
                            prop_assert_eq!(result, Ok(model.remove(i)));
                        } else {
                            prop_assert_eq!(result, Err(ListError::OutOfRange { index: i, bound: model.len() }));
                        }
                    }
                    Op::Set(i, v) => {
                        let result = list.set(i, v);
                        match model.get_mut(i) {
                            Some(slot) => prop_assert_eq!(result, Ok(core::mem::replace(slot, v))),
                            None => prop_assert!(result.is_err()),
                        }
                    }
                    Op::Truncate(n) => {
                        list.truncate(n);
                        model.truncate(n);
                    }
                    Op::Clear => {
                        list.clear();
                        model.clear();
                    }
                }
                prop_assert_eq!(list.len(), model.len());
                prop_assert_eq!(list.inline_len(), model.len().min(3));
                prop_assert_eq!(list.is_spilled(), model.len() > 3);
                prop_assert_eq!(list.iter().copied().collect::<Vec<_>>(), model.clone());
                for (i, v) in model.iter().enumerate() {
                    prop_assert_eq!(list.get(i), Some(v));
                }
                prop_assert_eq!(list.get(model.len()), None);
            }
        }

        #[test]
        fn pooled_list_matches_vec(ops in proptest::collection::vec(op(), 0..64)) {
            let mut list: PooledSmallList<u8, 4> = PooledSmallList::new();
            let mut model: Vec<u8> = Vec::new();
            let mut grew = false;
            for op in ops {
                match op {
                    Op::Push(v) => {
                        list.push(v);
                        model.push(v);
                    }
                    Op::Pop => prop_assert_eq!(list.pop(), model.pop()),
                    Op::Insert(i, v) => {
                        if i <= model.len() {
                            list.insert(i, v);
                            model.insert(i, v);
                        }
                    }
                    Op::Remove(i) => {
                        if i < model.len() {
                            prop_assert_eq!(list.remove(i), model.remove(i));
                        }
                    }
                    Op::Set(i, v) => {
                        if let (Some(a), Some(b)) = (list.get_mut(i), model.get_mut(i)) {
                            *a = v;
                            *b = v;
                        }
                    }
                    Op::Truncate(n) => {
                        list.truncate(n);
                        model.truncate(n);
                    }
                    Op::Clear => {
                        list.clear();
                        model.clear();
                    }
                }
                grew |= model.len() > 4;
                prop_assert_eq!(list.as_slice(), model.as_slice());
                prop_assert!(list.capacity() >= list.len());
                prop_assert_eq!(list.is_unmanaged_heap(), grew);
            }
            list.dispose();
            prop_assert!(list.is_inlined());
        }

        #[test]
        fn from_iter_matches_from_slice(values in proptest::collection::vec(any::<u16>(), 0..20)) {
            let a = SmallList::from_slice(&values);
            let b = SmallList::from_iter(values.iter().copied());
            let c = SmallList::from(values.clone());
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a, &c);
            prop_assert_eq!(a.into_vec(), values);
        }

        #[test]
        fn wrap_index_stays_in_bounds(len in 1usize..20, index in any::<isize>()) {
            let list: SmallList<u8> = SmallList::zeroed(len);
            let wrapped = list.wrap_index(index).unwrap();
            prop_assert!(wrapped < len);
            prop_assert_eq!(wrapped as isize, index.rem_euclid(len as isize));
            let clamped = list.clamp_index(index).unwrap();
            prop_assert!(clamped < len);
        }
    }
}
