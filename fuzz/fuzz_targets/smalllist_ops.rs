//! Drives `SmallList` and `PooledSmallList` with a byte-coded op stream and checks them against
//! a `Vec`.

#[cfg(feature = "afl_fuzz")]
#[macro_use]
extern crate afl;
#[cfg(feature = "honggfuzz_fuzz")]
#[macro_use]
extern crate honggfuzz;

use smalllist::{ArrayPool, PooledSmallList, SmallList};

fn do_test(data: &[u8]) {
    let pool = ArrayPool::new();
    let mut list = SmallList::new();
    let mut pooled = PooledSmallList::<u8, 4, _>::new_in(&pool);
    let mut model: Vec<u8> = Vec::new();

    let mut bytes = data.iter().copied();
    while let Some(op) = bytes.next() {
        let arg = bytes.next().unwrap_or(0);
        match op % 9 {
            0 => {
                list.push(arg);
                pooled.push(arg);
                model.push(arg);
            }
            1 => {
                let expected = model.pop();
                assert_eq!(list.pop(), expected);
                assert_eq!(pooled.pop(), expected);
            }
            2 => {
                let index = arg as usize;
                if index <= model.len() {
                    list.insert(index, op);
                    pooled.insert(index, op);
                    model.insert(index, op);
                } else {
                    assert!(list.try_insert(index, op).is_err());
                }
            }
            3 => {
                let index = arg as usize;
                if index < model.len() {
                    let expected = model.remove(index);
                    assert_eq!(list.remove(index), expected);
                    assert_eq!(pooled.remove(index), expected);
                } else {
                    assert!(list.try_remove(index).is_err());
                }
            }
            4 => {
                let len = arg as usize;
                list.truncate(len);
                pooled.truncate(len);
                model.truncate(len);
            }
            5 => {
                let slice = &data[..(arg as usize).min(data.len())];
                list.extend_from_slice(slice);
                pooled.extend_from_slice(slice);
                model.extend_from_slice(slice);
            }
            6 => {
                let offset = (arg as usize).min(model.len());
                let count = (op as usize / 9).min(model.len() - offset);
                pooled.remove_range(offset, count);
                model.drain(offset..offset + count);
                list = SmallList::from_slice(&model);
            }
            7 => {
                if let Some(buffer) = pooled.transfer_ownership_unmanaged() {
                    assert_eq!(&*buffer, model.as_slice());
                    pooled.extend_from_slice(&buffer);
                }
            }
            _ => {
                let wrapped = list.wrap_index(arg as i8 as isize);
                assert_eq!(wrapped.is_err(), model.is_empty());
                if let Ok(index) = wrapped {
                    assert_eq!(list[index], model[index]);
                }
            }
        }
        assert_eq!(list.len(), model.len());
        assert!(list.iter().eq(model.iter()));
        assert_eq!(pooled.as_slice(), model.as_slice());
    }

    pooled.dispose();
    pooled.dispose();
}

#[cfg(feature = "afl_fuzz")]
fn main() {
    fuzz!(|data| {
        do_test(data);
    });
}

#[cfg(feature = "honggfuzz_fuzz")]
fn main() {
    loop {
        fuzz!(|data| {
            do_test(data);
        });
    }
}

#[cfg(not(any(feature = "afl_fuzz", feature = "honggfuzz_fuzz")))]
fn main() {
    let mut data = Vec::new();
    std::io::Read::read_to_end(&mut std::io::stdin(), &mut data).unwrap();
    do_test(&data);
}
