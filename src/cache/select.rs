//! Partial Selection Module
//!
//! Finds the `k` smallest items of a collection without sorting it, using
//! randomized quickselect. Expected linear time; ties are not ordered stably.

use std::cmp::Ordering;

use rand::Rng;

// == Select Lowest ==
/// Returns the `k` items that compare lowest under `compare`.
///
/// The returned items are in no particular order. `k == 0` yields nothing and
/// `k >= items.len()` yields every item.
pub fn select_lowest<T, F, R>(mut items: Vec<T>, k: usize, mut compare: F, rng: &mut R) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
    R: Rng + ?Sized,
{
    if k == 0 {
        return Vec::new();
    }
    if k >= items.len() {
        return items;
    }

    // Rank of the k-th smallest item; everything left of it ends up <= it.
    let target = k - 1;
    let mut lo = 0;
    let mut hi = items.len() - 1;

    while lo < hi {
        let pivot = rng.gen_range(lo..=hi);
        let rank = lo + partition(&mut items[lo..=hi], pivot - lo, &mut compare);

        match rank.cmp(&target) {
            Ordering::Equal => break,
            Ordering::Less => lo = rank + 1,
            Ordering::Greater => hi = rank - 1,
        }
    }

    items.truncate(k);
    items
}

/// Lomuto partition around `slice[pivot]`; returns the pivot's final index.
fn partition<T, F>(slice: &mut [T], pivot: usize, compare: &mut F) -> usize
where
    F: FnMut(&T, &T) -> Ordering,
{
    let last = slice.len() - 1;
    slice.swap(pivot, last);

    let mut store = 0;
    for i in 0..last {
        if compare(&slice[i], &slice[last]) == Ordering::Less {
            slice.swap(i, store);
            store += 1;
        }
    }

    slice.swap(store, last);
    store
}
