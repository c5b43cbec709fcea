//! Multi-indices for cells and basis functions of tensor product meshes.
//!
//! A multi-index is a `[usize; D]`; its derived `Ord` is the lexicographic
//! order used for every returned collection in this crate. Sets of
//! multi-indices are kept in [`IndexSet`], which enforces sorting and
//! deduplication by construction.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use itertools::Itertools;

/// A D-tuple of per-axis cell or function indices.
pub type MultiIndex<const D: usize> = [usize; D];

/// Sorted, duplicate-free set of multi-indices.
pub type IndexSet<const D: usize> = BTreeSet<MultiIndex<D>>;

/// Per-level sets of multi-indices (e.g. marked or active cells).
pub type LevelSets<const D: usize> = BTreeMap<usize, IndexSet<D>>;

/// Lexicographic cartesian product of per-axis ranges.
pub fn product<const D: usize>(ranges: [Range<usize>; D]) -> impl Iterator<Item = MultiIndex<D>> {
    ranges
        .into_iter()
        .multi_cartesian_product()
        .map(|v| std::array::from_fn(|d| v[d]))
}

/// Cartesian product of per-axis index lists.
pub fn product_of_lists<const D: usize>(lists: [Vec<usize>; D]) -> impl Iterator<Item = MultiIndex<D>> {
    lists
        .into_iter()
        .multi_cartesian_product()
        .map(|v| std::array::from_fn(|d| v[d]))
}

/// Sequential (row-major) index of `idx` in a grid of shape `dims`.
#[inline]
pub fn ravel<const D: usize>(idx: &MultiIndex<D>, dims: &[usize; D]) -> usize {
    idx.iter().zip(dims).fold(0, |acc, (&i, &n)| acc * n + i)
}

/// Inverse of [`ravel`].
#[inline]
pub fn unravel<const D: usize>(mut seq: usize, dims: &[usize; D]) -> MultiIndex<D> {
    let mut idx = [0; D];
    for d in (0..D).rev() {
        idx[d] = seq % dims[d];
        seq /= dims[d];
    }
    idx
}

/// Raveled indices of an ordered sequence of multi-indices, order preserved.
pub fn ravel_all<'a, const D: usize>(
    indices: impl IntoIterator<Item = &'a MultiIndex<D>>,
    dims: &[usize; D],
) -> Vec<usize> {
    indices.into_iter().map(|i| ravel(i, dims)).collect()
}
