//! # Neighbor Subset Enumeration
//!
//! Given the neighbor list of a relation set, the search needs every non-empty
//! way of picking some of those neighbors. Subsets are produced in ascending
//! bitmask order over neighbor positions (neighbor `i` is bit `i`):
//!
//! ```text
//! neighbors = [3, 5, 8]
//! mask 1 -> [3]      mask 4 -> [8]
//! mask 2 -> [5]      mask 5 -> [3, 8]
//! mask 3 -> [3, 5]   mask 6 -> [5, 8]
//!                    mask 7 -> [3, 5, 8]
//! ```
//!
//! The order is fixed so that repeated runs over the same input make the same
//! tie-break decisions. A size-restricted enumeration steps straight from one
//! mask to the next larger mask with the same popcount, so it visits only the
//! `C(K, size)` subsets it yields. Because members are picked from an ascending neighbor
//! list in bit order, every yielded subset is itself ascending and can be fed
//! straight to `RelationSetManager::relation_from_sorted`.

use crate::relation_set::RelationId;
use std::iter::FusedIterator;

/// Widest neighbor list the bitmask can represent.
pub const MAX_NEIGHBORS: usize = 63;

/// Iterator over the non-empty subsets of a neighbor list.
#[derive(Debug, Clone)]
pub struct NeighborSubsets<'a> {
    neighbors: &'a [RelationId],
    next: u64,
    end: u64,
    size: Option<u32>,
}

impl<'a> NeighborSubsets<'a> {
    /// All `2^K - 1` non-empty subsets of `neighbors`.
    ///
    /// # Panics
    ///
    /// Panics if `neighbors` holds more than [`MAX_NEIGHBORS`] entries.
    pub fn new(neighbors: &'a [RelationId]) -> Self {
        assert!(
            neighbors.len() <= MAX_NEIGHBORS,
            "cannot enumerate subsets of {} neighbors (limit {MAX_NEIGHBORS})",
            neighbors.len()
        );
        Self {
            neighbors,
            next: 1,
            end: 1u64 << neighbors.len(),
            size: None,
        }
    }

    /// Only the subsets with exactly `size` members, in the same relative order.
    pub fn with_size(neighbors: &'a [RelationId], size: usize) -> Self {
        let mut subsets = Self::new(neighbors);
        if size == 0 || size > neighbors.len() {
            subsets.next = subsets.end;
        } else {
            // Smallest mask with `size` bits set.
            subsets.next = u64::MAX >> (64 - size);
        }
        subsets.size = Some(size as u32);
        subsets
    }

    fn advance(&mut self) {
        let mask = self.next;
        self.next = match self.size {
            None => mask + 1,
            Some(_) => next_same_popcount(mask),
        };
    }
}

/// Next larger integer with the same number of set bits (Gosper's hack).
///
/// `mask` must be non-zero and below `2^63`, which keeps the addition from
/// overflowing.
fn next_same_popcount(mask: u64) -> u64 {
    let lowest = mask & mask.wrapping_neg();
    let ripple = mask + lowest;
    (((ripple ^ mask) >> 2) / lowest) | ripple
}

impl Iterator for NeighborSubsets<'_> {
    type Item = Vec<RelationId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let mask = self.next;
        self.advance();

        let mut subset = Vec::with_capacity(mask.count_ones() as usize);
        let mut bits = mask;
        while bits != 0 {
            let i = bits.trailing_zeros() as usize;
            subset.push(self.neighbors[i]);
            bits &= bits - 1;
        }
        Some(subset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        match self.size {
            None => (remaining, Some(remaining)),
            Some(_) => (0, Some(remaining)),
        }
    }
}

impl FusedIterator for NeighborSubsets<'_> {}
