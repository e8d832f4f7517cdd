//! Fragment index sets
//!
//! Fragment indices `0..k` name data fragments and `k..n` name parity
//! fragments. Sets of indices are kept either as a one-word bitmap
//! ([`FragmentSet`]) or as an ordered list ([`FragmentList`]); the two convert
//! freely as long as `n <= 64`.

use crate::error::{ErasureError, Result};
use smallvec::SmallVec;

/// Number of fragment indices a [`FragmentSet`] can hold
pub const MAX_FRAGMENTS: usize = u64::BITS as usize;

/// Terminator used by host-side index lists
pub const SENTINEL: i32 = -1;

/// Bitmap of fragment indices, bit position = fragment index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FragmentSet(u64);

impl FragmentSet {
    pub const EMPTY: FragmentSet = FragmentSet(0);

    /// Build a set from an index list, rejecting duplicates and indices `>= n`
    pub fn from_indices(indices: &[usize], n: usize) -> Result<Self> {
        let mut set = Self::EMPTY;
        for &index in indices {
            if index >= n || index >= MAX_FRAGMENTS {
                return Err(ErasureError::InvalidIndex {
                    index,
                    reason: "out of range",
                });
            }
            if set.contains(index) {
                return Err(ErasureError::InvalidIndex {
                    index,
                    reason: "duplicate",
                });
            }
            set.insert(index);
        }
        Ok(set)
    }

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn contains(self, index: usize) -> bool {
        index < MAX_FRAGMENTS && (self.0 >> index) & 1 == 1
    }

    /// Add an index; indices beyond the bitmap capacity are ignored
    #[inline]
    pub fn insert(&mut self, index: usize) {
        if index < MAX_FRAGMENTS {
            self.0 |= 1 << index;
        }
    }

    #[inline]
    pub const fn union(self, other: FragmentSet) -> FragmentSet {
        FragmentSet(self.0 | other.0)
    }

    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of members in `range_start..range_end`
    pub fn count_in(self, range_start: usize, range_end: usize) -> usize {
        (range_start..range_end.min(MAX_FRAGMENTS))
            .filter(|&i| self.contains(i))
            .count()
    }

    /// Members in ascending order
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(index)
        })
    }

    /// Ordered list of the members
    pub fn to_list(self) -> FragmentList {
        FragmentList(self.iter().collect())
    }
}

/// Ordered list of fragment indices
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FragmentList(SmallVec<[usize; 16]>);

impl FragmentList {
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Read a sentinel-terminated host list; stops at the first negative entry
    pub fn from_sentinel(list: &[i32]) -> Self {
        Self(
            list.iter()
                .take_while(|&&i| i > SENTINEL)
                .map(|&i| i as usize)
                .collect(),
        )
    }

    /// Copy out as a sentinel-terminated host list
    pub fn to_sentinel(&self) -> Vec<i32> {
        self.0
            .iter()
            .map(|&i| i as i32)
            .chain(std::iter::once(SENTINEL))
            .collect()
    }

    pub fn push(&mut self, index: usize) {
        self.0.push(index);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Convert to a bitmap, validating every entry against `n`
    pub fn to_set(&self, n: usize) -> Result<FragmentSet> {
        FragmentSet::from_indices(&self.0, n)
    }
}

impl From<&[usize]> for FragmentList {
    fn from(indices: &[usize]) -> Self {
        Self(indices.iter().copied().collect())
    }
}

impl FromIterator<usize> for FragmentList {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::ops::Deref for FragmentList {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

/// Number of entries before the sentinel
pub fn count(list: &[i32]) -> usize {
    list.iter().take_while(|&&i| i > SENTINEL).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_positions_match_indices() {
        let set = FragmentSet::from_indices(&[0, 3, 63], 64).unwrap();
        assert_eq!(set.bits(), 1 | (1 << 3) | (1 << 63));
        assert!(set.contains(3));
        assert!(!set.contains(4));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_rejects_out_of_range_and_duplicates() {
        assert!(matches!(
            FragmentSet::from_indices(&[6], 6),
            Err(ErasureError::InvalidIndex { index: 6, .. })
        ));
        assert!(matches!(
            FragmentSet::from_indices(&[1, 2, 1], 6),
            Err(ErasureError::InvalidIndex { index: 1, .. })
        ));
    }

    #[test]
    fn test_iter_is_ascending() {
        let set = FragmentSet::from_indices(&[9, 1, 5], 10).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 5, 9]);
        assert_eq!(set.to_list().as_slice(), &[1, 5, 9]);
    }

    #[test]
    fn test_sentinel_lists() {
        let host = [4, 2, -1, 7];
        assert_eq!(count(&host), 2);

        let list = FragmentList::from_sentinel(&host);
        assert_eq!(list.as_slice(), &[4, 2]);
        assert_eq!(list.to_sentinel(), vec![4, 2, -1]);
        assert_eq!(list.to_set(6).unwrap().bits(), 0b10100);
    }

    #[test]
    fn test_count_in_range() {
        let set = FragmentSet::from_indices(&[0, 2, 4, 5], 6).unwrap();
        assert_eq!(set.count_in(0, 4), 2);
        assert_eq!(set.count_in(4, 6), 2);
    }

    #[test]
    fn test_union() {
        let a = FragmentSet::from_indices(&[1], 4).unwrap();
        let b = FragmentSet::from_indices(&[3], 4).unwrap();
        assert_eq!(a.union(b).iter().collect::<Vec<_>>(), vec![1, 3]);
        assert!(FragmentSet::EMPTY.is_empty());
    }
}
