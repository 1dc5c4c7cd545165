//! Fixed-size bit vector with sampled ranks for O(1) `rank` queries.
//!
//! The layout is dictated by the interchange format: bits are stored
//! little-endian within `u64` words, the word array always carries one
//! padding word (`1 + len/64` words even when `len` is a multiple of 64),
//! and a cumulative popcount is sampled before every 512-bit block. Samples
//! start from a caller-supplied offset so that ranks chain across the level
//! vectors of a cascade; `rank` therefore answers in the chained domain, not
//! just within this vector.

use std::mem::size_of_val;

/// Number of bits covered by one rank sample.
pub(crate) const RANK_SAMPLE_BITS: u64 = 512;
/// Number of words covered by one rank sample.
pub(crate) const WORDS_PER_SAMPLE: usize = (RANK_SAMPLE_BITS / 64) as usize;

/// Trait for bit and rank queries on ranked bit vectors.
///
/// Provides the query half of [`RankedBitVector`] in a form shared between
/// the native struct and its `Archived` counterpart (under the `rkyv_derive`
/// feature), so both run the same code.
pub trait RankedBitVectorAccess {
    /// Returns the bit at `pos`. `pos` must be below the bit length.
    fn get(&self, pos: u64) -> bool;

    /// Returns the sample offset plus the number of set bits at positions
    /// below `pos`. `pos` may equal the bit length. Requires built ranks.
    fn rank(&self, pos: u64) -> u64;

    /// Number of addressable bits.
    fn bit_len(&self) -> u64;

    /// Inner implementation of `get` over raw words.
    ///
    /// # Safety
    /// `pos / 64` must be within the bounds of `words`.
    #[inline]
    unsafe fn get_impl(words: &[u64], pos: u64) -> bool {
        (*words.get_unchecked((pos / 64) as usize) >> (pos % 64)) & 1 != 0
    }

    /// Inner implementation of `rank` over raw words and samples.
    ///
    /// # Safety
    /// `pos / 64` must be within the bounds of `words` and `pos / 512`
    /// within the bounds of `ranks`. The padding word guarantees both for
    /// any `pos` up to and including the bit length.
    #[inline]
    unsafe fn rank_impl(words: &[u64], ranks: &[u64], pos: u64) -> u64 {
        let word_idx = (pos / 64) as usize;
        let sample_idx = (pos / RANK_SAMPLE_BITS) as usize;

        let mut rank = *ranks.get_unchecked(sample_idx);
        for word in words.get_unchecked(sample_idx * WORDS_PER_SAMPLE..word_idx) {
            rank += word.count_ones() as u64;
        }

        let partial = *words.get_unchecked(word_idx) & ((1u64 << (pos % 64)) - 1);
        rank + partial.count_ones() as u64
    }
}

/// A fixed-size bit vector with precomputed rank samples.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "rkyv_derive", derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize))]
#[cfg_attr(feature = "rkyv_derive", archive_attr(derive(rkyv::CheckBytes)))]
pub struct RankedBitVector {
    /// Bit storage, bit `i` of the vector is bit `i % 64` of word `i / 64`.
    pub(crate) words: Box<[u64]>,
    /// Cumulative popcount (plus chaining offset) sampled every 512 bits.
    /// Empty until [`build_ranks`](RankedBitVector::build_ranks) runs.
    pub(crate) ranks: Box<[u64]>,
    /// Number of addressable bits.
    pub(crate) len: u64,
}

impl RankedBitVector {
    /// Allocates a zeroed vector of `len` bits backed by `1 + len/64` words.
    pub fn new(len: u64) -> Self {
        Self {
            words: vec![0u64; (1 + len / 64) as usize].into_boxed_slice(),
            ranks: Box::default(),
            len,
        }
    }

    /// Number of addressable bits.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the vector holds no addressable bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets the bit at `pos`. Setting an already-set bit is a no-op.
    #[inline]
    pub fn set(&mut self, pos: u64) {
        assert!(pos < self.len, "bit position {pos} out of range for {} bits", self.len);
        self.words[(pos / 64) as usize] |= 1u64 << (pos % 64);
    }

    /// Returns the `index`-th storage word.
    #[inline]
    pub fn word(&self, index: usize) -> u64 {
        self.words[index]
    }

    /// Computes the rank samples, with the running popcount starting from
    /// `offset`, and returns the final running total (`offset` plus the
    /// number of set bits). The returned total seeds the next vector in a
    /// chain.
    pub fn build_ranks(&mut self, offset: u64) -> u64 {
        let mut ranks = Vec::with_capacity(self.words.len().div_ceil(WORDS_PER_SAMPLE));
        let mut total = offset;
        for (i, word) in self.words.iter().enumerate() {
            if i % WORDS_PER_SAMPLE == 0 {
                ranks.push(total);
            }
            total += word.count_ones() as u64;
        }
        self.ranks = ranks.into_boxed_slice();
        total
    }

    /// Returns the total number of bytes occupied by the vector.
    pub fn size_bytes(&self) -> usize {
        size_of_val(self) + size_of_val(self.words.as_ref()) + size_of_val(self.ranks.as_ref())
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }
}

impl RankedBitVectorAccess for RankedBitVector {
    #[inline]
    fn get(&self, pos: u64) -> bool {
        assert!(pos < self.len, "bit position {pos} out of range for {} bits", self.len);
        unsafe { Self::get_impl(&self.words, pos) }
    }

    #[inline]
    fn rank(&self, pos: u64) -> u64 {
        assert!(pos <= self.len, "rank position {pos} out of range for {} bits", self.len);
        assert!(!self.ranks.is_empty(), "rank samples not built");
        unsafe { Self::rank_impl(&self.words, &self.ranks, pos) }
    }

    #[inline]
    fn bit_len(&self) -> u64 {
        self.len
    }
}

/// `rank`/`get` for the `Archived` version of `RankedBitVector`.
#[cfg(feature = "rkyv_derive")]
impl RankedBitVectorAccess for ArchivedRankedBitVector {
    #[inline]
    fn get(&self, pos: u64) -> bool {
        assert!(pos < self.len, "bit position {pos} out of range for {} bits", self.len);
        unsafe { Self::get_impl(&self.words, pos) }
    }

    #[inline]
    fn rank(&self, pos: u64) -> u64 {
        assert!(pos <= self.len, "rank position {pos} out of range for {} bits", self.len);
        unsafe { Self::rank_impl(&self.words, &self.ranks, pos) }
    }

    #[inline]
    fn bit_len(&self) -> u64 {
        self.len
    }
}
