//! # Minimal Perfect Hash Function (MPHF) Module
//!
//! This module implements a Minimal Perfect Hash Function (MPHF) over `u64`
//! key sets using the cascaded-bitset construction, as detailed in
//! [Fast and scalable minimal perfect hashing for massive key sets](https://doi.org/10.4230/LIPIcs.SEA.2017.25).
//!
//! Construction hashes every key into a level-sized bit vector, keeps the
//! positions hit exactly once, and cascades the collided keys into the next
//! (smaller) level. After a fixed number of levels the handful of still
//! colliding keys spill into a plain key→index table. A query replays the
//! same probes and answers with the rank of the first set bit it finds, so
//! each of the `n` keys maps to a distinct index in `[0, n)`.
//!
//! The serialized form (see [`Mphf::save`]) is byte-compatible with the
//! files produced by the C++ reference implementation of the construction.

use std::collections::HashMap;
use std::mem::{size_of, size_of_val};

use crate::error::Error;
use crate::hash::bit_index;
use crate::rank::{RankedBitVector, RankedBitVectorAccess};

/// Number of cascade levels a build always allocates.
pub const NB_LEVELS: u32 = 25;

/// Default load factor: each level's bit vector holds twice as many bits as
/// it has incoming keys.
pub const DEFAULT_GAMMA: f64 = 2.0;

/// Sentinel returned by [`Mphf::lookup`] for keys with no assignment.
pub const NOT_FOUND: u64 = u64::MAX;

/// A Minimal Perfect Hash Function (MPHF) over a fixed set of `u64` keys.
///
/// Immutable once built: concurrent lookups need no synchronization.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "rkyv_derive", derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize))]
#[cfg_attr(feature = "rkyv_derive", archive_attr(derive(rkyv::CheckBytes)))]
pub struct Mphf {
    /// Load factor the function was built with.
    pub(crate) gamma: f64,
    /// Cascade level bit vectors, rank samples chained level to level.
    pub(crate) levels: Box<[RankedBitVector]>,
    /// Cumulative rank at the end of the last level; base index for spilled keys.
    pub(crate) lastbitsetrank: u64,
    /// Number of indexed keys.
    pub(crate) nelem: u64,
    /// Keys that collided through every level, mapped straight to an index.
    pub(crate) fallback: HashMap<u64, u64>,
}

impl Mphf {
    /// Builds an MPHF over `keys` with load factor `gamma`.
    ///
    /// `keys` must be distinct; a duplicate surfaces as
    /// [`Error::DuplicateKey`]. `gamma` must be a finite value of at least
    /// 1.0 and trades memory for fewer cascade levels.
    pub fn from_slice(keys: &[u64], gamma: f64) -> Result<Self, Error> {
        Self::with_levels(keys, gamma, NB_LEVELS)
    }

    fn with_levels(keys: &[u64], gamma: f64, nb_levels: u32) -> Result<Self, Error> {
        if !gamma.is_finite() || gamma < 1.0 {
            return Err(Error::InvalidGamma(gamma));
        }

        let mut remaining = keys.to_vec();
        let mut levels = Vec::with_capacity(nb_levels as usize);
        for level in 0..nb_levels {
            let size = level_size(gamma, remaining.len());
            let mut bits = RankedBitVector::new(size);
            let mut collision = vec![0u64; bits.words().len()];

            for &key in &remaining {
                mark_bit(bits.words_mut(), &mut collision, bit_index(key, level, size));
            }
            clear_collided(bits.words_mut(), &collision);

            // A surviving bit now identifies exactly one key; everyone who
            // collided cascades into the next level.
            remaining.retain(|&key| !bits.get(bit_index(key, level, size)));
            levels.push(bits);
        }

        let mut rank_offset = 0;
        for level in &mut levels {
            rank_offset = level.build_ranks(rank_offset);
        }
        let lastbitsetrank = rank_offset;

        let mut fallback = HashMap::with_capacity(remaining.len());
        for (spill, &key) in remaining.iter().enumerate() {
            if fallback.insert(key, lastbitsetrank + spill as u64).is_some() {
                // Equal keys collide at every level, so any duplicate in the
                // input ends up here.
                return Err(Error::DuplicateKey(key));
            }
        }

        Ok(Mphf {
            gamma,
            levels: levels.into_boxed_slice(),
            lastbitsetrank,
            nelem: keys.len() as u64,
            fallback,
        })
    }

    /// Returns the index assigned to `key`, within 0 to the key set size
    /// (exclusive), or [`NOT_FOUND`] if no level matched and the fallback
    /// holds no entry.
    ///
    /// The function is not a membership test: a key absent from the build
    /// set may map onto any index.
    #[inline]
    pub fn lookup(&self, key: u64) -> u64 {
        match level_scan(&self.levels, key) {
            Some(index) => index,
            None => self.fallback.get(&key).copied().unwrap_or(NOT_FOUND),
        }
    }

    /// Returns the index assigned to `key`, or `None` instead of the
    /// [`NOT_FOUND`] sentinel.
    #[inline]
    pub fn get(&self, key: u64) -> Option<u64> {
        match self.lookup(key) {
            NOT_FOUND => None,
            index => Some(index),
        }
    }

    /// Number of keys the function was built over.
    #[inline]
    pub fn size(&self) -> u64 {
        self.nelem
    }

    /// Number of keys the function was built over, under the conventional
    /// container name.
    #[inline]
    pub fn len(&self) -> u64 {
        self.nelem
    }

    /// Returns `true` if the function indexes no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nelem == 0
    }

    /// Load factor the function was built with.
    #[inline]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Returns the total number of bytes occupied by the `Mphf`.
    pub fn size_bytes(&self) -> usize {
        size_of_val(self)
            + self.levels.iter().map(RankedBitVector::size_bytes).sum::<usize>()
            + self.fallback.len() * size_of::<(u64, u64)>()
    }
}

/// Query methods on the `Archived` version of [`Mphf`], sharing the level
/// scan with the native struct.
#[cfg(feature = "rkyv_derive")]
impl ArchivedMphf {
    /// Returns the index assigned to `key`, or [`NOT_FOUND`]; agrees
    /// pointwise with [`Mphf::lookup`] on the archived function.
    #[inline]
    pub fn lookup(&self, key: u64) -> u64 {
        match level_scan(&self.levels, key) {
            Some(index) => index,
            None => self.fallback.get(&key).copied().unwrap_or(NOT_FOUND),
        }
    }

    /// Returns the index assigned to `key`, or `None` instead of the
    /// [`NOT_FOUND`] sentinel.
    #[inline]
    pub fn get(&self, key: u64) -> Option<u64> {
        match self.lookup(key) {
            NOT_FOUND => None,
            index => Some(index),
        }
    }

    /// Number of keys the function was built over.
    #[inline]
    pub fn size(&self) -> u64 {
        self.nelem
    }

    /// Number of keys the function was built over, under the conventional
    /// container name.
    #[inline]
    pub fn len(&self) -> u64 {
        self.nelem
    }

    /// Returns `true` if the function indexes no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nelem == 0
    }
}

/// Bits allocated for a level receiving `remaining` keys, never below one.
#[inline]
fn level_size(gamma: f64, remaining: usize) -> u64 {
    ((gamma * remaining as f64).ceil() as u64).max(1)
}

/// Sets bit `pos` in `bits`; if it already was set, records it in `collision`.
#[inline]
fn mark_bit(bits: &mut [u64], collision: &mut [u64], pos: u64) {
    let index = (pos / 64) as usize;
    let mask = 1u64 << (pos % 64);
    collision[index] |= bits[index] & mask;
    bits[index] |= mask;
}

/// Clears from `bits` every position marked in `collision`.
fn clear_collided(bits: &mut [u64], collision: &[u64]) {
    for (word, collided) in bits.iter_mut().zip(collision) {
        *word &= !collided;
    }
}

/// Scans the cascade in level order and returns the chained rank of the
/// first level whose probe bit is set for `key`.
#[inline]
fn level_scan<V: RankedBitVectorAccess>(levels: &[V], key: u64) -> Option<u64> {
    for (level, bits) in levels.iter().enumerate() {
        let pos = bit_index(key, level as u32, bits.bit_len());
        if bits.get(pos) {
            return Some(bits.rank(pos));
        }
    }
    None
}


#[cfg(all(test, feature = "rkyv_derive"))]
mod archived_tests {
    use super::tests::{distinct_keys, spilling_keys};
    use super::*;

    #[test]
    fn test_archived_lookup_agrees() {
        let keys = distinct_keys(1000, 123);
        let mphf = Mphf::from_slice(&keys, DEFAULT_GAMMA).unwrap();

        let bytes = rkyv::to_bytes::<_, 1024>(&mphf).unwrap();
        let archived = rkyv::check_archived_root::<Mphf>(&bytes).unwrap();

        assert_eq!(archived.len(), mphf.len());
        for &key in &keys {
            assert_eq!(archived.lookup(key), mphf.lookup(key));
        }
    }

    #[test]
    fn test_archived_fallback_agrees() {
        let keys = spilling_keys();
        let mphf = Mphf::from_slice(&keys, 1.0).unwrap();
        assert!(!mphf.fallback.is_empty());

        let bytes = rkyv::to_bytes::<_, 1024>(&mphf).unwrap();
        let archived = rkyv::check_archived_root::<Mphf>(&bytes).unwrap();

        for &key in &keys {
            assert_eq!(archived.lookup(key), mphf.lookup(key));
        }
    }
}
