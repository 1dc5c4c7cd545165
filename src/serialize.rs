//! Little-endian (de)serialization of [`Mphf`] and [`RankedBitVector`].
//!
//! The byte layout mirrors the in-memory structures with no padding between
//! fields and is interchangeable with the C++ reference implementation:
//!
//! ```text
//! gamma: f64, nb_levels: u32, lastbitsetrank: u64, nelem: u64
//! per level: size: u64, nchar: u64, words: u64 × nchar,
//!            ranks_count: u64, ranks: u64 × ranks_count
//! fallback_count: u64, then (key: u64, value: u64) pairs
//! ```
//!
//! `nchar` is always `1 + size/64` (the padding word is mandatory) and is
//! honored as stored when reading. Streams are owned by the caller; loading
//! stops after the fallback table and leaves trailing bytes untouched.
//! Every rejected field and short read is reported with its byte offset.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use crate::error::Error;
use crate::mphf::Mphf;
use crate::rank::{RankedBitVector, WORDS_PER_SAMPLE};

/// Widest level count accepted when loading. Builds always write 25; the
/// margin tolerates other conforming writers without admitting absurd headers.
const MAX_FILE_LEVELS: u32 = 64;

/// Cap on speculative allocation while reading array fields; a corrupt count
/// then fails on the first short read instead of on a huge reserve.
const MAX_PREALLOC: usize = 1 << 20;

pub(crate) struct CountingWriter<W> {
    inner: W,
    offset: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.inner
            .write_all(bytes)
            .map_err(|source| Error::Io { offset: self.offset, source })?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    pub(crate) fn u32(&mut self, value: u32) -> Result<(), Error> {
        self.put(&value.to_le_bytes())
    }

    pub(crate) fn u64(&mut self, value: u64) -> Result<(), Error> {
        self.put(&value.to_le_bytes())
    }

    pub(crate) fn f64(&mut self, value: f64) -> Result<(), Error> {
        self.put(&value.to_le_bytes())
    }
}

pub(crate) struct CountingReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> CountingReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    fn take(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.inner.read_exact(buf).map_err(|source| match source.kind() {
            io::ErrorKind::UnexpectedEof => Error::Truncated { offset: self.offset },
            _ => Error::Io { offset: self.offset, source },
        })?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    pub(crate) fn u32(&mut self) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        self.take(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, Error> {
        let mut buf = [0u8; 8];
        self.take(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub(crate) fn f64(&mut self) -> Result<f64, Error> {
        let mut buf = [0u8; 8];
        self.take(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    pub(crate) fn u64_array(&mut self, count: usize) -> Result<Box<[u64]>, Error> {
        let mut values = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            values.push(self.u64()?);
        }
        Ok(values.into_boxed_slice())
    }
}

impl RankedBitVector {
    /// Writes the vector to `output` in the interchange byte layout.
    ///
    /// The rank samples must have been built; the layout stores them
    /// alongside the words.
    pub fn save<W: Write>(&self, output: &mut W) -> Result<(), Error> {
        debug_assert!(!self.ranks.is_empty(), "rank samples not built");
        self.write_into(&mut CountingWriter::new(output))
    }

    /// Reads a vector previously written by [`save`](RankedBitVector::save).
    pub fn load<R: Read>(input: &mut R) -> Result<Self, Error> {
        Self::read_from(&mut CountingReader::new(input))
    }

    pub(crate) fn write_into<W: Write>(&self, writer: &mut CountingWriter<W>) -> Result<(), Error> {
        writer.u64(self.len)?;
        writer.u64(self.words.len() as u64)?;
        for &word in self.words.iter() {
            writer.u64(word)?;
        }
        writer.u64(self.ranks.len() as u64)?;
        for &sample in self.ranks.iter() {
            writer.u64(sample)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: Read>(reader: &mut CountingReader<R>) -> Result<Self, Error> {
        let offset = reader.offset();
        let len = reader.u64()?;
        if len > i64::MAX as u64 {
            return Err(Error::Format { what: "bit vector size", value: len, offset });
        }

        let offset = reader.offset();
        let nchar = reader.u64()?;
        if nchar != 1 + len / 64 {
            return Err(Error::Format { what: "bit vector word count", value: nchar, offset });
        }
        let words = reader.u64_array(nchar as usize)?;

        let offset = reader.offset();
        let ranks_count = reader.u64()?;
        if ranks_count != nchar.div_ceil(WORDS_PER_SAMPLE as u64) {
            return Err(Error::Format { what: "rank sample count", value: ranks_count, offset });
        }
        let ranks = reader.u64_array(ranks_count as usize)?;

        Ok(RankedBitVector { words, ranks, len })
    }
}

impl Mphf {
    /// Writes the function to `output` in the interchange byte layout.
    ///
    /// Saving the same `Mphf` twice produces byte-identical output: fallback
    /// entries are written ordered by assigned index, which reproduces the
    /// insertion order of the build.
    pub fn save<W: Write>(&self, output: &mut W) -> Result<(), Error> {
        let mut writer = CountingWriter::new(output);
        writer.f64(self.gamma)?;
        writer.u32(self.levels.len() as u32)?;
        writer.u64(self.lastbitsetrank)?;
        writer.u64(self.nelem)?;
        for level in self.levels.iter() {
            level.write_into(&mut writer)?;
        }

        writer.u64(self.fallback.len() as u64)?;
        let mut spilled: Vec<(u64, u64)> = self.fallback.iter().map(|(&key, &index)| (key, index)).collect();
        spilled.sort_unstable_by_key(|&(_, index)| index);
        for (key, index) in spilled {
            writer.u64(key)?;
            writer.u64(index)?;
        }
        Ok(())
    }

    /// Reads a function previously written by [`save`](Mphf::save), from this
    /// or any other conforming implementation.
    ///
    /// Malformed fields, short reads and stream failures surface as
    /// [`Error::Format`], [`Error::Truncated`] and [`Error::Io`], each
    /// carrying the byte offset of the offending field.
    pub fn load<R: Read>(input: &mut R) -> Result<Self, Error> {
        let mut reader = CountingReader::new(input);

        let offset = reader.offset();
        let gamma = reader.f64()?;
        if !gamma.is_finite() || gamma < 1.0 {
            return Err(Error::Format { what: "gamma", value: gamma.to_bits(), offset });
        }

        let offset = reader.offset();
        let nb_levels = reader.u32()?;
        if nb_levels == 0 || nb_levels > MAX_FILE_LEVELS {
            return Err(Error::Format { what: "level count", value: nb_levels as u64, offset });
        }

        let lastbitsetrank = reader.u64()?;
        let nelem = reader.u64()?;

        let mut levels = Vec::with_capacity(nb_levels as usize);
        for _ in 0..nb_levels {
            let offset = reader.offset();
            let level = RankedBitVector::read_from(&mut reader)?;
            if level.is_empty() {
                return Err(Error::Format { what: "level bit count", value: 0, offset });
            }
            levels.push(level);
        }

        let offset = reader.offset();
        let fallback_count = reader.u64()?;
        if fallback_count > nelem {
            return Err(Error::Format { what: "fallback entry count", value: fallback_count, offset });
        }
        let mut fallback = HashMap::with_capacity(fallback_count.min(MAX_PREALLOC as u64) as usize);
        for _ in 0..fallback_count {
            let key = reader.u64()?;
            let index = reader.u64()?;
            fallback.insert(key, index);
        }

        Ok(Mphf {
            gamma,
            levels: levels.into_boxed_slice(),
            lastbitsetrank,
            nelem,
            fallback,
        })
    }
}
