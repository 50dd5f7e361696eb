// src/lexer/tables/pack.rs
//! Packs integer tables into chunks of 16-bit units and back.
//!
//! Two encodings:
//!  - count/value: run-length pairs `(count, value + translate)`, one unit each
//!  - hi/low: every value in `[0, 2^32)` becomes `value >> 16`, `value & 0xFFFF`
//!
//! A chunk is closed before its estimated UTF-8 size would pass [`MAX_CHUNK_BYTES`],
//! so every chunk fits one string constant whose length is stored in 16 bits.
//! Pairs never straddle two chunks.

use std::fmt::Write as _;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::lexer::error::CodecError;

/// Upper bound on the UTF-8 estimate of one chunk.
pub const MAX_CHUNK_BYTES: usize = 0xFFFF - 6;
/// Longest run a single count/value pair can carry.
pub const MAX_RUN: usize = 0xFFFF;

const MAX_UNIT: i64 = 0xFFFF;
const MAX_HI_LOW: i64 = u32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    CountValue,
    HiLow,
}

/// Estimated UTF-8 size of one unit inside a string constant. Zero is stored as two bytes
/// and the two-byte range stops at 0x400.
#[inline]
pub fn utf8_cost(unit: u16) -> usize {
    match unit {
        0 => 2,
        1..=0x7F => 1,
        0x80..=0x3FF => 2,
        _ => 3,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedChunk {
    units: Vec<u16>,
    utf8_len: usize,
}

impl PackedChunk {
    pub fn from_units(units: Vec<u16>) -> Self {
        let utf8_len = units.iter().map(|&u| utf8_cost(u)).sum();
        Self { units, utf8_len }
    }

    pub fn units(&self) -> &[u16] {
        &self.units
    }

    /// UTF-8 size estimate; never above [`MAX_CHUNK_BYTES`] for chunks produced by packing.
    pub fn utf8_len(&self) -> usize {
        self.utf8_len
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn push(&mut self, unit: u16) {
        self.utf8_len += utf8_cost(unit);
        self.units.push(unit);
    }

    /// Text form: `\\` for a backslash, `\uXXXX` for everything else.
    pub fn escaped(&self) -> String {
        let mut out = String::with_capacity(self.units.len() * 6);
        for &u in &self.units {
            if u == u16::from(b'\\') {
                out.push_str("\\\\");
            } else {
                let _ = write!(out, "\\u{u:04x}");
            }
        }
        out
    }

    pub fn from_escaped(text: &str) -> Result<Self, CodecError> {
        let bytes = text.as_bytes();
        let mut chunk = PackedChunk::default();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'\\' {
                return Err(CodecError::Malformed {
                    offset: i,
                    reason: "expected '\\'",
                });
            }
            match bytes.get(i + 1) {
                Some(b'\\') => {
                    chunk.push(u16::from(b'\\'));
                    i += 2;
                }
                Some(b'u') => {
                    let hex = bytes.get(i + 2..i + 6).ok_or(CodecError::Malformed {
                        offset: i,
                        reason: "truncated \\u escape",
                    })?;
                    let mut unit = 0u16;
                    for &h in hex {
                        let digit = (h as char).to_digit(16).ok_or(CodecError::Malformed {
                            offset: i,
                            reason: "non-hex digit in \\u escape",
                        })?;
                        unit = (unit << 4) | digit as u16;
                    }
                    chunk.push(unit);
                    i += 6;
                }
                _ => {
                    return Err(CodecError::Malformed {
                        offset: i,
                        reason: "unknown escape",
                    });
                }
            }
        }
        Ok(chunk)
    }
}

struct ChunkWriter {
    done: Vec<PackedChunk>,
    current: PackedChunk,
}

impl ChunkWriter {
    fn new() -> Self {
        Self {
            done: Vec::new(),
            current: PackedChunk::default(),
        }
    }

    fn pair(&mut self, first: u16, second: u16) {
        let cost = utf8_cost(first) + utf8_cost(second);
        if !self.current.is_empty() && self.current.utf8_len + cost > MAX_CHUNK_BYTES {
            self.done.push(std::mem::take(&mut self.current));
        }
        self.current.push(first);
        self.current.push(second);
    }

    fn finish(mut self) -> Vec<PackedChunk> {
        // an empty array still gets one (empty) chunk
        if !self.current.is_empty() || self.done.is_empty() {
            self.done.push(self.current);
        }
        self.done
    }
}

/// An encoded integer array: encoding, translation, declared length and its chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArray {
    encoding: Encoding,
    translate: i64,
    len: usize,
    chunks: Vec<PackedChunk>,
}

impl PackedArray {
    pub fn new(encoding: Encoding, translate: i64, len: usize, chunks: Vec<PackedChunk>) -> Self {
        Self {
            encoding,
            translate,
            len,
            chunks,
        }
    }

    /// Parses escaped chunk text as embedded in generated source.
    pub fn from_escaped(
        encoding: Encoding,
        translate: i64,
        len: usize,
        chunks: &[&str],
    ) -> Result<Self, CodecError> {
        let chunks = chunks
            .iter()
            .map(|c| PackedChunk::from_escaped(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(encoding, translate, len, chunks))
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn translate(&self) -> i64 {
        self.translate
    }

    /// Declared logical length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunks(&self) -> &[PackedChunk] {
        &self.chunks
    }

    pub fn escaped_chunks(&self) -> Vec<String> {
        self.chunks.iter().map(PackedChunk::escaped).collect()
    }

    pub fn unpack(&self) -> Result<Vec<i64>, CodecError> {
        let mut result = vec![0i64; self.len];
        let mut offset = 0usize;
        for chunk in &self.chunks {
            offset = match self.encoding {
                Encoding::CountValue => {
                    unpack_count_value_units(chunk.units(), self.translate, offset, &mut result)?
                }
                Encoding::HiLow => unpack_hi_low_units(chunk.units(), offset, &mut result)?,
            };
        }
        if offset != self.len {
            return Err(CodecError::LengthMismatch {
                expected: self.len,
                actual: offset,
            });
        }
        Ok(result)
    }

    /// [`Self::unpack`] followed by a checked conversion of every entry.
    pub fn unpack_as<T: TryFrom<i64>>(&self) -> Result<Vec<T>, CodecError> {
        self.unpack()?
            .into_iter()
            .map(|v| T::try_from(v).map_err(|_| CodecError::Overflow { value: v }))
            .collect()
    }
}

pub fn pack_count_value(values: &[i64], translate: i64) -> Result<PackedArray, CodecError> {
    let mut out = ChunkWriter::new();
    let mut i = 0usize;
    while i < values.len() {
        let value = values[i];
        let mut run = 1usize;
        while i + run < values.len() && values[i + run] == value {
            run += 1;
        }
        let stored = value
            .checked_add(translate)
            .filter(|v| (0..=MAX_UNIT).contains(v))
            .ok_or(CodecError::InvalidArgument {
                index: i,
                value,
                translate,
                encoding: Encoding::CountValue,
            })? as u16;

        let mut left = run;
        while left > MAX_RUN {
            out.pair(MAX_RUN as u16, stored);
            left -= MAX_RUN;
        }
        out.pair(left as u16, stored);
        i += run;
    }
    let packed = PackedArray::new(Encoding::CountValue, translate, values.len(), out.finish());
    debug!(
        "packed {} values (count/value, translate {}) into {} chunk(s)",
        values.len(),
        translate,
        packed.chunks.len()
    );
    Ok(packed)
}

pub fn pack_hi_low(values: &[i64]) -> Result<PackedArray, CodecError> {
    let mut out = ChunkWriter::new();
    for (index, &value) in values.iter().enumerate() {
        if !(0..=MAX_HI_LOW).contains(&value) {
            return Err(CodecError::InvalidArgument {
                index,
                value,
                translate: 0,
                encoding: Encoding::HiLow,
            });
        }
        out.pair((value >> 16) as u16, (value & 0xFFFF) as u16);
    }
    let packed = PackedArray::new(Encoding::HiLow, 0, values.len(), out.finish());
    debug!(
        "packed {} values (hi/low) into {} chunk(s)",
        values.len(),
        packed.chunks.len()
    );
    Ok(packed)
}

/// Decodes escaped count/value chunks as they appear in generated source.
pub fn unpack_count_value(chunks: &[&str], translate: i64, len: usize) -> Result<Vec<i64>, CodecError> {
    PackedArray::from_escaped(Encoding::CountValue, translate, len, chunks)?.unpack()
}

/// Decodes escaped hi/low chunks as they appear in generated source.
pub fn unpack_hi_low(chunks: &[&str], len: usize) -> Result<Vec<i64>, CodecError> {
    PackedArray::from_escaped(Encoding::HiLow, 0, len, chunks)?.unpack()
}

// Returns the output offset after this chunk.
fn unpack_count_value_units(
    units: &[u16],
    translate: i64,
    offset: usize,
    result: &mut [i64],
) -> Result<usize, CodecError> {
    if units.len() % 2 != 0 {
        return Err(CodecError::Malformed {
            offset: units.len() - 1,
            reason: "run count without a value",
        });
    }
    let expected = result.len();
    let mut j = offset;
    for (i, pair) in units.chunks_exact(2).enumerate() {
        let count = usize::from(pair[0]);
        if count == 0 {
            return Err(CodecError::Malformed {
                offset: 2 * i,
                reason: "zero run length",
            });
        }
        let value = i64::from(pair[1]) - translate;
        let end = j + count;
        let slot = result
            .get_mut(j..end)
            .ok_or(CodecError::LengthMismatch { expected, actual: end })?;
        slot.fill(value);
        j = end;
    }
    Ok(j)
}

fn unpack_hi_low_units(units: &[u16], offset: usize, result: &mut [i64]) -> Result<usize, CodecError> {
    if units.len() % 2 != 0 {
        return Err(CodecError::Malformed {
            offset: units.len() - 1,
            reason: "high half without a low half",
        });
    }
    let expected = result.len();
    let mut j = offset;
    for pair in units.chunks_exact(2) {
        let slot = result
            .get_mut(j)
            .ok_or(CodecError::LengthMismatch { expected, actual: j + 1 })?;
        *slot = (i64::from(pair[0]) << 16) | i64::from(pair[1]);
        j += 1;
    }
    Ok(j)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_table_boundaries() {
        assert_eq!(utf8_cost(0), 2);
        assert_eq!(utf8_cost(1), 1);
        assert_eq!(utf8_cost(0x7F), 1);
        assert_eq!(utf8_cost(0x80), 2);
        assert_eq!(utf8_cost(0x3FF), 2);
        assert_eq!(utf8_cost(0x400), 3);
        assert_eq!(utf8_cost(0xFFFF), 3);
    }

    #[test]
    fn runs_become_pairs() {
        let p = pack_count_value(&[-1, -1, -1, 4, 4, 7], 1).expect("pack");
        assert_eq!(p.chunks().len(), 1);
        assert_eq!(p.chunks()[0].units(), &[3, 0, 2, 5, 1, 8]);
        assert_eq!(p.unpack().expect("unpack"), vec![-1, -1, -1, 4, 4, 7]);
    }

    #[test]
    fn long_run_is_split_at_max_run() {
        let values = vec![9i64; MAX_RUN + 1];
        let p = pack_count_value(&values, 0).expect("pack");
        assert_eq!(p.chunks()[0].units(), &[0xFFFF, 9, 1, 9]);
        assert_eq!(p.unpack().expect("unpack"), values);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        match pack_count_value(&[0, 0xFFFF], 1) {
            Err(CodecError::InvalidArgument { index: 1, value: 0xFFFF, .. }) => {}
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
        assert!(pack_count_value(&[-2], 1).is_err());
        assert!(pack_hi_low(&[-1]).is_err());
        assert!(pack_hi_low(&[1 << 32]).is_err());
        assert!(pack_hi_low(&[u32::MAX as i64]).is_ok());
    }

    #[test]
    fn hi_low_splits_halves() {
        let p = pack_hi_low(&[0x0001_0002, 0xFFFF_0000]).expect("pack");
        assert_eq!(p.chunks()[0].units(), &[1, 2, 0xFFFF, 0]);
        assert_eq!(p.unpack().expect("unpack"), vec![0x0001_0002, 0xFFFF_0000]);
    }

    #[test]
    fn escaped_text_matches_emitter_format() {
        let chunk = PackedChunk::from_units(vec![0x5C, 0x41, 0x1234, 0]);
        assert_eq!(chunk.escaped(), r"\\\u0041\u1234\u0000");
        assert_eq!(PackedChunk::from_escaped(&chunk.escaped()).expect("parse"), chunk);
    }

    #[test]
    fn malformed_escapes_are_rejected() {
        assert!(matches!(
            PackedChunk::from_escaped("A"),
            Err(CodecError::Malformed { offset: 0, .. })
        ));
        assert!(PackedChunk::from_escaped(r"\u12").is_err());
        assert!(PackedChunk::from_escaped(r"\u12g4").is_err());
        assert!(PackedChunk::from_escaped(r"\x").is_err());
    }

    #[test]
    fn declared_length_must_match() {
        let p = pack_count_value(&[1, 2, 3], 0).expect("pack");
        let short = PackedArray::new(Encoding::CountValue, 0, 2, p.chunks().to_vec());
        assert!(matches!(
            short.unpack(),
            Err(CodecError::LengthMismatch { expected: 2, actual: 3 })
        ));
        let long = PackedArray::new(Encoding::CountValue, 0, 4, p.chunks().to_vec());
        assert!(matches!(
            long.unpack(),
            Err(CodecError::LengthMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn hi_low_data_past_declared_length_is_reported() {
        let p = pack_hi_low(&[1, 2, 3]).expect("pack");
        let short = PackedArray::new(Encoding::HiLow, 0, 2, p.chunks().to_vec());
        assert!(matches!(
            short.unpack(),
            Err(CodecError::LengthMismatch { expected: 2, actual: 3 })
        ));
        let exact = PackedArray::new(Encoding::HiLow, 0, 3, p.chunks().to_vec());
        assert_eq!(exact.unpack().expect("unpack"), vec![1, 2, 3]);
    }

    #[test]
    fn odd_unit_count_is_malformed() {
        let bad = PackedArray::new(Encoding::HiLow, 0, 1, vec![PackedChunk::from_units(vec![1])]);
        assert!(matches!(bad.unpack(), Err(CodecError::Malformed { .. })));
    }

    #[test]
    fn unpack_as_checks_range() {
        let p = pack_count_value(&[300], 0).expect("pack");
        assert!(matches!(p.unpack_as::<u8>(), Err(CodecError::Overflow { value: 300 })));
        assert_eq!(p.unpack_as::<u16>().expect("u16"), vec![300u16]);
    }

    #[test]
    fn empty_array_has_one_empty_chunk() {
        let p = pack_count_value(&[], 0).expect("pack");
        assert_eq!(p.chunks().len(), 1);
        assert!(p.chunks()[0].is_empty());
        assert!(p.unpack().expect("unpack").is_empty());
    }
}
