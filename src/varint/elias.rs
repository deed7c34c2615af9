/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Elias γ and δ universal codes for positive integers: the same
//! decomposition into a unary-coded exponent followed by the remaining
//! bits used elsewhere for universal codes, but bit-addressed over this
//! crate's caller-owned [`BitWriter`]/[`BitReader`] rather than a
//! generic buffered word-stream backend.

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};

#[inline]
fn log2_floor(v: u64) -> u32 {
    63 - v.leading_zeros()
}

fn check_positive(v: u64) -> Result<()> {
    if v == 0 {
        Err(Error::invalid_input("Elias codes are undefined for 0"))
    } else {
        Ok(())
    }
}

/// Bit length of the γ encoding of `v` (`v >= 1`).
#[must_use]
pub fn len_gamma(v: u64) -> usize {
    2 * log2_floor(v) as usize + 1
}

/// Writes `v` (`v >= 1`) as Elias γ: `floor(log2(v))` zero bits, a one
/// bit, then the low `floor(log2(v))` bits of `v`.
pub fn write_gamma(w: &mut BitWriter<'_>, v: u64) -> Result<()> {
    check_positive(v)?;
    let n = log2_floor(v);
    w.write_unary(n as u64);
    if n > 0 {
        w.write_bits(v & ((1u64 << n) - 1), n as u8);
    }
    Ok(())
}

/// Reads an Elias γ code.
pub fn read_gamma(r: &mut BitReader<'_>) -> Result<u64> {
    let n = r.read_unary()?;
    let low = if n > 0 { r.read_bits(n as u8)? } else { 0 };
    Ok((1u64 << n) | low)
}

/// Bit length of the δ encoding of `v` (`v >= 1`).
#[must_use]
pub fn len_delta(v: u64) -> usize {
    let n = log2_floor(v);
    len_gamma(n as u64 + 1) + n as usize
}

/// Writes `v` (`v >= 1`) as Elias δ: the Elias γ code of
/// `floor(log2(v)) + 1`, then the remaining `floor(log2(v))` bits of `v`.
pub fn write_delta(w: &mut BitWriter<'_>, v: u64) -> Result<()> {
    check_positive(v)?;
    let n = log2_floor(v);
    write_gamma(w, n as u64 + 1)?;
    if n > 0 {
        w.write_bits(v & ((1u64 << n) - 1), n as u8);
    }
    Ok(())
}

/// Reads an Elias δ code.
pub fn read_delta(r: &mut BitReader<'_>) -> Result<u64> {
    let n_plus_one = read_gamma(r)?;
    let n = n_plus_one - 1;
    let low = if n > 0 { r.read_bits(n as u8)? } else { 0 };
    Ok((1u64 << n) | low)
}

/// Result of encoding an array of values.
pub struct ArrayEncoding {
    pub count: usize,
    pub total_bits: usize,
    pub encoded_bytes: usize,
}

/// Writes every value in `values` back-to-back with the given per-value
/// writer (`write_gamma` or `write_delta`), into `dst`.
pub fn encode_array(
    dst: &mut [u8],
    values: &[u64],
    write_one: impl Fn(&mut BitWriter<'_>, u64) -> Result<()>,
) -> Result<ArrayEncoding> {
    let mut w = BitWriter::new(dst);
    for &v in values {
        write_one(&mut w, v)?;
    }
    Ok(ArrayEncoding {
        count: values.len(),
        total_bits: w.bit_len(),
        encoded_bytes: w.byte_len(),
    })
}

/// Greedily decodes up to `count` values (or until the bit budget
/// `bit_len` is exhausted).
pub fn decode_array(
    src: &[u8],
    bit_len: usize,
    count: usize,
    read_one: impl Fn(&mut BitReader<'_>) -> Result<u64>,
) -> Result<Vec<u64>> {
    let mut r = BitReader::with_bit_len(src, bit_len);
    let mut out = Vec::with_capacity(count);
    while out.len() < count && r.has_more(1) {
        out.push(read_one(&mut r)?);
    }
    Ok(out)
}

/// Worst-case byte length for encoding `count` values with Elias γ:
/// `⌈count·127/8⌉` (a `u64` value's γ code is at most 127 bits long).
#[must_use]
pub fn gamma_worst_case_bytes(count: usize) -> usize {
    (count * 127).div_ceil(8)
}

/// Worst-case byte length for encoding `count` values with Elias δ:
/// `⌈count·76/8⌉`.
#[must_use]
pub fn delta_worst_case_bytes(count: usize) -> usize {
    (count * 76).div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Vec<u64> {
        let mut v = vec![1u64];
        for k in 0..60u32 {
            v.push(1u64 << k);
            if k > 0 {
                v.push((1u64 << k) - 1);
                v.push((1u64 << k) + 1);
            }
        }
        v
    }

    #[test]
    fn gamma_roundtrip() {
        for v in domain() {
            let mut buf = vec![0u8; 32];
            let mut w = BitWriter::new(&mut buf);
            write_gamma(&mut w, v).unwrap();
            let bits = w.bit_len();
            let mut r = BitReader::with_bit_len(&buf, bits);
            assert_eq!(read_gamma(&mut r).unwrap(), v);
            assert_eq!(len_gamma(v), bits);
        }
    }

    #[test]
    fn delta_roundtrip() {
        for v in domain() {
            let mut buf = vec![0u8; 32];
            let mut w = BitWriter::new(&mut buf);
            write_delta(&mut w, v).unwrap();
            let bits = w.bit_len();
            let mut r = BitReader::with_bit_len(&buf, bits);
            assert_eq!(read_delta(&mut r).unwrap(), v);
            assert_eq!(len_delta(v), bits);
        }
    }

    #[test]
    fn rejects_zero() {
        let mut buf = vec![0u8; 8];
        let mut w = BitWriter::new(&mut buf);
        assert!(write_gamma(&mut w, 0).is_err());
        assert!(write_delta(&mut w, 0).is_err());
    }

    #[test]
    fn array_roundtrip() {
        let values: Vec<u64> = (1..=200u64).collect();
        let mut buf = vec![0u8; gamma_worst_case_bytes(values.len())];
        let enc = encode_array(&mut buf, &values, write_gamma).unwrap();
        assert_eq!(enc.count, values.len());
        let decoded = decode_array(&buf, enc.total_bits, enc.count, read_gamma).unwrap();
        assert_eq!(decoded, values);
    }
}
