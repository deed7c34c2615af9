/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Float codec: IEEE-754 decomposition with selectable mantissa/exponent
//! bit budgets and three exponent-compression modes.
//!
//! This is the one codec in the suite that is lossy outside of
//! [`Precision::Full`] — reduced precision rounds the mantissa to the
//! target bit width.

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::varint::{chained, external};

/// Mantissa bit budget. `Full` preserves all 52 stored mantissa bits (and
/// round-trips bit-for-bit); the others are progressively lossier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Precision {
    Full = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Precision {
    fn mantissa_bits(self) -> u32 {
        match self {
            Precision::Full => 52,
            Precision::High => 23,
            Precision::Medium => 10,
            Precision::Low => 4,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Precision::Full,
            1 => Precision::High,
            2 => Precision::Medium,
            3 => Precision::Low,
            _ => return Err(Error::invalid_input("float codec: unknown precision tag")),
        })
    }

    /// Picks the coarsest precision whose rounding error is still below
    /// `max_relative_error`.
    #[must_use]
    pub fn auto(max_relative_error: f64) -> Self {
        if max_relative_error < 1e-10 {
            Precision::Full
        } else if max_relative_error < 5e-4 {
            Precision::High
        } else if max_relative_error < 3e-2 {
            Precision::Medium
        } else {
            Precision::Low
        }
    }
}

/// How the per-element exponents are compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExponentMode {
    Independent = 0,
    CommonBase = 1,
    Delta = 2,
}

impl ExponentMode {
    fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => ExponentMode::Independent,
            1 => ExponentMode::CommonBase,
            2 => ExponentMode::Delta,
            _ => return Err(Error::invalid_input("float codec: unknown mode tag")),
        })
    }
}

const EXPONENT_BITS: u8 = 11;

struct Decomposed {
    sign: bool,
    special: bool,
    raw_bits: u64,
    exponent: i32,
    mantissa: u64,
}

fn decompose(v: f64) -> Decomposed {
    let bits = v.to_bits();
    let sign = bits >> 63 != 0;
    let exp_field = (bits >> 52) & 0x7FF;
    let mantissa = bits & ((1u64 << 52) - 1);
    let special = exp_field == 0 || exp_field == 0x7FF;
    Decomposed {
        sign,
        special,
        raw_bits: bits,
        exponent: exp_field as i32 - 1023,
        mantissa,
    }
}

/// Rounds a 52-bit mantissa field down to `target_bits`, returning the
/// rounded value and whether rounding carried (meaning the caller must
/// bump the exponent by one and treat the mantissa as all-zero).
fn round_mantissa(mantissa: u64, target_bits: u32) -> (u64, bool) {
    if target_bits >= 52 {
        return (mantissa, false);
    }
    let drop = 52 - target_bits;
    let half = 1u64 << (drop - 1);
    let rounded = (mantissa + half) >> drop;
    if rounded >= 1u64 << target_bits {
        (0, true)
    } else {
        (rounded, false)
    }
}

fn write_exp_external(w: &mut BitWriter<'_>, exp: i32) {
    let z = chained::zigzag_encode(exp as i64);
    let width = external::width_for(z);
    w.write_bits(width as u64, 8);
    let mut buf = [0u8; 8];
    external::put_fixed(&mut buf, z, width);
    for &b in &buf[..width as usize] {
        w.write_bits(b as u64, 8);
    }
}

fn read_exp_external(r: &mut BitReader<'_>) -> Result<i32> {
    let width = r.read_bits(8)? as u8;
    if !(1..=8).contains(&width) {
        return Err(Error::invalid_input("float codec: bad exponent width"));
    }
    let mut buf = [0u8; 8];
    for b in buf.iter_mut().take(width as usize) {
        *b = r.read_bits(8)? as u8;
    }
    let z = external::get(&buf, width)?;
    Ok(chained::zigzag_decode(z) as i32)
}

/// Encodes `values` into `dst`, returning the number of bytes written.
pub fn encode(
    dst: &mut [u8],
    values: &[f64],
    precision: Precision,
    mut mode: ExponentMode,
) -> Result<usize> {
    let decomposed: Vec<Decomposed> = values.iter().map(|&v| decompose(v)).collect();
    let target_bits = precision.mantissa_bits();

    // Round mantissas up front: a carry out of the mantissa bumps the
    // true exponent by one (§4.9 step 5), so the exponent stream below
    // must see the post-rounding exponent, not `d.exponent` as decomposed.
    let normal_values: Vec<(i32, u64)> = decomposed
        .iter()
        .filter(|d| !d.special)
        .map(|d| {
            let (rounded, carry) = round_mantissa(d.mantissa, target_bits);
            if carry {
                (d.exponent + 1, 0)
            } else {
                (d.exponent, rounded)
            }
        })
        .collect();

    if mode == ExponentMode::CommonBase && !normal_values.is_empty() {
        let min_exp = normal_values.iter().map(|(e, _)| *e).min().unwrap();
        let max_exp = normal_values.iter().map(|(e, _)| *e).max().unwrap();
        if max_exp - min_exp > 255 {
            // A common-base exponent field is a single byte; auto-upgrade
            // to delta coding rather than emit a corrupt stream.
            mode = ExponentMode::Delta;
        }
    }

    let mut w = BitWriter::new(dst);
    w.write_bits(precision as u64, 8);
    w.write_bits(EXPONENT_BITS as u64, 8);
    w.write_bits(target_bits as u64, 8);
    w.write_bits(mode as u64, 8);

    for d in &decomposed {
        w.write_bits(d.special as u64, 1);
    }
    for d in &decomposed {
        w.write_bits(d.sign as u64, 1);
    }

    match mode {
        ExponentMode::Independent => {
            for &(exp, _) in &normal_values {
                write_exp_external(&mut w, exp);
            }
        }
        ExponentMode::CommonBase => {
            if let Some(&min_exp) = normal_values.iter().map(|(e, _)| e).min() {
                write_exp_external(&mut w, min_exp);
                for &(exp, _) in &normal_values {
                    w.write_bits((exp - min_exp) as u64, 8);
                }
            }
        }
        ExponentMode::Delta => {
            let mut prev = 0i32;
            for (i, &(exp, _)) in normal_values.iter().enumerate() {
                if i == 0 {
                    write_exp_external(&mut w, exp);
                } else {
                    write_exp_external(&mut w, exp - prev);
                }
                prev = exp;
            }
        }
    }

    for &(_, mantissa) in &normal_values {
        w.write_bits(mantissa, target_bits as u8);
    }

    for d in &decomposed {
        if d.special {
            w.write_bits(d.raw_bits, 64);
        }
    }

    Ok(w.byte_len())
}

/// Decodes `count` doubles from `src`.
pub fn decode(src: &[u8], count: usize) -> Result<Vec<f64>> {
    let mut r = BitReader::new(src);
    let precision = Precision::from_tag(r.read_bits(8)? as u8)?;
    let _exponent_bits = r.read_bits(8)?;
    let mantissa_bits = r.read_bits(8)? as u32;
    let mode = ExponentMode::from_tag(r.read_bits(8)? as u8)?;

    let specials: Vec<bool> = (0..count).map(|_| r.read_bits(1).map(|b| b != 0)).collect::<Result<_>>()?;
    let signs: Vec<bool> = (0..count).map(|_| r.read_bits(1).map(|b| b != 0)).collect::<Result<_>>()?;

    let normal_count = specials.iter().filter(|s| !**s).count();
    let mut exponents = Vec::with_capacity(normal_count);
    match mode {
        ExponentMode::Independent => {
            for _ in 0..normal_count {
                exponents.push(read_exp_external(&mut r)?);
            }
        }
        ExponentMode::CommonBase => {
            if normal_count > 0 {
                let min_exp = read_exp_external(&mut r)?;
                for _ in 0..normal_count {
                    let delta = r.read_bits(8)? as i32;
                    exponents.push(min_exp + delta);
                }
            }
        }
        ExponentMode::Delta => {
            let mut prev = 0i32;
            for i in 0..normal_count {
                let v = read_exp_external(&mut r)?;
                let exp = if i == 0 { v } else { prev + v };
                exponents.push(exp);
                prev = exp;
            }
        }
    }

    let mut mantissas = Vec::with_capacity(normal_count);
    for _ in 0..normal_count {
        let rounded = r.read_bits(mantissa_bits as u8)?;
        mantissas.push(rounded << (52 - mantissa_bits));
    }

    let mut raw_specials = Vec::with_capacity(specials.iter().filter(|s| **s).count());
    for is_special in &specials {
        if *is_special {
            raw_specials.push(r.read_bits(64)?);
        }
    }

    let mut out = Vec::with_capacity(count);
    let mut normal_idx = 0;
    let mut special_idx = 0;
    for i in 0..count {
        if specials[i] {
            out.push(f64::from_bits(raw_specials[special_idx]));
            special_idx += 1;
        } else {
            let sign_bit = (signs[i] as u64) << 63;
            let biased_exp = (exponents[normal_idx] + 1023) as u64;
            let bits = sign_bit | (biased_exp << 52) | mantissas[normal_idx];
            out.push(f64::from_bits(bits));
            normal_idx += 1;
        }
    }
    let _ = precision;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_precision_is_bit_exact() {
        let values = vec![1.0, 2.0, 3.0, 4.0, -0.5, 123.456, 1e300, -1e-300];
        for mode in [ExponentMode::Independent, ExponentMode::CommonBase, ExponentMode::Delta] {
            let mut buf = vec![0u8; 4096];
            let n = encode(&mut buf, &values, Precision::Full, mode).unwrap();
            let decoded = decode(&buf[..n], values.len()).unwrap();
            assert_eq!(decoded, values, "mode {mode:?}");
        }
    }

    #[test]
    fn specials_are_preserved() {
        let values = vec![f64::NAN, 1.0, f64::INFINITY, f64::NEG_INFINITY, 0.0, -0.0];
        let mut buf = vec![0u8; 4096];
        let n = encode(&mut buf, &values, Precision::Full, ExponentMode::Delta).unwrap();
        let decoded = decode(&buf[..n], values.len()).unwrap();
        assert!(decoded[0].is_nan());
        assert_eq!(decoded[1], 1.0);
        assert!(decoded[2].is_infinite() && decoded[2] > 0.0);
        assert!(decoded[3].is_infinite() && decoded[3] < 0.0);
        assert_eq!(decoded[4].to_bits(), 0.0f64.to_bits());
        assert_eq!(decoded[5].to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn scenario_delta_roundtrip() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        let mut buf = vec![0u8; 4096];
        let n = encode(&mut buf, &values, Precision::Full, ExponentMode::Delta).unwrap();
        let decoded = decode(&buf[..n], values.len()).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn reduced_precision_within_error_bound() {
        let values: Vec<f64> = (1..=50).map(|i| i as f64 * 1.2345).collect();
        for (precision, bound) in [
            (Precision::High, 5e-4),
            (Precision::Medium, 3e-2),
            (Precision::Low, 0.2),
        ] {
            let mut buf = vec![0u8; 4096];
            let n = encode(&mut buf, &values, precision, ExponentMode::Independent).unwrap();
            let decoded = decode(&buf[..n], values.len()).unwrap();
            for (a, b) in values.iter().zip(&decoded) {
                let rel = ((a - b) / a).abs();
                assert!(rel <= bound, "rel error {rel} exceeds {bound} for {a}");
            }
        }
    }

    #[test]
    fn mantissa_rounding_carry_bumps_exponent() {
        // Largest double below 2.0: mantissa is all ones, so rounding to
        // any reduced precision carries out of the mantissa field. The
        // decoded value must land near 2.0, not silently drop to ~1.0.
        let value = f64::from_bits(2.0f64.to_bits() - 1);
        for (precision, bound) in [(Precision::High, 5e-4), (Precision::Medium, 3e-2), (Precision::Low, 0.2)] {
            let mut buf = vec![0u8; 4096];
            let n = encode(&mut buf, &[value], precision, ExponentMode::Independent).unwrap();
            let decoded = decode(&buf[..n], 1).unwrap()[0];
            let rel = ((value - decoded) / value).abs();
            assert!(rel <= bound, "rel error {rel} exceeds {bound} at {precision:?}: decoded {decoded}");
        }
    }

    #[test]
    fn common_base_upgrades_when_range_exceeds_255() {
        let values = vec![1e-300, 1e300];
        let mut buf = vec![0u8; 4096];
        let n = encode(&mut buf, &values, Precision::Full, ExponentMode::CommonBase).unwrap();
        let decoded = decode(&buf[..n], values.len()).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn auto_precision_thresholds() {
        assert_eq!(Precision::auto(1e-12), Precision::Full);
        assert_eq!(Precision::auto(1e-5), Precision::High);
        assert_eq!(Precision::auto(1e-2), Precision::Medium);
        assert_eq!(Precision::auto(0.5), Precision::Low);
    }
}
