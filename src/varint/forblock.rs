/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Frame-of-Reference block codec: one base value plus fixed-width
//! offsets chosen by block range.

use super::{external, tagged};
use crate::error::{Error, Result};

/// Analysis of a block prior to encoding.
#[derive(Debug, Clone, Copy)]
pub struct ForAnalysis {
    pub min: u64,
    pub max: u64,
    pub offset_width: u8,
}

/// Computes `min`, `max`, and the minimal offset width (`1..=8`, at least
/// 1 even when the range is zero) for `values`.
pub fn analyze(values: &[u64]) -> Result<ForAnalysis> {
    let &min = values.iter().min().ok_or_else(|| Error::invalid_input("FOR: empty block"))?;
    let max = *values.iter().max().unwrap();
    let range = max - min;
    let offset_width = external::width_for(range).max(1);
    Ok(ForAnalysis { min, max, offset_width })
}

/// Encodes `values` as `tagged(min) || tagged(count) || byte(offset_width)
/// || offset[count]`. Returns the number of bytes written.
pub fn put(dst: &mut [u8], values: &[u64]) -> Result<usize> {
    if values.is_empty() {
        return Err(Error::invalid_input("FOR: empty block"));
    }
    let analysis = analyze(values)?;
    let mut off = 0;
    let w = tagged::put(&mut dst[off..], analysis.min);
    if w == 0 {
        return Err(Error::allocation_failed("FOR: buffer too small for min"));
    }
    off += w as usize;

    let w = tagged::put(&mut dst[off..], values.len() as u64);
    if w == 0 {
        return Err(Error::allocation_failed("FOR: buffer too small for count"));
    }
    off += w as usize;

    if off >= dst.len() {
        return Err(Error::allocation_failed("FOR: buffer too small for header"));
    }
    dst[off] = analysis.offset_width;
    off += 1;

    let needed = off + values.len() * analysis.offset_width as usize;
    if dst.len() < needed {
        return Err(Error::allocation_failed("FOR: buffer too small for offsets"));
    }
    for &v in values {
        let offset = v - analysis.min;
        external::put_fixed(&mut dst[off..], offset, analysis.offset_width);
        off += analysis.offset_width as usize;
    }
    Ok(off)
}

/// A decoded FOR block header, enough to random-access individual
/// entries without re-decoding the whole block.
pub struct ForBlock<'a> {
    min: u64,
    count: usize,
    offset_width: u8,
    offsets: &'a [u8],
}

impl<'a> ForBlock<'a> {
    pub fn parse(src: &'a [u8]) -> Result<Self> {
        let (min, w1) = tagged::get(src)?;
        let (count, w2) = tagged::get(&src[w1 as usize..])?;
        let header = w1 as usize + w2 as usize;
        if src.len() <= header {
            return Err(Error::invalid_input("FOR: truncated header"));
        }
        let offset_width = src[header];
        if !(1..=8).contains(&offset_width) {
            return Err(Error::invalid_input("FOR: invalid offset width"));
        }
        let data_start = header + 1;
        let needed = data_start + count as usize * offset_width as usize;
        if src.len() < needed {
            return Err(Error::invalid_input("FOR: truncated offsets"));
        }
        Ok(Self {
            min,
            count: count as usize,
            offset_width,
            offsets: &src[data_start..needed],
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Random-access `get(i) = min + offset_i`.
    pub fn get(&self, i: usize) -> Result<u64> {
        if i >= self.count {
            return Err(Error::invalid_input("FOR: index out of range"));
        }
        let start = i * self.offset_width as usize;
        let offset = external::get(&self.offsets[start..], self.offset_width)?;
        Ok(self.min + offset)
    }

    pub fn to_vec(&self) -> Result<Vec<u64>> {
        (0..self.count).map(|i| self.get(i)).collect()
    }
}
