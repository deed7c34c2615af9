/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Dimension codec: packed `(row, col)` descriptors plus dense and
//! Roaring-style sparse matrix/vector accessors over raw buffers.
//!
//! `ALL_FULL` chunks are restricted to boolean matrices — "every bit in
//! this chunk is set" has no natural numeric reading. Numeric sparse
//! matrices use `ALL_EMPTY` (implicit zero), `SPARSE_SET` (explicit
//! non-zero entries with value blobs), and `DIRECT`; `SPARSE_CLEAR`
//! stays boolean-only.

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::varint::{external, tagged};

const CHUNK_SIZE: u64 = 65_536;
const INDEX_BITS: u8 = 12;

/// The one-byte `(row_width, col_width, sparse)` descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimDescriptor {
    pub row_width: u8,
    pub col_width: u8,
    pub sparse: bool,
}

impl DimDescriptor {
    pub fn new(row_width: u8, col_width: u8, sparse: bool) -> Result<Self> {
        if row_width > 8 {
            return Err(Error::invalid_input("dimension: row_width must be 0..=8"));
        }
        if !(1..=8).contains(&col_width) {
            return Err(Error::invalid_input("dimension: col_width must be 1..=8"));
        }
        Ok(Self { row_width, col_width, sparse })
    }

    #[must_use]
    pub fn to_byte(self) -> u8 {
        (self.row_width << 4) | ((self.col_width - 1) << 1) | (self.sparse as u8)
    }

    pub fn from_byte(b: u8) -> Result<Self> {
        let row_width = b >> 4;
        let col_width = ((b >> 1) & 0b111) + 1;
        let sparse = b & 1 != 0;
        Self::new(row_width, col_width, sparse)
    }
}

#[inline]
fn entry_offset(row: u64, col: u64, cols: u64) -> u64 {
    row * cols + col
}

/// A dense, row-major matrix of fixed-width numeric entries.
pub struct DenseMatrix {
    rows: u64,
    cols: u64,
    entry_width: u8,
    data: Vec<u8>,
}

impl DenseMatrix {
    #[must_use]
    pub fn new(rows: u64, cols: u64, entry_width: u8) -> Self {
        let total = rows as usize * cols as usize * entry_width as usize;
        Self { rows, cols, entry_width, data: vec![0u8; total] }
    }

    pub fn entry_get(&self, row: u64, col: u64) -> Result<u64> {
        let off = entry_offset(row, col, self.cols) as usize * self.entry_width as usize;
        external::get(&self.data[off..], self.entry_width)
    }

    pub fn entry_set(&mut self, row: u64, col: u64, value: u64) -> Result<()> {
        let off = entry_offset(row, col, self.cols) as usize * self.entry_width as usize;
        let w = self.entry_width;
        if external::put_fixed(&mut self.data[off..], value, w) == 0 {
            return Err(Error::invalid_input("dimension: value does not fit entry width"));
        }
        Ok(())
    }

    /// Serializes as `descriptor || row_count || col_count || entries`.
    pub fn serialize(&self) -> Vec<u8> {
        let row_width = external::width_for(self.rows);
        let col_width = external::width_for(self.cols).max(1);
        let desc = DimDescriptor::new(row_width, col_width, false).unwrap();
        let mut out = vec![desc.to_byte()];
        let mut buf = [0u8; 8];
        external::put_fixed(&mut buf, self.rows, row_width.max(1));
        out.extend_from_slice(&buf[..row_width.max(1) as usize]);
        external::put_fixed(&mut buf, self.cols, col_width);
        out.extend_from_slice(&buf[..col_width as usize]);
        out.push(self.entry_width);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn parse(src: &[u8]) -> Result<Self> {
        if src.is_empty() {
            return Err(Error::invalid_input("dimension: empty buffer"));
        }
        let desc = DimDescriptor::from_byte(src[0])?;
        let mut off = 1;
        let row_width = desc.row_width.max(1) as usize;
        let rows = external::get(&src[off..], row_width as u8)?;
        off += row_width;
        let cols = external::get(&src[off..], desc.col_width)?;
        off += desc.col_width as usize;
        if src.len() <= off {
            return Err(Error::invalid_input("dimension: missing entry width"));
        }
        let entry_width = src[off];
        off += 1;
        let total = rows as usize * cols as usize * entry_width as usize;
        if src.len() < off + total {
            return Err(Error::invalid_input("dimension: truncated entries"));
        }
        Ok(Self {
            rows,
            cols,
            entry_width,
            data: src[off..off + total].to_vec(),
        })
    }
}

/// A dense, row-major matrix of single-bit entries.
pub struct DenseBoolMatrix {
    rows: u64,
    cols: u64,
    data: Vec<u8>,
}

impl DenseBoolMatrix {
    #[must_use]
    pub fn new(rows: u64, cols: u64) -> Self {
        let bits = rows * cols;
        let bytes = (bits as usize).div_ceil(8);
        Self { rows, cols, data: vec![0u8; bytes] }
    }

    pub fn entry_get_bit(&self, row: u64, col: u64) -> Result<bool> {
        let bit = entry_offset(row, col, self.cols) as usize;
        let byte = bit / 8;
        if byte >= self.data.len() {
            return Err(Error::invalid_input("dimension: bit index out of range"));
        }
        Ok((self.data[byte] >> (7 - bit % 8)) & 1 != 0)
    }

    pub fn entry_set_bit(&mut self, row: u64, col: u64, value: bool) -> Result<()> {
        let bit = entry_offset(row, col, self.cols) as usize;
        let byte = bit / 8;
        if byte >= self.data.len() {
            return Err(Error::invalid_input("dimension: bit index out of range"));
        }
        let mask = 1 << (7 - bit % 8);
        if value {
            self.data[byte] |= mask;
        } else {
            self.data[byte] &= !mask;
        }
        Ok(())
    }

    pub fn entry_toggle_bit(&mut self, row: u64, col: u64) -> Result<()> {
        let current = self.entry_get_bit(row, col)?;
        self.entry_set_bit(row, col, !current)
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> u64 {
        self.cols
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ChunkKind {
    AllEmpty = 0,
    AllFull = 1,
    SparseSet = 2,
    SparseClear = 3,
    Direct = 4,
}

impl ChunkKind {
    fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => ChunkKind::AllEmpty,
            1 => ChunkKind::AllFull,
            2 => ChunkKind::SparseSet,
            3 => ChunkKind::SparseClear,
            4 => ChunkKind::Direct,
            _ => return Err(Error::invalid_input("dimension: unknown chunk kind")),
        })
    }
}

enum Chunk {
    AllEmpty,
    AllFull,
    SparseSet { indices: Vec<u16>, values: Option<Vec<u8>> },
    SparseClear { indices: Vec<u16> },
    Direct { data: Vec<u8> },
}

fn pack12(indices: &[u16]) -> Vec<u8> {
    let mut buf = vec![0u8; (indices.len() * INDEX_BITS as usize).div_ceil(8)];
    let mut w = BitWriter::new(&mut buf);
    for &idx in indices {
        w.write_bits(idx as u64, INDEX_BITS);
    }
    buf
}

fn unpack12(src: &[u8], count: usize) -> Result<Vec<u16>> {
    let mut r = BitReader::with_bit_len(src, count * INDEX_BITS as usize);
    (0..count).map(|_| r.read_bits(INDEX_BITS).map(|v| v as u16)).collect()
}

/// A Roaring-style sparse matrix, chunked into 64K-index blocks.
///
/// `value_width = None` means boolean (presence implies `true`);
/// `Some(w)` means each set entry carries a `w`-byte value blob.
pub struct SparseMatrix {
    rows: u64,
    cols: u64,
    value_width: Option<u8>,
    chunks: Vec<Chunk>,
}

impl SparseMatrix {
    #[must_use]
    pub fn new(rows: u64, cols: u64, value_width: Option<u8>) -> Self {
        let total = rows * cols;
        let n_chunks = total.div_ceil(CHUNK_SIZE).max(1) as usize;
        Self {
            rows,
            cols,
            value_width,
            chunks: (0..n_chunks).map(|_| Chunk::AllEmpty).collect(),
        }
    }

    fn locate(&self, row: u64, col: u64) -> (usize, u16) {
        let offset = entry_offset(row, col, self.cols);
        ((offset / CHUNK_SIZE) as usize, (offset % CHUNK_SIZE) as u16)
    }

    pub fn entry_get_bit(&self, row: u64, col: u64) -> Result<bool> {
        if self.value_width.is_some() {
            return Err(Error::type_mismatch("dimension: not a boolean matrix"));
        }
        let (chunk_idx, local) = self.locate(row, col);
        Ok(match &self.chunks[chunk_idx] {
            Chunk::AllEmpty => false,
            Chunk::AllFull => true,
            Chunk::SparseSet { indices, .. } => indices.contains(&local),
            Chunk::SparseClear { indices } => !indices.contains(&local),
            Chunk::Direct { data } => (data[local as usize / 8] >> (7 - local as usize % 8)) & 1 != 0,
        })
    }

    pub fn entry_set_bit(&mut self, row: u64, col: u64, value: bool) -> Result<()> {
        if self.value_width.is_some() {
            return Err(Error::type_mismatch("dimension: not a boolean matrix"));
        }
        let (chunk_idx, local) = self.locate(row, col);
        let chunk = &mut self.chunks[chunk_idx];
        *chunk = match std::mem::replace(chunk, Chunk::AllEmpty) {
            Chunk::AllEmpty if value => Chunk::SparseSet { indices: vec![local], values: None },
            Chunk::AllEmpty => Chunk::AllEmpty,
            Chunk::AllFull if !value => Chunk::SparseClear { indices: vec![local] },
            Chunk::AllFull => Chunk::AllFull,
            Chunk::SparseSet { mut indices, values } => {
                if value {
                    if !indices.contains(&local) {
                        indices.push(local);
                    }
                } else {
                    indices.retain(|&i| i != local);
                }
                Chunk::SparseSet { indices, values }
            }
            Chunk::SparseClear { mut indices } => {
                if !value {
                    if !indices.contains(&local) {
                        indices.push(local);
                    }
                } else {
                    indices.retain(|&i| i != local);
                }
                Chunk::SparseClear { indices }
            }
            Chunk::Direct { mut data } => {
                let byte = local as usize / 8;
                let mask = 1 << (7 - local as usize % 8);
                if value {
                    data[byte] |= mask;
                } else {
                    data[byte] &= !mask;
                }
                Chunk::Direct { data }
            }
        };
        Ok(())
    }

    pub fn entry_toggle_bit(&mut self, row: u64, col: u64) -> Result<()> {
        let current = self.entry_get_bit(row, col)?;
        self.entry_set_bit(row, col, !current)
    }

    pub fn entry_get_u64(&self, row: u64, col: u64) -> Result<u64> {
        let width = self.value_width.ok_or_else(|| Error::type_mismatch("dimension: not a numeric matrix"))?;
        let (chunk_idx, local) = self.locate(row, col);
        match &self.chunks[chunk_idx] {
            Chunk::AllEmpty => Ok(0),
            Chunk::SparseSet { indices, values } => {
                let values = values.as_ref().unwrap();
                match indices.iter().position(|&i| i == local) {
                    Some(pos) => external::get(&values[pos * width as usize..], width),
                    None => Ok(0),
                }
            }
            Chunk::Direct { data } => external::get(&data[local as usize * width as usize..], width),
            _ => Ok(0),
        }
    }

    pub fn entry_set_u64(&mut self, row: u64, col: u64, value: u64) -> Result<()> {
        let width = self.value_width.ok_or_else(|| Error::type_mismatch("dimension: not a numeric matrix"))?;
        let (chunk_idx, local) = self.locate(row, col);
        let chunk = &mut self.chunks[chunk_idx];
        *chunk = match std::mem::replace(chunk, Chunk::AllEmpty) {
            Chunk::AllEmpty => {
                if value == 0 {
                    Chunk::AllEmpty
                } else {
                    let mut blob = vec![0u8; width as usize];
                    external::put_fixed(&mut blob, value, width);
                    Chunk::SparseSet { indices: vec![local], values: Some(blob) }
                }
            }
            Chunk::SparseSet { mut indices, values } => {
                let mut values = values.unwrap_or_default();
                match indices.iter().position(|&i| i == local) {
                    Some(pos) => {
                        external::put_fixed(&mut values[pos * width as usize..], value, width);
                    }
                    None => {
                        indices.push(local);
                        let mut blob = vec![0u8; width as usize];
                        external::put_fixed(&mut blob, value, width);
                        values.extend_from_slice(&blob);
                    }
                }
                Chunk::SparseSet { indices, values: Some(values) }
            }
            Chunk::Direct { mut data } => {
                external::put_fixed(&mut data[local as usize * width as usize..], value, width);
                Chunk::Direct { data }
            }
            other => other,
        };
        Ok(())
    }

    /// Serializes as `descriptor || row_count || col_count || chunks`.
    pub fn serialize(&self) -> Vec<u8> {
        let row_width = external::width_for(self.rows);
        let col_width = external::width_for(self.cols).max(1);
        let desc = DimDescriptor::new(row_width, col_width, true).unwrap();
        let mut out = vec![desc.to_byte()];
        let mut buf = [0u8; 8];
        external::put_fixed(&mut buf, self.rows, row_width.max(1));
        out.extend_from_slice(&buf[..row_width.max(1) as usize]);
        external::put_fixed(&mut buf, self.cols, col_width);
        out.extend_from_slice(&buf[..col_width as usize]);

        for chunk in &self.chunks {
            match chunk {
                Chunk::AllEmpty => out.push(ChunkKind::AllEmpty as u8),
                Chunk::AllFull => out.push(ChunkKind::AllFull as u8),
                Chunk::SparseSet { indices, values } => {
                    out.push(ChunkKind::SparseSet as u8);
                    let mut cbuf = [0u8; 9];
                    let w = tagged::put(&mut cbuf, indices.len() as u64) as usize;
                    out.extend_from_slice(&cbuf[..w]);
                    out.extend_from_slice(&pack12(indices));
                    if let Some(values) = values {
                        out.extend_from_slice(values);
                    }
                }
                Chunk::SparseClear { indices } => {
                    out.push(ChunkKind::SparseClear as u8);
                    let mut cbuf = [0u8; 9];
                    let w = tagged::put(&mut cbuf, indices.len() as u64) as usize;
                    out.extend_from_slice(&cbuf[..w]);
                    out.extend_from_slice(&pack12(indices));
                }
                Chunk::Direct { data } => {
                    out.push(ChunkKind::Direct as u8);
                    out.extend_from_slice(data);
                }
            }
        }
        out
    }

    pub fn parse(src: &[u8], value_width: Option<u8>) -> Result<Self> {
        if src.is_empty() {
            return Err(Error::invalid_input("dimension: empty buffer"));
        }
        let desc = DimDescriptor::from_byte(src[0])?;
        if !desc.sparse {
            return Err(Error::invalid_input("dimension: descriptor is not sparse"));
        }
        let mut off = 1;
        let row_width = desc.row_width.max(1) as usize;
        let rows = external::get(&src[off..], row_width as u8)?;
        off += row_width;
        let cols = external::get(&src[off..], desc.col_width)?;
        off += desc.col_width as usize;

        let total = rows * cols;
        let n_chunks = total.div_ceil(CHUNK_SIZE).max(1) as usize;
        let mut chunks = Vec::with_capacity(n_chunks);
        for _ in 0..n_chunks {
            if off >= src.len() {
                return Err(Error::invalid_input("dimension: truncated chunk stream"));
            }
            let kind = ChunkKind::from_byte(src[off])?;
            off += 1;
            let chunk = match kind {
                ChunkKind::AllEmpty => Chunk::AllEmpty,
                ChunkKind::AllFull => Chunk::AllFull,
                ChunkKind::SparseSet => {
                    let (count, w) = tagged::get(&src[off..])?;
                    off += w as usize;
                    let count = count as usize;
                    let idx_bytes = (count * INDEX_BITS as usize).div_ceil(8);
                    let indices = unpack12(&src[off..off + idx_bytes], count)?;
                    off += idx_bytes;
                    let values = value_width.map(|width| {
                        let n = count * width as usize;
                        let v = src[off..off + n].to_vec();
                        off += n;
                        v
                    });
                    Chunk::SparseSet { indices, values }
                }
                ChunkKind::SparseClear => {
                    let (count, w) = tagged::get(&src[off..])?;
                    off += w as usize;
                    let count = count as usize;
                    let idx_bytes = (count * INDEX_BITS as usize).div_ceil(8);
                    let indices = unpack12(&src[off..off + idx_bytes], count)?;
                    off += idx_bytes;
                    Chunk::SparseClear { indices }
                }
                ChunkKind::Direct => {
                    let bytes = match value_width {
                        Some(w) => CHUNK_SIZE as usize * w as usize,
                        None => (CHUNK_SIZE as usize).div_ceil(8),
                    };
                    let data = src[off..off + bytes].to_vec();
                    off += bytes;
                    Chunk::Direct { data }
                }
            };
            chunks.push(chunk);
        }
        Ok(Self { rows, cols, value_width, chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_roundtrip() {
        for row_width in 0..=8u8 {
            for col_width in 1..=8u8 {
                for sparse in [false, true] {
                    let d = DimDescriptor::new(row_width, col_width, sparse).unwrap();
                    let b = d.to_byte();
                    assert_eq!(DimDescriptor::from_byte(b).unwrap(), d);
                }
            }
        }
    }

    #[test]
    fn dense_matrix_roundtrip() {
        let mut m = DenseMatrix::new(3, 4, 2);
        for r in 0..3 {
            for c in 0..4 {
                m.entry_set(r, c, r * 10 + c).unwrap();
            }
        }
        let bytes = m.serialize();
        let m2 = DenseMatrix::parse(&bytes).unwrap();
        for r in 0..3 {
            for c in 0..4 {
                assert_eq!(m2.entry_get(r, c).unwrap(), r * 10 + c);
            }
        }
    }

    #[test]
    fn dense_bool_matrix_bits() {
        let mut m = DenseBoolMatrix::new(4, 4);
        m.entry_set_bit(1, 2, true).unwrap();
        assert!(m.entry_get_bit(1, 2).unwrap());
        assert!(!m.entry_get_bit(0, 0).unwrap());
        m.entry_toggle_bit(1, 2).unwrap();
        assert!(!m.entry_get_bit(1, 2).unwrap());
    }

    #[test]
    fn sparse_bool_matrix_and_roundtrip() {
        let mut m = SparseMatrix::new(300, 300, None);
        m.entry_set_bit(0, 0, true).unwrap();
        m.entry_set_bit(100, 100, true).unwrap();
        m.entry_set_bit(299, 299, true).unwrap();
        assert!(m.entry_get_bit(0, 0).unwrap());
        assert!(!m.entry_get_bit(1, 1).unwrap());

        let bytes = m.serialize();
        let m2 = SparseMatrix::parse(&bytes, None).unwrap();
        assert!(m2.entry_get_bit(100, 100).unwrap());
        assert!(m2.entry_get_bit(299, 299).unwrap());
        assert!(!m2.entry_get_bit(5, 5).unwrap());
    }

    #[test]
    fn sparse_numeric_matrix_roundtrip() {
        let mut m = SparseMatrix::new(10, 10, Some(2));
        m.entry_set_u64(3, 4, 1000).unwrap();
        m.entry_set_u64(7, 7, 65535).unwrap();
        assert_eq!(m.entry_get_u64(3, 4).unwrap(), 1000);
        assert_eq!(m.entry_get_u64(0, 0).unwrap(), 0);

        let bytes = m.serialize();
        let m2 = SparseMatrix::parse(&bytes, Some(2)).unwrap();
        assert_eq!(m2.entry_get_u64(3, 4).unwrap(), 1000);
        assert_eq!(m2.entry_get_u64(7, 7).unwrap(), 65535);
    }
}
