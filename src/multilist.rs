/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Multi-sequence ("multilist"): an ordered list of byte-packed
//! [`Flex`] blocks with a preferred per-block capacity; cold blocks are
//! held compressed and decompressed into a per-handle scratch on access.
//!
//! Like flex, operations and cost are fixed, not wire format, so
//! cold-block compression here is this crate's own simple byte-oriented
//! run-length scheme rather than a general-purpose compression crate.

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::flex::Flex;

fn rle_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let mut run = 1usize;
        while i + run < data.len() && data[i + run] == byte && run < 255 {
            run += 1;
        }
        out.push(run as u8);
        out.push(byte);
        i += run;
    }
    out
}

fn rle_decompress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    for pair in data.chunks_exact(2) {
        out.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
    }
    out
}

enum Block {
    Hot(Flex),
    Cold(Vec<u8>),
}

/// A list of [`Flex`] blocks, with cold (not-recently-touched) blocks
/// held compressed.
pub struct MultiList {
    blocks: Vec<Block>,
    block_capacity: usize,
    /// Decompression/compression staging buffer, reused across calls;
    /// any reference returned from a "get entry" call is invalidated by
    /// the next operation on this handle.
    scratch: Vec<u8>,
}

impl MultiList {
    #[must_use]
    pub fn new(block_capacity: usize) -> Self {
        Self { blocks: vec![Block::Hot(Flex::new())], block_capacity, scratch: Vec::new() }
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| match b {
                Block::Hot(f) => f.len(),
                Block::Cold(data) => {
                    // length is cheap to recover without a full decode:
                    // count entries by re-inflating into scratch.
                    let inflated = rle_decompress(data);
                    Flex::parse(&inflated).map(|f| f.len()).unwrap_or(0)
                }
            })
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_hot(&mut self, block_idx: usize) -> Result<&mut Flex> {
        if let Block::Cold(data) = &self.blocks[block_idx] {
            self.scratch = rle_decompress(data);
            let flex = Flex::parse(&self.scratch)?;
            self.blocks[block_idx] = Block::Hot(flex);
        }
        match &mut self.blocks[block_idx] {
            Block::Hot(f) => Ok(f),
            Block::Cold(_) => unreachable!(),
        }
    }

    /// Marks a block cold, compressing its contents into the scratch
    /// buffer's compressed form.
    pub fn compress_block(&mut self, block_idx: usize) -> Result<()> {
        if block_idx >= self.blocks.len() {
            return Err(Error::invalid_input("multilist: block index out of range"));
        }
        if let Block::Hot(flex) = &self.blocks[block_idx] {
            let serialized = flex.serialize();
            self.blocks[block_idx] = Block::Cold(rle_compress(&serialized));
        }
        Ok(())
    }

    /// Appends `cell` to the last block, splitting into a new block once
    /// `block_capacity` is reached.
    pub fn push_back(&mut self, cell: Cell) -> Result<()> {
        let last = self.blocks.len() - 1;
        let flex = self.ensure_hot(last)?;
        if flex.len() >= self.block_capacity {
            let mut new_block = Flex::new();
            new_block.push_back(cell);
            self.blocks.push(Block::Hot(new_block));
        } else {
            flex.push_back(cell);
        }
        Ok(())
    }

    /// Indexes across blocks to find entry `index`; decompresses the
    /// owning block if it is cold. The returned value is a copy (no
    /// dangling-reference concern), but any zero-copy variant would be
    /// invalidated by the next call on this handle.
    pub fn get(&mut self, mut index: usize) -> Result<Cell> {
        for block_idx in 0..self.blocks.len() {
            let block_len = match &self.blocks[block_idx] {
                Block::Hot(f) => f.len(),
                Block::Cold(data) => {
                    let inflated = rle_decompress(data);
                    Flex::parse(&inflated)?.len()
                }
            };
            if index < block_len {
                let flex = self.ensure_hot(block_idx)?;
                return flex.get(index).cloned().ok_or_else(|| Error::invalid_input("multilist: index out of range"));
            }
            index -= block_len;
        }
        Err(Error::invalid_input("multilist: index out of range"))
    }

    /// Overwrites the entry at a flat `index`, decompressing the owning
    /// block if it is cold.
    pub fn set(&mut self, mut index: usize, cell: Cell) -> Result<()> {
        for block_idx in 0..self.blocks.len() {
            let block_len = match &self.blocks[block_idx] {
                Block::Hot(f) => f.len(),
                Block::Cold(data) => {
                    let inflated = rle_decompress(data);
                    Flex::parse(&inflated)?.len()
                }
            };
            if index < block_len {
                let flex = self.ensure_hot(block_idx)?;
                return flex.set(index, cell);
            }
            index -= block_len;
        }
        Err(Error::invalid_input("multilist: index out of range"))
    }

    /// Appends a new logical slot (used by Full-tier growth, which must
    /// materialize new positions before it can update them).
    pub fn push_back_many(&mut self, cells: impl IntoIterator<Item = Cell>) -> Result<()> {
        for cell in cells {
            self.push_back(cell)?;
        }
        Ok(())
    }

    pub fn iter_collect(&mut self) -> Result<Vec<Cell>> {
        let mut out = Vec::with_capacity(self.len());
        for block_idx in 0..self.blocks.len() {
            let flex = self.ensure_hot(block_idx)?;
            out.extend(flex.iter().cloned());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_get_across_blocks() {
        let mut ml = MultiList::new(3);
        for i in 0..10 {
            ml.push_back(Cell::Signed(i)).unwrap();
        }
        assert_eq!(ml.len(), 10);
        assert!(ml.block_count() >= 4);
        for i in 0..10 {
            assert_eq!(ml.get(i as usize).unwrap(), Cell::Signed(i));
        }
    }

    #[test]
    fn cold_block_roundtrips() {
        let mut ml = MultiList::new(4);
        for i in 0..8 {
            ml.push_back(Cell::Signed(i)).unwrap();
        }
        ml.compress_block(0).unwrap();
        assert_eq!(ml.get(1).unwrap(), Cell::Signed(1));
        let all = ml.iter_collect().unwrap();
        assert_eq!(all.len(), 8);
    }

    #[test]
    fn rle_roundtrip() {
        let data = vec![0u8, 0, 0, 1, 2, 2, 2, 2, 2];
        let compressed = rle_compress(&data);
        assert_eq!(rle_decompress(&compressed), data);
    }
}
