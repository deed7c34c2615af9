/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Fenwick tree / BIT: a tiered, type-polymorphic prefix-aggregate
//! structure over [`Cell`], auto-promoting from a compact `Small`
//! (contiguous) tier to an unbounded `Full` (multilist-backed) tier as
//! it grows.
//!
//! A separate monomorphic template per cell variant plus a polymorphic
//! fallback collapses here into a single implementation: [`Cell::add`]
//! already encodes the promotion rule, so a tree backed by `Cell` slots
//! is both the monomorphic and the polymorphic variant at once —
//! promotion on type mismatch falls out of the cell arithmetic rather
//! than needing tree-level bookkeeping.

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::multilist::MultiList;
use std::cmp::Ordering;

/// Per-variant Small-tier element cap, mirrored from the segment tree's
/// own 4K/8K/16K/32K tiering for consistency across both tree modules.
fn small_cap_for(identity: &Cell) -> usize {
    match identity {
        Cell::Double(_) | Cell::Bytes(_) => 4096,
        Cell::Signed(_) | Cell::Unsigned(_) => 8192,
        Cell::Float(_) => 16384,
        _ => 32768,
    }
}

fn next_pow2(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    1usize << (usize::BITS - (n - 1).leading_zeros())
}

struct SmallFenwick {
    tree: Vec<Cell>, // 1-indexed; tree[0] unused
    capacity: usize,
    count: usize,
    identity: Cell,
}

impl SmallFenwick {
    fn new(identity: Cell) -> Self {
        Self { tree: vec![identity.clone(); 2], capacity: 1, count: 0, identity }
    }

    fn ensure_capacity(&mut self, needed_count: usize) {
        if needed_count < self.capacity {
            return;
        }
        let new_capacity = next_pow2(needed_count + 1);
        if new_capacity <= self.capacity {
            return;
        }
        // Materialize logical values from Small (O(n)) rather than
        // re-querying per position (O(n log^2 n)).
        let logical: Vec<Cell> = (0..self.count).map(|i| self.get(i)).collect();
        self.capacity = new_capacity;
        self.tree = vec![self.identity.clone(); new_capacity + 1];
        for (i, v) in logical.into_iter().enumerate() {
            self.tree[i + 1] = v;
        }
        for i in 1..=new_capacity {
            let j = i + (i & i.wrapping_neg());
            if j <= new_capacity {
                let addend = self.tree[i].clone();
                self.tree[j] = self.tree[j].add(&addend).unwrap_or(self.tree[j].clone());
            }
        }
    }

    fn update(&mut self, idx: usize, delta: &Cell) -> Result<()> {
        self.ensure_capacity(idx);
        self.count = self.count.max(idx + 1);
        let mut i = idx + 1;
        while i <= self.capacity {
            self.tree[i] = self.tree[i].add(delta)?;
            i += i & i.wrapping_neg();
        }
        Ok(())
    }

    fn query(&self, idx: usize) -> Result<Cell> {
        if idx + 1 > self.capacity {
            return Ok(self.identity.clone());
        }
        let mut sum = self.identity.clone();
        let mut i = idx + 1;
        while i > 0 {
            sum = sum.add(&self.tree[i])?;
            i -= i & i.wrapping_neg();
        }
        Ok(sum)
    }

    fn get(&self, idx: usize) -> Cell {
        let hi = self.query(idx).unwrap_or_else(|_| self.identity.clone());
        if idx == 0 {
            hi
        } else {
            let lo = self.query(idx - 1).unwrap_or_else(|_| self.identity.clone());
            hi.sub(&lo).unwrap_or(hi)
        }
    }

    fn lower_bound(&self, target: &Cell) -> Option<usize> {
        let mut pos = 0usize;
        let mut remaining = target.clone();
        let mut pw = next_pow2(self.capacity + 1) / 2;
        while pw > 0 {
            if pos + pw <= self.capacity {
                if let Ok(Ordering::Less) = self.tree[pos + pw].compare(&remaining) {
                    pos += pw;
                    remaining = remaining.sub(&self.tree[pos]).unwrap_or(remaining);
                }
            }
            pw /= 2;
        }
        if pos < self.count {
            Some(pos)
        } else {
            None
        }
    }

    fn clear(&mut self) {
        for v in self.tree.iter_mut() {
            *v = self.identity.clone();
        }
        self.count = 0;
    }
}

struct FullFenwick {
    storage: MultiList,
    capacity: usize,
    count: usize,
    identity: Cell,
}

impl FullFenwick {
    fn from_small(small: &SmallFenwick) -> Self {
        let mut storage = MultiList::new(4096);
        storage.push_back(small.identity.clone()).ok();
        for i in 1..=small.capacity {
            storage.push_back(small.tree[i].clone()).ok();
        }
        Self { storage, capacity: small.capacity, count: small.count, identity: small.identity.clone() }
    }

    fn ensure_capacity(&mut self, needed_count: usize) -> Result<()> {
        if needed_count < self.capacity {
            return Ok(());
        }
        let new_capacity = next_pow2(needed_count + 1);
        if new_capacity <= self.capacity {
            return Ok(());
        }
        let logical: Vec<Cell> = (0..self.count).map(|i| self.get(i).unwrap_or_else(|_| self.identity.clone())).collect();
        let mut storage = MultiList::new(4096);
        storage.push_back(self.identity.clone())?;
        storage.push_back_many((0..new_capacity).map(|i| logical.get(i).cloned().unwrap_or_else(|| self.identity.clone())))?;
        for i in 1..=new_capacity {
            let j = i + (i & i.wrapping_neg());
            if j <= new_capacity {
                let vi = storage.get(i)?;
                let vj = storage.get(j)?;
                storage.set(j, vj.add(&vi).unwrap_or(vj))?;
            }
        }
        self.storage = storage;
        self.capacity = new_capacity;
        Ok(())
    }

    fn update(&mut self, idx: usize, delta: &Cell) -> Result<()> {
        self.ensure_capacity(idx)?;
        self.count = self.count.max(idx + 1);
        let mut i = idx + 1;
        while i <= self.capacity {
            let v = self.storage.get(i)?;
            self.storage.set(i, v.add(delta)?)?;
            i += i & i.wrapping_neg();
        }
        Ok(())
    }

    fn query(&mut self, idx: usize) -> Result<Cell> {
        if idx + 1 > self.capacity {
            return Ok(self.identity.clone());
        }
        let mut sum = self.identity.clone();
        let mut i = idx + 1;
        while i > 0 {
            sum = sum.add(&self.storage.get(i)?)?;
            i -= i & i.wrapping_neg();
        }
        Ok(sum)
    }

    fn get(&mut self, idx: usize) -> Result<Cell> {
        let hi = self.query(idx)?;
        if idx == 0 {
            Ok(hi)
        } else {
            let lo = self.query(idx - 1)?;
            hi.sub(&lo)
        }
    }

    fn lower_bound(&mut self, target: &Cell) -> Result<Option<usize>> {
        let mut pos = 0usize;
        let mut remaining = target.clone();
        let mut pw = next_pow2(self.capacity + 1) / 2;
        while pw > 0 {
            if pos + pw <= self.capacity {
                let node = self.storage.get(pos + pw)?;
                if let Ordering::Less = node.compare(&remaining)? {
                    pos += pw;
                    let node_at_pos = self.storage.get(pos)?;
                    remaining = remaining.sub(&node_at_pos)?;
                }
            }
            pw /= 2;
        }
        Ok(if pos < self.count { Some(pos) } else { None })
    }

    fn clear(&mut self) -> Result<()> {
        for i in 1..=self.capacity {
            self.storage.set(i, self.identity.clone())?;
        }
        self.count = 0;
        Ok(())
    }
}

enum Tier {
    Small(SmallFenwick),
    Full(FullFenwick),
}

/// A tiered tree handle, expressed as a plain Rust sum type rather than
/// bit tagging a raw pointer.
pub struct Fenwick {
    tier: Tier,
    small_cap: usize,
}

impl Fenwick {
    /// Creates an empty tree. `identity` fixes the cell variant new
    /// positions default to (e.g. `Cell::Signed(0)`).
    pub fn new(identity: Cell) -> Result<Self> {
        if !identity.is_numeric() && !matches!(identity, Cell::Void) {
            return Err(Error::type_mismatch("fenwick: identity must be numeric or void"));
        }
        let small_cap = small_cap_for(&identity);
        Ok(Self { tier: Tier::Small(SmallFenwick::new(identity)), small_cap })
    }

    fn maybe_promote(&mut self) {
        if let Tier::Small(small) = &self.tier {
            if small.count > self.small_cap || small.capacity * std::mem::size_of::<Cell>() > self.small_cap * 64 {
                let full = FullFenwick::from_small(small);
                self.tier = Tier::Full(full);
            }
        }
    }

    pub fn update(&mut self, idx: usize, delta: &Cell) -> Result<()> {
        match &mut self.tier {
            Tier::Small(small) => {
                small.update(idx, delta)?;
                self.maybe_promote();
            }
            Tier::Full(full) => full.update(idx, delta)?,
        }
        Ok(())
    }

    pub fn query(&mut self, idx: usize) -> Result<Cell> {
        match &mut self.tier {
            Tier::Small(small) => small.query(idx),
            Tier::Full(full) => full.query(idx),
        }
    }

    pub fn range(&mut self, l: usize, r: usize) -> Result<Cell> {
        let hi = self.query(r)?;
        if l == 0 {
            Ok(hi)
        } else {
            let lo = self.query(l - 1)?;
            hi.sub(&lo)
        }
    }

    pub fn get(&mut self, idx: usize) -> Result<Cell> {
        match &mut self.tier {
            Tier::Small(small) => Ok(small.get(idx)),
            Tier::Full(full) => full.get(idx),
        }
    }

    pub fn set(&mut self, idx: usize, value: Cell) -> Result<()> {
        let current = self.get(idx)?;
        let delta = value.sub(&current)?;
        self.update(idx, &delta)
    }

    pub fn lower_bound(&mut self, target: &Cell) -> Result<Option<usize>> {
        match &mut self.tier {
            Tier::Small(small) => Ok(small.lower_bound(target)),
            Tier::Full(full) => full.lower_bound(target),
        }
    }

    pub fn clear(&mut self) -> Result<()> {
        match &mut self.tier {
            Tier::Small(small) => {
                small.clear();
                Ok(())
            }
            Tier::Full(full) => full.clear(),
        }
    }

    #[must_use]
    pub fn is_full_tier(&self) -> bool {
        matches!(self.tier, Tier::Full(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_sums_match_naive() {
        let mut fw = Fenwick::new(Cell::Signed(0)).unwrap();
        let values = [3i64, -1, 4, 1, 5, 9, 2, 6];
        for (i, &v) in values.iter().enumerate() {
            fw.update(i, &Cell::Signed(v)).unwrap();
        }
        let mut prefix = 0i64;
        for (i, &v) in values.iter().enumerate() {
            prefix += v;
            assert_eq!(fw.query(i).unwrap(), Cell::Signed(prefix));
        }
    }

    #[test]
    fn set_and_get_round_trip() {
        let mut fw = Fenwick::new(Cell::Signed(0)).unwrap();
        for i in 0..5 {
            fw.update(i, &Cell::Signed(i as i64)).unwrap();
        }
        fw.set(2, Cell::Signed(100)).unwrap();
        assert_eq!(fw.get(2).unwrap(), Cell::Signed(100));
        assert_eq!(fw.get(1).unwrap(), Cell::Signed(1));
        assert_eq!(fw.get(3).unwrap(), Cell::Signed(3));
    }

    #[test]
    fn scenario_mixed_type_promotion() {
        let mut fw = Fenwick::new(Cell::Signed(0)).unwrap();
        fw.update(0, &Cell::Signed(5)).unwrap();
        fw.update(0, &Cell::Double(0.5)).unwrap();
        assert_eq!(fw.get(0).unwrap(), Cell::Double(5.5));
    }

    #[test]
    fn scenario_lower_bound() {
        let mut fw = Fenwick::new(Cell::Unsigned(0)).unwrap();
        for (i, v) in [1u64, 2, 3, 4, 5].into_iter().enumerate() {
            fw.update(i, &Cell::Unsigned(v)).unwrap();
        }
        assert_eq!(fw.lower_bound(&Cell::Unsigned(6)).unwrap(), Some(2));
        assert_eq!(fw.lower_bound(&Cell::Unsigned(100)).unwrap(), None);
    }

    #[test]
    fn growth_preserves_prefix_sums() {
        let mut fw = Fenwick::new(Cell::Signed(0)).unwrap();
        let mut naive = vec![];
        for i in 0..50 {
            let v = (i * 7 % 13) as i64 - 6;
            naive.push(v);
            fw.update(i, &Cell::Signed(v)).unwrap();
        }
        let mut prefix = 0i64;
        for (i, &v) in naive.iter().enumerate() {
            prefix += v;
            assert_eq!(fw.query(i).unwrap(), Cell::Signed(prefix), "mismatch at {i}");
        }
    }

    #[test]
    fn promotes_to_full_tier_past_small_cap() {
        let mut fw = Fenwick::new(Cell::Signed(0)).unwrap();
        for i in 0..9000 {
            fw.update(i, &Cell::Signed(1)).unwrap();
        }
        assert!(fw.is_full_tier());
        assert_eq!(fw.query(8999).unwrap(), Cell::Signed(9000));
    }

    #[test]
    fn clear_resets_all_queries() {
        let mut fw = Fenwick::new(Cell::Signed(0)).unwrap();
        for i in 0..5 {
            fw.update(i, &Cell::Signed(10)).unwrap();
        }
        fw.clear().unwrap();
        for i in 0..5 {
            assert_eq!(fw.get(i).unwrap(), Cell::Signed(0));
        }
    }
}
