/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Cross-module end-to-end scenarios covering interactions the
//! per-module unit tests don't: codec-backed tree persistence and
//! mixed-type tree usage through the public API rather than each
//! tier's internals directly.

use anyhow::Result;
use vartier::cell::Cell;
use vartier::fenwick::Fenwick;
use vartier::segtree::{Op, SegTree};
use vartier::trie::Trie;
use vartier::varint::tagged;

#[test]
fn fenwick_matches_naive_prefix_sums_across_growth_and_set() -> Result<()> {
    let mut fw = Fenwick::new(Cell::Signed(0))?;
    let mut naive = vec![0i64; 200];
    for i in 0..200usize {
        let v = ((i * 37) % 50) as i64 - 25;
        naive[i] = v;
        fw.update(i, &Cell::Signed(v))?;
    }
    naive[50] = 999;
    fw.set(50, Cell::Signed(999))?;

    let mut prefix = 0i64;
    for (i, &v) in naive.iter().enumerate() {
        prefix += v;
        assert_eq!(fw.query(i)?, Cell::Signed(prefix), "prefix mismatch at {i}");
    }
    let expected_range: i64 = naive[10..=40].iter().sum();
    assert_eq!(fw.range(10, 40)?, Cell::Signed(expected_range));
    Ok(())
}

#[test]
fn segtree_range_update_matches_naive_array() -> Result<()> {
    let mut st = SegTree::new(Op::Sum, Cell::Signed(0))?;
    let mut naive = vec![0i64; 64];
    for i in 0..64 {
        st.update(i, Cell::Signed(i as i64))?;
        naive[i] = i as i64;
    }
    st.range_update(5, 20, Cell::Signed(7))?;
    for v in naive.iter_mut().take(21).skip(5) {
        *v += 7;
    }
    for (l, r) in [(0, 63), (5, 20), (0, 4), (21, 63)] {
        let expected: i64 = naive[l..=r].iter().sum();
        assert_eq!(st.query(l, r)?, Cell::Signed(expected), "range ({l},{r}) mismatch");
    }
    Ok(())
}

#[test]
fn tagged_ordering_scenario() {
    // Exercised via the public varint module path rather than the
    // tagged module's own internal tests.
    let values = [1u64, 128, 16384, 1 << 24];
    let mut last: Option<Vec<u8>> = None;
    for &v in &values {
        let mut buf = [0u8; 9];
        let w = tagged::put(&mut buf, v) as usize;
        let encoded = buf[..w].to_vec();
        if let Some(prev) = &last {
            assert!(prev.as_slice() < encoded.as_slice());
        }
        last = Some(encoded);
    }
}

#[test]
fn trie_persistence_round_trip_preserves_match_behavior() -> Result<()> {
    let mut trie = Trie::new();
    trie.insert("stock.nasdaq.aapl", 1, "alice")?;
    trie.insert("stock.*.goog", 2, "bob")?;
    trie.insert("forex.#", 3, "carol")?;
    trie.insert("forex.#", 4, "dave")?;

    let saved_a = trie.save();
    let saved_b = trie.save();
    assert_eq!(saved_a, saved_b, "two successive saves must be byte-identical");

    let loaded = Trie::load(&saved_a)?;
    let before: Vec<u64> = {
        let mut v: Vec<u64> = trie.match_input("stock.nasdaq.goog")?.into_iter().map(|s| s.id).collect();
        v.sort_unstable();
        v
    };
    let after: Vec<u64> = {
        let mut v: Vec<u64> = loaded.match_input("stock.nasdaq.goog")?.into_iter().map(|s| s.id).collect();
        v.sort_unstable();
        v
    };
    assert_eq!(before, after);
    assert_eq!(before, vec![2]);
    Ok(())
}

#[test]
fn fenwick_across_tier_promotion_preserves_lower_bound() -> Result<()> {
    let mut fw = Fenwick::new(Cell::Unsigned(0))?;
    for i in 0..9000usize {
        fw.update(i, &Cell::Unsigned(1))?;
    }
    assert!(fw.is_full_tier());
    // Prefix sum reaches `k` exactly at index `k - 1` since every update
    // added exactly 1.
    assert_eq!(fw.lower_bound(&Cell::Unsigned(4500))?, Some(4499));
    assert_eq!(fw.lower_bound(&Cell::Unsigned(100_000))?, None);
    Ok(())
}
