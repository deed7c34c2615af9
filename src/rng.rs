/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Process-local PRNG: a single owned, stirred RC4-style generator with
//! an explicit `init`/`stir`/`read` lifecycle, reseeded from OS entropy
//! after a configured byte budget or a process-id change.
//!
//! Modeled as a single owned state rather than a thread-local. Tests
//! bypass the global singleton and construct an [`Rc4Prng`] directly
//! from fixed bytes.

use rand::rngs::OsRng;
use rand::TryRngCore;
use std::sync::{Mutex, OnceLock};

/// Bytes served between automatic reseeds.
const RESEED_BYTE_BUDGET: u64 = 1 << 20;

/// A stirred RC4-style byte stream.
///
/// `init` runs the key-scheduling algorithm once; `stir` re-runs it,
/// folding in fresh entropy without discarding the existing permutation;
/// `read` drains the pseudo-random generation algorithm and triggers an
/// automatic `stir` once the byte budget or the owning process changes.
pub struct Rc4Prng {
    s: [u8; 256],
    i: u8,
    j: u8,
    bytes_served: u64,
    pid: u32,
}

impl Rc4Prng {
    /// Initializes state from `seed` (the RC4 key-scheduling algorithm).
    /// `seed` must be non-empty.
    #[must_use]
    pub fn init(seed: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (idx, slot) in s.iter_mut().enumerate() {
            *slot = idx as u8;
        }
        if !seed.is_empty() {
            let mut j = 0u8;
            for i in 0..256 {
                j = j.wrapping_add(s[i]).wrapping_add(seed[i % seed.len()]);
                s.swap(i, j as usize);
            }
        }
        Self { s, i: 0, j: 0, bytes_served: 0, pid: std::process::id() }
    }

    /// Builds an instance seeded straight from OS entropy, for the
    /// process-local singleton's first use.
    pub fn from_os_entropy() -> Self {
        let mut seed = [0u8; 32];
        // OsRng failures are vanishingly rare on supported platforms;
        // fall back to a process-derived seed rather than panicking.
        if OsRng.try_fill_bytes(&mut seed).is_err() {
            log::debug!("rng: OS entropy source unavailable, falling back to process-derived seed");
            let fallback = (std::process::id() as u64).to_le_bytes();
            for (idx, byte) in seed.iter_mut().enumerate() {
                *byte = fallback[idx % fallback.len()];
            }
        }
        Self::init(&seed)
    }

    /// Re-runs the key schedule, mixing `extra` entropy into the current
    /// permutation instead of discarding it.
    pub fn stir(&mut self, extra: &[u8]) {
        if extra.is_empty() {
            return;
        }
        let mut j = self.j;
        for i in 0..256 {
            j = j.wrapping_add(self.s[i]).wrapping_add(extra[i % extra.len()]);
            self.s.swap(i, j as usize);
        }
        self.j = j;
        self.bytes_served = 0;
        self.pid = std::process::id();
        log::debug!("rng: stirred with {} bytes of fresh entropy", extra.len());
    }

    fn reseed_from_os(&mut self) {
        let mut extra = [0u8; 32];
        if OsRng.try_fill_bytes(&mut extra).is_err() {
            log::debug!("rng: OS entropy source unavailable during reseed");
            return;
        }
        self.stir(&extra);
    }

    /// Fills `out` with pseudo-random bytes (the RC4 pseudo-random
    /// generation algorithm), automatically reseeding from OS entropy
    /// first if the byte budget is exhausted or the process forked.
    pub fn read(&mut self, out: &mut [u8]) {
        if self.bytes_served >= RESEED_BYTE_BUDGET || self.pid != std::process::id() {
            self.reseed_from_os();
        }
        for slot in out.iter_mut() {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *slot = self.s[k as usize];
        }
        self.bytes_served += out.len() as u64;
    }

    /// Draws a `u64` from the stream.
    pub fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.read(&mut buf);
        u64::from_le_bytes(buf)
    }
}

static GLOBAL: OnceLock<Mutex<Rc4Prng>> = OnceLock::new();

fn global() -> &'static Mutex<Rc4Prng> {
    GLOBAL.get_or_init(|| Mutex::new(Rc4Prng::from_os_entropy()))
}

/// Fills `out` with bytes from the process-local singleton.
pub fn fill_bytes(out: &mut [u8]) {
    global().lock().expect("rng: singleton mutex poisoned").read(out);
}

/// Draws a `u64` from the process-local singleton.
pub fn next_u64() -> u64 {
    global().lock().expect("rng: singleton mutex poisoned").next_u64()
}

/// Forces an out-of-band stir on the process-local singleton, mixing in
/// `extra` entropy supplied by the caller.
pub fn stir(extra: &[u8]) {
    global().lock().expect("rng: singleton mutex poisoned").stir(extra);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Rc4Prng::init(b"fixed-test-seed");
        let mut b = Rc4Prng::init(b"fixed-test-seed");
        let mut out_a = [0u8; 64];
        let mut out_b = [0u8; 64];
        a.read(&mut out_a);
        b.read(&mut out_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Rc4Prng::init(b"seed-one");
        let mut b = Rc4Prng::init(b"seed-two");
        let mut out_a = [0u8; 64];
        let mut out_b = [0u8; 64];
        a.read(&mut out_a);
        b.read(&mut out_b);
        assert_ne!(out_a, out_b);
    }

    #[test]
    fn stir_changes_subsequent_output() {
        let mut rng = Rc4Prng::init(b"stir-me");
        let mut before = [0u8; 32];
        rng.read(&mut before);
        rng.stir(b"extra-entropy");
        let mut after = [0u8; 32];
        rng.read(&mut after);
        assert_ne!(before, after);
    }

    #[test]
    fn global_singleton_produces_bytes() {
        let mut out = [0u8; 16];
        fill_bytes(&mut out);
        assert!(out.iter().any(|&b| b != 0));
    }
}
