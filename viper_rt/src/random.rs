// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic pseudo-random numbers (64-bit LCG with MMIX constants).

use crate::heap::{Heap, HeapError, ObjRef};
use crate::seq::Seq;

const MUL: u64 = 6_364_136_223_846_793_005;
const INC: u64 = 1_442_695_040_888_963_407;
const DEFAULT_SEED: u64 = 0x853c_49e6_748f_ea9b;

/// Generator state. Owned by the runtime context rather than shared process-wide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rng {
    state: u64,
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl Rng {
    /// A generator seeded with `seed`.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Reseeds.
    pub fn randomize(&mut self, seed: i64) {
        self.state = seed.cast_unsigned();
    }

    fn step(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(MUL).wrapping_add(INC);
        self.state
    }

    /// Next value in `[0, 1)` built from the upper 53 bits of the state.
    pub fn rnd(&mut self) -> f64 {
        (self.step() >> 11) as f64 * (1.0 / (1_u64 << 53) as f64)
    }

    /// Uniform integer in `[0, max)`; 0 when `max <= 0`.
    #[allow(clippy::cast_possible_truncation, reason = "product is below max")]
    pub fn rand_int(&mut self, max: i64) -> i64 {
        if max <= 0 {
            return 0;
        }
        let v = (self.rnd() * max as f64) as i64;
        v.min(max - 1)
    }

    /// Uniform integer in `[min, max]`, swapping the bounds when reversed.
    pub fn rand_range(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min > max { (max, min) } else { (min, max) };
        let span = hi.wrapping_sub(lo).wrapping_add(1);
        if span <= 0 {
            // Full i64 range.
            return self.step().cast_signed();
        }
        lo + self.rand_int(span)
    }

    /// Normal deviate via Box-Muller.
    pub fn rand_gaussian(&mut self, mean: f64, stddev: f64) -> f64 {
        let u1 = 1.0 - self.rnd();
        let u2 = self.rnd();
        let z = (-2.0 * u1.ln()).sqrt() * (core::f64::consts::TAU * u2).cos();
        mean + stddev * z
    }

    /// Exponential deviate via the inverse CDF; 0 for non-positive `lambda`.
    pub fn rand_exponential(&mut self, lambda: f64) -> f64 {
        if lambda <= 0.0 {
            return 0.0;
        }
        -(1.0 - self.rnd()).ln() / lambda
    }

    /// A roll of a `sides`-sided die in `[1, sides]`; 0 for fewer than one side.
    pub fn rand_dice(&mut self, sides: i64) -> i64 {
        if sides < 1 {
            return 0;
        }
        self.rand_int(sides) + 1
    }

    /// `true` with probability `p` (clamped to `[0, 1]`).
    pub fn rand_chance(&mut self, p: f64) -> bool {
        self.rnd() < p.clamp(0.0, 1.0)
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let bound = i64::try_from(i + 1).unwrap_or(i64::MAX);
            let j = usize::try_from(self.rand_int(bound)).unwrap_or(0);
            items.swap(i, j);
        }
    }
}

impl Heap {
    /// Shuffles sequence `s` in place.
    pub fn rand_shuffle(&mut self, rng: &mut Rng, s: ObjRef) -> Result<(), HeapError> {
        let seq = self.borrow_mut::<Seq>(s)?;
        rng.shuffle(seq.items_mut());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Rng::new(7);
        let mut b = Rng::default();
        b.randomize(7);
        for _ in 0..16 {
            assert_eq!(a.rnd().to_bits(), b.rnd().to_bits());
        }
    }

    #[test]
    fn values_stay_in_range() {
        let mut r = Rng::new(42);
        for _ in 0..1000 {
            let x = r.rnd();
            assert!((0.0..1.0).contains(&x));
            assert!((0..10).contains(&r.rand_int(10)));
            assert!((-3..=3).contains(&r.rand_range(3, -3)));
            assert!((1..=6).contains(&r.rand_dice(6)));
            assert!(r.rand_exponential(2.0) >= 0.0);
        }
        assert_eq!(r.rand_int(0), 0);
        assert!(!r.rand_chance(0.0));
        assert!(r.rand_chance(1.0));
    }

    #[test]
    fn gaussian_centers_on_mean() {
        let mut r = Rng::new(1);
        let n = 4000;
        let sum: f64 = (0..n).map(|_| r.rand_gaussian(10.0, 2.0)).sum();
        let mean = sum / f64::from(n);
        assert!((mean - 10.0).abs() < 0.2, "mean {mean}");
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut r = Rng::new(3);
        let mut v: std::vec::Vec<u32> = (0..50).collect();
        r.shuffle(&mut v);
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<std::vec::Vec<_>>());

        let mut heap = Heap::new();
        let s = heap.seq_new();
        for i in 0..5 {
            let item = heap.str_from_i64(i);
            heap.seq_push(s, Some(item)).unwrap();
            heap.release(item).unwrap();
        }
        heap.rand_shuffle(&mut r, s).unwrap();
        assert_eq!(heap.seq_len(s).unwrap(), 5);
    }
}
