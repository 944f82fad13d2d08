// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use std::f64::consts::PI;

/// Deterministic 64-bit LCG (Knuth MMIX constants).
#[derive(Clone, Debug)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller standard normal.
    pub fn standard_normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1.0e-12);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

/// `n` draws of `N(mean, 1)` clamped to `mean +/- 2.5`.
pub fn gaussian(n: usize, mean: f64, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    (0..n)
        .map(|_| mean + rng.standard_normal().clamp(-2.5, 2.5))
        .collect()
}

/// `n` draws uniform in `mean +/- half_width`.
pub fn uniform_noise(n: usize, mean: f64, half_width: f64, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    (0..n)
        .map(|_| mean + half_width * (2.0 * rng.next_f64() - 1.0))
        .collect()
}

/// `k` draws around 0 followed by `after` draws around `offset`.
pub fn mean_shift(k: usize, after: usize, offset: f64, seed: u64) -> Vec<f64> {
    let mut out = gaussian(k, 0.0, seed);
    out.extend(gaussian(after, offset, seed.wrapping_add(1)));
    out
}
