// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Synthetic workloads shared by the benchmark targets.

/// Piecewise-constant series with `regimes` equal-length segments and a
/// deterministic sawtooth ripple on top.
pub fn piecewise_series(n: usize, regimes: usize) -> Vec<f64> {
    let regimes = regimes.max(1);
    let regime_len = n.div_ceil(regimes).max(1);
    (0..n)
        .map(|idx| {
            let level = match (idx / regime_len) % 3 {
                0 => 0.0,
                1 => 6.0,
                _ => -4.0,
            };
            let ripple = ((idx * 7) % 11) as f64 / 11.0 - 0.5;
            level + ripple
        })
        .collect()
}

pub fn crate_name() -> &'static str {
    let _ = (bocpd_core::crate_name(), bocpd_online::crate_name());
    "bocpd-bench"
}
