// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Numerically stable `ln(exp(a) + exp(b))`.
///
/// `-inf` is the additive identity, so folding from `f64::NEG_INFINITY`
/// accumulates a log-space sum.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Numerically stable `ln(sum(exp(values)))`.
///
/// Returns `-inf` for an empty slice or a slice of `-inf`, and NaN when any
/// entry is NaN. A single finite entry is returned unchanged.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.iter().any(|value| value.is_nan()) {
        return f64::NAN;
    }
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }

    let shifted: f64 = values.iter().map(|value| (value - max).exp()).sum();
    max + shifted.ln()
}
