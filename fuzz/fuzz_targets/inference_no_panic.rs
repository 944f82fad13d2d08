// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use bocpd_core::{BudgetMode, CancelToken, Constraints, ExecutionContext};
use bocpd_online::{
    BocpdConfig, BocpdDetector, ConstantHazard, GeometricHazard, HazardFunction, HazardSpec,
    NormalGammaPrior, Truncation,
};
use libfuzzer_sys::fuzz_target;

/// Hazard that wanders in and out of `[0, 1]` depending on its seed.
struct SeededHazard {
    seed: u8,
}

impl HazardFunction for SeededHazard {
    fn probability(&self, t: usize, run_length: usize) -> f64 {
        match self.seed % 4 {
            0 => 1.0 / (run_length as f64 + 2.0),
            1 => ((t * 31 + run_length * 17) % 97) as f64 / 96.0,
            2 => f64::from(self.seed) / 128.0 - 0.5,
            _ => f64::NAN,
        }
    }
}

fn build_hazard(kind_seed: u8, value_seed: u8) -> HazardSpec {
    match kind_seed % 4 {
        0 => {
            let rate = (f64::from(value_seed) + 1.0) / 256.0;
            HazardSpec::Constant(
                ConstantHazard::new(rate).expect("mapped constant hazard must be valid"),
            )
        }
        1 => {
            let mean_run_length = 1.0 + (f64::from(value_seed) / 255.0) * 511.0;
            HazardSpec::Geometric(
                GeometricHazard::new(mean_run_length)
                    .expect("mapped geometric hazard must be valid"),
            )
        }
        2 => HazardSpec::custom(SeededHazard { seed: value_seed }),
        _ => {
            // Unvalidated rate; zero and values past 1 must be rejected by `new`.
            let rate = f64::from(value_seed) / 128.0;
            match ConstantHazard::new(rate) {
                Ok(hazard) => HazardSpec::Constant(hazard),
                Err(_) => HazardSpec::default(),
            }
        }
    }
}

fn build_prior(mu_seed: i16, a_seed: u8, b_seed: u8, c_seed: u8) -> NormalGammaPrior {
    NormalGammaPrior {
        mu0: f64::from(mu_seed) / 16.0,
        kappa0: f64::from(a_seed % 64) / 8.0,
        alpha0: f64::from(b_seed % 64) / 8.0,
        beta0: f64::from(c_seed % 64) / 8.0,
    }
}

fn build_truncation(mode_seed: u8, cap_seed: u8, threshold_seed: u8) -> Truncation {
    Truncation {
        max_run_length: (mode_seed & 1 == 1).then(|| common::bounded(cap_seed, 0, 64)),
        log_prob_threshold: (mode_seed & 2 == 2)
            .then(|| f64::from(threshold_seed) / 4.0 - 60.0),
    }
}

fn build_value(base: f64, mode_seed: u8, raw_seed: i16) -> f64 {
    match mode_seed % 8 {
        0 | 1 => base,
        2 => f64::from(raw_seed) / 8.0,
        3 => 0.0,
        4 => f64::from(raw_seed) * 1.0e150,
        5 => f64::NAN,
        6 => f64::INFINITY,
        _ => f64::from(raw_seed),
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);

    let config = BocpdConfig {
        hazard: build_hazard(cursor.next_u8(), cursor.next_u8()),
        lag: common::bounded(cursor.next_u8(), 0, 12),
        prior: build_prior(
            cursor.next_i16(),
            cursor.next_u8(),
            cursor.next_u8(),
            cursor.next_u8(),
        ),
        truncation: build_truncation(cursor.next_u8(), cursor.next_u8(), cursor.next_u8()),
    };

    let Ok(detector) = BocpdDetector::new(config) else {
        return;
    };

    let payload_len = common::bounded(cursor.next_u8(), 0, 96).saturating_mul(8);
    let base_values = common::decode_f64_chunks(&cursor.take_padded(payload_len), 96);

    let n = common::bounded(cursor.next_u8(), 0, 128);
    let mut series = Vec::with_capacity(n);
    for idx in 0..n {
        let base = base_values.get(idx).copied().unwrap_or(0.0);
        series.push(build_value(base, cursor.next_u8(), cursor.next_i16()));
    }

    let budget_seed = cursor.next_u8();
    let constraints = Constraints {
        max_posterior_cells: (budget_seed & 1 == 1).then(|| usize::from(budget_seed) * 32),
        ..Constraints::default()
    };
    let budget_mode = if budget_seed & 2 == 2 {
        BudgetMode::SoftDegrade
    } else {
        BudgetMode::HardFail
    };
    let cancel = CancelToken::new();
    if budget_seed & 4 == 4 {
        cancel.cancel();
    }
    let ctx = ExecutionContext::new(&constraints)
        .with_budget_mode(budget_mode)
        .with_cancel(&cancel);

    if let Ok(inference) = detector.infer_with_context(&series, &ctx) {
        assert_eq!(inference.run_lengths.len(), series.len() + 1);
        assert_eq!(inference.posterior.cols(), series.len());
    }
});
