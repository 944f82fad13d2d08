// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bocpd_online::{BocpdConfig, BocpdDetector, HazardSpec, NormalGammaPrior, Truncation};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

const MIN_PROPTEST_CASES: u32 = 1000;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn make_detector(rate: f64, lag: usize, truncation: Truncation) -> BocpdDetector {
    BocpdDetector::new(BocpdConfig {
        hazard: HazardSpec::constant(rate).expect("rate strategy stays in (0,1]"),
        lag,
        prior: NormalGammaPrior::default(),
        truncation,
    })
    .expect("strategies only produce valid configs")
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn posterior_and_path_respect_structural_invariants(
        values in prop::collection::vec(-50.0f64..50.0, 3..64),
        rate in 0.001f64..0.5,
        lag in 0usize..4,
    ) {
        let n = values.len();
        let detector = make_detector(rate, lag.min(n), Truncation::EXACT);
        let inference = detector.infer(&values).expect("bounded inputs never fail");
        let posterior = &inference.posterior;

        prop_assert_eq!(posterior.rows(), n + 1);
        prop_assert_eq!(posterior.cols(), n);
        prop_assert_eq!(posterior.column_sum(0), Some(0.0));
        prop_assert_eq!(posterior.get(0, 1), Some(1.0));
        for t in 1..n {
            let column = posterior.column(t).expect("column exists");
            let sum: f64 = column.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9, "column {} sums to {}", t, sum);
            prop_assert!(column.iter().all(|mass| (0.0..=1.0).contains(mass)));
            prop_assert!(column.iter().skip(t).all(|mass| *mass == 0.0));
            if t >= 2 {
                prop_assert!((column[0] - rate).abs() < 1e-9);
            }
        }

        let run_lengths = &inference.run_lengths;
        prop_assert_eq!(run_lengths.len(), n + 1);
        prop_assert_eq!(run_lengths[0], 0);
        prop_assert_eq!(run_lengths[n], 0);
        for (t, &run_length) in run_lengths.iter().enumerate().take(n).skip(1) {
            prop_assert!(run_length <= t, "run_lengths[{}] = {}", t, run_length);
        }
        for commit in &inference.commits {
            prop_assert!(commit.changepoint_at >= 1);
            prop_assert_eq!(
                commit.detected_at - commit.run_length.min(commit.detected_at - 1),
                commit.changepoint_at
            );
        }
    }

    #[test]
    fn inference_ignores_boundary_observations_and_is_repeatable(
        values in prop::collection::vec(-20.0f64..20.0, 3..48),
        first in -1.0e3f64..1.0e3,
        last in -1.0e3f64..1.0e3,
        rate in 0.001f64..0.3,
    ) {
        let detector = make_detector(rate, 1, Truncation::EXACT);
        let baseline = detector.infer(&values).expect("bounded inputs never fail");
        let repeated = detector.infer(&values).expect("bounded inputs never fail");
        prop_assert_eq!(&baseline.posterior, &repeated.posterior);
        prop_assert_eq!(&baseline.run_lengths, &repeated.run_lengths);

        let mut perturbed = values.clone();
        perturbed[0] = first;
        let end = perturbed.len() - 1;
        perturbed[end] = last;
        let moved = detector.infer(&perturbed).expect("bounded inputs never fail");
        prop_assert_eq!(&baseline.posterior, &moved.posterior);
        prop_assert_eq!(&baseline.run_lengths, &moved.run_lengths);
        prop_assert_eq!(&baseline.commits, &moved.commits);
    }

    #[test]
    fn truncated_state_stays_bounded_and_normalized(
        values in prop::collection::vec(-50.0f64..50.0, 3..96),
        rate in 0.001f64..0.5,
        max_run_length in 1usize..24,
    ) {
        let detector = make_detector(
            rate,
            0,
            Truncation {
                max_run_length: Some(max_run_length),
                log_prob_threshold: None,
            },
        );
        let inference = detector.infer(&values).expect("bounded inputs never fail");

        prop_assert!(inference.diagnostics.peak_hypotheses <= max_run_length + 1);
        for t in 1..values.len() {
            let column = inference.posterior.column(t).expect("column exists");
            let sum: f64 = column.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
            prop_assert!(column.iter().skip(max_run_length + 1).all(|mass| *mass == 0.0));
        }
    }
}
