// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::detector::BocpdConfig;
use crate::hazard::{HazardSpec, checked_probability};
use crate::predictive::log_predictive;
use crate::prior::{NormalGammaPrior, ParameterTrajectories};
use bocpd_core::{BocpdError, ExecutionContext, PruningStats, log_add_exp, log_sum_exp};

/// Opt-in approximation that bounds the run-length state.
///
/// The default keeps every hypothesis, which is the exact algorithm with
/// `O(T^2)` state.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Truncation {
    /// Growth past this run length is folded into run length 0.
    pub max_run_length: Option<usize>,
    /// Relative log-probability threshold (must be <= 0). Trailing entries
    /// below `max + threshold` are dropped.
    pub log_prob_threshold: Option<f64>,
}

impl Truncation {
    pub const EXACT: Self = Self {
        max_run_length: None,
        log_prob_threshold: None,
    };

    pub fn is_exact(&self) -> bool {
        self.max_run_length.is_none() && self.log_prob_threshold.is_none()
    }

    pub(crate) fn validate(&self) -> Result<(), BocpdError> {
        if self.max_run_length == Some(0) {
            return Err(BocpdError::invalid_config(
                "truncation max_run_length must be >= 1",
            ));
        }
        if let Some(threshold) = self.log_prob_threshold
            && (!threshold.is_finite() || threshold > 0.0)
        {
            return Err(BocpdError::invalid_config(format!(
                "truncation log_prob_threshold must be finite and <= 0; got {threshold}"
            )));
        }
        Ok(())
    }
}

/// Per-step summary of the run-length posterior.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepSummary {
    /// Index of the posterior column this step produced.
    pub t: usize,
    /// Mass at run length 0.
    pub p_change: f64,
    /// Smallest run length attaining the maximum mass.
    pub run_length_mode: usize,
    /// Posterior expectation of the run length.
    pub run_length_mean: f64,
    pub live_hypotheses: usize,
}

/// Forward run-length recursion over one series.
///
/// Holds the current posterior column in log space together with the
/// parameter trajectories of every live hypothesis. Starts at the boundary
/// column `R[0, 1] = 1`; each [`step`](Self::step) produces the next column.
#[derive(Clone, Debug)]
pub struct RunLengthRecursion<'a> {
    hazard: &'a HazardSpec,
    prior: NormalGammaPrior,
    truncation: Truncation,
    t: usize,
    log_run_probs: Vec<f64>,
    trajectories: ParameterTrajectories,
    pruning: PruningStats,
}

impl<'a> RunLengthRecursion<'a> {
    /// Validates `config` and starts at the boundary column.
    pub fn new(config: &'a BocpdConfig) -> Result<Self, BocpdError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    pub(crate) fn from_validated(config: &'a BocpdConfig) -> Self {
        Self {
            hazard: &config.hazard,
            prior: config.prior,
            truncation: config.truncation,
            t: 1,
            log_run_probs: vec![0.0],
            trajectories: ParameterTrajectories::from_prior(&config.prior),
            pruning: PruningStats::default(),
        }
    }

    /// Index of the posterior column currently held.
    pub fn t(&self) -> usize {
        self.t
    }

    /// Number of run lengths still carried.
    pub fn live_hypotheses(&self) -> usize {
        self.log_run_probs.len()
    }

    /// Normalized log mass per live run length.
    pub fn log_run_probs(&self) -> &[f64] {
        &self.log_run_probs
    }

    /// Linear-space copy of [`log_run_probs`](Self::log_run_probs).
    pub fn run_length_probs(&self) -> Vec<f64> {
        self.log_run_probs.iter().map(|value| value.exp()).collect()
    }

    /// Posterior hyperparameters, one entry per live run length.
    pub fn trajectories(&self) -> &ParameterTrajectories {
        &self.trajectories
    }

    /// Running truncation counters.
    pub fn pruning_stats(&self) -> &PruningStats {
        &self.pruning
    }

    /// Absorbs `x` and advances to the next posterior column.
    pub fn step(&mut self, x: f64, ctx: &ExecutionContext<'_>) -> Result<StepSummary, BocpdError> {
        ctx.check_cancelled()?;
        if !x.is_finite() {
            return Err(BocpdError::invalid_input(format!(
                "observation at t={} must be finite; got {x}",
                self.t
            )));
        }

        let log_pred = log_predictive(&self.trajectories, x)?;
        let prev_len = self.log_run_probs.len();
        let hard_cap = self
            .truncation
            .max_run_length
            .map_or(usize::MAX, |max| max.saturating_add(1));
        let keep_len = prev_len.saturating_add(1).min(hard_cap).max(1);

        let mut next_log_probs = vec![f64::NEG_INFINITY; keep_len];
        let mut cp_mass = f64::NEG_INFINITY;
        let mut folded = 0usize;

        for run_length in 0..prev_len {
            let h = checked_probability(self.hazard, self.t, run_length)?;
            let weighted = self.log_run_probs[run_length] + log_pred[run_length];

            cp_mass = log_add_exp(cp_mass, weighted + h.ln());

            let growth = weighted + (1.0 - h).ln();
            if run_length + 1 < keep_len {
                next_log_probs[run_length + 1] = growth;
            } else {
                cp_mass = log_add_exp(cp_mass, growth);
                folded += 1;
            }
        }
        next_log_probs[0] = cp_mass;

        let mut next_trajectories = self.trajectories.advanced(&self.prior, x);
        next_trajectories.truncate(keep_len);

        let mut trimmed = 0usize;
        if let Some(threshold) = self.truncation.log_prob_threshold {
            let max_log_prob = next_log_probs
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            let cutoff = max_log_prob + threshold;

            let mut keep = next_log_probs.len();
            while keep > 1 && next_log_probs[keep - 1] < cutoff {
                keep -= 1;
            }
            trimmed = next_log_probs.len() - keep;
            next_log_probs.truncate(keep);
            next_trajectories.truncate(keep);
        }

        normalize_log_probs(&mut next_log_probs, self.t + 1)?;

        self.pruning.hypotheses_considered += prev_len;
        self.pruning.hypotheses_pruned += folded + trimmed;
        self.t += 1;
        self.log_run_probs = next_log_probs;
        self.trajectories = next_trajectories;

        Ok(self.summary())
    }

    /// Summary of the column currently held.
    pub fn summary(&self) -> StepSummary {
        StepSummary {
            t: self.t,
            p_change: self.log_run_probs.first().map_or(0.0, |value| value.exp()),
            run_length_mode: first_argmax(&self.log_run_probs),
            run_length_mean: run_length_expectation(&self.log_run_probs),
            live_hypotheses: self.log_run_probs.len(),
        }
    }
}

fn normalize_log_probs(log_probs: &mut [f64], t: usize) -> Result<(), BocpdError> {
    let normalizer = log_sum_exp(log_probs);
    if !normalizer.is_finite() {
        return Err(BocpdError::numerical_instability(format!(
            "posterior column {t} cannot be normalized (log column sum = {normalizer})"
        )));
    }

    for value in log_probs.iter_mut() {
        *value -= normalizer;
        if value.is_nan() {
            return Err(BocpdError::numerical_instability(format!(
                "posterior column {t} produced a NaN run-length probability"
            )));
        }
    }

    Ok(())
}

fn first_argmax(values: &[f64]) -> usize {
    let mut best = 0usize;
    for (idx, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = idx;
        }
    }
    best
}

fn run_length_expectation(log_probs: &[f64]) -> f64 {
    log_probs
        .iter()
        .enumerate()
        .map(|(idx, log_prob)| idx as f64 * log_prob.exp())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{RunLengthRecursion, Truncation};
    use crate::detector::BocpdConfig;
    use crate::hazard::{HazardFunction, HazardSpec};
    use crate::predictive::student_t_densities;
    use crate::prior::NormalGammaPrior;
    use bocpd_core::{CancelToken, Constraints, ExecutionContext};
    use std::sync::OnceLock;

    fn ctx() -> ExecutionContext<'static> {
        static CONSTRAINTS: OnceLock<Constraints> = OnceLock::new();
        let constraints = CONSTRAINTS.get_or_init(Constraints::default);
        ExecutionContext::new(constraints)
    }

    fn config_with_rate(rate: f64) -> BocpdConfig {
        BocpdConfig {
            hazard: HazardSpec::constant(rate).expect("valid hazard"),
            ..BocpdConfig::default()
        }
    }

    #[test]
    fn boundary_column_is_certain_run_length_zero() {
        let config = BocpdConfig::default();
        let recursion = RunLengthRecursion::new(&config).expect("valid config");
        assert_eq!(recursion.t(), 1);
        assert_eq!(recursion.run_length_probs(), vec![1.0]);
        assert_eq!(recursion.trajectories().len(), 1);
    }

    #[test]
    fn first_step_splits_mass_by_hazard() {
        let config = config_with_rate(0.2);
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        let summary = recursion.step(0.7, &ctx()).expect("step should succeed");

        let probs = recursion.run_length_probs();
        assert_eq!(summary.t, 2);
        assert_eq!(probs.len(), 2);
        assert!((probs[0] - 0.2).abs() < 1e-12);
        assert!((probs[1] - 0.8).abs() < 1e-12);
        assert_eq!(summary.run_length_mode, 1);
        assert!((summary.run_length_mean - 0.8).abs() < 1e-12);
    }

    #[test]
    fn two_steps_match_linear_space_recursion() {
        let hazard = 0.1;
        let config = config_with_rate(hazard);
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        recursion.step(0.5, &ctx()).expect("first step");
        recursion.step(-0.3, &ctx()).expect("second step");

        // Reproduce the second step by hand from the trajectories after step one.
        let prior = config.prior;
        let after_one = crate::prior::ParameterTrajectories::from_prior(&prior).advanced(&prior, 0.5);
        let pred = student_t_densities(
            -0.3,
            after_one.means(),
            &after_one.scaled_variances(),
            &after_one.degrees_of_freedom(),
        )
        .expect("valid predictive inputs");
        let prev = [hazard, 1.0 - hazard];
        let raw = [
            (prev[0] * pred[0] + prev[1] * pred[1]) * hazard,
            prev[0] * pred[0] * (1.0 - hazard),
            prev[1] * pred[1] * (1.0 - hazard),
        ];
        let total: f64 = raw.iter().sum();

        let probs = recursion.run_length_probs();
        for (idx, expected) in raw.iter().map(|value| value / total).enumerate() {
            assert!(
                (probs[idx] - expected).abs() < 1e-12,
                "run_length={idx}: observed={}, expected={expected}",
                probs[idx]
            );
        }
    }

    #[test]
    fn constant_hazard_pins_run_length_zero_mass_to_the_rate() {
        let config = config_with_rate(0.05);
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        for (i, x) in [0.1, 4.0, -2.0, 0.0, 9.5, 9.7, 10.1].into_iter().enumerate() {
            let summary = recursion.step(x, &ctx()).expect("step should succeed");
            assert!(
                (summary.p_change - 0.05).abs() < 1e-12,
                "step {i}: p_change={}",
                summary.p_change
            );
        }
    }

    #[test]
    fn exact_recursion_grows_one_hypothesis_per_step() {
        let config = BocpdConfig::default();
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        for step in 0..64 {
            let summary = recursion
                .step((step as f64 * 0.3).sin(), &ctx())
                .expect("step should succeed");
            assert_eq!(summary.live_hypotheses, step + 2);
            assert_eq!(recursion.trajectories().len(), step + 2);
        }
        assert_eq!(recursion.pruning_stats().hypotheses_pruned, 0);
    }

    #[test]
    fn max_run_length_bounds_state_and_conserves_mass() {
        let config = BocpdConfig {
            truncation: Truncation {
                max_run_length: Some(8),
                log_prob_threshold: None,
            },
            ..config_with_rate(0.01)
        };
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        for step in 0..100 {
            recursion
                .step((step as f64 * 0.01).cos(), &ctx())
                .expect("step should succeed");
            assert!(recursion.live_hypotheses() <= 9);
            let total: f64 = recursion.run_length_probs().iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
        assert!(recursion.pruning_stats().hypotheses_pruned > 0);
    }

    #[test]
    fn threshold_trim_drops_negligible_tail() {
        let config = BocpdConfig {
            truncation: Truncation {
                max_run_length: None,
                log_prob_threshold: Some(-10.0),
            },
            ..config_with_rate(0.3)
        };
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        for step in 0..80 {
            let x = if step < 40 { 0.0 } else { 25.0 };
            recursion.step(x, &ctx()).expect("step should succeed");
        }
        assert!(recursion.live_hypotheses() < 81);
        assert_eq!(
            recursion.trajectories().len(),
            recursion.live_hypotheses()
        );
    }

    #[test]
    fn invalid_truncation_is_rejected() {
        let config = BocpdConfig {
            truncation: Truncation {
                max_run_length: None,
                log_prob_threshold: Some(0.5),
            },
            ..BocpdConfig::default()
        };
        let err = RunLengthRecursion::new(&config).expect_err("positive threshold must fail");
        assert!(err.to_string().contains("log_prob_threshold"));
    }

    #[test]
    fn full_hazard_resets_every_step() {
        let config = config_with_rate(1.0);
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        for x in [0.0, 1.0, 2.0] {
            let summary = recursion.step(x, &ctx()).expect("step should succeed");
            assert_eq!(summary.run_length_mode, 0);
            assert_eq!(summary.p_change, 1.0);
            assert_eq!(summary.run_length_mean, 0.0);
        }
    }

    #[test]
    fn run_length_dependent_hazard_is_queried_per_hypothesis() {
        struct ShortRunsOnly;

        impl HazardFunction for ShortRunsOnly {
            fn probability(&self, _t: usize, run_length: usize) -> f64 {
                if run_length >= 3 { 1.0 } else { 0.1 }
            }
        }

        let config = BocpdConfig {
            hazard: HazardSpec::custom(ShortRunsOnly),
            ..BocpdConfig::default()
        };
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        for _ in 0..10 {
            recursion.step(0.0, &ctx()).expect("step should succeed");
            let probs = recursion.run_length_probs();
            assert!(probs.iter().skip(5).all(|mass| *mass == 0.0));
        }
    }

    #[test]
    fn overflowing_observation_is_numerical_instability() {
        let config = BocpdConfig::default();
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        recursion.step(0.0, &ctx()).expect("first step");
        let err = recursion
            .step(1.0e200, &ctx())
            .expect_err("all-zero column must fail");
        assert!(err.to_string().starts_with("numerical instability"), "{err}");
    }

    #[test]
    fn non_finite_observation_and_cancellation_fail_fast() {
        let config = BocpdConfig::default();
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        assert!(recursion.step(f64::NAN, &ctx()).is_err());

        let constraints = Constraints::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let cancelled = ExecutionContext::new(&constraints).with_cancel(&cancel);
        let err = recursion
            .step(0.0, &cancelled)
            .expect_err("cancelled context must stop the step");
        assert_eq!(err.to_string(), "cancelled");
        assert_eq!(recursion.t(), 1);
    }

    #[test]
    fn prior_is_shared_by_every_new_run() {
        let config = BocpdConfig {
            prior: NormalGammaPrior {
                mu0: 3.0,
                kappa0: 0.5,
                alpha0: 2.0,
                beta0: 0.5,
            },
            ..BocpdConfig::default()
        };
        let mut recursion = RunLengthRecursion::new(&config).expect("valid config");
        recursion.step(1.0, &ctx()).expect("step");
        recursion.step(2.0, &ctx()).expect("step");
        assert_eq!(recursion.trajectories().get(0), Some(config.prior.params()));
    }
}
