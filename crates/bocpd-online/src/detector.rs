// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::hazard::{HazardFunction, HazardSpec};
use crate::posterior::RunLengthMatrix;
use crate::prior::NormalGammaPrior;
use crate::recursion::{RunLengthRecursion, Truncation};
use crate::segmentation::{ChangepointCommit, MapSegmenter};
use bocpd_core::{BocpdError, BudgetStatus, Constraints, Diagnostics, ExecutionContext};
use std::borrow::Cow;
use std::time::Instant;
use tracing::{debug, warn};

/// Shortest series the boundary scan accepts: the first and last
/// observations never reach the recursion.
pub const MIN_SERIES_LEN: usize = 3;

/// Detector hyperparameters. Immutable once handed to [`BocpdDetector::new`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, Default)]
pub struct BocpdConfig {
    pub hazard: HazardSpec,
    /// Consecutive columns a competing MAP path must persist before it is
    /// committed. 0 and 1 commit immediately.
    pub lag: usize,
    pub prior: NormalGammaPrior,
    pub truncation: Truncation,
}

impl BocpdConfig {
    pub fn validate(&self) -> Result<(), BocpdError> {
        self.hazard.validate()?;
        self.prior.validate()?;
        self.truncation.validate()?;
        Ok(())
    }
}

/// Result of one batch inference call.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Inference {
    pub posterior: RunLengthMatrix,
    /// Committed MAP run length per column, `T + 1` entries.
    ///
    /// A commit on the final column can still rewrite earlier entries, so
    /// the path is settled only once the call returns.
    pub run_lengths: Vec<usize>,
    pub commits: Vec<ChangepointCommit>,
    pub diagnostics: Diagnostics,
}

impl Inference {
    pub fn into_parts(self) -> (RunLengthMatrix, Vec<usize>) {
        (self.posterior, self.run_lengths)
    }

    /// Steps `t >= 1` at which the committed path starts a new segment.
    pub fn changepoints(&self) -> Vec<usize> {
        let last = self.run_lengths.len().saturating_sub(1);
        (1..last)
            .filter(|&t| self.run_lengths[t] == 0)
            .collect()
    }
}

/// Bayesian online changepoint detector over a Normal-Gamma observation model.
///
/// Holds configuration only. Every [`infer`](Self::infer) call allocates its
/// own posterior and segmentation state, so one detector can serve concurrent
/// callers.
#[derive(Clone, Debug)]
pub struct BocpdDetector {
    config: BocpdConfig,
}

impl BocpdDetector {
    pub fn new(config: BocpdConfig) -> Result<Self, BocpdError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BocpdConfig {
        &self.config
    }

    /// Fresh step-able recursion starting at the boundary column.
    pub fn recursion(&self) -> RunLengthRecursion<'_> {
        RunLengthRecursion::from_validated(&self.config)
    }

    pub fn infer(&self, data: &[f64]) -> Result<Inference, BocpdError> {
        let constraints = Constraints::default();
        self.infer_with_context(data, &ExecutionContext::new(&constraints))
    }

    pub fn infer_with_context(
        &self,
        data: &[f64],
        ctx: &ExecutionContext<'_>,
    ) -> Result<Inference, BocpdError> {
        let started_at = Instant::now();
        let n = data.len();
        self.validate_series(data)?;

        let mut warnings = Vec::new();
        let cells = (n + 1).checked_mul(n).ok_or_else(|| {
            BocpdError::resource_limit(format!(
                "posterior size overflows usize for n={n}"
            ))
        })?;
        if ctx.check_cell_budget(cells)?.is_exceeded() {
            let message = format!(
                "constraints.max_posterior_cells exceeded: requested={cells}; continuing under SoftDegrade"
            );
            warn!(cells, "bocpd posterior cell budget exceeded");
            warnings.push(message);
        }

        let hazard_label = self.config.hazard.label();
        debug!(
            n,
            lag = self.config.lag,
            hazard = %hazard_label,
            max_run_length = ?self.config.truncation.max_run_length,
            log_prob_threshold = ?self.config.truncation.log_prob_threshold,
            "bocpd inference started"
        );

        let mut posterior = RunLengthMatrix::zeros(n);
        let mut recursion = RunLengthRecursion::from_validated(&self.config);
        let mut segmenter = MapSegmenter::new(self.config.lag, n);

        let boundary = recursion.run_length_probs();
        let first = posterior.push_column(&boundary)?;
        segmenter.observe(first, &boundary)?;

        let steps = n - 2;
        let mut peak_hypotheses = recursion.live_hypotheses();
        let mut time_warned = false;

        for (offset, &x) in data[1..=steps].iter().enumerate() {
            let summary = recursion.step(x, ctx)?;
            let probs = recursion.run_length_probs();
            let t = posterior.push_column(&probs)?;
            segmenter.observe(t, &probs)?;

            peak_hypotheses = peak_hypotheses.max(summary.live_hypotheses);
            ctx.record_scalar("bocpd.p_change", summary.p_change);
            ctx.record_scalar("bocpd.run_length_mode", summary.run_length_mode as f64);
            ctx.record_scalar("bocpd.run_length_mean", summary.run_length_mean);
            ctx.record_scalar("bocpd.live_hypotheses", summary.live_hypotheses as f64);
            ctx.report_progress((offset + 1) as f32 / steps as f32);

            if ctx.check_time_budget(started_at)? == BudgetStatus::ExceededSoftDegrade
                && !time_warned
            {
                time_warned = true;
                warn!(t, "bocpd time budget exceeded");
                warnings.push(format!(
                    "constraints.time_budget_ms exceeded at column {t}; continuing under SoftDegrade"
                ));
            }
        }

        let (run_lengths, commits) = segmenter.into_parts();
        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).ok();
        debug!(
            n,
            runtime_ms = ?runtime_ms,
            commits = commits.len(),
            peak_hypotheses,
            "bocpd inference finished"
        );

        let pruning_stats = (!self.config.truncation.is_exact())
            .then(|| recursion.pruning_stats().clone());
        let mut notes = vec![format!(
            "boundary scan: observations 1..={steps} feed columns 2..={}",
            steps + 1
        )];
        if pruning_stats.is_some() {
            notes.push("truncated run-length state (approximate posterior)".to_string());
        }

        let diagnostics = Diagnostics {
            n,
            runtime_ms,
            algorithm: Cow::Borrowed("bocpd"),
            observation_model: Cow::Borrowed("normal_gamma"),
            hazard: hazard_label,
            lag: self.config.lag,
            steps_processed: steps,
            peak_hypotheses,
            changepoint_commits: commits.len(),
            notes,
            warnings,
            pruning_stats,
            ..Diagnostics::default()
        };

        Ok(Inference {
            posterior,
            run_lengths,
            commits,
            diagnostics,
        })
    }

    fn validate_series(&self, data: &[f64]) -> Result<(), BocpdError> {
        let n = data.len();
        if n < MIN_SERIES_LEN {
            return Err(BocpdError::input_size(format!(
                "series must contain at least {MIN_SERIES_LEN} observations; got {n}"
            )));
        }
        if self.config.lag > n {
            return Err(BocpdError::input_size(format!(
                "lag={} exceeds series length {n}",
                self.config.lag
            )));
        }
        if let Some((idx, x)) = data.iter().enumerate().find(|(_, x)| !x.is_finite()) {
            return Err(BocpdError::invalid_input(format!(
                "observation at index {idx} must be finite; got {x}"
            )));
        }
        Ok(())
    }
}
