// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::BocpdError;
use crate::constraints::Constraints;
use crate::control::{BudgetMode, BudgetStatus, CancelToken};
use crate::observability::{ProgressSink, TelemetrySink};
use std::time::Instant;

/// Per-call execution context: limits, cancellation, and observability hooks.
///
/// The context only borrows its collaborators, so one [`Constraints`] value
/// can back many concurrent calls.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub constraints: &'a Constraints,
    pub cancel: Option<&'a CancelToken>,
    pub budget_mode: BudgetMode,
    pub progress: Option<&'a dyn ProgressSink>,
    pub telemetry: Option<&'a dyn TelemetrySink>,
}

impl<'a> ExecutionContext<'a> {
    /// Context with no cancellation, hard-fail budgets and no sinks.
    pub fn new(constraints: &'a Constraints) -> Self {
        Self {
            constraints,
            cancel: None,
            budget_mode: BudgetMode::HardFail,
            progress: None,
            telemetry: None,
        }
    }

    /// Sets the optional cancellation token.
    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Sets how exceeded budgets are handled.
    pub fn with_budget_mode(mut self, budget_mode: BudgetMode) -> Self {
        self.budget_mode = budget_mode;
        self
    }

    /// Sets the optional progress sink.
    pub fn with_progress_sink(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Sets the optional telemetry sink.
    pub fn with_telemetry_sink(mut self, telemetry: &'a dyn TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    /// Returns [`BocpdError::Cancelled`] once the token has fired.
    pub fn check_cancelled(&self) -> Result<(), BocpdError> {
        if self.is_cancelled() {
            return Err(BocpdError::cancelled());
        }
        Ok(())
    }

    /// Checks a planned posterior allocation against `max_posterior_cells`.
    pub fn check_cell_budget(&self, cells: usize) -> Result<BudgetStatus, BocpdError> {
        let Some(limit) = self.constraints.max_posterior_cells else {
            return Ok(BudgetStatus::WithinBudget);
        };

        if cells <= limit {
            return Ok(BudgetStatus::WithinBudget);
        }

        match self.budget_mode {
            BudgetMode::HardFail => Err(BocpdError::resource_limit(format!(
                "constraints.max_posterior_cells exceeded: requested={cells}, limit={limit}, budget_mode=HardFail"
            ))),
            BudgetMode::SoftDegrade => Ok(BudgetStatus::ExceededSoftDegrade),
        }
    }

    /// Checks elapsed wall time since `started_at` against `time_budget_ms`.
    pub fn check_time_budget(&self, started_at: Instant) -> Result<BudgetStatus, BocpdError> {
        let Some(limit_ms) = self.constraints.time_budget_ms else {
            return Ok(BudgetStatus::WithinBudget);
        };

        let elapsed_ms = started_at.elapsed().as_millis();
        if elapsed_ms <= u128::from(limit_ms) {
            return Ok(BudgetStatus::WithinBudget);
        }

        match self.budget_mode {
            BudgetMode::HardFail => Err(BocpdError::resource_limit(format!(
                "constraints.time_budget_ms exceeded: elapsed_ms={elapsed_ms}, limit_ms={limit_ms}, budget_mode=HardFail"
            ))),
            BudgetMode::SoftDegrade => Ok(BudgetStatus::ExceededSoftDegrade),
        }
    }

    /// Forwards progress clamped to `[0, 1]`; non-finite fractions are dropped.
    pub fn report_progress(&self, fraction: f32) {
        if !fraction.is_finite() {
            return;
        }
        if let Some(sink) = self.progress {
            sink.on_progress(fraction.clamp(0.0, 1.0));
        }
    }

    /// Forwards a named scalar to the telemetry sink, if any.
    pub fn record_scalar(&self, key: &'static str, value: f64) {
        if let Some(sink) = self.telemetry {
            sink.record_scalar(key, value);
        }
    }
}

impl std::fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("constraints", self.constraints)
            .field("cancelled", &self.is_cancelled())
            .field("budget_mode", &self.budget_mode)
            .field("progress", &self.progress.is_some())
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}
