// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::borrow::Cow;

/// Diagnostics schema version for inference run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Counters describing how much run-length state truncation discarded.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PruningStats {
    /// Run-length hypotheses produced by the growth step, summed over steps.
    pub hypotheses_considered: usize,
    /// Hypotheses dropped by `max_run_length` folding or threshold trimming.
    pub hypotheses_pruned: usize,
}

/// Structured metadata captured from one inference call.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostics {
    pub n: usize,
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub runtime_ms: Option<u64>,
    pub algorithm: Cow<'static, str>,
    pub observation_model: Cow<'static, str>,
    pub hazard: Cow<'static, str>,
    pub lag: usize,
    /// Observations that went through the recursion (`T - 2` for a batch call).
    pub steps_processed: usize,
    /// Largest number of simultaneously live run-length hypotheses.
    pub peak_hypotheses: usize,
    pub changepoint_commits: usize,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
    pub pruning_stats: Option<PruningStats>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            n: 0,
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            runtime_ms: None,
            algorithm: Cow::Borrowed(""),
            observation_model: Cow::Borrowed(""),
            hazard: Cow::Borrowed(""),
            lag: 0,
            steps_processed: 0,
            peak_hypotheses: 0,
            changepoint_commits: 0,
            notes: vec![],
            warnings: vec![],
            pruning_stats: None,
        }
    }
}
