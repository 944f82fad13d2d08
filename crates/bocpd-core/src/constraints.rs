// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Execution limits applied to a single inference call.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Constraints {
    /// Upper bound on `(T + 1) * T` posterior cells, checked before allocation.
    pub max_posterior_cells: Option<usize>,
    /// Wall-clock budget for the whole scan.
    pub time_budget_ms: Option<u64>,
}
