// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod constraints;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod execution_context;
pub mod numerics;
pub mod observability;

pub use constraints::Constraints;
pub use control::{BudgetMode, BudgetStatus, CancelToken};
pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics, PruningStats};
pub use error::BocpdError;
pub use execution_context::ExecutionContext;
pub use numerics::{log_add_exp, log_sum_exp};
pub use observability::{ProgressSink, TelemetrySink};

/// Core shared types and traits for bocpd-rs.
pub fn crate_name() -> &'static str {
    "bocpd-core"
}
