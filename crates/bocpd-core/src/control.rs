// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag polled once per scan step.
///
/// Clones share the same flag, so a token handed to a worker thread can be
/// cancelled from the owner.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// What to do when a [`crate::Constraints`] limit is crossed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BudgetMode {
    /// Fail the call with a resource-limit error.
    #[default]
    HardFail,
    /// Keep going and record a diagnostics warning.
    SoftDegrade,
}

/// Outcome of a budget check that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BudgetStatus {
    WithinBudget,
    ExceededSoftDegrade,
}

impl BudgetStatus {
    pub fn is_exceeded(self) -> bool {
        matches!(self, Self::ExceededSoftDegrade)
    }
}
