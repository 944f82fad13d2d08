// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Error taxonomy shared by every bocpd-rs crate.
///
/// All failures are terminal for the call that produced them; nothing in the
/// workspace retries.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum BocpdError {
    /// Hyperparameters rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input series too short, or lag longer than the series.
    #[error("input size error: {0}")]
    InputSize(String),

    /// Malformed observation or argument vector.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Posterior column that cannot be normalized, or a NaN leaking out of the recursion.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// A hard execution budget from [`crate::Constraints`] was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("cancelled")]
    Cancelled,
}

impl BocpdError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn input_size(message: impl Into<String>) -> Self {
        Self::InputSize(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn numerical_instability(message: impl Into<String>) -> Self {
        Self::NumericalInstability(message.into())
    }

    pub fn resource_limit(message: impl Into<String>) -> Self {
        Self::ResourceLimit(message.into())
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }
}
