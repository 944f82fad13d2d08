// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bocpd_core::BocpdError;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Default constant changepoint probability per step.
pub const DEFAULT_HAZARD_RATE: f64 = 0.0005;

/// Prior probability of a changepoint, queried for every live hypothesis on
/// every step.
///
/// `t` is the index of the posterior column being extended and `run_length`
/// the hypothesis being grown or reset. Implementations must be stateless
/// with respect to the scan; results are never cached.
pub trait HazardFunction: Send + Sync {
    fn probability(&self, t: usize, run_length: usize) -> f64;

    fn label(&self) -> Cow<'static, str> {
        Cow::Borrowed("custom")
    }
}

/// Memoryless hazard `h(t, r) = rate`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantHazard {
    rate: f64,
}

impl ConstantHazard {
    pub fn new(rate: f64) -> Result<Self, BocpdError> {
        let hazard = Self { rate };
        hazard.validate()?;
        Ok(hazard)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn validate(&self) -> Result<(), BocpdError> {
        if !(self.rate.is_finite() && 0.0 < self.rate && self.rate <= 1.0) {
            return Err(BocpdError::invalid_config(format!(
                "hazard_rate must be finite and in (0,1]; got {}",
                self.rate
            )));
        }
        Ok(())
    }
}

impl Default for ConstantHazard {
    fn default() -> Self {
        Self {
            rate: DEFAULT_HAZARD_RATE,
        }
    }
}

impl HazardFunction for ConstantHazard {
    fn probability(&self, _t: usize, _run_length: usize) -> f64 {
        self.rate
    }

    fn label(&self) -> Cow<'static, str> {
        Cow::Owned(format!("constant({})", self.rate))
    }
}

/// Constant hazard expressed through the expected run length `1 / rate`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometricHazard {
    mean_run_length: f64,
}

impl GeometricHazard {
    pub fn new(mean_run_length: f64) -> Result<Self, BocpdError> {
        let hazard = Self { mean_run_length };
        hazard.validate()?;
        Ok(hazard)
    }

    pub fn mean_run_length(&self) -> f64 {
        self.mean_run_length
    }

    fn validate(&self) -> Result<(), BocpdError> {
        if !self.mean_run_length.is_finite() || self.mean_run_length < 1.0 {
            return Err(BocpdError::invalid_config(format!(
                "geometric hazard mean_run_length must be finite and >= 1; got {}",
                self.mean_run_length
            )));
        }
        Ok(())
    }
}

impl HazardFunction for GeometricHazard {
    fn probability(&self, _t: usize, _run_length: usize) -> f64 {
        1.0 / self.mean_run_length
    }

    fn label(&self) -> Cow<'static, str> {
        Cow::Owned(format!("geometric(mean_run_length={})", self.mean_run_length))
    }
}

/// Hazard selection for [`crate::BocpdConfig`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone)]
pub enum HazardSpec {
    Constant(ConstantHazard),
    Geometric(GeometricHazard),
    /// Caller-supplied time- or run-length-dependent hazard. Not serializable.
    #[cfg_attr(feature = "serde", serde(skip))]
    Custom(Arc<dyn HazardFunction>),
}

impl HazardSpec {
    pub fn constant(rate: f64) -> Result<Self, BocpdError> {
        Ok(Self::Constant(ConstantHazard::new(rate)?))
    }

    pub fn custom(hazard: impl HazardFunction + 'static) -> Self {
        Self::Custom(Arc::new(hazard))
    }

    pub(crate) fn validate(&self) -> Result<(), BocpdError> {
        match self {
            Self::Constant(h) => h.validate(),
            Self::Geometric(h) => h.validate(),
            Self::Custom(_) => Ok(()),
        }
    }
}

impl Default for HazardSpec {
    fn default() -> Self {
        Self::Constant(ConstantHazard::default())
    }
}

impl HazardFunction for HazardSpec {
    fn probability(&self, t: usize, run_length: usize) -> f64 {
        match self {
            Self::Constant(h) => h.probability(t, run_length),
            Self::Geometric(h) => h.probability(t, run_length),
            Self::Custom(h) => h.probability(t, run_length),
        }
    }

    fn label(&self) -> Cow<'static, str> {
        match self {
            Self::Constant(h) => h.label(),
            Self::Geometric(h) => h.label(),
            Self::Custom(h) => h.label(),
        }
    }
}

impl fmt::Debug for HazardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(h) => f.debug_tuple("Constant").field(h).finish(),
            Self::Geometric(h) => f.debug_tuple("Geometric").field(h).finish(),
            Self::Custom(h) => f.debug_tuple("Custom").field(&h.label()).finish(),
        }
    }
}

/// Hazard value checked for use in the recursion.
pub(crate) fn checked_probability(
    hazard: &dyn HazardFunction,
    t: usize,
    run_length: usize,
) -> Result<f64, BocpdError> {
    let h = hazard.probability(t, run_length);
    if !(h.is_finite() && (0.0..=1.0).contains(&h)) {
        return Err(BocpdError::numerical_instability(format!(
            "hazard {} returned {h} at t={t}, run_length={run_length}; expected a probability in [0,1]",
            hazard.label()
        )));
    }
    Ok(h)
}
