// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bocpd_core::BocpdError;

/// Normal-Gamma prior over the (mean, precision) of the Gaussian that
/// generates observations within one run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalGammaPrior {
    /// Prior mean `mu0`.
    pub mu0: f64,
    /// Prior precision scale `kappa0`.
    pub kappa0: f64,
    /// Gamma shape `alpha0`.
    pub alpha0: f64,
    /// Gamma scale `beta0`.
    pub beta0: f64,
}

impl Default for NormalGammaPrior {
    fn default() -> Self {
        Self {
            mu0: 0.0,
            kappa0: 1.0,
            alpha0: 1.0,
            beta0: 1.0,
        }
    }
}

impl NormalGammaPrior {
    pub fn validate(&self) -> Result<(), BocpdError> {
        if !self.mu0.is_finite() {
            return Err(BocpdError::invalid_config(format!(
                "prior_mean must be finite; got {}",
                self.mu0
            )));
        }
        if !self.kappa0.is_finite() || self.kappa0 <= 0.0 {
            return Err(BocpdError::invalid_config(format!(
                "prior_precision_scale must be finite and > 0; got {}",
                self.kappa0
            )));
        }
        if !self.alpha0.is_finite() || self.alpha0 <= 0.0 {
            return Err(BocpdError::invalid_config(format!(
                "prior_shape must be finite and > 0; got {}",
                self.alpha0
            )));
        }
        if !self.beta0.is_finite() || self.beta0 <= 0.0 {
            return Err(BocpdError::invalid_config(format!(
                "prior_scale must be finite and > 0; got {}",
                self.beta0
            )));
        }
        Ok(())
    }

    pub fn params(&self) -> NormalGammaParams {
        NormalGammaParams {
            mu: self.mu0,
            kappa: self.kappa0,
            alpha: self.alpha0,
            beta: self.beta0,
        }
    }
}

/// Posterior Normal-Gamma parameters of a single run-length hypothesis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalGammaParams {
    pub mu: f64,
    pub kappa: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl NormalGammaParams {
    /// Closed-form conjugate update after observing `x`.
    pub fn updated(&self, x: f64) -> Self {
        let kappa_next = self.kappa + 1.0;
        Self {
            mu: (self.kappa * self.mu + x) / kappa_next,
            kappa: kappa_next,
            alpha: self.alpha + 0.5,
            beta: self.beta + self.kappa * (x - self.mu).powi(2) / (2.0 * kappa_next),
        }
    }

    /// Student-t degrees of freedom `2 alpha`.
    pub fn degrees_of_freedom(&self) -> f64 {
        2.0 * self.alpha
    }

    /// Student-t squared scale `beta (kappa + 1) / (alpha kappa)`.
    pub fn scaled_variance(&self) -> f64 {
        self.beta * (self.kappa + 1.0) / (self.alpha * self.kappa)
    }
}

/// Four parallel parameter sequences indexed by run length.
///
/// Entry `r` holds the posterior of the hypothesis "the current run has
/// length `r`". The layout is struct-of-arrays so the predictive evaluator can
/// consume whole columns at once.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterTrajectories {
    mu: Vec<f64>,
    kappa: Vec<f64>,
    alpha: Vec<f64>,
    beta: Vec<f64>,
}

impl ParameterTrajectories {
    /// Trajectories holding only the run-length-0 hypothesis.
    pub fn from_prior(prior: &NormalGammaPrior) -> Self {
        Self {
            mu: vec![prior.mu0],
            kappa: vec![prior.kappa0],
            alpha: vec![prior.alpha0],
            beta: vec![prior.beta0],
        }
    }

    pub fn len(&self) -> usize {
        self.mu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mu.is_empty()
    }

    pub fn means(&self) -> &[f64] {
        &self.mu
    }

    pub fn kappas(&self) -> &[f64] {
        &self.kappa
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alpha
    }

    pub fn betas(&self) -> &[f64] {
        &self.beta
    }

    pub fn get(&self, run_length: usize) -> Option<NormalGammaParams> {
        Some(NormalGammaParams {
            mu: *self.mu.get(run_length)?,
            kappa: *self.kappa.get(run_length)?,
            alpha: *self.alpha.get(run_length)?,
            beta: *self.beta.get(run_length)?,
        })
    }

    pub fn degrees_of_freedom(&self) -> Vec<f64> {
        self.alpha.iter().map(|alpha| 2.0 * alpha).collect()
    }

    pub fn scaled_variances(&self) -> Vec<f64> {
        self.beta
            .iter()
            .zip(&self.kappa)
            .zip(&self.alpha)
            .map(|((beta, kappa), alpha)| beta * (kappa + 1.0) / (alpha * kappa))
            .collect()
    }

    /// Trajectories for the next step: the prior at run length 0 followed by
    /// every current hypothesis updated with `x`, shifted up by one.
    pub fn advanced(&self, prior: &NormalGammaPrior, x: f64) -> Self {
        let len = self.len() + 1;
        let mut next = Self {
            mu: Vec::with_capacity(len),
            kappa: Vec::with_capacity(len),
            alpha: Vec::with_capacity(len),
            beta: Vec::with_capacity(len),
        };
        next.push(prior.params());
        for run_length in 0..self.len() {
            let current = NormalGammaParams {
                mu: self.mu[run_length],
                kappa: self.kappa[run_length],
                alpha: self.alpha[run_length],
                beta: self.beta[run_length],
            };
            next.push(current.updated(x));
        }
        next
    }

    pub fn truncate(&mut self, len: usize) {
        self.mu.truncate(len);
        self.kappa.truncate(len);
        self.alpha.truncate(len);
        self.beta.truncate(len);
    }

    fn push(&mut self, params: NormalGammaParams) {
        self.mu.push(params.mu);
        self.kappa.push(params.kappa);
        self.alpha.push(params.alpha);
        self.beta.push(params.beta);
    }
}
