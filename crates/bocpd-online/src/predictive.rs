// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::prior::ParameterTrajectories;
use bocpd_core::BocpdError;
use statrs::function::gamma::ln_gamma;
use std::f64::consts::PI;

/// Student-t log density with location `mu`, squared scale `scaled_variance`
/// and `nu` degrees of freedom.
///
/// The normalizer goes through `ln_gamma` so large `nu` (long runs) does not
/// overflow the gamma ratio. Returns `-inf` when `(x - mu)^2` overflows.
pub fn student_t_log_density(x: f64, mu: f64, scaled_variance: f64, nu: f64) -> f64 {
    let z = (x - mu).powi(2) / (nu * scaled_variance);
    let log_norm = ln_gamma(0.5 * (nu + 1.0))
        - ln_gamma(0.5 * nu)
        - 0.5 * (nu.ln() + PI.ln() + scaled_variance.ln());
    log_norm - 0.5 * (nu + 1.0) * z.ln_1p()
}

/// Predictive log densities of `x`, one per run-length hypothesis.
pub fn student_t_log_densities(
    x: f64,
    means: &[f64],
    scaled_variances: &[f64],
    dofs: &[f64],
) -> Result<Vec<f64>, BocpdError> {
    if means.len() != scaled_variances.len() || means.len() != dofs.len() {
        return Err(BocpdError::invalid_input(format!(
            "predictive inputs must have equal length: means={}, scaled_variances={}, dofs={}",
            means.len(),
            scaled_variances.len(),
            dofs.len()
        )));
    }
    if !x.is_finite() {
        return Err(BocpdError::invalid_input(format!(
            "predictive observation must be finite; got {x}"
        )));
    }

    let mut out = Vec::with_capacity(means.len());
    for (run_length, ((&mu, &scaled_variance), &nu)) in
        means.iter().zip(scaled_variances).zip(dofs).enumerate()
    {
        if !(scaled_variance.is_finite() && scaled_variance > 0.0) {
            return Err(BocpdError::numerical_instability(format!(
                "predictive scale at run_length={run_length} must be finite and > 0; got {scaled_variance}"
            )));
        }
        if !(nu.is_finite() && nu > 0.0) {
            return Err(BocpdError::numerical_instability(format!(
                "predictive degrees of freedom at run_length={run_length} must be finite and > 0; got {nu}"
            )));
        }
        if !mu.is_finite() {
            return Err(BocpdError::numerical_instability(format!(
                "predictive mean at run_length={run_length} became non-finite"
            )));
        }

        let log_density = student_t_log_density(x, mu, scaled_variance, nu);
        if log_density.is_nan() {
            return Err(BocpdError::numerical_instability(format!(
                "predictive log density at run_length={run_length} is NaN"
            )));
        }
        out.push(log_density);
    }

    Ok(out)
}

/// Linear-space twin of [`student_t_log_densities`].
pub fn student_t_densities(
    x: f64,
    means: &[f64],
    scaled_variances: &[f64],
    dofs: &[f64],
) -> Result<Vec<f64>, BocpdError> {
    Ok(student_t_log_densities(x, means, scaled_variances, dofs)?
        .into_iter()
        .map(f64::exp)
        .collect())
}

/// Predictive log densities of `x` under every hypothesis in `trajectories`.
pub fn log_predictive(trajectories: &ParameterTrajectories, x: f64) -> Result<Vec<f64>, BocpdError> {
    student_t_log_densities(
        x,
        trajectories.means(),
        &trajectories.scaled_variances(),
        &trajectories.degrees_of_freedom(),
    )
}
