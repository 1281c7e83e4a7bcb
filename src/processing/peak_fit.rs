//! Single-peak fitting of intensity profiles.
//!
//! The Gaussian fitter runs a Levenberg–Marquardt iteration on the model
//! `f(p) = A · exp(−(p − p0)² / (2σ²))`. Failure is reported as
//! [`FitDidNotConverge`], never as a panic or a silent NaN.

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::projector::IntensityProfile;
use crate::Error;

/// Parameters of a converged fit, in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakFitResult {
    pub amplitude: f64,
    pub center: f64,
    pub sigma: f64,
}

impl PeakFitResult {
    /// Evaluate the fitted model at pixel coordinate `p`.
    pub fn evaluate(&self, p: f64) -> f64 {
        gaussian(p, self.amplitude, self.center, self.sigma)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitFailure {
    /// Flat, all-zero, too short or non-finite profile: no peak to fit.
    DegenerateProfile,
    IterationBudget,
    SingularSystem,
    InvalidWidth,
}

impl fmt::Display for FitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FitFailure::DegenerateProfile => "profile has no peak",
            FitFailure::IterationBudget => "iteration budget exhausted",
            FitFailure::SingularSystem => "normal equations are singular",
            FitFailure::InvalidWidth => "fitted width is not a positive finite number",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("peak fit did not converge after {iterations} iterations: {reason}")]
pub struct FitDidNotConverge {
    pub iterations: usize,
    pub reason: FitFailure,
}

impl FitDidNotConverge {
    fn new(iterations: usize, reason: FitFailure) -> Self {
        Self { iterations, reason }
    }
}

/// Tuning for the Gaussian fitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    /// Starting width guess in pixels.
    pub initial_sigma_px: f64,
    pub max_iterations: usize,
    /// Relative cost reduction and relative step size that count as converged.
    pub tolerance: f64,
    pub initial_damping: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            initial_sigma_px: 10.0,
            max_iterations: 200,
            tolerance: 1e-10,
            initial_damping: 1e-3,
        }
    }
}

/// Processor variants selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    #[default]
    Gaussian,
    CircleFit,
    LineFit,
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessorKind::Gaussian => "gaussian",
            ProcessorKind::CircleFit => "circle_fit",
            ProcessorKind::LineFit => "line_fit",
        };
        f.write_str(name)
    }
}

impl FromStr for ProcessorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "gaussian" => Ok(ProcessorKind::Gaussian),
            "circle_fit" | "circlefit" => Ok(ProcessorKind::CircleFit),
            "line_fit" | "linefit" => Ok(ProcessorKind::LineFit),
            _ => Err(Error::InvalidInput {
                field: "processor",
                value: s.to_string(),
            }),
        }
    }
}

/// A single-peak estimator over one intensity profile.
pub trait PeakFitter: Send + Sync {
    fn name(&self) -> &str;

    /// Fit the profile; the profile is only read.
    fn fit(&self, profile: &IntensityProfile) -> Result<PeakFitResult, FitDidNotConverge>;
}

/// Build the fitter for `kind`. Unimplemented variants fail here rather than
/// on the first frame.
pub fn build_fitter(kind: ProcessorKind, settings: FitSettings) -> crate::Result<Box<dyn PeakFitter>> {
    match kind {
        ProcessorKind::Gaussian => Ok(Box::new(GaussianFitter::new(settings))),
        ProcessorKind::CircleFit | ProcessorKind::LineFit => Err(Error::NotSupported(kind)),
    }
}

#[derive(Debug, Clone, Default)]
pub struct GaussianFitter {
    settings: FitSettings,
}

impl GaussianFitter {
    pub fn new(settings: FitSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }
}

impl PeakFitter for GaussianFitter {
    fn name(&self) -> &str {
        "Gaussian"
    }

    fn fit(&self, profile: &IntensityProfile) -> Result<PeakFitResult, FitDidNotConverge> {
        let values = profile.values();
        let degenerate = FitDidNotConverge::new(0, FitFailure::DegenerateProfile);
        if values.len() < 3 || values.iter().any(|v| !v.is_finite()) {
            return Err(degenerate);
        }
        let (Some(max), Some(min), Some(peak_index)) = (profile.max(), profile.min(), profile.argmax())
        else {
            return Err(degenerate);
        };
        if max - min <= f64::EPSILON * max.abs().max(1.0) {
            return Err(degenerate);
        }

        let initial = Vector3::new(max, peak_index as f64, self.settings.initial_sigma_px);
        levenberg_marquardt(values, initial, &self.settings)
    }
}

fn gaussian(p: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    let d = p - center;
    amplitude * (-(d * d) / (2.0 * sigma * sigma)).exp()
}

fn cost(values: &[f64], params: &Vector3<f64>) -> f64 {
    values
        .iter()
        .enumerate()
        .map(|(i, &y)| {
            let r = y - gaussian(i as f64, params[0], params[1], params[2]);
            r * r
        })
        .sum()
}

/// Normal equations `JᵀJ` and `Jᵀr` with residuals `r = y − f`.
fn normal_equations(values: &[f64], params: &Vector3<f64>) -> (Matrix3<f64>, Vector3<f64>) {
    let (amplitude, center, sigma) = (params[0], params[1], params[2]);
    let sigma2 = sigma * sigma;
    let mut jtj = Matrix3::<f64>::zeros();
    let mut jtr = Vector3::<f64>::zeros();

    for (i, &y) in values.iter().enumerate() {
        let d = i as f64 - center;
        let e = (-(d * d) / (2.0 * sigma2)).exp();
        let f = amplitude * e;
        let j = Vector3::new(e, f * d / sigma2, f * d * d / (sigma2 * sigma));
        jtj += j * j.transpose();
        jtr += j * (y - f);
    }

    (jtj, jtr)
}

fn levenberg_marquardt(
    values: &[f64],
    initial: Vector3<f64>,
    settings: &FitSettings,
) -> Result<PeakFitResult, FitDidNotConverge> {
    const MAX_DAMPING: f64 = 1e16;

    let tol = settings.tolerance;
    let mut params = initial;
    let mut current = cost(values, &params);
    let mut damping = settings.initial_damping;

    for iteration in 1..=settings.max_iterations {
        if current == 0.0 {
            return finish(params, iteration);
        }

        let (jtj, jtr) = normal_equations(values, &params);
        let mut system = jtj;
        for k in 0..3 {
            system[(k, k)] += damping * jtj[(k, k)].max(f64::MIN_POSITIVE);
        }

        let Some(step) = system.lu().solve(&jtr) else {
            if damping >= MAX_DAMPING {
                return Err(FitDidNotConverge::new(iteration, FitFailure::SingularSystem));
            }
            damping *= 10.0;
            continue;
        };

        let candidate = params + step;
        let trial = if candidate.iter().all(|v| v.is_finite()) && candidate[2] != 0.0 {
            cost(values, &candidate)
        } else {
            f64::INFINITY
        };

        if trial < current {
            let reduction = (current - trial) / current;
            let relative_step = step.norm() / (params.norm() + tol);
            params = candidate;
            current = trial;
            damping = (damping / 10.0).max(1e-15);
            if reduction < tol || relative_step < tol {
                return finish(params, iteration);
            }
        } else {
            damping *= 10.0;
            // No damped step lowers the cost any more: stationary point.
            if damping >= MAX_DAMPING {
                return finish(params, iteration);
            }
        }
    }

    Err(FitDidNotConverge::new(
        settings.max_iterations,
        FitFailure::IterationBudget,
    ))
}

fn finish(params: Vector3<f64>, iterations: usize) -> Result<PeakFitResult, FitDidNotConverge> {
    let sigma = params[2].abs();
    if !sigma.is_finite() || sigma <= 0.0 || !params[0].is_finite() || !params[1].is_finite() {
        return Err(FitDidNotConverge::new(iterations, FitFailure::InvalidWidth));
    }
    Ok(PeakFitResult {
        amplitude: params[0],
        center: params[1],
        sigma,
    })
}
