//! # Elastic-Net Penalised Logistic Regression
//!
//! Minimises `-(1/n)·loglik(β₀, β) + λ(α‖β‖₁ + (1−α)/2·‖β‖²)` with an
//! unpenalised intercept. Each outer step is one IRLS linearisation of the
//! binomial likelihood; the resulting penalised weighted least-squares problem
//! is solved by cyclic coordinate descent with soft-thresholding.
//!
//! Columns are standardised internally (population standard deviation) and the
//! reported coefficients are mapped back to the original scale. Constant
//! columns are never selected.

use crate::fit::FitError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// The status of the IRLS outer loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// Coefficients moved less than the tolerance between outer iterations.
    Converged,
    /// The outer iteration cap was reached first.
    MaxIterationsReached,
}

#[derive(Clone, Debug)]
pub struct FitOptions {
    /// Maximum number of IRLS linearisations per λ.
    pub max_iterations: usize,
    /// Maximum number of coordinate-descent sweeps per linearisation.
    pub max_sweeps: usize,
    /// Convergence tolerance on the largest coefficient change (standardised scale).
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_sweeps: 500,
            tolerance: 1e-6,
        }
    }
}

/// A fitted model at one (λ, α).
#[derive(Clone, Debug)]
pub struct LogisticFit {
    pub intercept: f64,
    /// Coefficients on the original column scale.
    pub coefficients: Array1<f64>,
    pub lambda: f64,
    pub alpha: f64,
    /// Binomial deviance on the training data.
    pub deviance: f64,
    pub status: FitStatus,
    pub iterations: usize,
}

impl LogisticFit {
    pub fn linear_predictor(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }

    /// Predicted case probabilities.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Array1<f64> {
        self.linear_predictor(x).mapv(|e| {
            let e = e.clamp(-700.0, 700.0);
            (1.0 / (1.0 + (-e).exp())).clamp(1e-8, 1.0 - 1e-8)
        })
    }

    pub fn nonzero(&self) -> usize {
        self.coefficients.iter().filter(|&&b| b != 0.0).count()
    }
}

/// IRLS working quantities for the logit link: mean, weights and working response.
pub fn update_glm_vectors(
    y: ArrayView1<f64>,
    eta: &Array1<f64>,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    const MIN_WEIGHT: f64 = 1e-6;
    const PROB_EPS: f64 = 1e-8;

    let eta_clamped = eta.mapv(|e| e.clamp(-700.0, 700.0));
    let mut mu = eta_clamped.mapv(|e| 1.0 / (1.0 + (-e).exp()));
    mu.mapv_inplace(|v| v.clamp(PROB_EPS, 1.0 - PROB_EPS));
    let weights = mu.mapv(|m| (m * (1.0 - m)).max(MIN_WEIGHT));

    let residual = &y - &mu;
    let z = &eta_clamped + &(&residual / &weights);
    (mu, weights, z)
}

/// Binomial deviance, `-2·loglik` relative to the saturated model.
pub fn calculate_deviance(y: ArrayView1<f64>, mu: &Array1<f64>) -> f64 {
    const EPS: f64 = 1e-8;
    let total = Zip::from(y).and(mu).fold(0.0, |acc, &yi, &mui| {
        let mui_c = mui.clamp(EPS, 1.0 - EPS);
        let term1 = if yi > EPS {
            yi * (yi.ln() - mui_c.ln())
        } else {
            0.0
        };
        let term2 = if yi < 1.0 - EPS {
            (1.0 - yi) * ((1.0 - yi).ln() - (1.0 - mui_c).ln())
        } else {
            0.0
        };
        acc + term1 + term2
    });
    2.0 * total
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Column-standardised design, stored variant-major (`[p, n]`) so each
/// coordinate update walks contiguous memory.
pub struct StandardizedDesign {
    zt: Array2<f64>,
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl StandardizedDesign {
    pub fn new(x: ArrayView2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let mut scales = Array1::<f64>::zeros(x.ncols());
        let mut zt = Array2::<f64>::zeros((x.ncols(), x.nrows()));
        for (j, column) in x.columns().into_iter().enumerate() {
            let m = means[j];
            let var = column.iter().map(|&v| (v - m) * (v - m)).sum::<f64>() / n;
            let sd = var.sqrt();
            if sd > 1e-12 {
                scales[j] = sd;
                Zip::from(zt.row_mut(j))
                    .and(column)
                    .for_each(|z, &v| *z = (v - m) / sd);
            }
        }
        Self { zt, means, scales }
    }

    pub fn n_samples(&self) -> usize {
        self.zt.ncols()
    }

    pub fn n_variants(&self) -> usize {
        self.zt.nrows()
    }

    fn is_constant(&self, j: usize) -> bool {
        self.scales[j] == 0.0
    }

    /// Smallest λ at which every penalised coefficient is zero.
    pub fn lambda_max(&self, y: ArrayView1<f64>, alpha: f64) -> f64 {
        let n = self.n_samples() as f64;
        let y_bar = y.mean().unwrap_or(0.0);
        let centred = y.mapv(|v| v - y_bar);
        let max_grad = self
            .zt
            .rows()
            .into_iter()
            .map(|z| (z.dot(&centred) / n).abs())
            .fold(0.0_f64, f64::max);
        max_grad / alpha.max(1e-3)
    }
}

/// Coefficients on the standardised scale, carried along a λ path as warm starts.
#[derive(Clone, Debug)]
pub struct WarmStart {
    intercept: f64,
    beta: Array1<f64>,
}

impl WarmStart {
    /// The null model: no slopes, intercept at the log-odds of the case rate.
    pub fn null(design: &StandardizedDesign, y: ArrayView1<f64>) -> Self {
        let y_bar = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        Self {
            intercept: (y_bar / (1.0 - y_bar)).ln(),
            beta: Array1::zeros(design.n_variants()),
        }
    }
}

fn check_inputs(
    design: &StandardizedDesign,
    y: ArrayView1<f64>,
    lambda: f64,
    alpha: f64,
) -> Result<(), FitError> {
    if y.len() != design.n_samples() {
        return Err(FitError::DimensionMismatch {
            what: "outcome length",
            expected: design.n_samples(),
            found: y.len(),
        });
    }
    if !(0.0..=1.0).contains(&alpha) {
        return Err(FitError::invalid("alpha", format!("must lie in [0, 1], got {alpha}")));
    }
    if !(lambda >= 0.0 && lambda.is_finite()) {
        return Err(FitError::invalid("lambda", format!("must be finite and non-negative, got {lambda}")));
    }
    if y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(FitError::invalid("outcome", "values must be 0 or 1"));
    }
    let cases = y.iter().filter(|&&v| v == 1.0).count();
    if cases == 0 || cases == y.len() {
        return Err(FitError::SingleClass { n: y.len() });
    }
    Ok(())
}

/// Fits one λ starting from `start`, leaving the solution in `start`.
pub fn fit_standardized(
    design: &StandardizedDesign,
    y: ArrayView1<f64>,
    lambda: f64,
    alpha: f64,
    options: &FitOptions,
    start: &mut WarmStart,
) -> Result<LogisticFit, FitError> {
    check_inputs(design, y, lambda, alpha)?;

    let n = design.n_samples() as f64;
    let l1 = lambda * alpha;
    let l2 = lambda * (1.0 - alpha);
    let mut status = FitStatus::MaxIterationsReached;
    let mut iterations = 0;

    for iter in 1..=options.max_iterations {
        iterations = iter;
        let eta = design.zt.t().dot(&start.beta) + start.intercept;
        let (_, weights, z) = update_glm_vectors(y, &eta);
        let mut residual = &z - &eta;
        let weight_sum = weights.sum();

        let curvature: Vec<f64> = design
            .zt
            .rows()
            .into_iter()
            .map(|zj| Zip::from(zj).and(&weights).fold(0.0, |acc, &v, &w| acc + w * v * v) / n)
            .collect();

        let beta_before = start.beta.clone();
        let intercept_before = start.intercept;

        for sweep in 0..options.max_sweeps {
            let mut max_change = 0.0_f64;

            let shift = Zip::from(&weights).and(&residual).fold(0.0, |acc, &w, &r| acc + w * r) / weight_sum;
            if shift != 0.0 {
                start.intercept += shift;
                residual.mapv_inplace(|r| r - shift);
                max_change = max_change.max(shift.abs());
            }

            for j in 0..design.n_variants() {
                if design.is_constant(j) {
                    continue;
                }
                let zj = design.zt.row(j);
                let old = start.beta[j];
                let gradient = Zip::from(zj)
                    .and(&weights)
                    .and(&residual)
                    .fold(0.0, |acc, &v, &w, &r| acc + w * v * r)
                    / n
                    + curvature[j] * old;
                let updated = soft_threshold(gradient, l1) / (curvature[j] + l2);
                let delta = updated - old;
                if delta != 0.0 {
                    start.beta[j] = updated;
                    Zip::from(&mut residual).and(zj).for_each(|r, &v| *r -= delta * v);
                    max_change = max_change.max(delta.abs());
                }
            }

            if max_change < options.tolerance {
                log::debug!("IRLS step {iter}: coordinate descent settled after {} sweeps", sweep + 1);
                break;
            }
        }

        let outer_change = (&start.beta - &beta_before)
            .iter()
            .fold((start.intercept - intercept_before).abs(), |acc, d| acc.max(d.abs()));
        if outer_change < options.tolerance {
            status = FitStatus::Converged;
            break;
        }
    }

    if status == FitStatus::MaxIterationsReached {
        log::warn!(
            "Logistic fit at lambda={lambda:.4e} stopped after {} IRLS iterations without converging",
            options.max_iterations
        );
    }

    let eta = design.zt.t().dot(&start.beta) + start.intercept;
    let (mu, ..) = update_glm_vectors(y, &eta);
    let deviance = calculate_deviance(y, &mu);

    let mut coefficients = Array1::<f64>::zeros(design.n_variants());
    let mut intercept = start.intercept;
    for j in 0..design.n_variants() {
        if !design.is_constant(j) && start.beta[j] != 0.0 {
            coefficients[j] = start.beta[j] / design.scales[j];
            intercept -= coefficients[j] * design.means[j];
        }
    }

    Ok(LogisticFit {
        intercept,
        coefficients,
        lambda,
        alpha,
        deviance,
        status,
        iterations,
    })
}

/// Fits a single model from the null start.
pub fn fit_elastic_net_logistic(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    lambda: f64,
    alpha: f64,
    options: &FitOptions,
) -> Result<LogisticFit, FitError> {
    let design = StandardizedDesign::new(x);
    let mut start = WarmStart::null(&design, y);
    fit_standardized(&design, y, lambda, alpha, options, &mut start)
}

/// Fits every λ in `lambdas` in order, each warm-started from the previous one.
pub fn fit_path(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    lambdas: &[f64],
    alpha: f64,
    options: &FitOptions,
) -> Result<Vec<LogisticFit>, FitError> {
    let design = StandardizedDesign::new(x);
    let mut start = WarmStart::null(&design, y);
    lambdas
        .iter()
        .map(|&lambda| fit_standardized(&design, y, lambda, alpha, options, &mut start))
        .collect()
}

/// `n_lambda` log-spaced values from `λ_max` down to `ratio · λ_max`.
pub fn lambda_path(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    alpha: f64,
    n_lambda: usize,
    ratio: f64,
) -> Result<Vec<f64>, FitError> {
    if n_lambda == 0 {
        return Err(FitError::invalid("n_lambda", "must be positive"));
    }
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(FitError::invalid("lambda_ratio", format!("must lie in (0, 1), got {ratio}")));
    }
    let design = StandardizedDesign::new(x);
    check_inputs(&design, y, 0.0, alpha)?;
    let lambda_max = design.lambda_max(y, alpha);
    if n_lambda == 1 {
        return Ok(vec![lambda_max]);
    }
    let step = ratio.ln() / (n_lambda - 1) as f64;
    Ok((0..n_lambda)
        .map(|i| lambda_max * (step * i as f64).exp())
        .collect())
}
