//! Small numeric helpers shared by the simulation and fitting stages.
//!
//! Variances here are population variances (divide by `n`), matching the
//! estimator the liability model is calibrated with.

use crate::types::SimulationError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use statrs::distribution::{ContinuousCDF, Normal};

pub fn mean(values: ArrayView1<f64>) -> f64 {
    values.mean().unwrap_or(0.0)
}

/// Population variance (ddof = 0). Empty input has zero variance.
pub fn population_variance(values: ArrayView1<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.var(0.0)
}

/// Shifts and scales `values` to zero mean and unit population variance.
///
/// A constant vector cannot be scaled; it comes back centred only.
pub fn standardize(values: ArrayView1<f64>) -> Array1<f64> {
    let mu = mean(values);
    let sd = population_variance(values).sqrt();
    if sd > 0.0 && sd.is_finite() {
        values.mapv(|v| (v - mu) / sd)
    } else {
        values.mapv(|v| v - mu)
    }
}

/// Squared Pearson correlation between two equally long vectors.
///
/// Returns `None` when either side has no variance, since r² is undefined there.
pub fn squared_correlation(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let ma = mean(a);
    let mb = mean(b);
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - ma;
        let dy = y - mb;
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa <= 0.0 || sbb <= 0.0 {
        return None;
    }
    Some((sab * sab) / (saa * sbb))
}

/// r² between two dosage columns.
pub fn dosage_r2(a: ArrayView1<u8>, b: ArrayView1<u8>) -> Option<f64> {
    squared_correlation(a.mapv(f64::from).view(), b.mapv(f64::from).view())
}

/// Observed frequency of the counted allele per column: mean dosage over two.
pub fn allele_frequencies(dosages: ArrayView2<u8>) -> Array1<f64> {
    if dosages.nrows() == 0 {
        return Array1::zeros(dosages.ncols());
    }
    dosages
        .mapv(f64::from)
        .mean_axis(Axis(0))
        .map(|m| m / 2.0)
        .unwrap_or_else(|| Array1::zeros(dosages.ncols()))
}

/// Observed minor-allele frequency per column, folded onto [0, 0.5].
pub fn observed_maf(dosages: ArrayView2<u8>) -> Array1<f64> {
    allele_frequencies(dosages).mapv(|f| f.min(1.0 - f))
}

/// Pairwise r² between every pair of columns. Monomorphic columns get r² = 0
/// against everything else and 1 on the diagonal.
pub fn ld_matrix(dosages: ArrayView2<u8>) -> Array2<f64> {
    let p = dosages.ncols();
    let mut out = Array2::<f64>::eye(p);
    for i in 0..p {
        for j in (i + 1)..p {
            let r2 = dosage_r2(dosages.column(i), dosages.column(j)).unwrap_or(0.0);
            out[[i, j]] = r2;
            out[[j, i]] = r2;
        }
    }
    out
}

/// Liability threshold for a population prevalence: `Φ⁻¹(1 − prevalence)`.
pub fn liability_threshold(prevalence: f64) -> Result<f64, SimulationError> {
    if !(prevalence > 0.0 && prevalence < 1.0) {
        return Err(SimulationError::invalid(
            "prevalence",
            format!("must lie strictly between 0 and 1, got {prevalence}"),
        ));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| SimulationError::invalid("prevalence", e.to_string()))?;
    Ok(normal.inverse_cdf(1.0 - prevalence))
}
