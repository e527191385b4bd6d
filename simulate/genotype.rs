//! # Genotype Generator
//!
//! Draws one minor-allele frequency per variant from `Uniform(lo, hi)` and then
//! `n` independent dosages per variant from `Binomial(2, maf)`.

use crate::types::{GenotypeMatrix, SimulationError};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Binomial, Distribution};

/// Checks a frequency range for use as MAF bounds: `0 < lo < hi < 1`.
pub fn validate_maf_range(lo: f64, hi: f64) -> Result<(), SimulationError> {
    if !(lo.is_finite() && hi.is_finite()) {
        return Err(SimulationError::invalid(
            "maf_range",
            format!("bounds must be finite, got [{lo}, {hi}]"),
        ));
    }
    if lo >= hi {
        return Err(SimulationError::invalid(
            "maf_range",
            format!("lower bound {lo} must be below upper bound {hi}"),
        ));
    }
    if lo <= 0.0 || hi >= 1.0 {
        return Err(SimulationError::invalid(
            "maf_range",
            format!("frequencies must lie in (0, 1), got [{lo}, {hi}]"),
        ));
    }
    Ok(())
}

/// Draws `n_variants` frequencies uniformly in `[lo, hi)`.
pub fn draw_maf<R: Rng + ?Sized>(
    n_variants: usize,
    maf_range: (f64, f64),
    rng: &mut R,
) -> Result<Array1<f64>, SimulationError> {
    let (lo, hi) = maf_range;
    validate_maf_range(lo, hi)?;
    Ok(Array1::from_iter(
        (0..n_variants).map(|_| rng.gen_range(lo..hi)),
    ))
}

/// Draws `n` dosages from `Binomial(2, maf)`.
pub fn draw_dosages<R: Rng + ?Sized>(
    n: usize,
    maf: f64,
    rng: &mut R,
) -> Result<Array1<u8>, SimulationError> {
    let binomial = Binomial::new(2, maf)
        .map_err(|e| SimulationError::invalid("maf", format!("{maf}: {e}")))?;
    Ok(Array1::from_iter(
        (0..n).map(|_| binomial.sample(rng) as u8),
    ))
}

/// Simulates an `n_samples × n_variants` dosage matrix.
///
/// Columns are independent: variant `j` uses its own frequency `maf[j]` for all
/// of its samples. Fails with `InvalidParameter` for empty dimensions or an
/// invalid frequency range.
pub fn simulate_genotypes<R: Rng + ?Sized>(
    n_samples: usize,
    n_variants: usize,
    maf_range: (f64, f64),
    rng: &mut R,
) -> Result<GenotypeMatrix, SimulationError> {
    if n_samples == 0 {
        return Err(SimulationError::invalid("samples", "must be positive"));
    }
    if n_variants == 0 {
        return Err(SimulationError::invalid("variants", "must be positive"));
    }

    let maf = draw_maf(n_variants, maf_range, rng)?;
    let mut dosages = Array2::<u8>::zeros((n_samples, n_variants));
    for (j, mut column) in dosages.columns_mut().into_iter().enumerate() {
        let drawn = draw_dosages(n_samples, maf[j], rng)?;
        column.assign(&drawn);
    }

    log::debug!(
        "Simulated {} x {} genotype matrix (MAF range [{}, {}])",
        n_samples,
        n_variants,
        maf_range.0,
        maf_range.1
    );

    Ok(GenotypeMatrix { dosages, maf })
}
