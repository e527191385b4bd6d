//! Train/test evaluation of a penalised logistic model on a simulated cohort:
//! split, cross-validate λ on the training part, refit, score the held-out part
//! and compare the selected variants with the known causal set.

use crate::fit::FitError;
use crate::fit::cv::{CvResult, cross_validate};
use crate::fit::irls::{FitOptions, FitStatus, fit_path, lambda_path};
use crate::fit::metrics::{TopKOverlap, auc, top_k_overlap};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Elastic-net mixing: 1 is the lasso, 0 is ridge.
    pub alpha: f64,
    pub folds: usize,
    pub n_lambda: usize,
    /// Smallest λ on the path as a fraction of `λ_max`.
    pub lambda_ratio: f64,
    pub test_fraction: f64,
    /// Size of the top-ranked set compared against the causal variants;
    /// defaults to the number of causal variants.
    pub top_k: Option<usize>,
    pub seed: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            folds: 5,
            n_lambda: 20,
            lambda_ratio: 0.01,
            test_fraction: 0.2,
            top_k: None,
            seed: 42,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(FitError::invalid("alpha", format!("must lie in [0, 1], got {}", self.alpha)));
        }
        if self.folds < 2 {
            return Err(FitError::invalid("folds", format!("need at least 2, got {}", self.folds)));
        }
        if self.n_lambda == 0 {
            return Err(FitError::invalid("n_lambda", "must be positive"));
        }
        if !(self.lambda_ratio > 0.0 && self.lambda_ratio < 1.0) {
            return Err(FitError::invalid(
                "lambda_ratio",
                format!("must lie in (0, 1), got {}", self.lambda_ratio),
            ));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(FitError::invalid(
                "test_fraction",
                format!("must lie in (0, 1), got {}", self.test_fraction),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HarnessReport {
    pub n_train: usize,
    pub n_test: usize,
    pub n_variants: usize,
    pub alpha: f64,
    pub cv: CvResult,
    pub lambda: f64,
    pub status: FitStatus,
    pub train_auc: f64,
    pub test_auc: f64,
    pub nonzero: usize,
    pub top_k: Option<TopKOverlap>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

/// Splits observations into (train, test) index sets, holding out
/// `round(test_fraction · count)` of each class, at least one and never all.
pub fn stratified_split<R: Rng + ?Sized>(
    y: ArrayView1<f64>,
    test_fraction: f64,
    rng: &mut R,
) -> Result<(Vec<usize>, Vec<usize>), FitError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(FitError::invalid(
            "test_fraction",
            format!("must lie in (0, 1), got {test_fraction}"),
        ));
    }
    let mut train = Vec::new();
    let mut test = Vec::new();
    for is_case in [true, false] {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| (y[i] > 0.5) == is_case).collect();
        match members.len() {
            0 => return Err(FitError::SingleClass { n: y.len() }),
            1 => {
                return Err(FitError::invalid(
                    "test_fraction",
                    format!(
                        "a stratified split needs at least 2 members per class, but the {} class has 1",
                        if is_case { "case" } else { "control" }
                    ),
                ));
            }
            _ => {}
        }
        members.shuffle(rng);
        let held_out = ((test_fraction * members.len() as f64).round() as usize)
            .clamp(1, members.len() - 1);
        test.extend_from_slice(&members[..held_out]);
        train.extend_from_slice(&members[held_out..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

pub fn run_harness<R: Rng + ?Sized>(
    genotypes: ArrayView2<u8>,
    phenotype: ArrayView1<u8>,
    causal_mask: ArrayView1<bool>,
    config: &HarnessConfig,
    rng: &mut R,
) -> Result<HarnessReport, FitError> {
    config.validate()?;
    if phenotype.len() != genotypes.nrows() {
        return Err(FitError::DimensionMismatch {
            what: "phenotype length",
            expected: genotypes.nrows(),
            found: phenotype.len(),
        });
    }
    if causal_mask.len() != genotypes.ncols() {
        return Err(FitError::DimensionMismatch {
            what: "causal mask length",
            expected: genotypes.ncols(),
            found: causal_mask.len(),
        });
    }
    if phenotype.iter().any(|&v| v > 1) {
        return Err(FitError::invalid("phenotype", "values must be 0 or 1"));
    }

    let x = genotypes.mapv(f64::from);
    let y: Array1<f64> = phenotype.mapv(f64::from);
    let (train, test) = stratified_split(y.view(), config.test_fraction, rng)?;
    log::info!(
        "Fitting on {} training and {} held-out samples across {} variants",
        train.len(),
        test.len(),
        x.ncols()
    );

    let x_train = x.select(Axis(0), &train);
    let y_train = y.select(Axis(0), &train);
    let x_test = x.select(Axis(0), &test);
    let y_test = y.select(Axis(0), &test);

    let options = FitOptions::default();
    let lambdas = lambda_path(
        x_train.view(),
        y_train.view(),
        config.alpha,
        config.n_lambda,
        config.lambda_ratio,
    )?;
    let cv = cross_validate(
        x_train.view(),
        y_train.view(),
        config.alpha,
        &lambdas,
        config.folds,
        &options,
        rng,
    )?;

    // Refit along the path up to the chosen λ so the final fit is warm-started.
    let mut fits = fit_path(
        x_train.view(),
        y_train.view(),
        &lambdas[..=cv.best_index],
        config.alpha,
        &options,
    )?;
    let fit = fits
        .pop()
        .ok_or_else(|| FitError::invalid("lambdas", "the path is empty"))?;

    let train_auc = auc(y_train.view(), fit.predict_proba(x_train.view()).view())?;
    let test_auc = auc(y_test.view(), fit.predict_proba(x_test.view()).view())?;

    let causal_total = causal_mask.iter().filter(|&&c| c).count();
    let top_k = match config.top_k.or((causal_total > 0).then_some(causal_total)) {
        Some(k) => Some(top_k_overlap(fit.coefficients.view(), causal_mask, k)?),
        None => None,
    };
    log::info!(
        "Held-out AUC {:.4} at lambda={:.4e} with {} nonzero coefficients",
        test_auc,
        fit.lambda,
        fit.nonzero()
    );

    Ok(HarnessReport {
        n_train: train.len(),
        n_test: test.len(),
        n_variants: x.ncols(),
        alpha: config.alpha,
        lambda: fit.lambda,
        status: fit.status,
        train_auc,
        test_auc,
        nonzero: fit.nonzero(),
        top_k,
        intercept: fit.intercept,
        coefficients: fit.coefficients.to_vec(),
        cv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn split_holds_out_each_class() {
        let y = Array1::from_iter((0..50).map(|i| if i % 5 == 0 { 1.0 } else { 0.0 }));
        let mut rng = StdRng::seed_from_u64(3);
        let (train, test) = stratified_split(y.view(), 0.2, &mut rng).unwrap();
        assert_eq!(train.len() + test.len(), 50);
        assert_eq!(test.iter().filter(|&&i| y[i] == 1.0).count(), 2);
        assert_eq!(test.iter().filter(|&&i| y[i] == 0.0).count(), 8);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn single_class_outcome_is_rejected() {
        let y = Array1::<f64>::zeros(20);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            stratified_split(y.view(), 0.2, &mut rng),
            Err(FitError::SingleClass { n: 20 })
        ));
    }

    #[test]
    fn lone_case_cannot_be_split() {
        let mut y = Array1::<f64>::zeros(20);
        y[7] = 1.0;
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            stratified_split(y.view(), 0.2, &mut rng),
            Err(FitError::InvalidParameter { name: "test_fraction", .. })
        ));
    }

    #[test]
    fn invalid_configuration_fails_before_fitting() {
        let g = Array2::<u8>::zeros((10, 2));
        let y = Array1::<u8>::zeros(10);
        let mask = array![true, false];
        let mut rng = StdRng::seed_from_u64(3);
        let config = HarnessConfig {
            folds: 1,
            ..HarnessConfig::default()
        };
        assert!(matches!(
            run_harness(g.view(), y.view(), mask.view(), &config, &mut rng),
            Err(FitError::InvalidParameter { name: "folds", .. })
        ));
        let config = HarnessConfig::default();
        assert!(matches!(
            run_harness(g.view(), y.view(), array![true].view(), &config, &mut rng),
            Err(FitError::DimensionMismatch { .. })
        ));
    }
}
