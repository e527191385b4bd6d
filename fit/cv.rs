//! K-fold cross-validation of the penalised logistic model over a λ path.

use crate::fit::FitError;
use crate::fit::irls::{FitOptions, fit_path};
use crate::fit::metrics::auc;
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::Serialize;

/// Assigns every observation a fold in `0..k`, dealing cases and controls
/// out separately so each fold keeps roughly the overall case rate.
pub fn stratified_folds<R: Rng + ?Sized>(
    y: ArrayView1<f64>,
    k: usize,
    rng: &mut R,
) -> Result<Vec<usize>, FitError> {
    if k < 2 {
        return Err(FitError::invalid("folds", format!("need at least 2, got {k}")));
    }
    let mut cases: Vec<usize> = (0..y.len()).filter(|&i| y[i] > 0.5).collect();
    let mut controls: Vec<usize> = (0..y.len()).filter(|&i| y[i] <= 0.5).collect();
    if cases.len() < k || controls.len() < k {
        return Err(FitError::invalid(
            "folds",
            format!(
                "{k} folds need at least {k} cases and {k} controls, found {} and {}",
                cases.len(),
                controls.len()
            ),
        ));
    }
    cases.shuffle(rng);
    controls.shuffle(rng);

    let mut assignment = vec![0; y.len()];
    for (pos, &i) in cases.iter().chain(controls.iter()).enumerate() {
        assignment[i] = pos % k;
    }
    Ok(assignment)
}

#[derive(Clone, Debug, Serialize)]
pub struct CvResult {
    pub lambdas: Vec<f64>,
    /// Held-out AUC averaged over folds, one per λ.
    pub mean_auc: Vec<f64>,
    /// `fold_auc[f][l]` is the AUC on fold `f` at `lambdas[l]`.
    pub fold_auc: Vec<Vec<f64>>,
    pub best_index: usize,
    pub best_lambda: f64,
}

/// Cross-validates every λ in `lambdas`. Folds are fitted in parallel; the
/// best λ is the one with the highest mean held-out AUC, the larger λ winning
/// ties.
pub fn cross_validate<R: Rng + ?Sized>(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    alpha: f64,
    lambdas: &[f64],
    folds: usize,
    options: &FitOptions,
    rng: &mut R,
) -> Result<CvResult, FitError> {
    if x.nrows() != y.len() {
        return Err(FitError::DimensionMismatch {
            what: "outcome length",
            expected: x.nrows(),
            found: y.len(),
        });
    }
    if lambdas.is_empty() {
        return Err(FitError::invalid("lambdas", "the path is empty"));
    }
    let assignment = stratified_folds(y, folds, rng)?;

    let fold_auc = (0..folds)
        .into_par_iter()
        .map(|fold| -> Result<Vec<f64>, FitError> {
            let (train, test): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| assignment[i] != fold);
            let x_train = x.select(Axis(0), &train);
            let y_train = y.select(Axis(0), &train);
            let x_test = x.select(Axis(0), &test);
            let y_test = y.select(Axis(0), &test);

            let fits = fit_path(x_train.view(), y_train.view(), lambdas, alpha, options)?;
            let aucs = fits
                .iter()
                .map(|fit| auc(y_test.view(), fit.predict_proba(x_test.view()).view()))
                .collect::<Result<Vec<f64>, FitError>>()?;
            log::debug!("Fold {}/{folds}: held-out AUC {:?}", fold + 1, aucs);
            Ok(aucs)
        })
        .collect::<Result<Vec<Vec<f64>>, FitError>>()?;

    let mean_auc: Vec<f64> = (0..lambdas.len())
        .map(|l| fold_auc.iter().map(|row| row[l]).sum::<f64>() / folds as f64)
        .collect();
    let mut best_index = 0;
    for (l, &value) in mean_auc.iter().enumerate() {
        if value > mean_auc[best_index] {
            best_index = l;
        }
    }
    log::info!(
        "Cross-validation picked lambda={:.4e} (mean AUC {:.4})",
        lambdas[best_index],
        mean_auc[best_index]
    );

    Ok(CvResult {
        lambdas: lambdas.to_vec(),
        mean_auc,
        fold_auc,
        best_index,
        best_lambda: lambdas[best_index],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::irls::lambda_path;
    use ndarray::{Array1, Array2};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::StandardNormal;

    #[test]
    fn folds_are_balanced_by_class() {
        let y = Array1::from_iter((0..100).map(|i| if i < 30 { 1.0 } else { 0.0 }));
        let mut rng = StdRng::seed_from_u64(9);
        let folds = stratified_folds(y.view(), 5, &mut rng).unwrap();
        for f in 0..5 {
            let members: Vec<usize> = (0..100).filter(|&i| folds[i] == f).collect();
            assert_eq!(members.len(), 20);
            assert_eq!(members.iter().filter(|&&i| y[i] == 1.0).count(), 6);
        }
    }

    #[test]
    fn too_few_cases_for_the_fold_count() {
        let y = Array1::from_iter((0..50).map(|i| if i < 3 { 1.0 } else { 0.0 }));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(stratified_folds(y.view(), 5, &mut rng).is_err());
        assert!(stratified_folds(y.view(), 1, &mut rng).is_err());
    }

    #[test]
    fn informative_feature_beats_chance() {
        let mut rng = StdRng::seed_from_u64(21);
        let x = Array2::from_shape_fn((600, 4), |_| rng.sample::<f64, _>(StandardNormal));
        let y = Array1::from_iter(x.rows().into_iter().map(|r| {
            let p = 1.0 / (1.0 + (-2.0 * r[0]).exp());
            if rng.gen_range(0.0..1.0) < p { 1.0 } else { 0.0 }
        }));
        let lambdas = lambda_path(x.view(), y.view(), 0.5, 6, 0.01).unwrap();
        let cv = cross_validate(
            x.view(),
            y.view(),
            0.5,
            &lambdas,
            4,
            &FitOptions::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(cv.fold_auc.len(), 4);
        assert_eq!(cv.mean_auc.len(), 6);
        assert!(cv.mean_auc[cv.best_index] > 0.75, "{:?}", cv.mean_auc);
        assert!(cv.best_index > 0);
    }
}
