use genosim::config::{GenotypeConfig, PhenotypeConfig, SimulationConfig};
use genosim::fit::FitError;
use genosim::fit::harness::{HarnessConfig, run_harness};
use genosim::fit::irls::{FitOptions, FitStatus, fit_elastic_net_logistic};
use genosim::pipeline::{SimulatedCohort, simulate_cohort};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn cohort(samples: usize, heritability: f64, seed: u64) -> SimulatedCohort {
    let config = SimulationConfig {
        seed,
        genotypes: GenotypeConfig {
            samples,
            variants: 30,
            maf_range: (0.1, 0.5),
        },
        ld: None,
        ld_blocks: None,
        phenotype: PhenotypeConfig::Gaussian {
            causal_proportion: 0.2,
            heritability,
            prevalence: 0.3,
        },
    };
    simulate_cohort(&config, &mut StdRng::seed_from_u64(seed)).unwrap()
}

#[test]
fn harness_beats_chance_on_a_heritable_trait() {
    let cohort = cohort(2000, 0.6, 17);
    let config = HarnessConfig::default();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let report = run_harness(
        cohort.genotypes.view(),
        cohort.phenotype.phenotype.view(),
        cohort.phenotype.causal_mask.view(),
        &config,
        &mut rng,
    )
    .unwrap();

    assert_eq!(report.n_train + report.n_test, 2000);
    assert_eq!(report.n_variants, 30);
    assert_eq!(report.cv.mean_auc.len(), config.n_lambda);
    assert_eq!(report.lambda, report.cv.best_lambda);
    assert_eq!(report.status, FitStatus::Converged);
    assert!(report.test_auc > 0.65, "test AUC {}", report.test_auc);
    assert!(report.nonzero >= 3);

    let overlap = report.top_k.as_ref().unwrap();
    assert_eq!(overlap.k, 6);
    assert_eq!(overlap.causal_total, 6);
    assert!(overlap.hits >= 2, "{overlap:?}");

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["test_auc"].is_number());
    assert_eq!(json["status"], "Converged");
}

#[test]
fn harness_is_reproducible_for_a_seed() {
    let cohort = cohort(600, 0.5, 23);
    let config = HarnessConfig {
        folds: 3,
        n_lambda: 8,
        ..HarnessConfig::default()
    };
    let run = || {
        run_harness(
            cohort.genotypes.view(),
            cohort.phenotype.phenotype.view(),
            cohort.phenotype.causal_mask.view(),
            &config,
            &mut StdRng::seed_from_u64(5),
        )
        .unwrap()
    };
    let (a, b) = (run(), run());
    assert_eq!(a.coefficients, b.coefficients);
    assert_eq!(a.cv.mean_auc, b.cv.mean_auc);
}

#[test]
fn direct_fit_rejects_a_single_class_outcome() {
    let cohort = cohort(200, 0.5, 29);
    let x = cohort.genotypes.mapv(f64::from);
    let y = ndarray::Array1::<f64>::ones(200);
    assert!(matches!(
        fit_elastic_net_logistic(x.view(), y.view(), 0.01, 0.5, &FitOptions::default()),
        Err(FitError::SingleClass { n: 200 })
    ));
}
