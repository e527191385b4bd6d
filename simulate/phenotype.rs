//! # Liability-Threshold Phenotypes
//!
//! A genetic score is combined with calibrated Gaussian noise so that the
//! genetic share of liability variance equals the requested liability-scale
//! heritability. The liability is standardised and cut at `Φ⁻¹(1 − k)`, which
//! makes roughly a fraction `k` of observations cases when liability is close to
//! normal.

use crate::stats::{liability_threshold, population_variance, standardize};
use crate::types::{
    EffectSizes, Interaction, PairwiseArchitecture, PhenotypeSimulation, SimulationError,
};
use ndarray::{Array1, ArrayView1, ArrayView2, Zip};
use rand::Rng;
use rand::seq::index;
use rand_distr::{Distribution, Normal, StandardNormal};

/// `floor(n_variants * causal_proportion)`, tolerant of representation error
/// (`100 * 0.29` counts as 29).
pub fn causal_count(n_variants: usize, causal_proportion: f64) -> usize {
    (n_variants as f64 * causal_proportion + 1e-9).floor() as usize
}

fn validate_heritability(heritability: f64) -> Result<(), SimulationError> {
    if heritability.is_nan() || heritability <= 0.0 {
        return Err(SimulationError::invalid(
            "heritability",
            format!("must be positive, got {heritability}"),
        ));
    }
    Ok(())
}

/// Draws a main-effect vector with `floor(p * causal_proportion)` Normal(0, 1)
/// entries at uniformly random positions and exact zeros elsewhere.
///
/// Returns the effects and the causal mask.
pub fn draw_effects<R: Rng + ?Sized>(
    n_variants: usize,
    causal_proportion: f64,
    rng: &mut R,
) -> Result<(Array1<f64>, Array1<bool>), SimulationError> {
    if !(0.0..=1.0).contains(&causal_proportion) {
        return Err(SimulationError::invalid(
            "causal_proportion",
            format!("must lie in [0, 1], got {causal_proportion}"),
        ));
    }
    let m = causal_count(n_variants, causal_proportion);
    if m == 0 {
        return Err(SimulationError::NoCausalVariants {
            variants: n_variants,
            proportion: causal_proportion,
        });
    }

    let mut effects = Array1::<f64>::zeros(n_variants);
    let mut mask = Array1::from_elem(n_variants, false);
    for j in index::sample(rng, n_variants, m).into_vec() {
        effects[j] = StandardNormal.sample(rng);
        mask[j] = true;
    }
    Ok((effects, mask))
}

/// Resolves an [`EffectSizes`] description into a concrete vector and mask.
pub fn resolve_effects<R: Rng + ?Sized>(
    n_variants: usize,
    effects: &EffectSizes,
    rng: &mut R,
) -> Result<(Array1<f64>, Array1<bool>), SimulationError> {
    match effects {
        EffectSizes::Gaussian { causal_proportion } => {
            draw_effects(n_variants, *causal_proportion, rng)
        }
        EffectSizes::Fixed(values) => {
            if values.len() != n_variants {
                return Err(SimulationError::DimensionMismatch {
                    what: "fixed effect sizes",
                    expected: n_variants,
                    found: values.len(),
                });
            }
            let effects = Array1::from(values.clone());
            let mask = effects.mapv(|b| b != 0.0);
            if !mask.iter().any(|&c| c) {
                return Err(SimulationError::NoCausalVariants {
                    variants: n_variants,
                    proportion: 0.0,
                });
            }
            Ok((effects, mask))
        }
    }
}

/// Output of the noise-and-threshold step.
struct Thresholded {
    liability: Array1<f64>,
    phenotype: Array1<u8>,
    threshold: f64,
    environmental_variance: f64,
}

/// Adds noise with variance `var_g / h² − var_g`, standardises, and thresholds.
fn apply_liability_threshold<R: Rng + ?Sized>(
    genetic_score: ArrayView1<f64>,
    heritability: f64,
    threshold: f64,
    rng: &mut R,
) -> Result<Thresholded, SimulationError> {
    let genetic_variance = population_variance(genetic_score);
    let environmental_variance = genetic_variance / heritability - genetic_variance;
    if heritability >= 1.0
        || genetic_variance <= 0.0
        || !(environmental_variance > 0.0 && environmental_variance.is_finite())
    {
        return Err(SimulationError::NonPositiveVariance {
            genetic_variance,
            heritability,
        });
    }

    let noise = Normal::new(0.0, environmental_variance.sqrt()).map_err(|e| {
        SimulationError::invalid("heritability", format!("noise distribution: {e}"))
    })?;
    let raw = genetic_score.mapv(|g| g + noise.sample(rng));
    let liability = standardize(raw.view());
    let phenotype = liability.mapv(|l| u8::from(l > threshold));

    log::debug!(
        "var_g = {genetic_variance:.4e}, var_e = {environmental_variance:.4e}, threshold = {threshold:.4}"
    );

    Ok(Thresholded {
        liability,
        phenotype,
        threshold,
        environmental_variance,
    })
}

/// Simulates a binary phenotype under an additive model with Gaussian effects on a
/// random causal subset.
///
/// Fails with `NoCausalVariants` when `floor(p * causal_proportion) = 0`, with
/// `NonPositiveVariance` when `heritability >= 1` or the genetic score is
/// constant, and with `InvalidParameter` for out-of-range inputs.
pub fn simulate_y<R: Rng + ?Sized>(
    genotypes: ArrayView2<u8>,
    causal_proportion: f64,
    heritability: f64,
    prevalence: f64,
    rng: &mut R,
) -> Result<PhenotypeSimulation, SimulationError> {
    simulate_additive(
        genotypes,
        &EffectSizes::Gaussian { causal_proportion },
        heritability,
        prevalence,
        rng,
    )
}

/// Liability-threshold simulation for any additive effect description.
pub fn simulate_additive<R: Rng + ?Sized>(
    genotypes: ArrayView2<u8>,
    effects: &EffectSizes,
    heritability: f64,
    prevalence: f64,
    rng: &mut R,
) -> Result<PhenotypeSimulation, SimulationError> {
    validate_heritability(heritability)?;
    let threshold = liability_threshold(prevalence)?;

    let (effects, causal_mask) = resolve_effects(genotypes.ncols(), effects, rng)?;
    let genetic_score = genotypes.mapv(f64::from).dot(&effects);
    let out = apply_liability_threshold(genetic_score.view(), heritability, threshold, rng)?;

    Ok(PhenotypeSimulation {
        phenotype: out.phenotype,
        causal_mask,
        effects,
        genetic_score,
        liability: out.liability,
        threshold: out.threshold,
        environmental_variance: out.environmental_variance,
    })
}

impl PairwiseArchitecture {
    /// Pairs columns `(0, 1), (2, 3), …` with `pair_effects` in order.
    ///
    /// An empty `main_effects` means no main effects at all.
    pub fn consecutive_pairs(
        n_variants: usize,
        main_effects: Vec<f64>,
        pair_effects: &[f64],
    ) -> Result<Self, SimulationError> {
        let main_effects = if main_effects.is_empty() {
            vec![0.0; n_variants]
        } else {
            main_effects
        };
        if pair_effects.len() > n_variants / 2 {
            return Err(SimulationError::invalid(
                "pair_effects",
                format!(
                    "{} pair effects need {} columns, only {n_variants} available",
                    pair_effects.len(),
                    2 * pair_effects.len()
                ),
            ));
        }
        let interactions = pair_effects
            .iter()
            .enumerate()
            .map(|(i, &effect)| Interaction {
                left: 2 * i,
                right: 2 * i + 1,
                effect,
            })
            .collect();
        let arch = Self {
            main_effects,
            interactions,
        };
        arch.validate(n_variants)?;
        Ok(arch)
    }

    pub fn validate(&self, n_variants: usize) -> Result<(), SimulationError> {
        if self.main_effects.len() != n_variants {
            return Err(SimulationError::DimensionMismatch {
                what: "main effects",
                expected: n_variants,
                found: self.main_effects.len(),
            });
        }
        for term in &self.interactions {
            if term.left >= n_variants || term.right >= n_variants {
                return Err(SimulationError::invalid(
                    "interactions",
                    format!(
                        "pair ({}, {}) is outside {n_variants} columns",
                        term.left, term.right
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Variants with a non-zero main effect or in a non-zero interaction.
    pub fn causal_mask(&self) -> Result<Array1<bool>, SimulationError> {
        self.validate(self.main_effects.len())?;
        let mut mask = Array1::from_iter(self.main_effects.iter().map(|&b| b != 0.0));
        for term in self.interactions.iter().filter(|t| t.effect != 0.0) {
            mask[term.left] = true;
            mask[term.right] = true;
        }
        Ok(mask)
    }

    /// `X·main + Σ effect · x_left ∘ x_right`.
    pub fn genetic_score(&self, genotypes: ArrayView2<f64>) -> Result<Array1<f64>, SimulationError> {
        self.validate(genotypes.ncols())?;
        let mut score = genotypes.dot(&Array1::from(self.main_effects.clone()));
        for term in self.interactions.iter().filter(|t| t.effect != 0.0) {
            Zip::from(&mut score)
                .and(genotypes.column(term.left))
                .and(genotypes.column(term.right))
                .for_each(|s, &a, &b| *s += term.effect * a * b);
        }
        Ok(score)
    }
}

/// Liability-threshold simulation with additive main effects plus pairwise
/// multiplicative interactions.
pub fn simulate_pairwise<R: Rng + ?Sized>(
    genotypes: ArrayView2<u8>,
    architecture: &PairwiseArchitecture,
    heritability: f64,
    prevalence: f64,
    rng: &mut R,
) -> Result<PhenotypeSimulation, SimulationError> {
    validate_heritability(heritability)?;
    let threshold = liability_threshold(prevalence)?;
    architecture.validate(genotypes.ncols())?;

    let causal_mask = architecture.causal_mask()?;
    if !causal_mask.iter().any(|&c| c) {
        return Err(SimulationError::NoCausalVariants {
            variants: genotypes.ncols(),
            proportion: 0.0,
        });
    }

    let genetic_score = architecture.genetic_score(genotypes.mapv(f64::from).view())?;
    let out = apply_liability_threshold(genetic_score.view(), heritability, threshold, rng)?;

    Ok(PhenotypeSimulation {
        phenotype: out.phenotype,
        causal_mask,
        effects: Array1::from(architecture.main_effects.clone()),
        genetic_score,
        liability: out.liability,
        threshold: out.threshold,
        environmental_variance: out.environmental_variance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::simulate_genotypes;
    use ndarray::{Array2, array};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn causal_count_floors() {
        assert_eq!(causal_count(10, 0.25), 2);
        assert_eq!(causal_count(100, 0.29), 29);
        assert_eq!(causal_count(9, 0.1), 0);
    }

    #[test]
    fn mask_size_matches_floor() {
        let mut rng = StdRng::seed_from_u64(12);
        let g = simulate_genotypes(300, 37, (0.1, 0.5), &mut rng).unwrap();
        let sim = simulate_y(g.dosages.view(), 0.3, 0.5, 0.1, &mut rng).unwrap();
        assert_eq!(sim.n_causal(), causal_count(37, 0.3));
        for (&b, &c) in sim.effects.iter().zip(sim.causal_mask.iter()) {
            assert_eq!(b != 0.0, c);
        }
        assert!(sim.phenotype.iter().all(|&y| y <= 1));
    }

    #[test]
    fn zero_causal_count_fails_fast() {
        let mut rng = StdRng::seed_from_u64(1);
        let g = simulate_genotypes(50, 9, (0.1, 0.5), &mut rng).unwrap();
        let err = simulate_y(g.dosages.view(), 0.1, 0.5, 0.1, &mut rng).unwrap_err();
        assert!(matches!(err, SimulationError::NoCausalVariants { variants: 9, .. }));
    }

    #[test]
    fn degenerate_heritability_is_rejected() {
        let mut rng = StdRng::seed_from_u64(2);
        let g = simulate_genotypes(200, 10, (0.1, 0.5), &mut rng).unwrap();
        let err = simulate_y(g.dosages.view(), 0.5, 1.0, 0.1, &mut rng).unwrap_err();
        assert!(matches!(err, SimulationError::NonPositiveVariance { .. }));
        let err = simulate_y(g.dosages.view(), 0.5, 0.0, 0.1, &mut rng).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidParameter { .. }));
        let err = simulate_y(g.dosages.view(), 0.5, 0.5, 1.0, &mut rng).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidParameter { .. }));
    }

    #[test]
    fn constant_genotypes_have_no_genetic_variance() {
        let mut rng = StdRng::seed_from_u64(3);
        let x = Array2::<u8>::ones((100, 4));
        let err = simulate_y(x.view(), 0.5, 0.5, 0.1, &mut rng).unwrap_err();
        assert!(matches!(err, SimulationError::NonPositiveVariance { .. }));
    }

    #[test]
    fn fixed_effects_are_used_verbatim() {
        let mut rng = StdRng::seed_from_u64(4);
        let g = simulate_genotypes(500, 3, (0.2, 0.5), &mut rng).unwrap();
        let effects = EffectSizes::Fixed(vec![0.5, 0.0, -0.25]);
        let sim = simulate_additive(g.dosages.view(), &effects, 0.6, 0.2, &mut rng).unwrap();
        assert_eq!(sim.causal_mask, array![true, false, true]);
        let expected = g.to_f64().dot(&array![0.5, 0.0, -0.25]);
        assert_eq!(sim.genetic_score, expected);

        let wrong = EffectSizes::Fixed(vec![0.5]);
        assert!(simulate_additive(g.dosages.view(), &wrong, 0.6, 0.2, &mut rng).is_err());
    }

    #[test]
    fn consecutive_pairs_build_interaction_terms() {
        let arch = PairwiseArchitecture::consecutive_pairs(6, vec![], &[0.5, 0.0, 1.0]).unwrap();
        assert_eq!(arch.interactions[2], Interaction { left: 4, right: 5, effect: 1.0 });
        assert_eq!(arch.causal_mask().unwrap(), array![true, true, false, false, true, true]);

        let x = array![[1.0, 2.0, 0.0, 0.0, 2.0, 2.0], [0.0, 1.0, 1.0, 1.0, 1.0, 0.0]];
        let score = arch.genetic_score(x.view()).unwrap();
        assert_eq!(score, array![1.0 + 4.0, 0.0]);

        assert!(PairwiseArchitecture::consecutive_pairs(5, vec![], &[0.1, 0.1, 0.1]).is_err());
    }

    #[test]
    fn out_of_range_pairs_are_reported_not_indexed() {
        let arch = PairwiseArchitecture {
            main_effects: vec![0.0; 4],
            interactions: vec![Interaction { left: 2, right: 7, effect: 0.3 }],
        };
        assert!(matches!(
            arch.causal_mask(),
            Err(SimulationError::InvalidParameter { name: "interactions", .. })
        ));
    }
}
