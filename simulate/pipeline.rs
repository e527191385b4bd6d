//! # Cohort Simulation Pipeline
//!
//! Chains the stages in order: genotypes, optional batch LD replacement,
//! optional LD blocks, then the liability-threshold phenotype. Each stage is a
//! pure function of its inputs and the shared generator.

use crate::config::{ConfigError, PhenotypeConfig, SimulationConfig};
use crate::genotype::simulate_genotypes;
use crate::ld::{expand_with_blocks, replace_with_ld};
use crate::phenotype::{simulate_pairwise, simulate_y};
use crate::stats::observed_maf;
use crate::types::{PairwiseArchitecture, PhenotypeSimulation, SimulationError};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// A fully simulated cohort.
#[derive(Debug, Clone)]
pub struct SimulatedCohort {
    /// Final dosage matrix, LD blocks included. Shape: [samples, total_variants].
    pub genotypes: Array2<u8>,
    /// Frequency each base column was drawn with; block columns inherit their source's.
    pub maf: Array1<f64>,
    /// Columns rewritten by batch LD replacement.
    pub ld_replaced: Vec<usize>,
    /// `(source column, first block column, block size)` per appended block.
    pub blocks: Vec<(usize, usize, usize)>,
    pub phenotype: PhenotypeSimulation,
}

impl SimulatedCohort {
    pub fn sample_ids(&self) -> Vec<String> {
        (1..=self.genotypes.nrows()).map(|i| format!("sample{i}")).collect()
    }

    pub fn variant_ids(&self) -> Vec<String> {
        (1..=self.genotypes.ncols()).map(|j| format!("snp{j}")).collect()
    }
}

/// Runs every configured stage with the given generator.
pub fn simulate_cohort<R: Rng + ?Sized>(
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<SimulatedCohort, SimulationError> {
    config.validate()?;

    let g = &config.genotypes;
    let base = simulate_genotypes(g.samples, g.variants, g.maf_range, rng)?;
    log::info!(
        "Generated {} samples x {} variants (mean drawn MAF {:.3})",
        base.n_samples(),
        base.n_variants(),
        base.maf.mean().unwrap_or(0.0)
    );

    let mut genotypes = base.dosages;
    let mut maf = base.maf;

    let mut ld_replaced = Vec::new();
    if let Some(ld) = &config.ld {
        let replacement = replace_with_ld(
            genotypes.view(),
            ld.retain_proportion,
            ld.r2_range,
            ld.source,
            rng,
        )?;
        for (&j, &s) in replacement.replaced.iter().zip(&replacement.sources) {
            maf[j] = maf[s];
        }
        genotypes = replacement.dosages;
        ld_replaced = replacement.replaced;
    }

    let mut blocks = Vec::new();
    if let Some(block_config) = &config.ld_blocks {
        let expansion = expand_with_blocks(
            genotypes.view(),
            block_config.sources,
            block_config.block_size,
            block_config.r2_range,
            rng,
        )?;
        let mut widened = maf.to_vec();
        for &(source, _, size) in &expansion.blocks {
            widened.extend(std::iter::repeat_n(maf[source], size));
        }
        maf = Array1::from(widened);
        genotypes = expansion.dosages;
        blocks = expansion.blocks;
        log::info!(
            "Appended {} LD blocks; matrix is now {} variants wide",
            blocks.len(),
            genotypes.ncols()
        );
    }

    let phenotype = match &config.phenotype {
        PhenotypeConfig::Gaussian {
            causal_proportion,
            heritability,
            prevalence,
        } => simulate_y(
            genotypes.view(),
            *causal_proportion,
            *heritability,
            *prevalence,
            rng,
        )?,
        PhenotypeConfig::Pairwise {
            main_effects,
            pair_effects,
            heritability,
            prevalence,
        } => {
            let architecture = PairwiseArchitecture::consecutive_pairs(
                genotypes.ncols(),
                main_effects.clone(),
                pair_effects,
            )?;
            simulate_pairwise(
                genotypes.view(),
                &architecture,
                *heritability,
                *prevalence,
                rng,
            )?
        }
    };

    let observed = observed_maf(genotypes.view());
    log::info!(
        "Phenotype: {} causal variants, case fraction {:.4} (target {}), mean observed MAF {:.3}",
        phenotype.n_causal(),
        phenotype.case_fraction(),
        config.phenotype.prevalence(),
        observed.mean().unwrap_or(0.0)
    );

    Ok(SimulatedCohort {
        genotypes,
        maf,
        ld_replaced,
        blocks,
        phenotype,
    })
}

/// Loads a configuration and runs it with a generator seeded from `config.seed`.
pub fn run_from_config(path: &Path) -> Result<(SimulationConfig, SimulatedCohort), ConfigError> {
    let config = SimulationConfig::load(path)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let cohort = simulate_cohort(&config, &mut rng)?;
    Ok((config, cohort))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenotypeConfig, LdBlockConfig, LdConfig};
    use crate::ld::LdSource;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            seed: 99,
            genotypes: GenotypeConfig {
                samples: 400,
                variants: 20,
                maf_range: (0.1, 0.5),
            },
            ld: Some(LdConfig {
                retain_proportion: 0.5,
                r2_range: (0.3, 0.7),
                source: LdSource::Retained,
            }),
            ld_blocks: Some(LdBlockConfig {
                sources: 2,
                block_size: 3,
                r2_range: (0.1, 0.9),
            }),
            phenotype: PhenotypeConfig::Gaussian {
                causal_proportion: 0.2,
                heritability: 0.5,
                prevalence: 0.2,
            },
        }
    }

    #[test]
    fn cohort_has_consistent_shapes() {
        let config = small_config();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let cohort = simulate_cohort(&config, &mut rng).unwrap();
        assert_eq!(cohort.genotypes.dim(), (400, 26));
        assert_eq!(cohort.maf.len(), 26);
        assert_eq!(cohort.ld_replaced.len(), 10);
        assert_eq!(cohort.blocks.len(), 2);
        assert_eq!(cohort.phenotype.phenotype.len(), 400);
        assert_eq!(cohort.phenotype.n_causal(), 5);
        assert_eq!(cohort.variant_ids().len(), 26);
        assert_eq!(cohort.sample_ids()[0], "sample1");
    }

    #[test]
    fn same_seed_same_cohort() {
        let config = small_config();
        let a = simulate_cohort(&config, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = simulate_cohort(&config, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a.genotypes, b.genotypes);
        assert_eq!(a.phenotype.phenotype, b.phenotype.phenotype);
        assert_eq!(a.phenotype.causal_mask, b.phenotype.causal_mask);
    }
}
