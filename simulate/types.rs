//! # Shared Simulation Types
//!
//! The in-memory entities that flow between the simulation stages, plus the
//! error taxonomy every stage reports through. All of them are plain owned
//! arrays with no lifecycle beyond a single run.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameter-validation failures raised by the statistical routines.
///
/// Every variant is local and non-recoverable within the routine that raised it:
/// the caller has to supply corrected parameters and call again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(
        "Environmental variance is not positive (genetic variance {genetic_variance:.6e}, liability-scale heritability {heritability}). Heritability must lie strictly between 0 and 1 and the genetic score must vary."
    )]
    NonPositiveVariance {
        genetic_variance: f64,
        heritability: f64,
    },

    #[error(
        "No causal variants: a causal proportion of {proportion} over {variants} variants rounds down to zero."
    )]
    NoCausalVariants { variants: usize, proportion: f64 },

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

impl SimulationError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Genotype dosages together with the allele frequencies they were drawn from.
#[derive(Debug, Clone)]
pub struct GenotypeMatrix {
    /// Minor-allele dosages in {0, 1, 2}. Shape: [n_samples, n_variants].
    pub dosages: Array2<u8>,
    /// The per-variant frequency each column was drawn with.
    pub maf: Array1<f64>,
}

impl GenotypeMatrix {
    pub fn n_samples(&self) -> usize {
        self.dosages.nrows()
    }

    pub fn n_variants(&self) -> usize {
        self.dosages.ncols()
    }

    /// Dosages as floating point, the form every downstream product needs.
    pub fn to_f64(&self) -> Array2<f64> {
        self.dosages.mapv(f64::from)
    }
}

/// How effect sizes are assigned to variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSizes {
    /// One effect per variant, used as given. Zero entries are non-causal.
    Fixed(Vec<f64>),
    /// `floor(p * causal_proportion)` effects drawn from Normal(0, 1) at uniformly
    /// random positions; every other effect is exactly zero.
    Gaussian { causal_proportion: f64 },
}

/// A multiplicative interaction between two variant columns (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub left: usize,
    pub right: usize,
    pub effect: f64,
}

/// Additive main effects plus pairwise products of dosages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseArchitecture {
    pub main_effects: Vec<f64>,
    pub interactions: Vec<Interaction>,
}

/// Everything the liability-threshold simulator produces for one cohort.
#[derive(Debug, Clone)]
pub struct PhenotypeSimulation {
    /// Binary outcome: 1 iff the standardised liability exceeds `threshold`.
    pub phenotype: Array1<u8>,
    /// True for the variants that carry a non-zero effect.
    pub causal_mask: Array1<bool>,
    /// The main-effect vector actually used (zeros at non-causal positions).
    pub effects: Array1<f64>,
    /// Genetic contribution to liability, before noise.
    pub genetic_score: Array1<f64>,
    /// Liability after noise, standardised to zero mean and unit variance.
    pub liability: Array1<f64>,
    /// `Φ⁻¹(1 − prevalence)`.
    pub threshold: f64,
    /// Environmental variance used for the noise draw.
    pub environmental_variance: f64,
}

impl PhenotypeSimulation {
    pub fn n_causal(&self) -> usize {
        self.causal_mask.iter().filter(|&&c| c).count()
    }

    /// Fraction of observations with phenotype 1.
    pub fn case_fraction(&self) -> f64 {
        if self.phenotype.is_empty() {
            return 0.0;
        }
        let cases = self.phenotype.iter().filter(|&&y| y == 1).count();
        cases as f64 / self.phenotype.len() as f64
    }
}
