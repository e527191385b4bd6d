//! Run configuration for a cohort simulation, persisted as TOML.

use crate::genotype::validate_maf_range;
use crate::ld::{LdSource, validate_r2_range};
use crate::phenotype::causal_count;
use crate::types::SimulationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] SimulationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenotypeConfig {
    pub samples: usize,
    pub variants: usize,
    pub maf_range: (f64, f64),
}

/// Batch LD replacement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdConfig {
    /// Proportion of columns left untouched.
    pub retain_proportion: f64,
    pub r2_range: (f64, f64),
    #[serde(default)]
    pub source: LdSource,
}

/// LD blocks appended after the base matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdBlockConfig {
    /// Number of base columns that each seed one block.
    pub sources: usize,
    pub block_size: usize,
    #[serde(default = "default_block_r2_range")]
    pub r2_range: (f64, f64),
}

fn default_block_r2_range() -> (f64, f64) {
    crate::ld::DEFAULT_BLOCK_R2_RANGE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PhenotypeConfig {
    Gaussian {
        causal_proportion: f64,
        heritability: f64,
        prevalence: f64,
    },
    Pairwise {
        #[serde(default)]
        main_effects: Vec<f64>,
        #[serde(default)]
        pair_effects: Vec<f64>,
        heritability: f64,
        prevalence: f64,
    },
}

impl PhenotypeConfig {
    pub fn heritability(&self) -> f64 {
        match self {
            Self::Gaussian { heritability, .. } | Self::Pairwise { heritability, .. } => {
                *heritability
            }
        }
    }

    pub fn prevalence(&self) -> f64 {
        match self {
            Self::Gaussian { prevalence, .. } | Self::Pairwise { prevalence, .. } => *prevalence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub genotypes: GenotypeConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ld: Option<LdConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ld_blocks: Option<LdBlockConfig>,
    pub phenotype: PhenotypeConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            genotypes: GenotypeConfig {
                samples: 10_000,
                variants: 100,
                maf_range: (0.05, 0.5),
            },
            ld: Some(LdConfig {
                retain_proportion: 0.8,
                r2_range: (0.2, 0.8),
                source: LdSource::SelfColumn,
            }),
            ld_blocks: None,
            phenotype: PhenotypeConfig::Gaussian {
                causal_proportion: 0.1,
                heritability: 0.5,
                prevalence: 0.1,
            },
        }
    }
}

impl SimulationConfig {
    /// Column count after LD blocks are appended.
    pub fn total_variants(&self) -> usize {
        let extra = self
            .ld_blocks
            .as_ref()
            .map_or(0, |b| b.sources * b.block_size);
        self.genotypes.variants + extra
    }

    /// Checks every parameter before any work starts.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let g = &self.genotypes;
        if g.samples == 0 {
            return Err(SimulationError::invalid("genotypes.samples", "must be positive"));
        }
        if g.variants == 0 {
            return Err(SimulationError::invalid("genotypes.variants", "must be positive"));
        }
        validate_maf_range(g.maf_range.0, g.maf_range.1)?;

        if let Some(ld) = &self.ld {
            if !(0.0..=1.0).contains(&ld.retain_proportion) {
                return Err(SimulationError::invalid(
                    "ld.retain_proportion",
                    format!("must lie in [0, 1], got {}", ld.retain_proportion),
                ));
            }
            validate_r2_range(ld.r2_range)?;
        }

        if let Some(blocks) = &self.ld_blocks {
            if blocks.sources > g.variants {
                return Err(SimulationError::invalid(
                    "ld_blocks.sources",
                    format!("{} exceeds the {} base variants", blocks.sources, g.variants),
                ));
            }
            if blocks.block_size == 0 {
                return Err(SimulationError::invalid("ld_blocks.block_size", "must be positive"));
            }
            validate_r2_range(blocks.r2_range)?;
        }

        let heritability = self.phenotype.heritability();
        if heritability.is_nan() || heritability <= 0.0 {
            return Err(SimulationError::invalid(
                "phenotype.heritability",
                format!("must lie strictly between 0 and 1, got {heritability}"),
            ));
        }
        if heritability >= 1.0 {
            return Err(SimulationError::NonPositiveVariance {
                genetic_variance: f64::NAN,
                heritability,
            });
        }
        let prevalence = self.phenotype.prevalence();
        if !(prevalence > 0.0 && prevalence < 1.0) {
            return Err(SimulationError::invalid(
                "phenotype.prevalence",
                format!("must lie strictly between 0 and 1, got {prevalence}"),
            ));
        }

        let p = self.total_variants();
        match &self.phenotype {
            PhenotypeConfig::Gaussian {
                causal_proportion, ..
            } => {
                if !(0.0..=1.0).contains(causal_proportion) {
                    return Err(SimulationError::invalid(
                        "phenotype.causal_proportion",
                        format!("must lie in [0, 1], got {causal_proportion}"),
                    ));
                }
                if causal_count(p, *causal_proportion) == 0 {
                    return Err(SimulationError::NoCausalVariants {
                        variants: p,
                        proportion: *causal_proportion,
                    });
                }
            }
            PhenotypeConfig::Pairwise {
                main_effects,
                pair_effects,
                ..
            } => {
                if !main_effects.is_empty() && main_effects.len() != p {
                    return Err(SimulationError::DimensionMismatch {
                        what: "phenotype.main_effects",
                        expected: p,
                        found: main_effects.len(),
                    });
                }
                if pair_effects.len() > p / 2 {
                    return Err(SimulationError::invalid(
                        "phenotype.pair_effects",
                        format!("{} pairs do not fit in {p} variants", pair_effects.len()),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Saves the configuration in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads and validates a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid_and_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        let config = SimulationConfig::default();
        config.validate().unwrap();
        config.save(&path).unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn parses_pairwise_model() {
        let text = r#"
seed = 7

[genotypes]
samples = 1000
variants = 10
maf_range = [0.35, 0.5]

[phenotype]
model = "pairwise"
pair_effects = [0.01, 0.01, 0.0, 0.0, 0.0]
heritability = 0.8
prevalence = 0.2
"#;
        let config: SimulationConfig = toml::from_str(text).unwrap();
        config.validate().unwrap();
        assert!(config.ld.is_none());
        match config.phenotype {
            PhenotypeConfig::Pairwise {
                ref main_effects,
                ref pair_effects,
                ..
            } => {
                assert!(main_effects.is_empty());
                assert_eq!(pair_effects.len(), 5);
            }
            PhenotypeConfig::Gaussian { .. } => panic!("expected pairwise model"),
        }
    }

    #[test]
    fn validation_names_the_offending_field() {
        let mut config = SimulationConfig::default();
        config.genotypes.maf_range = (0.5, 0.1);
        assert!(matches!(
            config.validate(),
            Err(SimulationError::InvalidParameter { name: "maf_range", .. })
        ));

        let mut config = SimulationConfig::default();
        config.phenotype = PhenotypeConfig::Gaussian {
            causal_proportion: 0.001,
            heritability: 0.5,
            prevalence: 0.1,
        };
        assert!(matches!(
            config.validate(),
            Err(SimulationError::NoCausalVariants { .. })
        ));

        let mut config = SimulationConfig::default();
        config.ld_blocks = Some(LdBlockConfig {
            sources: 2,
            block_size: 0,
            r2_range: (0.1, 0.9),
        });
        assert!(config.validate().is_err());

        for heritability in [1.0, 1.5] {
            let mut config = SimulationConfig::default();
            config.phenotype = PhenotypeConfig::Gaussian {
                causal_proportion: 0.1,
                heritability,
                prevalence: 0.1,
            };
            assert!(matches!(
                config.validate(),
                Err(SimulationError::NonPositiveVariance { .. })
            ));
        }

        let mut config = SimulationConfig::default();
        config.phenotype = PhenotypeConfig::Gaussian {
            causal_proportion: 0.1,
            heritability: f64::NAN,
            prevalence: 0.1,
        };
        assert!(matches!(
            config.validate(),
            Err(SimulationError::InvalidParameter { name: "phenotype.heritability", .. })
        ));
    }

    #[test]
    fn blocks_widen_the_variant_count() {
        let mut config = SimulationConfig::default();
        config.ld_blocks = Some(LdBlockConfig {
            sources: 3,
            block_size: 4,
            r2_range: (0.1, 0.9),
        });
        assert_eq!(config.total_variants(), 112);
    }
}
