#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod genotype;
pub mod io;
pub mod ld;
pub mod phenotype;
pub mod pipeline;
pub mod stats;
pub mod types;

#[path = "../shared/files.rs"]
pub mod shared_files;
#[path = "../shared/vcf.rs"]
pub mod shared_vcf;
pub mod shared {
    pub use super::shared_files as files;
    pub use super::shared_vcf as vcf;
}

#[path = "../fit/mod.rs"]
pub mod fit;
