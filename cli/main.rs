#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::process;

use genosim::config::SimulationConfig;
use genosim::fit::harness::{HarnessConfig, run_harness};
use genosim::io::{read_causal_tsv, read_genotype_tsv, read_phenotype_tsv, write_cohort, write_genotype_tsv};
use genosim::pipeline::run_from_config;
use genosim::shared::vcf::{Region, VcfReadOptions, read_vcf_region};

#[derive(Args)]
pub struct FitArgs {
    /// Genotype dosage TSV (sample_id followed by one column per variant)
    #[arg(long)]
    pub genotypes: PathBuf,

    /// Phenotype TSV with a 0/1 `phenotype` column
    #[arg(long)]
    pub phenotype: PathBuf,

    /// Causal-variant TSV with a 0/1 `causal` column
    #[arg(long)]
    pub causal: PathBuf,

    /// Elastic-net mixing parameter (1 = lasso, 0 = ridge)
    #[arg(long, default_value = "0.5")]
    pub alpha: f64,

    /// Number of cross-validation folds
    #[arg(long, default_value = "5")]
    pub folds: usize,

    /// Number of penalty values on the regularisation path
    #[arg(long, default_value = "20")]
    pub n_lambda: usize,

    /// Fraction of each class held out for the final evaluation
    #[arg(long, default_value = "0.2")]
    pub test_fraction: f64,

    /// Size of the top-ranked variant set compared with the causal set
    #[arg(long)]
    pub top_k: Option<usize>,

    #[arg(long, default_value = "42")]
    pub seed: u64,
}

#[derive(Args)]
pub struct VcfArgs {
    /// VCF file, plain or gzip-compressed
    #[arg(long)]
    pub input: PathBuf,

    /// Region as CHROM, CHROM:POS or CHROM:START-END
    #[arg(long)]
    pub region: String,

    /// Drop variants whose observed minor-allele frequency is below this
    #[arg(long, default_value = "0.0")]
    pub min_maf: f64,

    /// Stop after this many variants have been kept
    #[arg(long)]
    pub max_variants: Option<usize>,

    /// Treat missing calls as reference instead of failing
    #[arg(long)]
    pub missing_as_ref: bool,

    /// Output dosage TSV
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Parser)]
#[command(
    name = "genosim",
    about = "Genotype, linkage-disequilibrium and case/control phenotype simulator",
    long_about = "Simulates genotype matrices with controllable linkage disequilibrium, \
                 draws liability-threshold case/control phenotypes, and evaluates penalised \
                 logistic models against the known causal variants."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a cohort from a TOML configuration
    #[command(about = "Simulate a cohort (outputs: genotypes.tsv, phenotype.tsv, causal.tsv)")]
    Simulate {
        #[arg(long)]
        config: PathBuf,

        /// Directory the three TSV files are written into
        #[arg(long)]
        out: PathBuf,
    },

    /// Fit an elastic-net logistic model and score it against the causal set
    #[command(about = "Cross-validated elastic-net fit (outputs: JSON report on stdout)")]
    Fit(FitArgs),

    /// Extract a dosage matrix for a region of a VCF
    #[command(about = "Convert a VCF region into a dosage TSV")]
    Vcf(VcfArgs),

    /// Write the default simulation configuration
    #[command(about = "Write a default configuration (outputs: TOML)")]
    InitConfig {
        #[arg(long, default_value = "run.toml")]
        out: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Simulate { config, out }) => run_simulate(config, out),
        Some(Commands::Fit(args)) => run_fit(args),
        Some(Commands::Vcf(args)) => run_vcf(args),
        Some(Commands::InitConfig { out }) => run_init_config(out),
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(|e| e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_simulate(config: PathBuf, out: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let (config, cohort) = run_from_config(&config)?;
    let files = write_cohort(&cohort, &out)?;
    log::info!(
        "Wrote {} samples x {} variants (seed {}) to {}, {} and {}",
        cohort.genotypes.nrows(),
        cohort.genotypes.ncols(),
        config.seed,
        files.genotypes.display(),
        files.phenotype.display(),
        files.causal.display()
    );
    Ok(())
}

fn run_fit(args: FitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let table = read_genotype_tsv(&args.genotypes)?;
    let phenotype = read_phenotype_tsv(&args.phenotype)?;
    let causal = read_causal_tsv(&args.causal)?;

    let config = HarnessConfig {
        alpha: args.alpha,
        folds: args.folds,
        n_lambda: args.n_lambda,
        test_fraction: args.test_fraction,
        top_k: args.top_k,
        seed: args.seed,
        ..HarnessConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(config.seed);
    let report = run_harness(
        table.dosages.view(),
        phenotype.view(),
        causal.view(),
        &config,
        &mut rng,
    )?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_vcf(args: VcfArgs) -> Result<(), Box<dyn std::error::Error>> {
    let region: Region = args.region.parse()?;
    let options = VcfReadOptions {
        min_maf: args.min_maf,
        max_variants: args.max_variants,
        missing_as_ref: args.missing_as_ref,
    };
    let genotypes = read_vcf_region(&args.input, &region, &options)?;
    write_genotype_tsv(
        &args.out,
        &genotypes.sample_ids,
        &genotypes.variant_ids,
        genotypes.dosages.view(),
    )?;
    log::info!(
        "Wrote {} variants for {} samples in {} to {}",
        genotypes.variant_ids.len(),
        genotypes.sample_ids.len(),
        region,
        args.out.display()
    );
    Ok(())
}

fn run_init_config(out: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    SimulationConfig::default().save(&out)?;
    log::info!("Wrote the default configuration to {}", out.display());
    Ok(())
}
