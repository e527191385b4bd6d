use std::fs;
use std::process::Command;

use genosim::config::SimulationConfig;
use tempfile::tempdir;

const SMALL_CONFIG: &str = r#"
seed = 11

[genotypes]
samples = 400
variants = 20
maf_range = [0.1, 0.5]

[ld]
retain_proportion = 0.8
r2_range = [0.2, 0.8]

[phenotype]
model = "gaussian"
causal_proportion = 0.25
heritability = 0.6
prevalence = 0.3
"#;

#[test]
fn init_config_writes_the_defaults() {
    let tmp = tempdir().expect("temporary directory");
    let out = tmp.path().join("run.toml");
    let status = Command::new(env!("CARGO_BIN_EXE_genosim"))
        .args(["init-config", "--out", out.to_str().expect("path str")])
        .status()
        .expect("run genosim");
    assert!(status.success(), "CLI exited with status {status:?}");
    assert_eq!(SimulationConfig::load(&out).unwrap(), SimulationConfig::default());
}

#[test]
fn simulate_then_fit() {
    let tmp = tempdir().expect("temporary directory");
    let config = tmp.path().join("run.toml");
    fs::write(&config, SMALL_CONFIG).expect("write config");
    let cohort_dir = tmp.path().join("cohort");

    let status = Command::new(env!("CARGO_BIN_EXE_genosim"))
        .args([
            "simulate",
            "--config",
            config.to_str().expect("path str"),
            "--out",
            cohort_dir.to_str().expect("path str"),
        ])
        .status()
        .expect("run genosim simulate");
    assert!(status.success(), "simulate exited with status {status:?}");
    for name in ["genotypes.tsv", "phenotype.tsv", "causal.tsv"] {
        assert!(cohort_dir.join(name).exists(), "{name} missing");
    }

    let output = Command::new(env!("CARGO_BIN_EXE_genosim"))
        .args([
            "fit",
            "--genotypes",
            cohort_dir.join("genotypes.tsv").to_str().expect("path str"),
            "--phenotype",
            cohort_dir.join("phenotype.tsv").to_str().expect("path str"),
            "--causal",
            cohort_dir.join("causal.tsv").to_str().expect("path str"),
            "--folds",
            "3",
            "--n-lambda",
            "6",
        ])
        .output()
        .expect("run genosim fit");
    assert!(output.status.success(), "fit failed: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("JSON report");
    assert_eq!(report["n_variants"], 20);
    assert!(report["test_auc"].as_f64().is_some());
}

#[test]
fn invalid_config_exits_with_an_error() {
    let tmp = tempdir().expect("temporary directory");
    let config = tmp.path().join("bad.toml");
    fs::write(&config, SMALL_CONFIG.replace("heritability = 0.6", "heritability = 1.5"))
        .expect("write config");
    let output = Command::new(env!("CARGO_BIN_EXE_genosim"))
        .args([
            "simulate",
            "--config",
            config.to_str().expect("path str"),
            "--out",
            tmp.path().join("out").to_str().expect("path str"),
        ])
        .output()
        .expect("run genosim simulate");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("heritability"));
}
