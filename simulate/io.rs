//! Tab-separated files for simulated cohorts.
//!
//! - `genotypes.tsv`: `sample_id` followed by one dosage column per variant.
//! - `phenotype.tsv`: `sample_id`, `phenotype`, `liability`.
//! - `causal.tsv`: `variant`, `causal`, `effect`.

use crate::pipeline::SimulatedCohort;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const GENOTYPE_FILE: &str = "genotypes.tsv";
pub const PHENOTYPE_FILE: &str = "phenotype.tsv";
pub const CAUSAL_FILE: &str = "causal.tsv";

#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Error reading or writing delimited text: {0}")]
    CsvError(#[from] csv::Error),
    #[error("The required column '{0}' was not found in the header.")]
    ColumnNotFound(String),
    #[error("Line {line}: column '{column}' holds '{value}', which is not a valid {expected}.")]
    InvalidCell {
        line: u64,
        column: String,
        value: String,
        expected: &'static str,
    },
    #[error("Line {line}: expected {expected} fields, found {found}.")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("Table has {found} rows, expected {expected}.")]
    RowCountMismatch { expected: usize, found: usize },
}

/// A dosage matrix with its row and column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeTable {
    pub sample_ids: Vec<String>,
    pub variant_ids: Vec<String>,
    pub dosages: Array2<u8>,
}

fn tsv_reader(path: &Path) -> Result<csv::Reader<fs::File>, TableError> {
    Ok(ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)?)
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<fs::File>, TableError> {
    Ok(WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, TableError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
}

fn parse_cell<T: std::str::FromStr>(
    record: &StringRecord,
    idx: usize,
    column: &str,
    expected: &'static str,
) -> Result<T, TableError> {
    let raw = record.get(idx).unwrap_or("");
    raw.trim().parse::<T>().map_err(|_| TableError::InvalidCell {
        line: line_of(record),
        column: column.to_string(),
        value: raw.to_string(),
        expected,
    })
}

pub fn write_genotype_tsv(
    path: &Path,
    sample_ids: &[String],
    variant_ids: &[String],
    dosages: ArrayView2<u8>,
) -> Result<(), TableError> {
    if sample_ids.len() != dosages.nrows() {
        return Err(TableError::RowCountMismatch {
            expected: dosages.nrows(),
            found: sample_ids.len(),
        });
    }
    let mut writer = tsv_writer(path)?;
    let mut header = Vec::with_capacity(variant_ids.len() + 1);
    header.push("sample_id");
    header.extend(variant_ids.iter().map(String::as_str));
    writer.write_record(&header)?;

    let mut row = Vec::with_capacity(dosages.ncols() + 1);
    for (id, dosage_row) in sample_ids.iter().zip(dosages.rows()) {
        row.clear();
        row.push(id.clone());
        row.extend(dosage_row.iter().map(|d| d.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_genotype_tsv(path: &Path) -> Result<GenotypeTable, TableError> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers()?.clone();
    if headers.get(0) != Some("sample_id") {
        return Err(TableError::ColumnNotFound("sample_id".to_string()));
    }
    let variant_ids: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    let width = headers.len();

    let mut sample_ids = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != width {
            return Err(TableError::RaggedRow {
                line: line_of(&record),
                expected: width,
                found: record.len(),
            });
        }
        sample_ids.push(record[0].to_string());
        for (k, variant) in variant_ids.iter().enumerate() {
            let dosage: u8 = parse_cell(&record, k + 1, variant, "dosage (0, 1 or 2)")?;
            if dosage > 2 {
                return Err(TableError::InvalidCell {
                    line: line_of(&record),
                    column: variant.clone(),
                    value: dosage.to_string(),
                    expected: "dosage (0, 1 or 2)",
                });
            }
            values.push(dosage);
        }
    }

    let dosages = Array2::from_shape_vec((sample_ids.len(), variant_ids.len()), values)
        .map_err(|_| TableError::RowCountMismatch {
            expected: sample_ids.len() * variant_ids.len(),
            found: 0,
        })?;
    Ok(GenotypeTable {
        sample_ids,
        variant_ids,
        dosages,
    })
}

pub fn write_phenotype_tsv(
    path: &Path,
    sample_ids: &[String],
    phenotype: ArrayView1<u8>,
    liability: ArrayView1<f64>,
) -> Result<(), TableError> {
    if sample_ids.len() != phenotype.len() || phenotype.len() != liability.len() {
        return Err(TableError::RowCountMismatch {
            expected: sample_ids.len(),
            found: phenotype.len(),
        });
    }
    let mut writer = tsv_writer(path)?;
    writer.write_record(["sample_id", "phenotype", "liability"])?;
    for ((id, y), l) in sample_ids.iter().zip(phenotype.iter()).zip(liability.iter()) {
        writer.write_record([id.clone(), y.to_string(), format!("{l:.6}")])?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads the `phenotype` column as 0/1 outcomes.
pub fn read_phenotype_tsv(path: &Path) -> Result<Array1<u8>, TableError> {
    let mut reader = tsv_reader(path)?;
    let idx = column_index(reader.headers()?, "phenotype")?;
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record?;
        let y: u8 = parse_cell(&record, idx, "phenotype", "binary outcome (0 or 1)")?;
        if y > 1 {
            return Err(TableError::InvalidCell {
                line: line_of(&record),
                column: "phenotype".to_string(),
                value: y.to_string(),
                expected: "binary outcome (0 or 1)",
            });
        }
        out.push(y);
    }
    Ok(Array1::from(out))
}

pub fn write_causal_tsv(
    path: &Path,
    variant_ids: &[String],
    causal_mask: ArrayView1<bool>,
    effects: ArrayView1<f64>,
) -> Result<(), TableError> {
    if variant_ids.len() != causal_mask.len() || causal_mask.len() != effects.len() {
        return Err(TableError::RowCountMismatch {
            expected: variant_ids.len(),
            found: causal_mask.len(),
        });
    }
    let mut writer = tsv_writer(path)?;
    writer.write_record(["variant", "causal", "effect"])?;
    for ((id, &c), b) in variant_ids.iter().zip(causal_mask.iter()).zip(effects.iter()) {
        writer.write_record([id.clone(), u8::from(c).to_string(), format!("{b:.8}")])?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads the `causal` column as a boolean mask.
pub fn read_causal_tsv(path: &Path) -> Result<Array1<bool>, TableError> {
    let mut reader = tsv_reader(path)?;
    let idx = column_index(reader.headers()?, "causal")?;
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record?;
        let flag: u8 = parse_cell(&record, idx, "causal", "flag (0 or 1)")?;
        out.push(flag != 0);
    }
    Ok(Array1::from(out))
}

/// Paths of the three files written for a cohort.
#[derive(Debug, Clone)]
pub struct CohortFiles {
    pub genotypes: PathBuf,
    pub phenotype: PathBuf,
    pub causal: PathBuf,
}

/// Writes a cohort into `dir`, creating it if needed.
pub fn write_cohort(cohort: &SimulatedCohort, dir: &Path) -> Result<CohortFiles, TableError> {
    fs::create_dir_all(dir)?;
    let files = CohortFiles {
        genotypes: dir.join(GENOTYPE_FILE),
        phenotype: dir.join(PHENOTYPE_FILE),
        causal: dir.join(CAUSAL_FILE),
    };
    let sample_ids = cohort.sample_ids();
    let variant_ids = cohort.variant_ids();

    write_genotype_tsv(
        &files.genotypes,
        &sample_ids,
        &variant_ids,
        cohort.genotypes.view(),
    )?;
    write_phenotype_tsv(
        &files.phenotype,
        &sample_ids,
        cohort.phenotype.phenotype.view(),
        cohort.phenotype.liability.view(),
    )?;
    write_causal_tsv(
        &files.causal,
        &variant_ids,
        cohort.phenotype.causal_mask.view(),
        cohort.phenotype.effects.view(),
    )?;
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn genotype_table_survives_a_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("g.tsv");
        let dosages = array![[0u8, 1, 2], [2, 2, 0]];
        let samples = vec!["a".to_string(), "b".to_string()];
        let variants = vec!["rs1".to_string(), "rs2".to_string(), "rs3".to_string()];
        write_genotype_tsv(&path, &samples, &variants, dosages.view()).unwrap();
        let table = read_genotype_tsv(&path).unwrap();
        assert_eq!(table.dosages, dosages);
        assert_eq!(table.sample_ids, samples);
        assert_eq!(table.variant_ids, variants);
    }

    #[test]
    fn bad_dosage_reports_line_and_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("g.tsv");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "sample_id\tsnp1\tsnp2").unwrap();
        writeln!(f, "s1\t0\t1").unwrap();
        writeln!(f, "s2\t3\t1").unwrap();
        drop(f);
        match read_genotype_tsv(&path) {
            Err(TableError::InvalidCell { line, column, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "snp1");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("g.tsv");
        fs::write(&path, "sample_id\tsnp1\tsnp2\ns1\t0\n").unwrap();
        assert!(matches!(
            read_genotype_tsv(&path),
            Err(TableError::RaggedRow { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn phenotype_and_mask_files_read_back() {
        let dir = tempdir().unwrap();
        let ids = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];
        let pheno = dir.path().join("p.tsv");
        write_phenotype_tsv(&pheno, &ids, array![0u8, 1, 0].view(), array![-0.2, 1.4, 0.1].view())
            .unwrap();
        assert_eq!(read_phenotype_tsv(&pheno).unwrap(), array![0u8, 1, 0]);

        let causal = dir.path().join("c.tsv");
        write_causal_tsv(&causal, &ids, array![true, false, true].view(), array![0.3, 0.0, -1.0].view())
            .unwrap();
        assert_eq!(read_causal_tsv(&causal).unwrap(), array![true, false, true]);
    }
}
