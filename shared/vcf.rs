//! # VCF Genotype Reader
//!
//! Turns a tab-separated VCF (plain or gzip/bgzip) into an alternate-allele
//! dosage matrix for one genomic region. Only biallelic SNVs are kept, and only
//! the `GT` subfield of each sample is read.

use crate::shared::files::open_text_source;
use ndarray::Array2;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const FIXED_COLUMNS: usize = 9;

#[derive(Error, Debug)]
pub enum VcfError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("No '#CHROM' header line was found before the first record.")]
    MissingHeader,
    #[error("Malformed '#CHROM' header: {0}")]
    MalformedHeader(String),
    #[error("Line {line}: {message}")]
    MalformedRecord { line: usize, message: String },
    #[error("Invalid region '{0}'. Expected CHROM, CHROM:START-END or CHROM:POS.")]
    InvalidRegion(String),
    #[error("Line {line}: sample '{sample}' has genotype call '{call}', which cannot be converted to a dosage.")]
    UnsupportedCall {
        line: usize,
        sample: String,
        call: String,
    },
}

/// Strips a leading `chr` and upper-cases, so `chr22`, `CHR22` and `22` agree.
fn normalize_chromosome(chromosome: &str) -> String {
    let trimmed = chromosome.trim();
    let stripped = if trimmed.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("chr")) {
        &trimmed[3..]
    } else {
        trimmed
    };
    stripped.to_ascii_uppercase()
}

/// A closed interval `start..=end` on one chromosome (1-based positions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
}

impl Region {
    pub fn contains(&self, chromosome: &str, position: u64) -> bool {
        normalize_chromosome(chromosome) == self.chromosome
            && position >= self.start
            && position <= self.end
    }
}

impl FromStr for Region {
    type Err = VcfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VcfError::InvalidRegion(s.to_string());
        let (chrom, span) = match s.split_once(':') {
            Some((c, rest)) => (c, Some(rest)),
            None => (s, None),
        };
        if chrom.trim().is_empty() {
            return Err(invalid());
        }
        let parse_pos = |v: &str| v.trim().replace(',', "").parse::<u64>().map_err(|_| invalid());
        let (start, end) = match span {
            None => (1, u64::MAX),
            Some(span) => match span.split_once('-') {
                Some((a, b)) => (parse_pos(a)?, parse_pos(b)?),
                None => {
                    let pos = parse_pos(span)?;
                    (pos, pos)
                }
            },
        };
        if start == 0 || start > end {
            return Err(invalid());
        }
        Ok(Self {
            chromosome: normalize_chromosome(chrom),
            start,
            end,
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.end == u64::MAX {
            write!(f, "{}", self.chromosome)
        } else {
            write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VcfReadOptions {
    /// Drop variants whose observed minor-allele frequency is below this.
    pub min_maf: f64,
    /// Stop after this many variants have been kept.
    pub max_variants: Option<usize>,
    /// Read `.` alleles as reference instead of failing.
    pub missing_as_ref: bool,
}

/// Dosages read from a VCF region.
#[derive(Debug, Clone)]
pub struct VcfGenotypes {
    pub sample_ids: Vec<String>,
    pub variant_ids: Vec<String>,
    pub positions: Vec<u64>,
    /// Alternate-allele dosages. Shape: [n_samples, n_variants].
    pub dosages: Array2<u8>,
}

fn is_base(allele: &str) -> bool {
    allele.len() == 1 && matches!(allele.as_bytes()[0].to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T')
}

/// Converts one `GT` value (`0|1`, `1/1`, `1`, `./.`) to an alternate-allele count.
fn gt_to_dosage(gt: &str, missing_as_ref: bool) -> Option<u8> {
    let mut dosage = 0u8;
    for allele in gt.split(['|', '/']) {
        match allele {
            "0" => {}
            "1" => dosage += 1,
            "." if missing_as_ref => {}
            _ => return None,
        }
    }
    if dosage > 2 { None } else { Some(dosage) }
}

/// Reads the biallelic SNVs of `region` from a VCF into a dosage matrix.
pub fn read_vcf_region(
    path: &Path,
    region: &Region,
    options: &VcfReadOptions,
) -> Result<VcfGenotypes, VcfError> {
    let mut source = open_text_source(path)?;
    let mut sample_ids: Option<Vec<String>> = None;
    let mut columns: Vec<Vec<u8>> = Vec::new();
    let mut variant_ids = Vec::new();
    let mut positions = Vec::new();
    let mut skipped_non_snv = 0usize;
    let mut skipped_rare = 0usize;
    let mut line_number = 0usize;

    while let Some(raw) = source.next_line()? {
        line_number += 1;
        let line = std::str::from_utf8(raw).map_err(|e| VcfError::MalformedRecord {
            line: line_number,
            message: format!("line is not valid UTF-8: {e}"),
        })?;
        if line.is_empty() || line.starts_with("##") {
            continue;
        }
        if let Some(header) = line.strip_prefix('#') {
            let fields: Vec<&str> = header.split('\t').collect();
            if fields.first() != Some(&"CHROM") || fields.len() <= FIXED_COLUMNS {
                return Err(VcfError::MalformedHeader(format!(
                    "expected CHROM plus {} fixed columns and at least one sample, found {} columns",
                    FIXED_COLUMNS - 1,
                    fields.len()
                )));
            }
            sample_ids = Some(fields[FIXED_COLUMNS..].iter().map(|s| s.to_string()).collect());
            continue;
        }

        let samples = sample_ids.as_ref().ok_or(VcfError::MissingHeader)?;
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != FIXED_COLUMNS + samples.len() {
            return Err(VcfError::MalformedRecord {
                line: line_number,
                message: format!(
                    "expected {} fields, found {}",
                    FIXED_COLUMNS + samples.len(),
                    fields.len()
                ),
            });
        }

        let position: u64 = fields[1].parse().map_err(|_| VcfError::MalformedRecord {
            line: line_number,
            message: format!("POS '{}' is not a positive integer", fields[1]),
        })?;
        if !region.contains(fields[0], position) {
            continue;
        }
        let (reference, alternate) = (fields[3], fields[4]);
        if !is_base(reference) || !is_base(alternate) {
            skipped_non_snv += 1;
            continue;
        }

        let gt_index = fields[8]
            .split(':')
            .position(|k| k == "GT")
            .ok_or_else(|| VcfError::MalformedRecord {
                line: line_number,
                message: "FORMAT has no GT subfield".to_string(),
            })?;

        let mut column = Vec::with_capacity(samples.len());
        for (sample, value) in samples.iter().zip(&fields[FIXED_COLUMNS..]) {
            let gt = value.split(':').nth(gt_index).unwrap_or(".");
            let dosage = gt_to_dosage(gt, options.missing_as_ref).ok_or_else(|| {
                VcfError::UnsupportedCall {
                    line: line_number,
                    sample: sample.clone(),
                    call: gt.to_string(),
                }
            })?;
            column.push(dosage);
        }

        if options.min_maf > 0.0 {
            let total: usize = column.iter().map(|&d| d as usize).sum();
            let freq = total as f64 / (2 * column.len()) as f64;
            if freq.min(1.0 - freq) < options.min_maf {
                skipped_rare += 1;
                continue;
            }
        }

        let id = if fields[2] == "." {
            format!("{}:{}:{}:{}", fields[0], position, reference, alternate)
        } else {
            fields[2].to_string()
        };
        variant_ids.push(id);
        positions.push(position);
        columns.push(column);

        if options.max_variants.is_some_and(|cap| columns.len() >= cap) {
            log::info!("Reached the cap of {} variants at line {}", columns.len(), line_number);
            break;
        }
    }

    let sample_ids = sample_ids.ok_or(VcfError::MissingHeader)?;
    let n = sample_ids.len();
    let p = columns.len();
    let dosages = Array2::from_shape_fn((n, p), |(i, j)| columns[j][i]);

    log::info!(
        "Read {} variants x {} samples from {} in {} ({} non-SNV and {} below MAF {} skipped)",
        p,
        n,
        path.display(),
        region,
        skipped_non_snv,
        skipped_rare,
        options.min_maf
    );

    Ok(VcfGenotypes {
        sample_ids,
        variant_ids,
        positions,
        dosages,
    })
}
