//! # Linkage Disequilibrium by Partial Permutation
//!
//! Correlation between a derived column and its source is induced by leaving a
//! share of the entries in place and permuting the rest among themselves. A
//! permutation only moves values, so the derived column always has the same
//! multiset of dosages (and therefore the same allele frequency) as its source.
//!
//! When a fraction `q` of entries stays in place and the rest are exchangeable,
//! the correlation with the source is `q` in expectation, so `q = sqrt(r²)` is
//! left in place to hit a target squared correlation of `r²`.

use crate::types::SimulationError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand::seq::SliceRandom;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Range r² is drawn from for each member of an LD block.
pub const DEFAULT_BLOCK_R2_RANGE: (f64, f64) = (0.1, 0.9);

/// Which column a replaced column is derived from during batch replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LdSource {
    /// The replaced column is a partially permuted copy of itself.
    #[default]
    #[serde(rename = "self")]
    SelfColumn,
    /// The replaced column is a partially permuted copy of a randomly chosen
    /// column that is left untouched, so the two end up in LD with each other.
    Retained,
}

/// Result of replacing a subset of columns with LD-shuffled versions.
#[derive(Debug, Clone)]
pub struct LdReplacement {
    pub dosages: Array2<u8>,
    /// Replaced column indices, in ascending order.
    pub replaced: Vec<usize>,
    /// Column each replaced column was derived from, aligned with `replaced`.
    pub sources: Vec<usize>,
    /// Target r² drawn for each replaced column, aligned with `replaced`.
    pub target_r2: Vec<f64>,
}

fn validate_r2(r2: f64) -> Result<(), SimulationError> {
    if !(r2 > 0.0 && r2 <= 1.0) {
        return Err(SimulationError::invalid(
            "r2",
            format!("target r² must lie in (0, 1], got {r2}"),
        ));
    }
    Ok(())
}

/// Checks an r² sampling range: `0 < lo <= hi <= 1`.
pub fn validate_r2_range(range: (f64, f64)) -> Result<(), SimulationError> {
    let (lo, hi) = range;
    if !(lo > 0.0 && hi <= 1.0 && lo <= hi) {
        return Err(SimulationError::invalid(
            "r2_range",
            format!("expected 0 < lo <= hi <= 1, got [{lo}, {hi}]"),
        ));
    }
    Ok(())
}

/// Number of positions that get permuted for a column of length `n`.
pub fn shuffled_count(n: usize, r2: f64) -> usize {
    let kept = (r2.sqrt() * n as f64).round() as usize;
    n - kept.min(n)
}

/// Derives a column in LD with `source` at an expected squared correlation of `r2`.
///
/// `n - round(sqrt(r2) * n)` positions are chosen uniformly without replacement
/// and the values at those positions are permuted among themselves. With one or
/// no positions to permute the source comes back unchanged; `r2 = 1` is always
/// such a no-op.
pub fn add_simple_ld<R: Rng + ?Sized>(
    source: ArrayView1<u8>,
    r2: f64,
    rng: &mut R,
) -> Result<Array1<u8>, SimulationError> {
    validate_r2(r2)?;
    let n = source.len();
    let mut derived = source.to_owned();
    let count = shuffled_count(n, r2);
    if count <= 1 {
        log::warn!("LD target r²={r2} leaves {count} of {n} positions to permute; column kept as is");
        return Ok(derived);
    }

    let positions = index::sample(rng, n, count).into_vec();
    let mut values: Vec<u8> = positions.iter().map(|&i| source[i]).collect();
    values.shuffle(rng);
    for (&i, v) in positions.iter().zip(values) {
        derived[i] = v;
    }
    Ok(derived)
}

/// Replaces `round((1 - retain_proportion) * p)` randomly chosen columns with
/// LD-shuffled versions, each with its own r² drawn from `r2_range`.
///
/// The column count is unchanged and columns that are not selected are
/// returned as they were.
pub fn replace_with_ld<R: Rng + ?Sized>(
    dosages: ArrayView2<u8>,
    retain_proportion: f64,
    r2_range: (f64, f64),
    source: LdSource,
    rng: &mut R,
) -> Result<LdReplacement, SimulationError> {
    if !(0.0..=1.0).contains(&retain_proportion) {
        return Err(SimulationError::invalid(
            "retain_proportion",
            format!("must lie in [0, 1], got {retain_proportion}"),
        ));
    }
    validate_r2_range(r2_range)?;

    let p = dosages.ncols();
    let n_replace = (((1.0 - retain_proportion) * p as f64).round() as usize).min(p);
    let mut replaced = index::sample(rng, p, n_replace).into_vec();
    replaced.sort_unstable();

    let mut is_replaced = vec![false; p];
    for &j in &replaced {
        is_replaced[j] = true;
    }
    let retained: Vec<usize> = (0..p).filter(|&j| !is_replaced[j]).collect();
    if source == LdSource::Retained && retained.is_empty() && !replaced.is_empty() {
        log::warn!("No retained columns to derive LD from; replaced columns use themselves as source");
    }

    let mut out = dosages.to_owned();
    let mut sources = Vec::with_capacity(replaced.len());
    let mut target_r2 = Vec::with_capacity(replaced.len());
    for &j in &replaced {
        let r2 = rng.gen_range(r2_range.0..=r2_range.1);
        let origin = match source {
            LdSource::Retained => retained.choose(rng).copied().unwrap_or(j),
            LdSource::SelfColumn => j,
        };
        let derived = add_simple_ld(dosages.column(origin), r2, rng)?;
        out.column_mut(j).assign(&derived);
        sources.push(origin);
        target_r2.push(r2);
    }

    log::info!(
        "Replaced {} of {} columns with LD-shuffled copies",
        replaced.len(),
        p
    );

    Ok(LdReplacement {
        dosages: out,
        replaced,
        sources,
        target_r2,
    })
}

/// Builds `block_size` columns, each independently derived from `source` with
/// its own r² drawn from `r2_range`.
///
/// Members are only correlated with each other through the shared source; no
/// pairwise target is enforced among them.
pub fn add_simple_ld_block<R: Rng + ?Sized>(
    source: ArrayView1<u8>,
    block_size: usize,
    r2_range: (f64, f64),
    rng: &mut R,
) -> Result<Array2<u8>, SimulationError> {
    if block_size == 0 {
        return Err(SimulationError::invalid("block_size", "must be positive"));
    }
    validate_r2_range(r2_range)?;

    let mut block = Array2::<u8>::zeros((source.len(), block_size));
    for mut column in block.columns_mut() {
        let r2 = rng.gen_range(r2_range.0..=r2_range.1);
        column.assign(&add_simple_ld(source, r2, rng)?);
    }
    Ok(block)
}

/// A matrix widened with LD blocks, and where each block came from.
#[derive(Debug, Clone)]
pub struct BlockExpansion {
    pub dosages: Array2<u8>,
    /// `(source column, first block column, block size)` per block.
    pub blocks: Vec<(usize, usize, usize)>,
}

/// Picks `n_sources` distinct columns and appends an LD block for each one.
pub fn expand_with_blocks<R: Rng + ?Sized>(
    dosages: ArrayView2<u8>,
    n_sources: usize,
    block_size: usize,
    r2_range: (f64, f64),
    rng: &mut R,
) -> Result<BlockExpansion, SimulationError> {
    let p = dosages.ncols();
    if n_sources > p {
        return Err(SimulationError::invalid(
            "sources",
            format!("cannot pick {n_sources} source columns from {p}"),
        ));
    }

    let mut chosen = index::sample(rng, p, n_sources).into_vec();
    chosen.sort_unstable();

    let mut out = dosages.to_owned();
    let mut blocks = Vec::with_capacity(chosen.len());
    for j in chosen {
        let block = add_simple_ld_block(dosages.column(j), block_size, r2_range, rng)?;
        let start = out.ncols();
        out.append(Axis(1), block.view())
            .map_err(|e| SimulationError::invalid("block_size", e.to_string()))?;
        blocks.push((j, start, block_size));
    }

    Ok(BlockExpansion {
        dosages: out,
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::draw_dosages;
    use crate::stats::dosage_r2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn counts(v: ArrayView1<u8>) -> [usize; 3] {
        let mut c = [0; 3];
        for &d in v {
            c[d as usize] += 1;
        }
        c
    }

    #[test]
    fn full_r2_is_identity() {
        let mut rng = StdRng::seed_from_u64(5);
        let col = draw_dosages(1000, 0.3, &mut rng).unwrap();
        let out = add_simple_ld(col.view(), 1.0, &mut rng).unwrap();
        assert_eq!(out, col);
    }

    #[test]
    fn tiny_columns_are_left_alone() {
        let mut rng = StdRng::seed_from_u64(5);
        let col = Array1::from(vec![0u8, 2]);
        assert_eq!(shuffled_count(2, 0.3), 1);
        assert_eq!(add_simple_ld(col.view(), 0.3, &mut rng).unwrap(), col);
    }

    #[test]
    fn value_counts_are_preserved() {
        let mut rng = StdRng::seed_from_u64(9);
        let col = draw_dosages(2000, 0.4, &mut rng).unwrap();
        for r2 in [0.05, 0.3, 0.5, 0.9, 1.0] {
            let out = add_simple_ld(col.view(), r2, &mut rng).unwrap();
            assert_eq!(counts(out.view()), counts(col.view()));
        }
    }

    #[test]
    fn rejects_out_of_range_r2() {
        let mut rng = StdRng::seed_from_u64(1);
        let col = Array1::from(vec![0u8, 1, 2, 1]);
        assert!(add_simple_ld(col.view(), 0.0, &mut rng).is_err());
        assert!(add_simple_ld(col.view(), 1.5, &mut rng).is_err());
    }

    #[test]
    fn half_r2_lands_near_target() {
        let mut rng = StdRng::seed_from_u64(21);
        let col = draw_dosages(10_000, 0.3, &mut rng).unwrap();
        for _ in 0..5 {
            let out = add_simple_ld(col.view(), 0.5, &mut rng).unwrap();
            let r2 = dosage_r2(col.view(), out.view()).unwrap();
            assert!((0.4..=0.6).contains(&r2), "r² = {r2}");
        }
    }

    #[test]
    fn block_members_share_the_source_distribution() {
        let mut rng = StdRng::seed_from_u64(2);
        let col = draw_dosages(3000, 0.25, &mut rng).unwrap();
        let block = add_simple_ld_block(col.view(), 6, DEFAULT_BLOCK_R2_RANGE, &mut rng).unwrap();
        assert_eq!(block.dim(), (3000, 6));
        for member in block.columns() {
            assert_eq!(counts(member), counts(col.view()));
            let r2 = dosage_r2(col.view(), member).unwrap();
            assert!(r2 > 0.03 && r2 < 0.97, "r² = {r2}");
        }
    }

    #[test]
    fn retained_source_points_at_untouched_columns() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut x = Array2::<u8>::zeros((400, 10));
        for mut c in x.columns_mut() {
            c.assign(&draw_dosages(400, 0.35, &mut rng).unwrap());
        }
        let res = replace_with_ld(x.view(), 0.6, (0.3, 0.7), LdSource::Retained, &mut rng).unwrap();
        assert_eq!(res.replaced.len(), 4);
        for (&j, &s) in res.replaced.iter().zip(&res.sources) {
            assert!(!res.replaced.contains(&s));
            assert_eq!(counts(res.dosages.column(j)), counts(x.column(s)));
        }
    }

    #[test]
    fn expansion_appends_blocks() {
        let mut rng = StdRng::seed_from_u64(8);
        let x = Array2::from_shape_fn((100, 4), |(i, j)| ((i + j) % 3) as u8);
        let res = expand_with_blocks(x.view(), 2, 3, (0.2, 0.8), &mut rng).unwrap();
        assert_eq!(res.dosages.ncols(), 10);
        assert_eq!(res.blocks.len(), 2);
        assert_eq!(res.blocks[0].1, 4);
        assert_eq!(res.blocks[1].1, 7);
        assert!(expand_with_blocks(x.view(), 5, 3, (0.2, 0.8), &mut rng).is_err());
    }
}
