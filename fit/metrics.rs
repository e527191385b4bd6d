use crate::fit::FitError;
use ndarray::ArrayView1;
use serde::Serialize;

/// Area under the ROC curve via the Mann-Whitney U statistic, with tied
/// scores sharing their average rank. Returns 0.5 when one class is absent.
pub fn auc(y: ArrayView1<f64>, scores: ArrayView1<f64>) -> Result<f64, FitError> {
    if y.len() != scores.len() {
        return Err(FitError::DimensionMismatch {
            what: "scores",
            expected: y.len(),
            found: scores.len(),
        });
    }
    let n = y.len();
    let n_pos = y.iter().filter(|&&t| t > 0.5).count() as f64;
    let n_neg = n as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return Ok(0.5);
    }

    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&i, &j| {
        scores[i]
            .partial_cmp(&scores[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && (scores[idx[j]] - scores[idx[i]]).abs() < 1e-10 {
            j += 1;
        }
        let avg_rank = (i + j - 1) as f64 / 2.0 + 1.0;
        for &k in &idx[i..j] {
            ranks[k] = avg_rank;
        }
        i = j;
    }

    let sum_ranks_pos: f64 = y
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();
    Ok((sum_ranks_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// How many of the `k` largest-magnitude coefficients sit on causal variants.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TopKOverlap {
    pub k: usize,
    pub hits: usize,
    pub causal_total: usize,
    /// `hits / k`.
    pub precision: f64,
    /// `hits / causal_total`, or 0 with no causal variants.
    pub recall: f64,
}

/// Ranks variants by `|coefficient|` and compares the top `k` against the
/// causal mask. Zero coefficients are never selected, so a sparse fit may
/// fill fewer than `k` slots; precision still divides by `k`. Ties keep the
/// lower index.
pub fn top_k_overlap(
    coefficients: ArrayView1<f64>,
    causal_mask: ArrayView1<bool>,
    k: usize,
) -> Result<TopKOverlap, FitError> {
    if coefficients.len() != causal_mask.len() {
        return Err(FitError::DimensionMismatch {
            what: "causal mask",
            expected: coefficients.len(),
            found: causal_mask.len(),
        });
    }
    let mut order: Vec<usize> = (0..coefficients.len())
        .filter(|&j| coefficients[j] != 0.0)
        .collect();
    order.sort_by(|&a, &b| {
        coefficients[b]
            .abs()
            .partial_cmp(&coefficients[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k);

    let hits = order.iter().filter(|&&j| causal_mask[j]).count();
    let causal_total = causal_mask.iter().filter(|&&c| c).count();
    Ok(TopKOverlap {
        k,
        hits,
        causal_total,
        precision: if k == 0 { 0.0 } else { hits as f64 / k as f64 },
        recall: if causal_total == 0 {
            0.0
        } else {
            hits as f64 / causal_total as f64
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn perfect_and_reversed_rankings() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_abs_diff_eq!(auc(y.view(), array![0.1, 0.2, 0.8, 0.9].view()).unwrap(), 1.0);
        assert_abs_diff_eq!(auc(y.view(), array![0.9, 0.8, 0.2, 0.1].view()).unwrap(), 0.0);
    }

    #[test]
    fn ties_count_half() {
        let y = array![0.0, 1.0];
        assert_abs_diff_eq!(auc(y.view(), array![0.3, 0.3].view()).unwrap(), 0.5);
        let y = array![0.0, 0.0, 1.0, 1.0];
        // one positive beats both negatives, the other ties one and beats one
        let scores = array![0.1, 0.5, 0.5, 0.9];
        assert_abs_diff_eq!(auc(y.view(), scores.view()).unwrap(), 0.875);
    }

    #[test]
    fn single_class_is_uninformative() {
        let y = array![1.0, 1.0, 1.0];
        assert_eq!(auc(y.view(), array![0.1, 0.2, 0.3].view()).unwrap(), 0.5);
        assert!(auc(y.view(), array![0.1].view()).is_err());
    }

    #[test]
    fn top_k_counts_causal_hits() {
        let coefs = array![0.0, -2.0, 0.5, 1.0, 0.0];
        let mask = array![true, true, false, true, true];
        let overlap = top_k_overlap(coefs.view(), mask.view(), 2).unwrap();
        assert_eq!(overlap.hits, 2);
        assert_eq!(overlap.causal_total, 4);
        assert_abs_diff_eq!(overlap.precision, 1.0);
        assert_abs_diff_eq!(overlap.recall, 0.5);

        let overlap = top_k_overlap(coefs.view(), mask.view(), 10).unwrap();
        assert_eq!(overlap.hits, 2);
        assert_abs_diff_eq!(overlap.precision, 0.2);
    }
}
