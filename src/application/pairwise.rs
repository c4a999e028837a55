//! Pairwise spread statistics over a date × instrument matrix.
//!
//! For every unordered pair `(i, j)` the spread series is `x_i - x_j` on dates
//! where both are observed. Moments come from matrix products over the
//! observation mask, so there is no per-pair loop over history:
//!
//! - `n   = Mᵀ M`
//! - `Σs  = Xᵀ M - Mᵀ X`
//! - `Σs² = (X∘X)ᵀ M - 2 Xᵀ X + Mᵀ (X∘X)`
//!
//! where `M` is the 0/1 mask and `X` the matrix with missing values zeroed.
//! Latest value, extremes and percentile rank are swept date-by-date on the
//! full `N × N` spread matrix.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, Axis, Zip};
use tracing::debug;

use crate::domain::analytics::{PairAnalysisRecord, SeriesPoint};

/// Parameters of a pairwise run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairwiseParams {
    /// Jointly observed dates a pair needs to be reported.
    pub min_overlap_periods: usize,
    /// Most recent dates considered.
    pub lookback_window: usize,
    /// Keep only the instruments with the most observations.
    pub top_n: Option<usize>,
}

/// Wide matrix pivoted from a long series.
#[derive(Debug, Clone)]
pub struct SpreadMatrix {
    pub dates: Vec<NaiveDate>,
    pub instruments: Vec<String>,
    /// `dates.len() × instruments.len()`, `NaN` where missing.
    pub values: Array2<f64>,
}

impl SpreadMatrix {
    /// Pivot long-format points, keeping the last `lookback_window` dates.
    /// A repeated (date, instrument) keeps the later point.
    #[must_use]
    pub fn pivot(series: &[SeriesPoint], lookback_window: usize) -> Self {
        let all_dates: BTreeSet<NaiveDate> = series.iter().map(|p| p.date).collect();
        let skip = all_dates.len().saturating_sub(lookback_window);
        let dates: Vec<NaiveDate> = all_dates.into_iter().skip(skip).collect();
        let date_index: BTreeMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let instruments: Vec<String> = series
            .iter()
            .filter(|p| date_index.contains_key(&p.date))
            .map(|p| p.instrument.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let instrument_index: BTreeMap<&str, usize> = instruments
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut values = Array2::from_elem((dates.len(), instruments.len()), f64::NAN);
        for point in series {
            if let (Some(&t), Some(&k)) = (
                date_index.get(&point.date),
                instrument_index.get(point.instrument.as_str()),
            ) {
                values[[t, k]] = point.value;
            }
        }

        Self {
            dates,
            instruments,
            values,
        }
    }

    /// Restrict to the `n` instruments with the most observations.
    #[must_use]
    pub fn most_observed(self, n: usize) -> Self {
        if n >= self.instruments.len() {
            return self;
        }
        let counts: Vec<usize> = self
            .values
            .axis_iter(Axis(1))
            .map(|col| col.iter().filter(|v| !v.is_nan()).count())
            .collect();
        let mut order: Vec<usize> = (0..self.instruments.len()).collect();
        order.sort_by(|&a, &b| {
            counts[b]
                .cmp(&counts[a])
                .then_with(|| self.instruments[a].cmp(&self.instruments[b]))
        });
        let mut keep: Vec<usize> = order.into_iter().take(n).collect();
        keep.sort_unstable();

        Self {
            dates: self.dates,
            instruments: keep.iter().map(|&k| self.instruments[k].clone()).collect(),
            values: self.values.select(Axis(1), &keep),
        }
    }
}

/// `row_i - row_j` for every pair, `NaN` where either side is missing.
fn spread_matrix(row: ArrayView1<'_, f64>) -> Array2<f64> {
    let column = row.insert_axis(Axis(1));
    let across = row.insert_axis(Axis(0));
    &column - &across
}

/// Compute pair statistics for a long-format series.
#[must_use]
pub fn analyze(series: &[SeriesPoint], params: &PairwiseParams) -> Vec<PairAnalysisRecord> {
    let mut matrix = SpreadMatrix::pivot(series, params.lookback_window);
    if let Some(n) = params.top_n {
        matrix = matrix.most_observed(n);
    }
    analyze_matrix(&matrix, params.min_overlap_periods)
}

/// Compute pair statistics for an already pivoted matrix.
#[must_use]
pub fn analyze_matrix(matrix: &SpreadMatrix, min_overlap_periods: usize) -> Vec<PairAnalysisRecord> {
    let n = matrix.instruments.len();
    if n < 2 || matrix.dates.is_empty() {
        return Vec::new();
    }

    let x = &matrix.values;
    let mask = x.mapv(|v| if v.is_nan() { 0.0 } else { 1.0 });
    let xz = x.mapv(|v| if v.is_nan() { 0.0 } else { v });
    let x2 = &xz * &xz;

    let counts = mask.t().dot(&mask);
    let sums = xz.t().dot(&mask) - mask.t().dot(&xz);
    let sum_squares = x2.t().dot(&mask) - 2.0 * xz.t().dot(&xz) + mask.t().dot(&x2);

    // Latest jointly observed spread, sweeping backwards.
    let mut last = Array2::from_elem((n, n), f64::NAN);
    for row in x.axis_iter(Axis(0)).rev() {
        let spreads = spread_matrix(row);
        let mut missing = 0usize;
        Zip::from(&mut last).and(&spreads).for_each(|l, &s| {
            if l.is_nan() {
                if s.is_nan() {
                    missing += 1;
                } else {
                    *l = s;
                }
            }
        });
        if missing == 0 {
            break;
        }
    }

    let mut max = Array2::from_elem((n, n), f64::NEG_INFINITY);
    let mut min = Array2::from_elem((n, n), f64::INFINITY);
    let mut at_or_below = Array2::<f64>::zeros((n, n));
    for row in x.axis_iter(Axis(0)) {
        let spreads = spread_matrix(row);
        Zip::from(&mut max)
            .and(&mut min)
            .and(&mut at_or_below)
            .and(&spreads)
            .and(&last)
            .for_each(|hi, lo, le, &s, &l| {
                if !s.is_nan() {
                    *hi = hi.max(s);
                    *lo = lo.min(s);
                    if s <= l {
                        *le += 1.0;
                    }
                }
            });
    }

    let mut records = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let observations = counts[[i, j]];
            if observations < min_overlap_periods.max(1) as f64 {
                continue;
            }
            let last_spread = last[[i, j]];
            let mean = sums[[i, j]] / observations;
            let z_score = if observations >= 2.0 {
                let variance =
                    (sum_squares[[i, j]] - observations * mean * mean) / (observations - 1.0);
                let std = variance.max(0.0).sqrt();
                (std > 1e-12).then(|| (last_spread - mean) / std)
            } else {
                None
            };

            records.push(PairAnalysisRecord {
                instrument_1: matrix.instruments[i].clone(),
                instrument_2: matrix.instruments[j].clone(),
                observations: observations as i64,
                last_spread,
                z_score,
                percentile: 100.0 * at_or_below[[i, j]] / observations,
                max: max[[i, j]],
                min: min[[i, j]],
                last_vs_max: last_spread - max[[i, j]],
                last_vs_min: last_spread - min[[i, j]],
            });
        }
    }

    debug!(
        instruments = n,
        dates = matrix.dates.len(),
        pairs = records.len(),
        "Computed pairwise spreads"
    );
    records
}
