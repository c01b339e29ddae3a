//! # Convergence Search (CONVERGENCE)
//!
//! Searches a chronological sequence of extrema for "converging" chart
//! patterns: two trend lines fitted over the merged extrema narrowing
//! towards each other. The merged `(index, price)` sequence is split by
//! *position parity* — even positions form the high series, odd positions
//! the low series — regardless of whether a point is actually a maximum or
//! a minimum. This assumes extrema strictly alternate in the input and is
//! preserved as specified behavior (see `test_parity_split_ignores_extremum_kind`).
//!
//! A window converges when it holds between `min_points` and `max_points`
//! points, both residual variances stay strictly below `max_variance`, and
//! the absolute slope difference stays strictly below `max_angle`. The
//! variance and angle thresholds are absolute values in raw price units, so
//! they are scale-dependent; retune them for series that do not live near
//! unit scale.
//!
//! ## Parameters
//! - **min_points**: Minimum window size, at least 2. Defaults to 4.
//! - **max_points**: Maximum window size, at least `min_points`. Defaults to 10.
//! - **max_variance**: Strict upper bound on either residual variance.
//!   Defaults to 0.01.
//! - **max_angle**: Strict upper bound on `|slope_high - slope_low|`.
//!   Defaults to 0.1.
//!
//! ## Errors
//! - **EmptyData**: convergence: Price slice is empty.
//! - **IndexOutOfRange**: convergence: an extremum index is past the series.
//! - **InvalidPointBounds**: convergence: `min_points < 2` or
//!   `max_points < min_points`.
//!
//! ## Returns
//! - **`Ok(ConvergenceOutput)`** with all qualifying windows, scanned
//!   right-to-left, smallest window first at each start position;
//!   overlapping segments are not merged.
//! - **`Err(ConvergenceError)`** otherwise.

use crate::utilities::data_loader::{source_type, Candles};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fitted trend line in index/price space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
}

/// Ordinary least-squares fit plus the population variance of the
/// residuals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    pub variance: f64,
}

impl TrendFit {
    pub fn line(&self) -> TrendLine {
        TrendLine {
            slope: self.slope,
            intercept: self.intercept,
        }
    }
}

/// One qualifying window of the search. `start_index`/`end_index` are
/// price indices of the first and last extremum in the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceSegment {
    pub start_index: usize,
    pub end_index: usize,
    pub up_trend: TrendLine,
    pub down_trend: TrendLine,
    pub angle: f64,
    pub variance: f64,
}

/// Result of [`check_convergence`] on a single window. Trend fields stay
/// `None` when a series degenerates (fewer than two points or identical
/// indices); that is a normal negative result, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConvergenceCheck {
    pub is_converging: bool,
    pub up_trend: Option<TrendLine>,
    pub down_trend: Option<TrendLine>,
    pub angle: Option<f64>,
    pub variance: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum ConvergenceData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
        maxima: &'a [usize],
        minima: &'a [usize],
    },
    Slice {
        prices: &'a [f64],
        maxima: &'a [usize],
        minima: &'a [usize],
    },
}

#[derive(Debug, Clone)]
pub struct ConvergenceParams {
    pub min_points: Option<usize>,
    pub max_points: Option<usize>,
    pub max_variance: Option<f64>,
    pub max_angle: Option<f64>,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        Self {
            min_points: Some(4),
            max_points: Some(10),
            max_variance: Some(0.01),
            max_angle: Some(0.1),
        }
    }
}

impl ConvergenceParams {
    pub fn get_min_points(&self) -> usize {
        self.min_points.unwrap_or(4)
    }
    pub fn get_max_points(&self) -> usize {
        self.max_points.unwrap_or(10)
    }
    pub fn get_max_variance(&self) -> f64 {
        self.max_variance.unwrap_or(0.01)
    }
    pub fn get_max_angle(&self) -> f64 {
        self.max_angle.unwrap_or(0.1)
    }
}

#[derive(Debug, Clone)]
pub struct ConvergenceInput<'a> {
    pub data: ConvergenceData<'a>,
    pub params: ConvergenceParams,
}

impl<'a> ConvergenceInput<'a> {
    pub fn from_candles(
        candles: &'a Candles,
        source: &'a str,
        maxima: &'a [usize],
        minima: &'a [usize],
        params: ConvergenceParams,
    ) -> Self {
        Self {
            data: ConvergenceData::Candles {
                candles,
                source,
                maxima,
                minima,
            },
            params,
        }
    }

    pub fn from_slice(
        prices: &'a [f64],
        maxima: &'a [usize],
        minima: &'a [usize],
        params: ConvergenceParams,
    ) -> Self {
        Self {
            data: ConvergenceData::Slice {
                prices,
                maxima,
                minima,
            },
            params,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvergenceOutput {
    pub segments: Vec<ConvergenceSegment>,
}

#[derive(Debug, Error)]
pub enum ConvergenceError {
    #[error("convergence: Empty price data provided.")]
    EmptyData,
    #[error("convergence: extremum index {index} is out of range for series of length {data_len}")]
    IndexOutOfRange { index: usize, data_len: usize },
    #[error("convergence: invalid point bounds: min_points = {min_points}, max_points = {max_points}")]
    InvalidPointBounds {
        min_points: usize,
        max_points: usize,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ConvergenceBuilder {
    min_points: Option<usize>,
    max_points: Option<usize>,
    max_variance: Option<f64>,
    max_angle: Option<f64>,
}

impl ConvergenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn min_points(mut self, n: usize) -> Self {
        self.min_points = Some(n);
        self
    }
    pub fn max_points(mut self, n: usize) -> Self {
        self.max_points = Some(n);
        self
    }
    pub fn max_variance(mut self, v: f64) -> Self {
        self.max_variance = Some(v);
        self
    }
    pub fn max_angle(mut self, a: f64) -> Self {
        self.max_angle = Some(a);
        self
    }
    fn params(&self) -> ConvergenceParams {
        ConvergenceParams {
            min_points: self.min_points,
            max_points: self.max_points,
            max_variance: self.max_variance,
            max_angle: self.max_angle,
        }
    }
    pub fn apply(
        self,
        candles: &Candles,
        source: &str,
        maxima: &[usize],
        minima: &[usize],
    ) -> Result<ConvergenceOutput, ConvergenceError> {
        let params = self.params();
        convergence_search(&ConvergenceInput::from_candles(
            candles, source, maxima, minima, params,
        ))
    }
    pub fn apply_slice(
        self,
        prices: &[f64],
        maxima: &[usize],
        minima: &[usize],
    ) -> Result<ConvergenceOutput, ConvergenceError> {
        let params = self.params();
        convergence_search(&ConvergenceInput::from_slice(prices, maxima, minima, params))
    }
}

/// Ordinary least-squares line over `(index, price)` points. Returns `None`
/// for fewer than two points or zero variance in x.
pub fn fit_trend(points: &[(usize, f64)]) -> Option<TrendFit> {
    let n = points.len();
    if n < 2 {
        return None;
    }
    let count = n as f64;
    let mean_x = points.iter().map(|&(x, _)| x as f64).sum::<f64>() / count;
    let mean_y = points.iter().map(|&(_, y)| y).sum::<f64>() / count;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for &(x, y) in points {
        let dx = x as f64 - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let variance = points
        .iter()
        .map(|&(x, y)| {
            let r = y - (slope * x as f64 + intercept);
            r * r
        })
        .sum::<f64>()
        / count;

    Some(TrendFit {
        slope,
        intercept,
        variance,
    })
}

/// Evaluates one window of merged extrema against the convergence
/// thresholds. The parity split (even positions high, odd positions low)
/// operates on the window as passed in.
pub fn check_convergence(points: &[(usize, f64)], params: &ConvergenceParams) -> ConvergenceCheck {
    if points.len() < params.get_min_points() {
        return ConvergenceCheck::default();
    }

    let high: Vec<(usize, f64)> = points.iter().copied().step_by(2).collect();
    let low: Vec<(usize, f64)> = points.iter().copied().skip(1).step_by(2).collect();

    let fit_high = fit_trend(&high);
    let fit_low = fit_trend(&low);
    let (fit_high, fit_low) = match (fit_high, fit_low) {
        (Some(h), Some(l)) => (h, l),
        (h, l) => {
            return ConvergenceCheck {
                is_converging: false,
                up_trend: h.map(|f| f.line()),
                down_trend: l.map(|f| f.line()),
                angle: None,
                variance: None,
            }
        }
    };

    let angle = (fit_high.slope - fit_low.slope).abs();
    let variance = fit_high.variance.max(fit_low.variance);
    let is_converging = points.len() <= params.get_max_points()
        && fit_high.variance < params.get_max_variance()
        && fit_low.variance < params.get_max_variance()
        && angle < params.get_max_angle();

    ConvergenceCheck {
        is_converging,
        up_trend: Some(fit_high.line()),
        down_trend: Some(fit_low.line()),
        angle: Some(angle),
        variance: Some(variance),
    }
}

/// Backward sliding-window scan over the merged extrema sequence. At each
/// start position the smallest qualifying window is emitted, then the start
/// retreats by one whether or not a match was found.
pub fn convergence_search(
    input: &ConvergenceInput,
) -> Result<ConvergenceOutput, ConvergenceError> {
    let (prices, maxima, minima) = match &input.data {
        ConvergenceData::Candles {
            candles,
            source,
            maxima,
            minima,
        } => (source_type(candles, source), *maxima, *minima),
        ConvergenceData::Slice {
            prices,
            maxima,
            minima,
        } => (*prices, *maxima, *minima),
    };

    if prices.is_empty() {
        return Err(ConvergenceError::EmptyData);
    }
    let min_points = input.params.get_min_points();
    let max_points = input.params.get_max_points();
    if min_points < 2 || max_points < min_points {
        return Err(ConvergenceError::InvalidPointBounds {
            min_points,
            max_points,
        });
    }

    // Merge both index lists into one chronological (index, price) sequence.
    let mut points = Vec::with_capacity(maxima.len() + minima.len());
    for &idx in maxima.iter().chain(minima) {
        let price = *prices
            .get(idx)
            .ok_or(ConvergenceError::IndexOutOfRange {
                index: idx,
                data_len: prices.len(),
            })?;
        points.push((idx, price));
    }
    points.sort_unstable_by_key(|&(idx, _)| idx);

    let merged = points.len();
    let mut segments = Vec::new();
    if merged < min_points {
        return Ok(ConvergenceOutput { segments });
    }

    let mut start = merged - min_points;
    loop {
        let end_max = (start + max_points).min(merged);
        for end in start + min_points..=end_max {
            let check = check_convergence(&points[start..end], &input.params);
            if check.is_converging {
                if let (Some(up), Some(down), Some(angle), Some(variance)) =
                    (check.up_trend, check.down_trend, check.angle, check.variance)
                {
                    segments.push(ConvergenceSegment {
                        start_index: points[start].0,
                        end_index: points[end - 1].0,
                        up_trend: up,
                        down_trend: down,
                        angle,
                        variance,
                    });
                }
                break;
            }
        }
        if start == 0 {
            break;
        }
        start -= 1;
    }

    Ok(ConvergenceOutput { segments })
}

/// Runs independent searches in parallel. Each input is a self-contained
/// extrema set, so the searches do not share any state.
pub fn convergence_search_batch(
    inputs: &[ConvergenceInput],
) -> Vec<Result<ConvergenceOutput, ConvergenceError>> {
    inputs.par_iter().map(convergence_search).collect()
}
