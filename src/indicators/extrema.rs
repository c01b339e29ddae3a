//! # Local Extrema Detection (EXTREMA)
//!
//! Two-stage smoothing (Savitzky-Golay pass, then Gaussian kernel pass)
//! followed by strict-neighbor extrema detection on the smoothed curve and
//! refinement against the raw prices. Available both as a one-shot pass
//! ([`extrema`]) and as the stateful [`ExtremaTracker`] that re-smooths only
//! a bounded window around the newest samples on each call.
//!
//! Each candidate from the smoothed curve is refined by taking the raw-price
//! arg-max/arg-min over the symmetric neighborhood `idx-2 ..= idx+2` (clamped
//! to the series), so reported extrema always sit on raw prices.
//!
//! ## Parameters
//! - **window_length**: Savitzky-Golay window, odd and at least 3. Defaults to 7.
//! - **poly_order**: Savitzky-Golay polynomial degree, less than
//!   `window_length`. Defaults to 2.
//! - **sigma**: Gaussian kernel standard deviation. Defaults to 1.5.
//! - **buffer**: How many samples before the cursor get re-smoothed on an
//!   incremental update, at least 1. Defaults to 20.
//!
//! ## Errors
//! - **EmptyData**: extrema: Input data slice is empty.
//! - **InvalidWindowLength**: extrema: `window_length` is even or below 3.
//! - **WindowLongerThanData**: extrema: `window_length` exceeds the
//!   re-smoothing window.
//! - **InvalidPolyOrder** / **InvalidSigma** / **InvalidBuffer**: bad
//!   smoothing configuration.
//! - **CursorPastEnd**: extrema: the tracker cursor points past the end of
//!   the supplied series; the caller replaced the series instead of
//!   appending to it.
//!
//! ## Returns
//! - **`Ok(ExtremaOutput)`** from the one-shot pass: maxima/minima
//!   `(index, price)` lists plus the smoothed curve.
//! - **`Err(ExtremaError)`** otherwise.

use crate::indicators::gaussian_smooth::gaussian_smooth_compute;
use crate::indicators::savgol::savgol_compute;
use crate::utilities::data_loader::{source_type, Candles};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone)]
pub enum ExtremaData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
    },
    Slice(&'a [f64]),
}

#[derive(Debug, Clone)]
pub struct ExtremaParams {
    pub window_length: Option<usize>,
    pub poly_order: Option<usize>,
    pub sigma: Option<f64>,
    pub buffer: Option<usize>,
}

impl Default for ExtremaParams {
    fn default() -> Self {
        Self {
            window_length: Some(7),
            poly_order: Some(2),
            sigma: Some(1.5),
            buffer: Some(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtremaInput<'a> {
    pub data: ExtremaData<'a>,
    pub params: ExtremaParams,
}

impl<'a> ExtremaInput<'a> {
    pub fn from_candles(candles: &'a Candles, source: &'a str, params: ExtremaParams) -> Self {
        Self {
            data: ExtremaData::Candles { candles, source },
            params,
        }
    }

    pub fn from_slice(slice: &'a [f64], params: ExtremaParams) -> Self {
        Self {
            data: ExtremaData::Slice(slice),
            params,
        }
    }

    pub fn with_default_candles(candles: &'a Candles) -> Self {
        Self::from_candles(candles, "close", ExtremaParams::default())
    }

    pub fn get_window_length(&self) -> usize {
        self.params.window_length.unwrap_or(7)
    }
    pub fn get_poly_order(&self) -> usize {
        self.params.poly_order.unwrap_or(2)
    }
    pub fn get_sigma(&self) -> f64 {
        self.params.sigma.unwrap_or(1.5)
    }
    pub fn get_buffer(&self) -> usize {
        self.params.buffer.unwrap_or(20)
    }
}

/// One-shot output: extrema as `(index, price)` pairs over the raw series,
/// plus the fully smoothed curve.
#[derive(Debug, Clone)]
pub struct ExtremaOutput {
    pub maxima: Vec<(usize, f64)>,
    pub minima: Vec<(usize, f64)>,
    pub smoothed: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum ExtremaError {
    #[error("extrema: Empty data provided.")]
    EmptyData,
    #[error("extrema: window_length must be odd and at least 3: window_length = {window_length}")]
    InvalidWindowLength { window_length: usize },
    #[error("extrema: window_length must not exceed the window: window_length = {window_length}, window length = {data_len}")]
    WindowLongerThanData {
        window_length: usize,
        data_len: usize,
    },
    #[error("extrema: poly_order must be less than window_length: poly_order = {poly_order}, window_length = {window_length}")]
    InvalidPolyOrder {
        poly_order: usize,
        window_length: usize,
    },
    #[error("extrema: sigma must be finite and positive: sigma = {sigma}")]
    InvalidSigma { sigma: f64 },
    #[error("extrema: buffer must be at least 1.")]
    InvalidBuffer,
    #[error("extrema: least-squares system is ill-conditioned.")]
    IllConditioned,
    #[error("extrema: cursor {cursor} points past the end of the series (len = {data_len}); the series must be appended to, never replaced")]
    CursorPastEnd { cursor: usize, data_len: usize },
}

#[derive(Copy, Clone, Debug, Default)]
pub struct ExtremaBuilder {
    window_length: Option<usize>,
    poly_order: Option<usize>,
    sigma: Option<f64>,
    buffer: Option<usize>,
}

impl ExtremaBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn window_length(mut self, n: usize) -> Self {
        self.window_length = Some(n);
        self
    }
    pub fn poly_order(mut self, p: usize) -> Self {
        self.poly_order = Some(p);
        self
    }
    pub fn sigma(mut self, s: f64) -> Self {
        self.sigma = Some(s);
        self
    }
    pub fn buffer(mut self, b: usize) -> Self {
        self.buffer = Some(b);
        self
    }
    fn params(self) -> ExtremaParams {
        ExtremaParams {
            window_length: self.window_length,
            poly_order: self.poly_order,
            sigma: self.sigma,
            buffer: self.buffer,
        }
    }
    pub fn apply(self, candles: &Candles) -> Result<ExtremaOutput, ExtremaError> {
        extrema(&ExtremaInput::from_candles(candles, "close", self.params()))
    }
    pub fn apply_slice(self, data: &[f64]) -> Result<ExtremaOutput, ExtremaError> {
        extrema(&ExtremaInput::from_slice(data, self.params()))
    }
    pub fn into_tracker(self) -> Result<ExtremaTracker, ExtremaError> {
        ExtremaTracker::try_new(self.params())
    }
}

fn validate_extrema_params(
    window_length: usize,
    poly_order: usize,
    sigma: f64,
    buffer: usize,
) -> Result<(), ExtremaError> {
    if window_length % 2 == 0 || window_length < 3 {
        return Err(ExtremaError::InvalidWindowLength { window_length });
    }
    if poly_order >= window_length {
        return Err(ExtremaError::InvalidPolyOrder {
            poly_order,
            window_length,
        });
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(ExtremaError::InvalidSigma { sigma });
    }
    if buffer == 0 {
        return Err(ExtremaError::InvalidBuffer);
    }
    Ok(())
}

/// Raw-price arg-max over `idx-2 ..= idx+2` clamped to the series, first
/// occurrence on ties.
fn refine_argmax(prices: &[f64], idx: usize) -> usize {
    let lo = idx.saturating_sub(2);
    let hi = (idx + 3).min(prices.len());
    let mut best = lo;
    for j in lo + 1..hi {
        if prices[j] > prices[best] {
            best = j;
        }
    }
    best
}

fn refine_argmin(prices: &[f64], idx: usize) -> usize {
    let lo = idx.saturating_sub(2);
    let hi = (idx + 3).min(prices.len());
    let mut best = lo;
    for j in lo + 1..hi {
        if prices[j] < prices[best] {
            best = j;
        }
    }
    best
}

/// Direction-carrying monotonicity check. `direction` is the trend already
/// established before `segment` (`0` for none): the first strictly-unequal
/// pair may set or confirm it, equal pairs are neutral, and any move against
/// the current direction breaks the run. Returns the updated direction, or
/// `None` when the run is broken.
fn monotonic_direction(segment: &[f64], mut direction: i8) -> Option<i8> {
    for pair in segment.windows(2) {
        if pair[1] > pair[0] {
            if direction < 0 {
                return None;
            }
            direction = 1;
        } else if pair[1] < pair[0] {
            if direction > 0 {
                return None;
            }
            direction = -1;
        }
    }
    Some(direction)
}

/// Trend direction at the end of a segment: the sign of the last
/// strictly-unequal pair, `0` when all values are equal.
fn tail_direction(segment: &[f64]) -> i8 {
    for pair in segment.windows(2).rev() {
        if pair[1] > pair[0] {
            return 1;
        }
        if pair[1] < pair[0] {
            return -1;
        }
    }
    0
}

#[inline]
pub fn extrema(input: &ExtremaInput) -> Result<ExtremaOutput, ExtremaError> {
    let data: &[f64] = match &input.data {
        ExtremaData::Candles { candles, source } => source_type(candles, source),
        ExtremaData::Slice(slice) => slice,
    };
    if data.is_empty() {
        return Err(ExtremaError::EmptyData);
    }

    let window_length = input.get_window_length();
    let poly_order = input.get_poly_order();
    let sigma = input.get_sigma();
    validate_extrema_params(window_length, poly_order, sigma, input.get_buffer())?;
    if window_length > data.len() {
        return Err(ExtremaError::WindowLongerThanData {
            window_length,
            data_len: data.len(),
        });
    }

    let smoothed = savgol_compute(data, window_length, poly_order)
        .ok_or(ExtremaError::IllConditioned)?;
    let smoothed = gaussian_smooth_compute(&smoothed, sigma);

    let mut maxima: Vec<(usize, f64)> = Vec::new();
    let mut minima: Vec<(usize, f64)> = Vec::new();
    let mut seen_maxima: HashSet<usize> = HashSet::new();
    let mut seen_minima: HashSet<usize> = HashSet::new();

    for i in 1..smoothed.len() - 1 {
        let g = smoothed[i];
        if g > smoothed[i - 1] && g > smoothed[i + 1] {
            let refined = refine_argmax(data, i);
            if seen_maxima.insert(refined)
                && maxima.last().map_or(true, |&(last, _)| refined > last)
            {
                maxima.push((refined, data[refined]));
            }
        } else if g < smoothed[i - 1] && g < smoothed[i + 1] {
            let refined = refine_argmin(data, i);
            if seen_minima.insert(refined)
                && minima.last().map_or(true, |&(last, _)| refined > last)
            {
                minima.push((refined, data[refined]));
            }
        }
    }

    Ok(ExtremaOutput {
        maxima,
        minima,
        smoothed,
    })
}

/// Most recently recorded extremum on each side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatestExtrema {
    pub maximum: Option<(usize, f64)>,
    pub minimum: Option<(usize, f64)>,
}

/// Stateful incremental extrema detector.
///
/// The tracker owns only derived state (extrema lists and the smoothed
/// curve); the caller owns the price series and passes it to every
/// [`ExtremaTracker::update`] call, so the tracker always observes the
/// series at its current length. Prices must only ever be appended between
/// calls — a series that shrank is reported as
/// [`ExtremaError::CursorPastEnd`].
///
/// A monotonic tail rides a fast path that skips re-smoothing. The trend
/// direction is carried across calls, so a reversal triggers the next
/// smoothing pass no matter how the appends are chunked — a one-sample
/// append is monotonic in isolation but still breaks a carried run.
#[derive(Debug, Clone)]
pub struct ExtremaTracker {
    window_length: usize,
    poly_order: usize,
    sigma: f64,
    buffer: usize,
    last_detected: Option<usize>,
    direction: i8,
    maxima: Vec<(usize, f64)>,
    minima: Vec<(usize, f64)>,
    seen_maxima: HashSet<usize>,
    seen_minima: HashSet<usize>,
    smoothed_curve: Vec<f64>,
    // Samples past this length were carried raw by the fast path and are
    // replaced wholesale by the next smoothing pass.
    smoothed_valid_len: usize,
}

impl ExtremaTracker {
    pub fn try_new(params: ExtremaParams) -> Result<Self, ExtremaError> {
        let window_length = params.window_length.unwrap_or(7);
        let poly_order = params.poly_order.unwrap_or(2);
        let sigma = params.sigma.unwrap_or(1.5);
        let buffer = params.buffer.unwrap_or(20);
        validate_extrema_params(window_length, poly_order, sigma, buffer)?;

        Ok(Self {
            window_length,
            poly_order,
            sigma,
            buffer,
            last_detected: None,
            direction: 0,
            maxima: Vec::new(),
            minima: Vec::new(),
            seen_maxima: HashSet::new(),
            seen_minima: HashSet::new(),
            smoothed_curve: Vec::new(),
            smoothed_valid_len: 0,
        })
    }

    /// Retunes the smoothing parameters; `None` fields keep their current
    /// value. Validation failures leave the tracker untouched.
    pub fn set_params(&mut self, params: &ExtremaParams) -> Result<(), ExtremaError> {
        let window_length = params.window_length.unwrap_or(self.window_length);
        let poly_order = params.poly_order.unwrap_or(self.poly_order);
        let sigma = params.sigma.unwrap_or(self.sigma);
        let buffer = params.buffer.unwrap_or(self.buffer);
        validate_extrema_params(window_length, poly_order, sigma, buffer)?;

        self.window_length = window_length;
        self.poly_order = poly_order;
        self.sigma = sigma;
        self.buffer = buffer;
        Ok(())
    }

    /// Incorporates any prices appended since the previous call.
    ///
    /// Errors abort the call before any state mutation: an update is either
    /// fully applied or fully rejected.
    pub fn update(&mut self, prices: &[f64]) -> Result<(), ExtremaError> {
        let len = prices.len();

        if let Some(cursor) = self.last_detected {
            if cursor >= len {
                return Err(ExtremaError::CursorPastEnd {
                    cursor,
                    data_len: len,
                });
            }
            if cursor == len - 1 {
                // Already current.
                return Ok(());
            }
            if let Some(direction) = monotonic_direction(&prices[cursor..], self.direction) {
                // The run that started before the cursor is still unbroken,
                // so no extremum can have formed. The curve keeps pace with
                // the series by carrying the raw tail; `smoothed_valid_len`
                // stays put so the next smoothing pass replaces it.
                let prev_len = self.smoothed_curve.len();
                self.smoothed_curve.extend_from_slice(&prices[prev_len..]);
                self.direction = direction;
                self.last_detected = Some(len - 1);
                return Ok(());
            }
        }

        // The window reaches back `buffer` samples behind the cursor, and
        // further when fast-path calls carried raw samples past that point,
        // so every sample beyond `smoothed_valid_len` gets smoothed.
        let start = match self.last_detected {
            Some(cursor) => cursor
                .saturating_sub(self.buffer)
                .min(self.smoothed_valid_len),
            None => 0,
        };
        let window = &prices[start..];
        if self.window_length > window.len() {
            return Err(ExtremaError::WindowLongerThanData {
                window_length: self.window_length,
                data_len: window.len(),
            });
        }

        let smoothed = savgol_compute(window, self.window_length, self.poly_order)
            .ok_or(ExtremaError::IllConditioned)?;
        let gauss = gaussian_smooth_compute(&smoothed, self.sigma);

        // Splice: grow the curve to the series length, then overwrite
        // everything past the last genuinely smoothed sample with freshly
        // smoothed values. Raw samples carried by the fast path never
        // survive a smoothing pass.
        if self.last_detected.is_none() {
            self.smoothed_curve = gauss.clone();
        } else {
            let fresh = len - self.smoothed_valid_len;
            self.smoothed_curve.resize(len, 0.0);
            self.smoothed_curve[len - fresh..].copy_from_slice(&gauss[gauss.len() - fresh..]);
        }
        self.smoothed_valid_len = len;

        // Strict-neighbor extrema inside the smoothed window, mapped to
        // global indices and refined against the raw prices. Indices that
        // were already recorded (the window reaches back over `buffer`
        // already-processed samples) are dropped, as is anything that would
        // break the strictly-increasing index order of a list.
        for i in 1..gauss.len() - 1 {
            let g = gauss[i];
            if g > gauss[i - 1] && g > gauss[i + 1] {
                let refined = refine_argmax(prices, start + i);
                if !self.seen_maxima.contains(&refined)
                    && self.maxima.last().map_or(true, |&(last, _)| refined > last)
                {
                    self.seen_maxima.insert(refined);
                    self.maxima.push((refined, prices[refined]));
                }
            } else if g < gauss[i - 1] && g < gauss[i + 1] {
                let refined = refine_argmin(prices, start + i);
                if !self.seen_minima.contains(&refined)
                    && self.minima.last().map_or(true, |&(last, _)| refined > last)
                {
                    self.seen_minima.insert(refined);
                    self.minima.push((refined, prices[refined]));
                }
            }
        }

        self.direction = tail_direction(window);
        self.last_detected = Some(len - 1);
        Ok(())
    }

    /// Recorded maxima as `(index, price)` pairs, index strictly increasing.
    pub fn maxima(&self) -> &[(usize, f64)] {
        &self.maxima
    }

    /// Recorded minima as `(index, price)` pairs, index strictly increasing.
    pub fn minima(&self) -> &[(usize, f64)] {
        &self.minima
    }

    /// Smoothed curve, same length as the price series after every
    /// successful update. Samples past the last smoothing pass are carried
    /// from raw prices and are replaced by the next pass.
    pub fn smoothed_curve(&self) -> &[f64] {
        &self.smoothed_curve
    }

    /// Highest price index already incorporated, `None` before the first
    /// successful update.
    pub fn last_detected_index(&self) -> Option<usize> {
        self.last_detected
    }

    /// Most recently recorded maximum and minimum, either side `None` while
    /// its list is still empty.
    pub fn latest_extrema(&self) -> LatestExtrema {
        LatestExtrema {
            maximum: self.maxima.last().copied(),
            minimum: self.minima.last().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tent_wave(n: usize) -> Vec<f64> {
        // Triangle wave with period 8: troughs at i % 8 == 0, peaks at
        // i % 8 == 4.
        (0..n)
            .map(|i| {
                let k = i % 8;
                let v = if k <= 4 { k } else { 8 - k };
                100.0 + v as f64
            })
            .collect()
    }

    fn default_tracker() -> ExtremaTracker {
        ExtremaTracker::try_new(ExtremaParams {
            window_length: Some(5),
            poly_order: Some(2),
            sigma: Some(1.0),
            buffer: Some(20),
        })
        .expect("Failed to build tracker")
    }

    #[test]
    fn test_extrema_param_validation() {
        let bad = [
            ExtremaParams {
                window_length: Some(4),
                ..ExtremaParams::default()
            },
            ExtremaParams {
                window_length: Some(1),
                ..ExtremaParams::default()
            },
            ExtremaParams {
                window_length: Some(5),
                poly_order: Some(5),
                ..ExtremaParams::default()
            },
            ExtremaParams {
                sigma: Some(0.0),
                ..ExtremaParams::default()
            },
            ExtremaParams {
                buffer: Some(0),
                ..ExtremaParams::default()
            },
        ];
        for params in bad {
            assert!(
                ExtremaTracker::try_new(params.clone()).is_err(),
                "Expected tracker construction to fail for {:?}",
                params
            );
        }
    }

    #[test]
    fn test_one_shot_finds_tent_extrema() {
        let prices = tent_wave(33);
        let output = extrema(&ExtremaInput::from_slice(
            &prices,
            ExtremaParams {
                window_length: Some(5),
                poly_order: Some(2),
                sigma: Some(1.0),
                buffer: Some(20),
            },
        ))
        .expect("Failed one-shot extrema");

        let max_indices: Vec<usize> = output.maxima.iter().map(|&(i, _)| i).collect();
        let min_indices: Vec<usize> = output.minima.iter().map(|&(i, _)| i).collect();
        assert_eq!(max_indices, vec![4, 12, 20, 28], "peak indices mismatch");
        assert_eq!(min_indices, vec![8, 16, 24], "trough indices mismatch");
        for &(i, p) in output.maxima.iter().chain(&output.minima) {
            assert_eq!(p, prices[i], "reported price must be the raw price");
        }
        assert_eq!(output.smoothed.len(), prices.len());
    }

    #[test]
    fn test_one_shot_window_longer_than_data() {
        let prices = [1.0, 2.0, 3.0];
        let result = extrema(&ExtremaInput::from_slice(&prices, ExtremaParams::default()));
        assert!(result.is_err(), "Expected error for window > data length");
    }

    #[test]
    fn test_tracker_first_update_matches_one_shot() {
        let prices = tent_wave(40);
        let params = ExtremaParams {
            window_length: Some(5),
            poly_order: Some(2),
            sigma: Some(1.0),
            buffer: Some(20),
        };
        let one_shot =
            extrema(&ExtremaInput::from_slice(&prices, params.clone())).expect("one-shot failed");

        let mut tracker = ExtremaTracker::try_new(params).expect("tracker failed");
        tracker.update(&prices).expect("update failed");

        assert_eq!(tracker.maxima(), one_shot.maxima.as_slice());
        assert_eq!(tracker.minima(), one_shot.minima.as_slice());
        assert_eq!(tracker.smoothed_curve(), one_shot.smoothed.as_slice());
        assert_eq!(tracker.last_detected_index(), Some(prices.len() - 1));
    }

    #[test]
    fn test_update_is_idempotent() {
        let prices = tent_wave(30);
        let mut tracker = default_tracker();
        tracker.update(&prices).expect("first update failed");

        let maxima = tracker.maxima().to_vec();
        let minima = tracker.minima().to_vec();
        let curve = tracker.smoothed_curve().to_vec();
        let cursor = tracker.last_detected_index();

        tracker.update(&prices).expect("second update failed");
        assert_eq!(tracker.maxima(), maxima.as_slice());
        assert_eq!(tracker.minima(), minima.as_slice());
        assert_eq!(tracker.smoothed_curve(), curve.as_slice());
        assert_eq!(tracker.last_detected_index(), cursor);
    }

    #[test]
    fn test_monotonic_fast_path_no_spurious_extrema() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + 0.5 * i as f64).collect();

        let mut incremental = default_tracker();
        incremental.update(&prices[..10]).expect("seed update failed");
        for end in 11..=prices.len() {
            incremental.update(&prices[..end]).expect("append update failed");
            assert_eq!(
                incremental.smoothed_curve().len(),
                end,
                "curve length invariant broken at len {}",
                end
            );
        }

        let mut batch = default_tracker();
        batch.update(&prices).expect("batch update failed");

        assert_eq!(
            incremental.last_detected_index(),
            batch.last_detected_index()
        );
        assert!(incremental.maxima().is_empty(), "ramp has no maxima");
        assert!(incremental.minima().is_empty(), "ramp has no minima");
        assert!(batch.maxima().is_empty());
        assert!(batch.minima().is_empty());
    }

    #[test]
    fn test_incremental_chunks_match_batch() {
        // Appends of 2-3 points straddling a peak exercise the bounded
        // re-smoothing path; the final extrema must match one batch update
        // on the full series.
        let prices = tent_wave(40);

        let mut incremental = default_tracker();
        incremental.update(&prices[..35]).expect("seed update failed");
        incremental.update(&prices[..38]).expect("chunk update failed");
        incremental.update(&prices[..40]).expect("tail update failed");

        let mut batch = default_tracker();
        batch.update(&prices[..35]).expect("seed update failed");
        batch.update(&prices).expect("batch update failed");

        assert_eq!(incremental.maxima(), batch.maxima());
        assert_eq!(incremental.minima(), batch.minima());
        assert_eq!(incremental.last_detected_index(), batch.last_detected_index());
        assert_eq!(incremental.smoothed_curve().len(), prices.len());
    }

    #[test]
    fn test_dedup_invariant_across_updates() {
        let prices = tent_wave(48);
        let mut tracker = default_tracker();
        for end in (8..=48).step_by(4) {
            tracker.update(&prices[..end]).expect("update failed");
        }

        let max_set: HashSet<usize> = tracker.maxima().iter().map(|&(i, _)| i).collect();
        let min_set: HashSet<usize> = tracker.minima().iter().map(|&(i, _)| i).collect();
        assert_eq!(max_set.len(), tracker.maxima().len(), "duplicate maxima");
        assert_eq!(min_set.len(), tracker.minima().len(), "duplicate minima");
        assert!(
            max_set.is_disjoint(&min_set),
            "an index appears in both lists"
        );
        for pair in tracker.maxima().windows(2) {
            assert!(pair[0].0 < pair[1].0, "maxima indices not increasing");
        }
        for pair in tracker.minima().windows(2) {
            assert!(pair[0].0 < pair[1].0, "minima indices not increasing");
        }
    }

    #[test]
    fn test_cursor_past_end_is_fatal() {
        let prices = tent_wave(30);
        let mut tracker = default_tracker();
        tracker.update(&prices).expect("update failed");

        let maxima = tracker.maxima().to_vec();
        let result = tracker.update(&prices[..10]);
        assert!(
            matches!(result, Err(ExtremaError::CursorPastEnd { .. })),
            "Expected CursorPastEnd, got {:?}",
            result
        );
        // State untouched by the failed call.
        assert_eq!(tracker.maxima(), maxima.as_slice());
        assert_eq!(tracker.last_detected_index(), Some(29));
    }

    #[test]
    fn test_update_empty_series_fails_without_mutation() {
        let mut tracker = default_tracker();
        let result = tracker.update(&[]);
        assert!(result.is_err(), "Expected error for empty series");
        assert_eq!(tracker.last_detected_index(), None);
        assert!(tracker.smoothed_curve().is_empty());
    }

    #[test]
    fn test_latest_extrema() {
        let mut tracker = default_tracker();
        assert_eq!(
            tracker.latest_extrema(),
            LatestExtrema {
                maximum: None,
                minimum: None
            }
        );

        let prices = tent_wave(33);
        tracker.update(&prices).expect("update failed");
        let latest = tracker.latest_extrema();
        assert_eq!(latest.maximum, Some((28, prices[28])));
        assert_eq!(latest.minimum, Some((24, prices[24])));
    }

    #[test]
    fn test_set_params_validates_and_applies() {
        let mut tracker = default_tracker();
        let result = tracker.set_params(&ExtremaParams {
            window_length: None,
            poly_order: None,
            sigma: Some(-2.0),
            buffer: None,
        });
        assert!(result.is_err(), "Expected error for negative sigma");

        tracker
            .set_params(&ExtremaParams {
                window_length: Some(7),
                poly_order: None,
                sigma: None,
                buffer: Some(10),
            })
            .expect("Failed to retune params");
        let prices = tent_wave(30);
        tracker.update(&prices).expect("update after retune failed");
        assert_eq!(tracker.smoothed_curve().len(), prices.len());
    }

    #[test]
    fn test_monotonic_direction_rules() {
        assert_eq!(monotonic_direction(&[1.0, 2.0, 2.0, 3.0], 0), Some(1));
        assert_eq!(monotonic_direction(&[3.0, 3.0, 2.0, 1.0], 0), Some(-1));
        assert_eq!(monotonic_direction(&[5.0, 5.0, 5.0], 0), Some(0));
        assert_eq!(monotonic_direction(&[1.0], 0), Some(0));
        assert_eq!(monotonic_direction(&[1.0, 2.0, 1.5], 0), None);
        assert_eq!(monotonic_direction(&[3.0, 2.0, 2.5], 0), None);
        // A segment monotonic on its own still breaks a carried trend.
        assert_eq!(monotonic_direction(&[2.0, 3.0], -1), None);
        assert_eq!(monotonic_direction(&[3.0, 2.0], 1), None);
        assert_eq!(monotonic_direction(&[2.0, 2.0], 1), Some(1));

        assert_eq!(tail_direction(&[1.0, 2.0, 1.5]), -1);
        assert_eq!(tail_direction(&[3.0, 1.0, 1.0]), -1);
        assert_eq!(tail_direction(&[4.0, 4.0]), 0);
    }

    #[test]
    fn test_single_point_appends_match_batch() {
        // One-sample appends are always monotonic in isolation, so the fast
        // path must carry the trend direction across calls: the upturn after
        // index 40 has to trigger a re-smoothing pass even though every
        // individual segment is two monotonic samples.
        let prices = tent_wave(45);

        let mut incremental = default_tracker();
        incremental.update(&prices[..40]).expect("seed update failed");
        for end in 41..=45 {
            incremental.update(&prices[..end]).expect("append update failed");
            assert_eq!(incremental.smoothed_curve().len(), end);
        }

        let mut batch = default_tracker();
        batch.update(&prices[..40]).expect("seed update failed");
        batch.update(&prices).expect("batch update failed");

        assert_eq!(incremental.maxima(), batch.maxima(), "maxima mismatch");
        assert_eq!(incremental.minima(), batch.minima(), "minima mismatch");
        assert_eq!(
            incremental.last_detected_index(),
            batch.last_detected_index()
        );
        assert!(
            incremental.minima().iter().any(|&(i, _)| i == 40),
            "trough at 40 must be found despite one-sample appends"
        );
    }

    #[test]
    fn test_fast_path_tail_resmoothed_after_reversal() {
        // Raw samples carried by the fast path sit in the curve only until
        // the next smoothing pass, which overwrites every sample past the
        // last genuinely smoothed one.
        let mut prices = tent_wave(30);
        prices.extend_from_slice(&[102.0, 100.5, 99.5, 99.0, 98.8]);

        let mut tracker = default_tracker();
        tracker.update(&prices[..30]).expect("seed update failed");
        for end in 31..=35 {
            tracker.update(&prices[..end]).expect("append update failed");
        }
        // The falling appends all ride the fast path; the active edge
        // carries raw samples for now.
        assert_eq!(&tracker.smoothed_curve()[30..], &prices[30..]);

        prices.push(99.3);
        tracker.update(&prices).expect("reversal update failed");

        // Cursor 34, buffer 20: the pass smooths prices[14..36] and the last
        // six samples of its output replace the raw-carried tail.
        let sav = savgol_compute(&prices[14..36], 5, 2).expect("savgol failed");
        let gauss = gaussian_smooth_compute(&sav, 1.0);
        let curve = tracker.smoothed_curve();
        assert_eq!(curve.len(), prices.len());
        for (i, (&got, &want)) in curve[30..36].iter().zip(&gauss[16..22]).enumerate() {
            assert!(
                (got - want).abs() < 1e-12,
                "curve tail not re-smoothed at offset {}: expected {}, got {}",
                i,
                want,
                got
            );
        }
        assert!(
            (curve[31] - prices[31]).abs() > 1e-3,
            "raw price survived the smoothing pass"
        );
    }

    #[test]
    fn test_long_fast_path_run_fully_resmoothed() {
        // A monotonic run longer than `buffer` carries more raw samples than
        // the cursor-minus-buffer window would cover; the smoothing window
        // must reach back far enough to replace all of them.
        let mut prices = tent_wave(30);
        for k in 1..=25 {
            prices.push(103.0 - 0.4 * k as f64);
        }

        let mut tracker = default_tracker();
        tracker.update(&prices[..30]).expect("seed update failed");
        for end in 31..=55 {
            tracker.update(&prices[..end]).expect("append update failed");
        }
        assert_eq!(tracker.last_detected_index(), Some(54));

        prices.push(93.4);
        tracker.update(&prices).expect("reversal update failed");

        let sav = savgol_compute(&prices[30..56], 5, 2).expect("savgol failed");
        let gauss = gaussian_smooth_compute(&sav, 1.0);
        let curve = tracker.smoothed_curve();
        assert_eq!(curve.len(), prices.len());
        for (i, (&got, &want)) in curve[30..56].iter().zip(&gauss).enumerate() {
            assert!(
                (got - want).abs() < 1e-12,
                "raw-carried sample not replaced at offset {}: expected {}, got {}",
                i,
                want,
                got
            );
        }
        assert!(
            tracker.minima().iter().any(|&(i, _)| i == 54),
            "trough at the end of the long run must be found"
        );
    }

    #[test]
    fn test_extrema_builder_into_tracker() {
        let tracker = ExtremaBuilder::new()
            .window_length(5)
            .poly_order(2)
            .sigma(1.0)
            .buffer(15)
            .into_tracker()
            .expect("Failed to build tracker via builder");
        assert_eq!(tracker.last_detected_index(), None);
    }
}
