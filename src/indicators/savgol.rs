//! # Savitzky-Golay Filter (SAVGOL)
//!
//! Local-polynomial regression smoothing. At each position a polynomial of
//! degree `poly_order` is least-squares fitted over a centered window of
//! `window_length` samples and evaluated at the window center, producing a
//! symmetric (non-lagging) smoothed value. The edges are handled by fitting
//! one polynomial to the first/last `window_length` samples and evaluating
//! it at the edge positions.
//!
//! ## Parameters
//! - **window_length**: Sliding window size, must be odd. Defaults to 7.
//! - **poly_order**: Polynomial degree, must be less than `window_length`.
//!   Defaults to 2.
//!
//! ## Errors
//! - **EmptyData**: savgol: Input data slice is empty.
//! - **EvenWindowLength**: savgol: `window_length` is even.
//! - **WindowLongerThanData**: savgol: `window_length` exceeds the data length.
//! - **InvalidPolyOrder**: savgol: `poly_order >= window_length`.
//! - **IllConditioned**: savgol: the least-squares system could not be solved.
//!
//! ## Returns
//! - **`Ok(SavgolOutput)`** on success, containing a `Vec<f64>` matching the
//!   input length.
//! - **`Err(SavgolError)`** otherwise.

use crate::utilities::data_loader::{source_type, Candles};
use thiserror::Error;

#[derive(Debug, Clone)]
pub enum SavgolData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
    },
    Slice(&'a [f64]),
}

#[derive(Debug, Clone)]
pub struct SavgolOutput {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SavgolParams {
    pub window_length: Option<usize>,
    pub poly_order: Option<usize>,
}

impl Default for SavgolParams {
    fn default() -> Self {
        Self {
            window_length: Some(7),
            poly_order: Some(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SavgolInput<'a> {
    pub data: SavgolData<'a>,
    pub params: SavgolParams,
}

impl<'a> SavgolInput<'a> {
    pub fn from_candles(candles: &'a Candles, source: &'a str, params: SavgolParams) -> Self {
        Self {
            data: SavgolData::Candles { candles, source },
            params,
        }
    }

    pub fn from_slice(slice: &'a [f64], params: SavgolParams) -> Self {
        Self {
            data: SavgolData::Slice(slice),
            params,
        }
    }

    pub fn with_default_candles(candles: &'a Candles) -> Self {
        Self::from_candles(candles, "close", SavgolParams::default())
    }

    pub fn get_window_length(&self) -> usize {
        self.params.window_length.unwrap_or(7)
    }

    pub fn get_poly_order(&self) -> usize {
        self.params.poly_order.unwrap_or(2)
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct SavgolBuilder {
    window_length: Option<usize>,
    poly_order: Option<usize>,
}

impl SavgolBuilder {
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
    pub fn apply(self, candles: &Candles) -> Result<SavgolOutput, SavgolError> {
        let params = SavgolParams {
            window_length: self.window_length,
            poly_order: self.poly_order,
        };
        savgol(&SavgolInput::from_candles(candles, "close", params))
    }
    pub fn apply_slice(self, data: &[f64]) -> Result<SavgolOutput, SavgolError> {
        let params = SavgolParams {
            window_length: self.window_length,
            poly_order: self.poly_order,
        };
        savgol(&SavgolInput::from_slice(data, params))
    }
}

#[derive(Debug, Error)]
pub enum SavgolError {
    #[error("savgol: Empty data provided.")]
    EmptyData,
    #[error("savgol: window_length must be odd: window_length = {window_length}")]
    EvenWindowLength { window_length: usize },
    #[error("savgol: window_length must not exceed the data length: window_length = {window_length}, data length = {data_len}")]
    WindowLongerThanData {
        window_length: usize,
        data_len: usize,
    },
    #[error("savgol: poly_order must be less than window_length: poly_order = {poly_order}, window_length = {window_length}")]
    InvalidPolyOrder {
        poly_order: usize,
        window_length: usize,
    },
    #[error("savgol: least-squares system is ill-conditioned.")]
    IllConditioned,
}

#[inline]
pub fn savgol(input: &SavgolInput) -> Result<SavgolOutput, SavgolError> {
    let data: &[f64] = match &input.data {
        SavgolData::Candles { candles, source } => source_type(candles, source),
        SavgolData::Slice(slice) => slice,
    };

    if data.is_empty() {
        return Err(SavgolError::EmptyData);
    }

    let window_length = input.get_window_length();
    let poly_order = input.get_poly_order();
    validate_savgol_params(window_length, poly_order, data.len())?;

    let values = savgol_compute(data, window_length, poly_order)
        .ok_or(SavgolError::IllConditioned)?;
    Ok(SavgolOutput { values })
}

#[inline]
pub(crate) fn validate_savgol_params(
    window_length: usize,
    poly_order: usize,
    data_len: usize,
) -> Result<(), SavgolError> {
    if window_length % 2 == 0 {
        return Err(SavgolError::EvenWindowLength { window_length });
    }
    if window_length > data_len {
        return Err(SavgolError::WindowLongerThanData {
            window_length,
            data_len,
        });
    }
    if poly_order >= window_length {
        return Err(SavgolError::InvalidPolyOrder {
            poly_order,
            window_length,
        });
    }
    Ok(())
}

/// Core pass over validated input. Returns `None` if the normal equations
/// cannot be solved (distinct abscissae make this unreachable in practice).
pub(crate) fn savgol_compute(
    data: &[f64],
    window_length: usize,
    poly_order: usize,
) -> Option<Vec<f64>> {
    let len = data.len();
    let half = window_length / 2;
    let mut out = vec![0.0; len];

    // Interior: one fixed convolution weight per window offset. The weights
    // are the center row of the least-squares projection for the window.
    let weights = central_weights(window_length, poly_order)?;
    for i in half..len - half {
        let mut acc = 0.0;
        for (w, &y) in weights.iter().zip(&data[i - half..=i + half]) {
            acc += w * y;
        }
        out[i] = acc;
    }

    // Leading edge: fit one polynomial to the first window and evaluate it
    // at positions 0..half.
    let xs: Vec<f64> = (0..window_length).map(|x| x as f64).collect();
    let head = polyfit(&xs, &data[..window_length], poly_order)?;
    for (i, v) in out.iter_mut().take(half).enumerate() {
        *v = polyval(&head, i as f64);
    }

    // Trailing edge: same with the last window.
    let tail = polyfit(&xs, &data[len - window_length..], poly_order)?;
    for i in 0..half {
        out[len - half + i] = polyval(&tail, (window_length - half + i) as f64);
    }

    Some(out)
}

/// Convolution weights for the window center: `A (A^T A)^{-1} e0` where `A`
/// is the Vandermonde matrix over offsets `-half..=half`.
fn central_weights(window_length: usize, poly_order: usize) -> Option<Vec<f64>> {
    let half = (window_length / 2) as isize;
    let terms = poly_order + 1;

    let mut normal = vec![vec![0.0; terms]; terms];
    for j in -half..=half {
        let x = j as f64;
        let mut pw = vec![1.0; 2 * poly_order + 1];
        for k in 1..pw.len() {
            pw[k] = pw[k - 1] * x;
        }
        for r in 0..terms {
            for c in 0..terms {
                normal[r][c] += pw[r + c];
            }
        }
    }

    let mut e0 = vec![0.0; terms];
    e0[0] = 1.0;
    let z = solve_linear(normal, e0)?;

    Some((-half..=half).map(|j| polyval(&z, j as f64)).collect())
}

/// Least-squares polynomial fit via the normal equations.
fn polyfit(xs: &[f64], ys: &[f64], poly_order: usize) -> Option<Vec<f64>> {
    let terms = poly_order + 1;
    let mut normal = vec![vec![0.0; terms]; terms];
    let mut rhs = vec![0.0; terms];

    for (&x, &y) in xs.iter().zip(ys) {
        let mut pw = vec![1.0; 2 * poly_order + 1];
        for k in 1..pw.len() {
            pw[k] = pw[k - 1] * x;
        }
        for r in 0..terms {
            for c in 0..terms {
                normal[r][c] += pw[r + c];
            }
            rhs[r] += pw[r] * y;
        }
    }

    solve_linear(normal, rhs)
}

#[inline]
fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Gaussian elimination with partial pivoting. Returns `None` when the
/// system is singular.
fn solve_linear(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if m[row][col].abs() > m[pivot][col].abs() {
                pivot = row;
            }
        }
        if m[pivot][col].abs() < 1e-300 {
            return None;
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);

        let diag = m[col][col];
        for row in col + 1..n {
            let factor = m[row][col] / diag;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = rhs[row];
        for k in row + 1..n {
            acc -= m[row][k] * x[k];
        }
        x[row] = acc / m[row][row];
    }
    Some(x)
}
