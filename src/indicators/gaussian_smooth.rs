//! # Gaussian Kernel Smoothing (GAUSSIAN_SMOOTH)
//!
//! Convolves the input with a truncated, normalized Gaussian kernel of
//! standard deviation `sigma`. The kernel radius is `(4.0 * sigma + 0.5)`
//! truncated to an integer. Boundaries are handled by reflect-about-edge
//! padding (`d c b a | a b c d`), applied identically on every call.
//!
//! ## Parameters
//! - **sigma**: Kernel standard deviation, must be finite and positive.
//!   Defaults to 1.5.
//!
//! ## Errors
//! - **EmptyData**: gaussian_smooth: Input data slice is empty.
//! - **InvalidSigma**: gaussian_smooth: `sigma` is non-positive or not finite.
//!
//! ## Returns
//! - **`Ok(GaussianSmoothOutput)`** on success, containing a `Vec<f64>`
//!   matching the input length.
//! - **`Err(GaussianSmoothError)`** otherwise.

use crate::utilities::data_loader::{source_type, Candles};
use thiserror::Error;

#[derive(Debug, Clone)]
pub enum GaussianSmoothData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
    },
    Slice(&'a [f64]),
}

#[derive(Debug, Clone)]
pub struct GaussianSmoothOutput {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct GaussianSmoothParams {
    pub sigma: Option<f64>,
}

impl Default for GaussianSmoothParams {
    fn default() -> Self {
        Self { sigma: Some(1.5) }
    }
}

#[derive(Debug, Clone)]
pub struct GaussianSmoothInput<'a> {
    pub data: GaussianSmoothData<'a>,
    pub params: GaussianSmoothParams,
}

impl<'a> GaussianSmoothInput<'a> {
    pub fn from_candles(
        candles: &'a Candles,
        source: &'a str,
        params: GaussianSmoothParams,
    ) -> Self {
        Self {
            data: GaussianSmoothData::Candles { candles, source },
            params,
        }
    }

    pub fn from_slice(slice: &'a [f64], params: GaussianSmoothParams) -> Self {
        Self {
            data: GaussianSmoothData::Slice(slice),
            params,
        }
    }

    pub fn with_default_candles(candles: &'a Candles) -> Self {
        Self::from_candles(candles, "close", GaussianSmoothParams::default())
    }

    pub fn get_sigma(&self) -> f64 {
        self.params.sigma.unwrap_or(1.5)
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct GaussianSmoothBuilder {
    sigma: Option<f64>,
}

impl GaussianSmoothBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn sigma(mut self, s: f64) -> Self {
        self.sigma = Some(s);
        self
    }
    pub fn apply(self, candles: &Candles) -> Result<GaussianSmoothOutput, GaussianSmoothError> {
        let params = GaussianSmoothParams { sigma: self.sigma };
        gaussian_smooth(&GaussianSmoothInput::from_candles(candles, "close", params))
    }
    pub fn apply_slice(self, data: &[f64]) -> Result<GaussianSmoothOutput, GaussianSmoothError> {
        let params = GaussianSmoothParams { sigma: self.sigma };
        gaussian_smooth(&GaussianSmoothInput::from_slice(data, params))
    }
}

#[derive(Debug, Error)]
pub enum GaussianSmoothError {
    #[error("gaussian_smooth: Empty data provided.")]
    EmptyData,
    #[error("gaussian_smooth: sigma must be finite and positive: sigma = {sigma}")]
    InvalidSigma { sigma: f64 },
}

#[inline]
pub fn gaussian_smooth(
    input: &GaussianSmoothInput,
) -> Result<GaussianSmoothOutput, GaussianSmoothError> {
    let data: &[f64] = match &input.data {
        GaussianSmoothData::Candles { candles, source } => source_type(candles, source),
        GaussianSmoothData::Slice(slice) => slice,
    };

    if data.is_empty() {
        return Err(GaussianSmoothError::EmptyData);
    }
    let sigma = input.get_sigma();
    validate_sigma(sigma)?;

    Ok(GaussianSmoothOutput {
        values: gaussian_smooth_compute(data, sigma),
    })
}

#[inline]
pub(crate) fn validate_sigma(sigma: f64) -> Result<(), GaussianSmoothError> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(GaussianSmoothError::InvalidSigma { sigma });
    }
    Ok(())
}

/// Core pass over validated input: truncated Gaussian correlation with
/// reflect padding at both edges.
pub(crate) fn gaussian_smooth_compute(data: &[f64], sigma: f64) -> Vec<f64> {
    let n = data.len() as isize;
    let radius = (4.0 * sigma + 0.5) as isize;

    let mut weights = Vec::with_capacity((2 * radius + 1) as usize);
    let mut sum = 0.0;
    for k in -radius..=radius {
        let x = k as f64 / sigma;
        let w = (-0.5 * x * x).exp();
        weights.push(w);
        sum += w;
    }
    for w in &mut weights {
        *w /= sum;
    }

    let mut out = vec![0.0; data.len()];
    for i in 0..n {
        let mut acc = 0.0;
        for (w, k) in weights.iter().zip(-radius..=radius) {
            let mut idx = i + k;
            loop {
                if idx < 0 {
                    idx = -idx - 1;
                } else if idx >= n {
                    idx = 2 * n - idx - 1;
                } else {
                    break;
                }
            }
            acc += w * data[idx as usize];
        }
        out[i as usize] = acc;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_smooth_invalid_sigma() {
        let data = [1.0, 2.0, 3.0];
        for bad in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            let params = GaussianSmoothParams { sigma: Some(bad) };
            let result = gaussian_smooth(&GaussianSmoothInput::from_slice(&data, params));
            assert!(result.is_err(), "Expected an error for sigma = {}", bad);
        }
    }

    #[test]
    fn test_gaussian_smooth_empty_data() {
        let data: [f64; 0] = [];
        let result = gaussian_smooth(&GaussianSmoothInput::from_slice(
            &data,
            GaussianSmoothParams::default(),
        ));
        assert!(result.is_err(), "Expected an error for empty data");
    }

    #[test]
    fn test_gaussian_smooth_constant_series_unchanged() {
        // A normalized kernel with reflect padding maps a constant series
        // to itself.
        let data = [42.0; 25];
        let output = gaussian_smooth(&GaussianSmoothInput::from_slice(
            &data,
            GaussianSmoothParams { sigma: Some(2.0) },
        ))
        .expect("Failed gaussian smooth on constant series");
        for (i, &v) in output.values.iter().enumerate() {
            assert!(
                (v - 42.0).abs() < 1e-12,
                "constant not preserved at index {}: got {}",
                i,
                v
            );
        }
    }

    #[test]
    fn test_gaussian_smooth_linear_interior_exact() {
        // The kernel is symmetric, so interior samples of a linear ramp
        // (further than one radius from either edge) are reproduced exactly.
        let data: Vec<f64> = (0..30).map(|i| 1.5 * i as f64 - 4.0).collect();
        let sigma = 1.0;
        let radius = (4.0 * sigma + 0.5) as usize;
        let output = gaussian_smooth(&GaussianSmoothInput::from_slice(
            &data,
            GaussianSmoothParams { sigma: Some(sigma) },
        ))
        .expect("Failed gaussian smooth on ramp");
        for i in radius..data.len() - radius {
            assert!(
                (output.values[i] - data[i]).abs() < 1e-9,
                "ramp interior mismatch at index {}: expected {}, got {}",
                i,
                data[i],
                output.values[i]
            );
        }
    }

    #[test]
    fn test_gaussian_smooth_symmetric_impulse() {
        let data = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let output = gaussian_smooth(&GaussianSmoothInput::from_slice(
            &data,
            GaussianSmoothParams { sigma: Some(0.8) },
        ))
        .expect("Failed gaussian smooth on impulse");
        let v = &output.values;
        assert!(v[3] > v[2] && v[3] > v[4], "impulse peak not preserved");
        assert!(
            (v[2] - v[4]).abs() < 1e-12,
            "response not symmetric around the impulse"
        );
        assert!((v[1] - v[5]).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_smooth_single_sample() {
        let data = [7.0];
        let output = gaussian_smooth(&GaussianSmoothInput::from_slice(
            &data,
            GaussianSmoothParams { sigma: Some(3.0) },
        ))
        .expect("Failed gaussian smooth on single sample");
        assert_eq!(output.values.len(), 1);
        assert!((output.values[0] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_smooth_builder_with_candles() {
        let closes: Vec<f64> = (0..20).map(|i| 50.0 + (i as f64).sin()).collect();
        let n = closes.len();
        let candles = Candles::new(
            (0..n as i64).collect(),
            closes.clone(),
            closes.clone(),
            closes.clone(),
            closes.clone(),
            vec![1.0; n],
        );
        let output = GaussianSmoothBuilder::new()
            .sigma(1.5)
            .apply(&candles)
            .expect("Failed gaussian smooth via builder");
        assert_eq!(output.values.len(), n);
    }
}
