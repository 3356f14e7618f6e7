//! Savitzky-Golay smoothing for position and speed derived series.
//!
//! A least-squares polynomial is fitted to every window of samples and evaluated at the window
//! centre, which keeps peaks (corner apexes, braking spikes) much better than a moving average
//! of the same width. The first and last half-windows are evaluated on the polynomial fitted to
//! the first and last full window, so no padding is involved.

use log::{debug, warn};
use nalgebra::DMatrix;
use snafu::Snafu;

use super::numeric::fill_gaps;

/// Smallest window the filter accepts after clamping.
const MIN_WINDOW: usize = 3;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum SmoothingError {
    #[snafu(display("Series does not contain any finite sample"))]
    NoFiniteSamples,
    #[snafu(display("Least-squares system for window {window} order {polyorder} is singular"))]
    SingularFit { window: usize, polyorder: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SavitzkyGolay {
    window: usize,
    polyorder: usize,
}

impl SavitzkyGolay {
    pub fn new(window: usize, polyorder: usize) -> Self {
        Self { window, polyorder }
    }

    /// Window and order actually usable on a series of `len` samples, or `None` when the series
    /// is too short to be smoothed at all.
    ///
    /// Even windows grow to the next odd size, windows longer than the series shrink to the
    /// longest odd size that fits, and the order drops to `window - 2` when it would otherwise
    /// interpolate the window exactly.
    pub fn effective(&self, len: usize) -> Option<(usize, usize)> {
        if len < MIN_WINDOW {
            return None;
        }
        let mut window = self.window.max(MIN_WINDOW);
        if window % 2 == 0 {
            window += 1;
        }
        if window > len {
            window = if len % 2 == 1 { len } else { len - 1 };
        }
        let polyorder = self.polyorder.min(window - 2);
        Some((window, polyorder))
    }

    /// Smooth `series`, reporting why smoothing was impossible instead of degrading.
    ///
    /// Missing samples are forward then backward filled first. Series too short for any window
    /// are returned filled but otherwise untouched.
    pub fn try_apply(&self, series: &[f64]) -> Result<Vec<f64>, SmoothingError> {
        let filled = fill_gaps(series).ok_or(SmoothingError::NoFiniteSamples)?;
        let Some((window, polyorder)) = self.effective(filled.len()) else {
            return Ok(filled);
        };
        if (window, polyorder) != (self.window, self.polyorder) {
            debug!(
                "Savitzky-Golay parameters clamped from ({}, {}) to ({}, {}) for {} samples",
                self.window,
                self.polyorder,
                window,
                polyorder,
                filled.len()
            );
        }

        let projection = fit_projection(window, polyorder)
            .ok_or(SmoothingError::SingularFit { window, polyorder })?;
        Ok(convolve(&filled, &projection, window, polyorder))
    }

    /// Smooth `series`, falling back to the gap-filled input when smoothing is impossible.
    pub fn apply(&self, series: &[f64]) -> Vec<f64> {
        match self.try_apply(series) {
            Ok(smoothed) => smoothed,
            Err(e) => {
                warn!("Returning unsmoothed series: {}", e);
                fill_gaps(series).unwrap_or_else(|| series.to_vec())
            }
        }
    }
}

/// Convenience wrapper around [`SavitzkyGolay::apply`].
pub fn smooth(series: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    SavitzkyGolay::new(window, polyorder).apply(series)
}

/// Odd window covering roughly `fraction` of `len` samples, never below `min_window`.
pub fn proportional_window(len: usize, fraction: f64, min_window: usize) -> usize {
    let raw = (len as f64 * fraction).round() as usize;
    let window = raw.max(min_window);
    if window % 2 == 0 { window + 1 } else { window }
}

/// Pseudo-inverse of the Vandermonde matrix of a centred window, with abscissae scaled to
/// [-1, 1]. Row `k` maps window samples to the `k`-th polynomial coefficient.
fn fit_projection(window: usize, polyorder: usize) -> Option<DMatrix<f64>> {
    let half = (window / 2) as f64;
    let vandermonde = DMatrix::from_fn(window, polyorder + 1, |row, power| {
        ((row as f64 - half) / half).powi(power as i32)
    });
    let normal = vandermonde.transpose() * &vandermonde;
    let inverse = normal.try_inverse()?;
    Some(inverse * vandermonde.transpose())
}

fn evaluate(coefficients: &[f64], t: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

fn fit_window(projection: &DMatrix<f64>, samples: &[f64], polyorder: usize) -> Vec<f64> {
    (0..=polyorder)
        .map(|k| {
            projection
                .row(k)
                .iter()
                .zip(samples)
                .map(|(w, s)| w * s)
                .sum::<f64>()
        })
        .collect()
}

fn convolve(
    series: &[f64],
    projection: &DMatrix<f64>,
    window: usize,
    polyorder: usize,
) -> Vec<f64> {
    let n = series.len();
    let half = window / 2;
    let centre: Vec<f64> = projection.row(0).iter().copied().collect();
    let mut out = vec![0.0; n];

    for i in half..n - half {
        out[i] = centre
            .iter()
            .zip(&series[i - half..=i + half])
            .map(|(w, s)| w * s)
            .sum();
    }

    // edges: evaluate the polynomial of the first/last full window
    let scale = half as f64;
    let head = fit_window(projection, &series[..window], polyorder);
    for (i, value) in out.iter_mut().enumerate().take(half) {
        *value = evaluate(&head, (i as f64 - scale) / scale);
    }
    let tail = fit_window(projection, &series[n - window..], polyorder);
    for j in window - half..window {
        out[n - window + j] = evaluate(&tail, (j as f64 - scale) / scale);
    }
    out
}
