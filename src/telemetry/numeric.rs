// Array helpers shared by the distance, kinematics and comparison code.
//
// All helpers are total: empty or degenerate inputs produce empty or neutral outputs rather
// than panicking.

use std::cmp::Ordering;

/// Evenly spaced values over `[start, end]`, both ends included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![end];
    }
    let step = (end - start) / (count as f64 - 1.0);
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Piecewise linear interpolation of `(xp, fp)` evaluated at every `x`.
///
/// `xp` must be non-decreasing. Values outside the sampled range clamp to the first or last
/// `fp` value. Repeated `xp` values are tolerated: the sample right after the repeated run wins.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    let len = xp.len().min(fp.len());
    if len == 0 {
        return vec![f64::NAN; x.len()];
    }
    let xp = &xp[..len];
    let fp = &fp[..len];
    x.iter()
        .map(|&target| {
            let upper = xp.partition_point(|&v| v <= target);
            if upper == 0 {
                fp[0]
            } else if upper == len {
                fp[len - 1]
            } else {
                let (x0, x1) = (xp[upper - 1], xp[upper]);
                let (y0, y1) = (fp[upper - 1], fp[upper]);
                let frac = ((target - x0) / (x1 - x0)).clamp(0.0, 1.0);
                y0 + (y1 - y0) * frac
            }
        })
        .collect()
}

/// Discrete gradient with unit spacing: central differences inside, one-sided at the edges.
pub fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    values[1] - values[0]
                } else if i == n - 1 {
                    values[n - 1] - values[n - 2]
                } else {
                    (values[i + 1] - values[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}

/// Consecutive differences with the first element fixed to `first`.
pub fn diff(values: &[f64], first: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    std::iter::once(first)
        .chain(values.windows(2).map(|w| w[1] - w[0]))
        .collect()
}

/// Running maximum. Non-finite samples carry the previous maximum forward.
pub fn running_max(values: &[f64]) -> Vec<f64> {
    let mut acc: Option<f64> = None;
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                acc = Some(acc.map_or(v, |a| a.max(v)));
            }
            acc.unwrap_or(0.0)
        })
        .collect()
}

pub fn is_non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] >= w[0])
}

/// Forward-fill then backward-fill missing (non-finite) samples.
///
/// Returns `None` when the series holds no finite value at all.
pub fn fill_gaps(values: &[f64]) -> Option<Vec<f64>> {
    let first_finite = values.iter().copied().find(|v| v.is_finite())?;
    let mut last = first_finite;
    Some(
        values
            .iter()
            .map(|&v| {
                if v.is_finite() {
                    last = v;
                }
                last
            })
            .collect(),
    )
}

/// Percentile with linear interpolation between closest ranks, ignoring non-finite samples.
///
/// `q` is expressed in percent (0-100).
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().sum::<f64>() / finite.len() as f64)
}

/// Sample standard deviation (n - 1 denominator) of the finite values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    let avg = finite.iter().sum::<f64>() / finite.len() as f64;
    let variance =
        finite.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    Some(variance.sqrt())
}

pub fn finite_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
}

pub fn finite_min(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
}

/// Share of `total` samples matching a predicate, in percent.
pub fn share_pct(matching: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    matching as f64 / total as f64 * 100.0
}
