//! Feature Extractor: pure curve → [`FeatureVector`] derivation.
//!
//! Every function here is a pure function of its inputs — no state, no I/O.
//! [`Curve::new`] is the only validating boundary; once constructed, a
//! `Curve` is guaranteed equal-length, finite, and at least 10 samples long.

use crate::error::Error;
use serde::Deserialize;

/// Minimum denominator magnitude treated as non-zero when computing slopes.
const SLOPE_EPS: f64 = 1e-6;
/// Half-width of the smoothing window used for [`slope_min`].
const SLOPE_SMOOTHING_K: usize = 3;
/// Minimum curve length.
const MIN_SAMPLES: usize = 10;

static_assertions::const_assert!(MIN_SAMPLES > 2 * SLOPE_SMOOTHING_K);

/// A validated torque/angle/time signal triple for one fastening attempt.
#[derive(Debug, Clone)]
pub struct Curve {
    torque: Vec<f64>,
    angle: Vec<f64>,
    time: Vec<f64>,
}

impl Curve {
    /// Validate and construct a curve.
    ///
    /// Rejects mismatched lengths, fewer than 10 samples, and any
    /// non-finite (`NaN`/`Inf`) value in any of the three sequences.
    pub fn new(torque: Vec<f64>, angle: Vec<f64>, time: Vec<f64>) -> Result<Self, Error> {
        if torque.len() != angle.len() || torque.len() != time.len() {
            return Err(Error::InvalidCurve {
                reason: format!(
                    "length mismatch: torque={}, angle={}, time={}",
                    torque.len(),
                    angle.len(),
                    time.len()
                ),
            });
        }
        if torque.len() < MIN_SAMPLES {
            return Err(Error::InvalidCurve {
                reason: format!("need at least {MIN_SAMPLES} samples, got {}", torque.len()),
            });
        }
        for (name, series) in [("torque", &torque), ("angle", &angle), ("time", &time)] {
            if series.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidCurve {
                    reason: format!("{name} contains a non-finite value"),
                });
            }
        }
        Ok(Self { torque, angle, time })
    }

    pub fn len(&self) -> usize {
        self.torque.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torque.is_empty()
    }

    pub fn torque(&self) -> &[f64] {
        &self.torque
    }

    pub fn angle(&self) -> &[f64] {
        &self.angle
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }
}

/// Unvalidated per-hole wire input: a `{torque, angle, time}` triple as it
/// arrives at the diagnostic entry point, before [`Curve::new`] has checked
/// lengths, minimum sample count, or finiteness.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCurve {
    pub torque: Vec<f64>,
    pub angle: Vec<f64>,
    pub time: Vec<f64>,
}

impl RawCurve {
    /// Validate into a [`Curve`], consuming `self`.
    pub fn into_curve(self) -> Result<Curve, Error> {
        Curve::new(self.torque, self.angle, self.time)
    }
}

/// Derived physical metrics for one curve.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FeatureVector {
    pub peak_torque: f64,
    pub final_angle: f64,
    pub rigidity_slope: f64,
    pub total_work: f64,
    pub slope_min: f64,
    pub duration: f64,
}

/// Extract the [`FeatureVector`] for a curve.
#[tracing::instrument(skip(curve), fields(len = curve.len()))]
pub fn extract(curve: &Curve) -> FeatureVector {
    let peak_torque = curve
        .torque
        .iter()
        .copied()
        .fold(f64::MIN, f64::max);
    let final_angle = *curve.angle.last().expect("curve has >= MIN_SAMPLES samples");
    let duration = curve.time.last().unwrap() - curve.time.first().unwrap();

    let angle_monotone = monotone_angle(&curve.angle);
    let rigidity_slope = rigidity_slope(&curve.torque, &angle_monotone, peak_torque);
    let total_work = trapezoidal_work(&curve.torque, &angle_monotone);
    let slope_min = smoothed_slope_min(&curve.torque, &angle_monotone);

    FeatureVector {
        peak_torque,
        final_angle,
        rigidity_slope,
        total_work,
        slope_min,
        duration,
    }
}

/// Clamp any backward angle step to its predecessor so later integration
/// sees a non-decreasing sequence.
fn monotone_angle(angle: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(angle.len());
    let mut prev = f64::MIN;
    for &a in angle {
        let clamped = if a < prev { prev } else { a };
        out.push(clamped);
        prev = clamped;
    }
    out
}

/// Locate the snug point: first index where torque exceeds 20% of peak and
/// the local slope (vs. the previous sample) is positive.
fn snug_point(torque: &[f64], angle: &[f64], peak_torque: f64) -> Option<usize> {
    let threshold = 0.2 * peak_torque;
    for i in 1..torque.len() {
        if torque[i] > threshold {
            let dtheta = angle[i] - angle[i - 1];
            let dtorque = torque[i] - torque[i - 1];
            if dtheta.abs() >= SLOPE_EPS && dtorque / dtheta > 0.0 {
                return Some(i);
            }
        }
    }
    None
}

/// First index at/after `start` where torque reaches 80% of peak.
fn eighty_percent_point(torque: &[f64], start: usize, peak_torque: f64) -> usize {
    let threshold = 0.8 * peak_torque;
    torque[start..]
        .iter()
        .position(|&t| t >= threshold)
        .map(|i| start + i)
        .unwrap_or(torque.len() - 1)
}

/// Ordinary least-squares slope of `angle -> torque` over `[start, end]`.
fn ols_slope(torque: &[f64], angle: &[f64], start: usize, end: usize) -> Option<f64> {
    let n = end.saturating_sub(start) + 1;
    if n < 5 {
        return None;
    }
    let xs = &angle[start..=end];
    let ys = &torque[start..=end];
    let n_f = n as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();
    let denom = n_f * sum_xx - sum_x * sum_x;
    if denom.abs() < SLOPE_EPS {
        return None;
    }
    Some((n_f * sum_xy - sum_x * sum_y) / denom)
}

fn rigidity_slope(torque: &[f64], angle: &[f64], peak_torque: f64) -> f64 {
    let Some(snug) = snug_point(torque, angle, peak_torque) else {
        return endpoint_slope(torque, angle);
    };
    let end = eighty_percent_point(torque, snug, peak_torque);
    if end <= snug {
        return endpoint_slope(torque, angle);
    }
    ols_slope(torque, angle, snug, end).unwrap_or_else(|| endpoint_slope(torque, angle))
}

/// Fallback: slope between the curve's two endpoints.
fn endpoint_slope(torque: &[f64], angle: &[f64]) -> f64 {
    let dtheta = angle[angle.len() - 1] - angle[0];
    if dtheta.abs() < SLOPE_EPS {
        return 0.0;
    }
    (torque[torque.len() - 1] - torque[0]) / dtheta
}

/// Minimum of the smoothed central-difference slope `ΔT/Δθ`, `k = 3`.
fn smoothed_slope_min(torque: &[f64], angle: &[f64]) -> f64 {
    let n = torque.len();
    let k = SLOPE_SMOOTHING_K;
    let mut min_slope: Option<f64> = None;
    if n <= 2 * k {
        return 0.0;
    }
    for i in k..(n - k) {
        let dtheta = angle[i + k] - angle[i - k];
        if dtheta.abs() < SLOPE_EPS {
            continue;
        }
        let slope = (torque[i + k] - torque[i - k]) / dtheta;
        min_slope = Some(min_slope.map_or(slope, |m: f64| m.min(slope)));
    }
    min_slope.unwrap_or(0.0)
}

/// Trapezoidal integral of torque with respect to (monotonized) angle.
fn trapezoidal_work(torque: &[f64], angle: &[f64]) -> f64 {
    torque
        .windows(2)
        .zip(angle.windows(2))
        .map(|(t, a)| 0.5 * (t[0] + t[1]) * (a[1] - a[0]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_curve(n: usize, slope: f64) -> Curve {
        let angle: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let torque: Vec<f64> = angle.iter().map(|a| slope * a).collect();
        let time: Vec<f64> = (0..n).map(|i| i as f64 * 0.01).collect();
        Curve::new(torque, angle, time).unwrap()
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let err = Curve::new(vec![1.0; 10], vec![1.0; 9], vec![1.0; 10]).unwrap_err();
        assert!(matches!(err, Error::InvalidCurve { .. }));
    }

    #[test]
    fn rejects_too_short() {
        let err = Curve::new(vec![1.0; 5], vec![1.0; 5], vec![1.0; 5]).unwrap_err();
        assert!(matches!(err, Error::InvalidCurve { .. }));
    }

    #[test]
    fn rejects_non_finite() {
        let mut t = vec![1.0; 10];
        t[3] = f64::NAN;
        let err = Curve::new(t, vec![1.0; 10], (0..10).map(|i| i as f64).collect()).unwrap_err();
        assert!(matches!(err, Error::InvalidCurve { .. }));
    }

    #[test]
    fn peak_torque_is_the_max() {
        let curve = linear_curve(20, 0.5);
        let f = extract(&curve);
        assert_eq!(f.peak_torque, 0.5 * 19.0);
    }

    #[test]
    fn duration_is_last_minus_first_time() {
        let curve = linear_curve(20, 0.5);
        let f = extract(&curve);
        assert!((f.duration - 0.19).abs() < 1e-9);
    }

    #[test]
    fn rigidity_slope_recovers_linear_climb() {
        let curve = linear_curve(50, 2.0);
        let f = extract(&curve);
        assert!((f.rigidity_slope - 2.0).abs() < 1e-6, "got {}", f.rigidity_slope);
    }

    #[test]
    fn monotone_angle_clamps_backward_steps() {
        let angle = vec![0.0, 1.0, 2.0, 1.5, 3.0];
        let fixed = monotone_angle(&angle);
        assert_eq!(fixed, vec![0.0, 1.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn total_work_matches_trapezoidal_rule_for_constant_torque() {
        // Constant torque T over angle span [0, 10] -> work = T * 10.
        let n = 11;
        let angle: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let torque = vec![3.0; n];
        let time: Vec<f64> = (0..n).map(|i| i as f64 * 0.01).collect();
        let curve = Curve::new(torque, angle, time).unwrap();
        let f = extract(&curve);
        assert!((f.total_work - 30.0).abs() < 1e-9);
    }

    #[test]
    fn slope_min_detects_negative_region() {
        // Torque rises then falls sharply -> negative slope region.
        let angle: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let torque: Vec<f64> = angle
            .iter()
            .map(|&a| if a < 15.0 { a } else { 30.0 - a })
            .collect();
        let time: Vec<f64> = (0..30).map(|i| i as f64 * 0.01).collect();
        let curve = Curve::new(torque, angle, time).unwrap();
        let f = extract(&curve);
        assert!(f.slope_min < 0.0, "expected negative slope_min, got {}", f.slope_min);
    }

    #[test]
    fn slope_min_is_zero_when_no_valid_index() {
        // Constant angle -> every denominator is below epsilon.
        let curve = Curve::new(vec![1.0; 10], vec![5.0; 10], (0..10).map(|i| i as f64).collect())
            .unwrap();
        let f = extract(&curve);
        assert_eq!(f.slope_min, 0.0);
    }
}
