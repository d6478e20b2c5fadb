//! Adaptive Learning Layer: lifecycle transitions, drift detection,
//! z-score anomaly classification, and optimization suggestions.
//!
//! [`classify_and_learn`] is the single entry point the orchestrator calls
//! per hole, per successfully physics-passed curve. It mutates the
//! [`HoleState`] in place: observing into the accumulators, stepping the
//! lifecycle, testing for drift, and classifying anomalies, in that order.

use crate::carrier::{GoldenBase, HoleState, LifecyclePhase, MetricSnapshot};
use crate::codes;
use crate::config::{CodesConfig, ToleranceConfig};
use crate::feature::FeatureVector;
use crate::orchestrator::Status;
use serde::{Deserialize, Serialize};

/// Floor applied to a golden-base standard deviation before it is used as
/// a z-score denominator, so a metric with zero observed spread (e.g. a
/// perfectly constant curve) doesn't divide by zero.
pub const STD_FLOOR: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationParams {
    pub suggested_torque_adjustment_percent: f64,
    pub suggested_speed_adjustment_percent: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    pub status: &'static str,
    pub e_code: &'static str,
    pub params: OptimizationParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveOutcome {
    pub status: Status,
    pub e_codes: Vec<&'static str>,
    pub r_codes: Vec<&'static str>,
    pub optimization_suggestion: Option<OptimizationSuggestion>,
}

/// Lifecycle thresholds, carried in separately from `ToleranceConfig`
/// because they gate transitions rather than tolerance math.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub shadow_threshold: u64,
    pub golden_threshold: u64,
}

#[tracing::instrument(skip(features, hole, tolerance, codes_config), fields(phase = ?hole.phase))]
pub fn classify_and_learn(
    features: &FeatureVector,
    hole: &mut HoleState,
    tolerance: &ToleranceConfig,
    codes_config: &CodesConfig,
    thresholds: Thresholds,
) -> AdaptiveOutcome {
    hole.metrics.peak_torque.observe(features.peak_torque);
    hole.metrics.rigidity_slope.observe(features.rigidity_slope);
    hole.metrics.total_work.observe(features.total_work);

    step_lifecycle(hole, thresholds);

    let mut drift_entered = false;
    if hole.phase == LifecyclePhase::GoldenLocked {
        if drift_test(hole, tolerance) {
            hole.phase = LifecyclePhase::DriftDetected;
            hole.drift_event_count += 1;
            hole.consecutive_recovery_passes = 0;
            drift_entered = true;
            tracing::warn!(carrier_metric = "drift", "drift detected, entering DriftDetected");
        }
    } else if hole.phase == LifecyclePhase::DriftDetected {
        if drift_test(hole, tolerance) {
            hole.consecutive_recovery_passes = 0;
        } else {
            hole.consecutive_recovery_passes += 1;
            if hole.consecutive_recovery_passes >= 2 {
                hole.phase = LifecyclePhase::GoldenLocked;
                hole.consecutive_recovery_passes = 0;
                tracing::info!("two consecutive passing drift tests, recovering to GoldenLocked");
            }
        }
    }

    let (mut status, mut e_codes, mut r_codes) = (Status::Ok, Vec::new(), Vec::new());
    if matches!(hole.phase, LifecyclePhase::GoldenLocked | LifecyclePhase::DriftDetected) {
        let anomaly = classify_anomalies(features, hole, tolerance, codes_config);
        if anomaly.0 == Status::Ng {
            status = Status::Ng;
        }
        e_codes.extend(anomaly.1);
        r_codes.extend(anomaly.2);
    }

    let optimization_suggestion = if hole.phase == LifecyclePhase::DriftDetected || drift_entered {
        hole.golden_base.as_ref().map(|gb| optimization_suggestion(hole, gb))
    } else {
        None
    };

    AdaptiveOutcome {
        status,
        e_codes,
        r_codes,
        optimization_suggestion,
    }
}

fn step_lifecycle(hole: &mut HoleState, thresholds: Thresholds) {
    let count = hole.metrics.peak_torque.count;
    match hole.phase {
        LifecyclePhase::ColdStart if count >= thresholds.shadow_threshold => {
            hole.phase = LifecyclePhase::Shadow;
            tracing::debug!(count, "transitioned ColdStart -> Shadow");
        }
        LifecyclePhase::Shadow if count >= thresholds.golden_threshold => {
            hole.phase = LifecyclePhase::GoldenLocked;
            hole.golden_base = Some(GoldenBase::snapshot(
                &hole.metrics.peak_torque,
                &hole.metrics.rigidity_slope,
                &hole.metrics.total_work,
            ));
            tracing::info!(count, "transitioned Shadow -> GoldenLocked, golden base snapshotted");
        }
        _ => {}
    }
}

/// True when the three tracked metrics' live windows are at least
/// two-thirds full *and* either window mean drifted past `d_mean *
/// golden.std` or window std exceeded `d_std * golden.std`, for any
/// tracked metric.
fn drift_test(hole: &HoleState, tolerance: &ToleranceConfig) -> bool {
    let Some(gb) = &hole.golden_base else {
        return false;
    };
    let metrics: [(&crate::stats::StatAccumulator, &MetricSnapshot); 3] = [
        (&hole.metrics.peak_torque, &gb.peak_torque),
        (&hole.metrics.rigidity_slope, &gb.rigidity_slope),
        (&hole.metrics.total_work, &gb.total_work),
    ];
    metrics.into_iter().any(|(acc, snapshot)| metric_drifted(acc, snapshot, tolerance))
}

fn metric_drifted(acc: &crate::stats::StatAccumulator, golden: &MetricSnapshot, tolerance: &ToleranceConfig) -> bool {
    if acc.window_fraction_full() < 2.0 / 3.0 {
        return false;
    }
    let golden_std = golden.std.max(STD_FLOOR);
    let mean_shifted = (acc.window_mean() - golden.mean).abs() > tolerance.d_mean * golden_std;
    let spread_widened = acc.window_std() > tolerance.d_std * golden_std;
    mean_shifted || spread_widened
}

/// z-score anomaly classification against the frozen golden base. Always
/// runs all three metrics (no short-circuiting), matching the physics
/// layer's policy of reporting every violation, not just the first.
fn classify_anomalies(
    features: &FeatureVector,
    hole: &HoleState,
    tolerance: &ToleranceConfig,
    codes_config: &CodesConfig,
) -> (Status, Vec<&'static str>, Vec<&'static str>) {
    let Some(gb) = &hole.golden_base else {
        return (Status::Ok, Vec::new(), Vec::new());
    };
    let k = tolerance.production_tolerance_factor;

    let mut e_codes = Vec::new();
    let mut r_codes = Vec::new();
    let mut ng = false;

    if is_anomalous(features.peak_torque, &gb.peak_torque, k) {
        ng |= codes_config.e_code_enabled(codes::E02);
        push_if(&mut e_codes, codes_config.e_code_enabled(codes::E02), codes::E02);
        push_if(&mut r_codes, codes_config.r_code_enabled(codes::R02), codes::R02);
    }
    if is_anomalous(features.rigidity_slope, &gb.rigidity_slope, k) {
        ng |= codes_config.e_code_enabled(codes::E04);
        push_if(&mut e_codes, codes_config.e_code_enabled(codes::E04), codes::E04);
        push_if(&mut r_codes, codes_config.r_code_enabled(codes::R04), codes::R04);
    }
    if is_anomalous(features.total_work, &gb.total_work, k) {
        ng |= codes_config.e_code_enabled(codes::E08);
        push_if(&mut e_codes, codes_config.e_code_enabled(codes::E08), codes::E08);
        push_if(&mut r_codes, codes_config.r_code_enabled(codes::R08), codes::R08);
    }

    (if ng { Status::Ng } else { Status::Ok }, e_codes, r_codes)
}

fn is_anomalous(x: f64, golden: &MetricSnapshot, k: f64) -> bool {
    let z = (x - golden.mean) / golden.std.max(STD_FLOOR);
    z.abs() > k
}

fn push_if(codes: &mut Vec<&'static str>, enabled: bool, code: &'static str) {
    if enabled {
        codes.push(code);
    }
}

fn optimization_suggestion(hole: &HoleState, gb: &GoldenBase) -> OptimizationSuggestion {
    let window_mean_torque = hole.metrics.peak_torque.window_mean();
    let golden_mean_torque = gb.peak_torque.mean;
    let raw_adjustment = if golden_mean_torque.abs() < STD_FLOOR {
        0.0
    } else {
        -100.0 * (window_mean_torque - golden_mean_torque) / golden_mean_torque
    };
    let suggested_torque_adjustment_percent = round1(raw_adjustment.clamp(-15.0, 15.0));

    let golden_std_torque = gb.peak_torque.std.max(STD_FLOOR);
    let window_std_torque = hole.metrics.peak_torque.window_std();
    let suggested_speed_adjustment_percent = if window_std_torque / golden_std_torque > 1.5 { -10 } else { 0 };

    OptimizationSuggestion {
        status: "OPTIMIZE",
        e_code: codes::DRIFT_DETECTED,
        params: OptimizationParams {
            suggested_torque_adjustment_percent,
            suggested_speed_adjustment_percent,
        },
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
