//! Carrier Model: per-carrier aggregate of lifecycle state for every hole.
//!
//! A [`CarrierModel`] is created on first diagnosis of an unknown
//! `carrier_id` or loaded from persistence, mutated only by the
//! orchestrator, and destroyed only by an explicit
//! [`crate::orchestrator::Orchestrator::forget_carrier`] call.

use crate::stats::StatAccumulator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `carrier::HoleState` tracks exactly these three metrics.
pub const TRACKED_METRICS: [&str; 3] = ["peak_torque", "rigidity_slope", "total_work"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    ColdStart,
    Shadow,
    GoldenLocked,
    DriftDetected,
}

impl Default for LifecyclePhase {
    fn default() -> Self {
        LifecyclePhase::ColdStart
    }
}

/// Frozen `{mean, std}` pair for one tracked metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub mean: f64,
    pub std: f64,
}

/// Reference distribution snapshot taken when a hole first reaches the
/// golden threshold. Immutable once set except through an explicit
/// administrative reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenBase {
    pub peak_torque: MetricSnapshot,
    pub rigidity_slope: MetricSnapshot,
    pub total_work: MetricSnapshot,
}

impl GoldenBase {
    pub fn snapshot(peak_torque: &StatAccumulator, rigidity_slope: &StatAccumulator, total_work: &StatAccumulator) -> Self {
        Self {
            peak_torque: MetricSnapshot {
                mean: peak_torque.mean,
                std: peak_torque.std(),
            },
            rigidity_slope: MetricSnapshot {
                mean: rigidity_slope.mean,
                std: rigidity_slope.std(),
            },
            total_work: MetricSnapshot {
                mean: total_work.mean,
                std: total_work.std(),
            },
        }
    }
}

/// The three tracked `StatAccumulator`s for one hole, grouped under a
/// `metrics` object in the persisted schema rather than flattened as
/// siblings of `phase`/`golden_base`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub peak_torque: StatAccumulator,
    pub rigidity_slope: StatAccumulator,
    pub total_work: StatAccumulator,
}

impl Metrics {
    fn new(window_size: usize) -> Self {
        Self {
            peak_torque: StatAccumulator::new(window_size),
            rigidity_slope: StatAccumulator::new(window_size),
            total_work: StatAccumulator::new(window_size),
        }
    }

    fn set_window_capacity(&mut self, capacity: usize) {
        self.peak_torque.set_window_capacity(capacity);
        self.rigidity_slope.set_window_capacity(capacity);
        self.total_work.set_window_capacity(capacity);
    }

    fn reset(&mut self) {
        self.peak_torque.reset();
        self.rigidity_slope.reset();
        self.total_work.reset();
    }
}

/// Per-hole lifecycle state: phase, accumulators, golden base, and the
/// consecutive-recovery counter used by the drift-recovery rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoleState {
    #[serde(default)]
    pub phase: LifecyclePhase,
    pub metrics: Metrics,
    #[serde(default)]
    pub golden_base: Option<GoldenBase>,
    #[serde(default)]
    pub last_update_timestamp: Option<u64>,
    #[serde(default)]
    pub drift_event_count: u64,
    /// Consecutive passing drift tests since entering `DriftDetected`;
    /// two in a row trigger recovery to `GoldenLocked`.
    #[serde(default)]
    pub consecutive_recovery_passes: u32,
}

impl HoleState {
    pub fn new(window_size: usize) -> Self {
        Self {
            phase: LifecyclePhase::ColdStart,
            metrics: Metrics::new(window_size),
            golden_base: None,
            last_update_timestamp: None,
            drift_event_count: 0,
            consecutive_recovery_passes: 0,
        }
    }

    /// Re-apply the configured window capacity after deserialization.
    pub fn set_window_capacity(&mut self, capacity: usize) {
        self.metrics.set_window_capacity(capacity);
    }

    /// Administrative reset: clear all accumulators, the golden base, and
    /// drop back to `ColdStart`. Never invoked by the diagnostic path.
    pub fn reset_golden_base(&mut self) {
        self.metrics.reset();
        self.golden_base = None;
        self.phase = LifecyclePhase::ColdStart;
        self.drift_event_count = 0;
        self.consecutive_recovery_passes = 0;
    }
}

/// Aggregate keyed by `carrier_id`, mapping `hole_id -> HoleState`.
///
/// `holes` is a `BTreeMap` rather than a `HashMap` so that lexicographic
/// hole iteration (the orchestrator's determinism requirement) falls out
/// of the type instead of a sort call at every diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierModel {
    pub schema_version: u32,
    pub carrier_id: String,
    pub holes: BTreeMap<String, HoleState>,
}

pub const SCHEMA_VERSION: u32 = 1;

impl CarrierModel {
    pub fn new(carrier_id: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            carrier_id: carrier_id.into(),
            holes: BTreeMap::new(),
        }
    }

    pub fn hole_mut(&mut self, hole_id: &str, window_size: usize) -> &mut HoleState {
        self.holes
            .entry(hole_id.to_string())
            .or_insert_with(|| HoleState::new(window_size))
    }

    /// Re-apply window capacity to every hole, used after loading from
    /// persistence where capacity isn't part of the wire schema.
    pub fn set_window_capacity(&mut self, capacity: usize) {
        for hole in self.holes.values_mut() {
            hole.set_window_capacity(capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_hole_starts_cold() {
        let hole = HoleState::new(200);
        assert_eq!(hole.phase, LifecyclePhase::ColdStart);
        assert!(hole.golden_base.is_none());
    }

    #[test]
    fn golden_base_snapshots_current_means() {
        let mut hole = HoleState::new(10);
        for i in 0..10 {
            hole.metrics.peak_torque.observe(5.0 + i as f64 * 0.01);
            hole.metrics.rigidity_slope.observe(0.05);
            hole.metrics.total_work.observe(10.0);
        }
        let gb = GoldenBase::snapshot(&hole.metrics.peak_torque, &hole.metrics.rigidity_slope, &hole.metrics.total_work);
        assert!((gb.peak_torque.mean - hole.metrics.peak_torque.mean).abs() < 1e-12);
    }

    #[test]
    fn reset_golden_base_returns_to_cold_start() {
        let mut hole = HoleState::new(10);
        hole.phase = LifecyclePhase::GoldenLocked;
        hole.golden_base = Some(GoldenBase {
            peak_torque: MetricSnapshot { mean: 5.0, std: 0.1 },
            rigidity_slope: MetricSnapshot { mean: 0.05, std: 0.01 },
            total_work: MetricSnapshot { mean: 10.0, std: 1.0 },
        });
        hole.drift_event_count = 3;
        hole.reset_golden_base();
        assert_eq!(hole.phase, LifecyclePhase::ColdStart);
        assert!(hole.golden_base.is_none());
        assert_eq!(hole.drift_event_count, 0);
    }

    #[test]
    fn carrier_model_holes_iterate_lexicographically() {
        let mut model = CarrierModel::new("carrier-1");
        model.hole_mut("hole-b", 10);
        model.hole_mut("hole-a", 10);
        model.hole_mut("hole-c", 10);
        let ids: Vec<&String> = model.holes.keys().collect();
        assert_eq!(ids, vec!["hole-a", "hole-b", "hole-c"]);
    }

    #[test]
    fn roundtrip_through_json_preserves_state() {
        let mut model = CarrierModel::new("carrier-1");
        let hole = model.hole_mut("hole-a", 10);
        hole.metrics.peak_torque.observe(5.0);
        hole.phase = LifecyclePhase::Shadow;

        let json = serde_json::to_string(&model).unwrap();
        let mut restored: CarrierModel = serde_json::from_str(&json).unwrap();
        restored.set_window_capacity(10);
        assert_eq!(restored.carrier_id, model.carrier_id);
        assert_eq!(restored.holes["hole-a"].phase, LifecyclePhase::Shadow);
        assert_eq!(restored.holes["hole-a"].metrics.peak_torque.count, 1);
    }
}
