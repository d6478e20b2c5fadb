//! Rolling Statistics Engine: Welford accumulator plus a bounded window.
//!
//! One [`StatAccumulator`] tracks a single metric for a single hole. The
//! running mean/variance (Welford) never forget history; the window is a
//! separate bounded view used purely for drift testing.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default bounded-window capacity for drift testing.
pub const DEFAULT_WINDOW: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatAccumulator {
    pub count: u64,
    pub mean: f64,
    /// Sum of squared deviations from the running mean (Welford's `M2`).
    #[serde(rename = "M2")]
    pub m2: f64,
    pub window: VecDeque<f64>,
    #[serde(skip)]
    window_capacity: usize,
}

impl StatAccumulator {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            window: VecDeque::with_capacity(window_capacity.min(4096)),
            window_capacity,
        }
    }

    /// Restore the window capacity after deserialization, where it isn't
    /// carried in the persisted form (capacity is a config concern, not
    /// per-carrier state).
    pub fn set_window_capacity(&mut self, capacity: usize) {
        self.window_capacity = capacity;
        while self.window.len() > capacity {
            self.window.pop_front();
        }
    }

    /// Welford single-pass update, plus bounded FIFO window push.
    pub fn observe(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;

        if self.window.len() >= self.window_capacity.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(x);
    }

    /// Running (Welford) variance; `0.0` until at least two observations.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Mean of the samples currently held in the bounded window.
    pub fn window_mean(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Population standard deviation of the window.
    pub fn window_std(&self) -> f64 {
        let n = self.window.len();
        if n == 0 {
            return 0.0;
        }
        let mean = self.window_mean();
        let var = self.window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        var.sqrt()
    }

    pub fn window_fraction_full(&self) -> f64 {
        self.window.len() as f64 / self.window_capacity.max(1) as f64
    }

    /// Zero count/mean/M2 and clear the window. Administrative only — never
    /// called from the diagnostic path.
    pub fn reset(&mut self) {
        self.count = 0;
        self.mean = 0.0;
        self.m2 = 0.0;
        self.window.clear();
    }
}
