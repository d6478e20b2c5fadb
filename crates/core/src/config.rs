//! Typed configuration record consumed by the diagnostic engine.
//!
//! This crate never reads a config *file* — callers parse whatever format
//! they like (YAML, TOML, env) and hand over an [`EngineConfig`] value.
//! [`EngineConfig::validate`] is the construction-time gate: anything that
//! would otherwise surface as a confusing runtime panic or silent
//! misbehavior is rejected here with [`crate::Error::Config`].

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub codes: CodesConfig,
    pub physics: PhysicsConfig,
    #[serde(default = "default_shadow_threshold")]
    pub shadow_threshold: u64,
    #[serde(default = "default_golden_threshold")]
    pub golden_threshold: u64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Save the carrier model after every diagnosis. Disable to batch saves.
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
}

fn default_shadow_threshold() -> u64 {
    50
}

fn default_golden_threshold() -> u64 {
    100
}

fn default_window_size() -> usize {
    200
}

fn default_auto_save() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: ToleranceConfig::default(),
            codes: CodesConfig::default(),
            physics: PhysicsConfig::default(),
            shadow_threshold: default_shadow_threshold(),
            golden_threshold: default_golden_threshold(),
            window_size: default_window_size(),
            auto_save: default_auto_save(),
        }
    }
}

impl EngineConfig {
    /// Validate and normalize this config, clamping what can be clamped and
    /// rejecting what can't.
    ///
    /// Returns the normalized config so callers can't accidentally keep
    /// using the unclamped value.
    pub fn validate(mut self) -> Result<Self, Error> {
        if self.shadow_threshold == 0 {
            return Err(Error::Config("shadow_threshold must be > 0".into()));
        }
        if self.golden_threshold <= self.shadow_threshold {
            return Err(Error::Config(
                "golden_threshold must be greater than shadow_threshold".into(),
            ));
        }
        if self.window_size == 0 {
            return Err(Error::Config("window_size must be > 0".into()));
        }
        self.tolerance.production_tolerance_factor = self
            .tolerance
            .production_tolerance_factor
            .clamp(TOLERANCE_FACTOR_MIN, TOLERANCE_FACTOR_MAX);
        self.physics.validate()?;
        Ok(self)
    }
}

pub const TOLERANCE_FACTOR_MIN: f64 = 0.5;
pub const TOLERANCE_FACTOR_MAX: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToleranceConfig {
    #[serde(default = "default_tolerance_factor")]
    pub production_tolerance_factor: f64,
    /// Drift mean-shift multiplier (`d_mean`).
    #[serde(default = "default_d_mean")]
    pub d_mean: f64,
    /// Drift spread multiplier (`d_std`).
    #[serde(default = "default_d_std")]
    pub d_std: f64,
}

fn default_tolerance_factor() -> f64 {
    3.0
}

fn default_d_mean() -> f64 {
    1.0
}

fn default_d_std() -> f64 {
    1.5
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            production_tolerance_factor: default_tolerance_factor(),
            d_mean: default_d_mean(),
            d_std: default_d_std(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CodesConfig {
    #[serde(default)]
    pub disabled_e_codes: HashSet<String>,
    #[serde(default)]
    pub disabled_r_codes: HashSet<String>,
}

impl CodesConfig {
    pub fn e_code_enabled(&self, code: &str) -> bool {
        !self.disabled_e_codes.contains(code)
    }

    pub fn r_code_enabled(&self, code: &str) -> bool {
        !self.disabled_r_codes.contains(code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    #[serde(default = "default_neg_slope_threshold")]
    pub neg_slope_threshold: f64,
    #[serde(default = "default_slope_min_abs")]
    pub slope_min_abs: f64,
    #[serde(default = "default_slope_max_abs")]
    pub slope_max_abs: f64,
    #[serde(default = "default_torque_abs_min")]
    pub torque_abs_min: f64,
    #[serde(default = "default_torque_abs_max")]
    pub torque_abs_max: f64,
}

fn default_neg_slope_threshold() -> f64 {
    -0.001
}

fn default_slope_min_abs() -> f64 {
    0.005
}

fn default_slope_max_abs() -> f64 {
    10.0
}

fn default_torque_abs_min() -> f64 {
    0.0
}

fn default_torque_abs_max() -> f64 {
    f64::MAX
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            neg_slope_threshold: default_neg_slope_threshold(),
            slope_min_abs: default_slope_min_abs(),
            slope_max_abs: default_slope_max_abs(),
            torque_abs_min: default_torque_abs_min(),
            torque_abs_max: default_torque_abs_max(),
        }
    }
}

impl PhysicsConfig {
    fn validate(&self) -> Result<(), Error> {
        if self.slope_min_abs > self.slope_max_abs {
            return Err(Error::Config(
                "physics.slope_min_abs must be <= slope_max_abs".into(),
            ));
        }
        if self.torque_abs_min > self.torque_abs_max {
            return Err(Error::Config(
                "physics.torque_abs_min must be <= torque_abs_max".into(),
            ));
        }
        Ok(())
    }
}
