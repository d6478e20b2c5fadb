//! Physics Constraint Layer: hard deterministic rules over a [`FeatureVector`].
//!
//! Rules run in a fixed order and do not short-circuit: every violated rule
//! contributes its codes, and the layer result is the union. This mirrors
//! the "all violated rules are reported" requirement — a diagnostic report
//! that silently hid a second violation because the first one fired first
//! would be actively misleading to a line operator.

use crate::codes;
use crate::config::{CodesConfig, PhysicsConfig};
use crate::feature::FeatureVector;

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsOutcome {
    pub pass: bool,
    pub e_codes: Vec<&'static str>,
    pub r_codes: Vec<&'static str>,
}

/// Apply the physics rules to `features`, in fixed order, filtering codes
/// disabled in `codes_config`.
///
/// A disabled E-code is both omitted from the output and does not cause NG
/// on its own — but if *other* enabled codes also fired, the layer still
/// fails on those.
#[tracing::instrument(skip(features, physics, codes_config))]
pub fn check(
    features: &FeatureVector,
    physics: &PhysicsConfig,
    codes_config: &CodesConfig,
) -> PhysicsOutcome {
    let mut e_codes = Vec::new();
    let mut r_codes = Vec::new();
    // NG-causing codes only, before code-disabling is applied — this drives
    // `pass`, independent of whether the code is hidden from the reported
    // lists.
    let mut ng = false;

    if features.slope_min < physics.neg_slope_threshold {
        ng |= codes_config.e_code_enabled(codes::E_NEG_SLOPE);
        push_enabled(&mut e_codes, codes_config.e_code_enabled(codes::E_NEG_SLOPE), codes::E_NEG_SLOPE);
        push_enabled(&mut r_codes, codes_config.r_code_enabled(codes::R_CHECK_FIXTURE), codes::R_CHECK_FIXTURE);
    }

    if features.rigidity_slope < physics.slope_min_abs || features.rigidity_slope > physics.slope_max_abs {
        ng |= codes_config.e_code_enabled(codes::E04);
        push_enabled(&mut e_codes, codes_config.e_code_enabled(codes::E04), codes::E04);
        push_enabled(&mut r_codes, codes_config.r_code_enabled(codes::R04), codes::R04);
    }

    if features.peak_torque < physics.torque_abs_min || features.peak_torque > physics.torque_abs_max {
        ng |= codes_config.e_code_enabled(codes::E02);
        push_enabled(&mut e_codes, codes_config.e_code_enabled(codes::E02), codes::E02);
        push_enabled(&mut r_codes, codes_config.r_code_enabled(codes::R02), codes::R02);
    }

    PhysicsOutcome {
        pass: !ng,
        e_codes,
        r_codes,
    }
}

fn push_enabled(codes: &mut Vec<&'static str>, enabled: bool, code: &'static str) {
    if enabled {
        codes.push(code);
    }
}
