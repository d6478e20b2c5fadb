//! Standardized E-code / R-code identifiers.
//!
//! Kept as `&'static str` constants rather than an enum so that downstream
//! manufacturing-execution-system consumers can match on the exact wire
//! strings without a serde mapping layer.

/// Negative-slope physics violation.
pub const E_NEG_SLOPE: &str = "E_NEG_SLOPE";
pub const R_CHECK_FIXTURE: &str = "R_CHECK_FIXTURE";

/// Rigidity slope outside configured bounds.
pub const E04: &str = "E04";
pub const R04: &str = "R04";

/// Peak torque outside configured bounds.
pub const E02: &str = "E02";
pub const R02: &str = "R02";

/// Anomalous total work under the adaptive layer.
pub const E08: &str = "E08";
pub const R08: &str = "R08";

/// Curve failed structural validation before feature extraction ran.
pub const E_BAD_INPUT: &str = "E_BAD_INPUT";

pub const DRIFT_DETECTED: &str = "DRIFT_DETECTED";
