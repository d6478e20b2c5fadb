//! Adaptive diagnostic engine for industrial screw-fastening operations.
//!
//! Given synchronized torque/angle/time curves for a fastening attempt, this
//! crate derives physical metrics, checks them against deterministic physics
//! rules, and maintains per-carrier rolling statistics that adapt over time
//! (cold start → shadow → golden-locked → drift-detected). See
//! [`orchestrator::Orchestrator`] for the composed entry point.

pub mod adaptive;
pub mod carrier;
pub mod codes;
pub mod config;
pub mod error;
pub mod feature;
pub mod orchestrator;
pub mod persistence;
pub mod physics;
pub mod stats;

pub use error::Error;
pub use orchestrator::{DiagnosisResult, Orchestrator, Status};
