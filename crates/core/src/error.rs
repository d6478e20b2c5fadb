//! Error types for the diagnostic engine.
//!
//! `InvalidCurve` is returned by [`crate::feature::Curve::new`]. Raised from
//! inside [`crate::orchestrator::Orchestrator::diagnose`] it is caught and
//! isolated per hole as `E_BAD_INPUT`, never propagated out of `diagnose`
//! itself. `Config` and `Persistence` are the errors that can still surface
//! from `diagnose`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid curve: {reason}")]
    InvalidCurve { reason: String },

    #[error("invalid carrier id {id:?}: {reason}")]
    InvalidCarrierId { id: String, reason: &'static str },

    #[error("persisted model for carrier {carrier_id:?} is corrupt: {reason}")]
    PersistenceCorruption { carrier_id: String, reason: String },

    #[error("failed to persist carrier model to {path:?}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
