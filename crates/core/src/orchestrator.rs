//! Diagnostic Orchestrator: composes the Feature Extractor, Physics
//! Constraint Layer, Adaptive Learning Layer, and Persistence Layer into
//! the single entry point callers use.

use crate::adaptive::{self, OptimizationSuggestion, Thresholds};
use crate::carrier::CarrierModel;
use crate::codes;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::feature::{self, FeatureVector, RawCurve};
use crate::persistence::ModelStore;
use crate::physics;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Ng,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrewIssue {
    pub status: Status,
    pub e_codes: Vec<&'static str>,
    pub r_codes: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisResult {
    pub status: Status,
    /// `None` when the raw input failed curve validation (`E_BAD_INPUT`):
    /// there is no curve to extract features from.
    pub features: Option<FeatureVector>,
    pub screw_issue: ScrewIssue,
    pub optimization_suggestion: Option<OptimizationSuggestion>,
}

/// Composes the Feature Extractor, Physics Constraint Layer, Adaptive
/// Learning Layer, and Persistence Layer. Owns the in-memory carrier
/// cache and the per-carrier exclusive locks described in the
/// concurrency model: a cache lookup takes a shared read lock, a cache
/// insert takes an exclusive write lock, and the per-carrier `Mutex`
/// then serializes every diagnosis against that carrier regardless of
/// which thread holds it.
pub struct Orchestrator {
    store: Box<dyn ModelStore + Send + Sync>,
    cache: RwLock<HashMap<String, Arc<Mutex<CarrierModel>>>>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(store: Box<dyn ModelStore + Send + Sync>, config: EngineConfig) -> Result<Self, Error> {
        let config = config.validate()?;
        Ok(Self {
            store,
            cache: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// Diagnose every hole in `data`, iterating in `BTreeMap` (lexicographic)
    /// order so that results and post-state are deterministic across runs.
    ///
    /// A hole whose raw `{torque, angle, time}` data fails curve validation
    /// is isolated as an `E_BAD_INPUT` NG result; it never aborts the rest
    /// of the batch.
    #[tracing::instrument(skip(self, data), fields(carrier_id, holes = data.len()))]
    pub fn diagnose(
        &self,
        carrier_id: &str,
        data: &BTreeMap<String, RawCurve>,
    ) -> Result<BTreeMap<String, DiagnosisResult>, Error> {
        let model_handle = self.resolve_carrier(carrier_id)?;
        let mut results = BTreeMap::new();

        {
            let mut model = model_handle.lock().expect("carrier mutex poisoned");
            for (hole_id, raw) in data {
                let result = self.diagnose_hole(&mut model, hole_id, raw);
                results.insert(hole_id.clone(), result);
            }
        }

        if self.config.auto_save {
            let model = model_handle.lock().expect("carrier mutex poisoned");
            self.store.save(&model)?;
        }

        Ok(results)
    }

    fn diagnose_hole(&self, model: &mut CarrierModel, hole_id: &str, raw: &RawCurve) -> DiagnosisResult {
        let curve = match raw.clone().into_curve() {
            Ok(curve) => curve,
            Err(e) => {
                tracing::warn!(hole_id, reason = %e, "curve failed validation, isolating as E_BAD_INPUT");
                return DiagnosisResult {
                    status: Status::Ng,
                    features: None,
                    screw_issue: ScrewIssue {
                        status: Status::Ng,
                        e_codes: vec![codes::E_BAD_INPUT],
                        r_codes: Vec::new(),
                    },
                    optimization_suggestion: None,
                };
            }
        };

        let features = feature::extract(&curve);

        let physics_outcome = physics::check(&features, &self.config.physics, &self.config.codes);
        let physics_is_hard_ng = physics_outcome.e_codes.contains(&codes::E_NEG_SLOPE);

        if !physics_is_hard_ng {
            let hole = model.hole_mut(hole_id, self.config.window_size);
            let adaptive_outcome = adaptive::classify_and_learn(
                &features,
                hole,
                &self.config.tolerance,
                &self.config.codes,
                Thresholds {
                    shadow_threshold: self.config.shadow_threshold,
                    golden_threshold: self.config.golden_threshold,
                },
            );

            let status = if !physics_outcome.pass || adaptive_outcome.status == Status::Ng {
                Status::Ng
            } else {
                Status::Ok
            };
            let mut e_codes = physics_outcome.e_codes;
            e_codes.extend(adaptive_outcome.e_codes);
            let mut r_codes = physics_outcome.r_codes;
            r_codes.extend(adaptive_outcome.r_codes);

            DiagnosisResult {
                status,
                features: Some(features),
                screw_issue: ScrewIssue { status, e_codes, r_codes },
                optimization_suggestion: adaptive_outcome.optimization_suggestion,
            }
        } else {
            // Fatal physics violation: preserve learning from contaminated
            // data by never observing these features into the statistics.
            tracing::warn!(hole_id, "negative slope violation, skipping adaptive observation");
            DiagnosisResult {
                status: Status::Ng,
                features: Some(features),
                screw_issue: ScrewIssue {
                    status: Status::Ng,
                    e_codes: physics_outcome.e_codes,
                    r_codes: physics_outcome.r_codes,
                },
                optimization_suggestion: None,
            }
        }
    }

    fn resolve_carrier(&self, carrier_id: &str) -> Result<Arc<Mutex<CarrierModel>>, Error> {
        if let Some(existing) = self.cache.read().expect("cache lock poisoned").get(carrier_id) {
            return Ok(Arc::clone(existing));
        }

        let mut cache = self.cache.write().expect("cache lock poisoned");
        if let Some(existing) = cache.get(carrier_id) {
            return Ok(Arc::clone(existing));
        }

        let model = match self.store.load(carrier_id) {
            Ok(Some(mut model)) => {
                model.set_window_capacity(self.config.window_size);
                model
            }
            Ok(None) => CarrierModel::new(carrier_id),
            Err(Error::PersistenceCorruption { carrier_id, reason }) => {
                tracing::warn!(%carrier_id, %reason, "persisted model corrupt, treating as cold start");
                CarrierModel::new(carrier_id)
            }
            Err(e) => return Err(e),
        };

        let handle = Arc::new(Mutex::new(model));
        cache.insert(carrier_id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Evict `carrier_id` from the in-memory cache. Does not touch the
    /// on-disk file; the next diagnosis for this carrier reloads from
    /// persistence (or creates a fresh model if none exists).
    pub fn forget_carrier(&self, carrier_id: &str) {
        self.cache.write().expect("cache lock poisoned").remove(carrier_id);
    }
}
