//! Persistence Layer: atomic per-carrier JSON files.
//!
//! [`FileModelStore::save`] writes to `{carrier_id}.json.tmp`, fsyncs it,
//! then renames over the target — the rename is atomic on the same
//! filesystem, so a reader never observes a half-written file.

use crate::carrier::{CarrierModel, SCHEMA_VERSION};
use crate::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub trait ModelStore {
    fn load(&self, carrier_id: &str) -> Result<Option<CarrierModel>, Error>;
    fn save(&self, model: &CarrierModel) -> Result<(), Error>;
}

/// Validate that `carrier_id` is safe to use as a single path component:
/// non-empty, no path separators, not `.` or `..`.
pub fn sanitize_carrier_id(carrier_id: &str) -> Result<(), Error> {
    if carrier_id.is_empty() {
        return Err(Error::InvalidCarrierId {
            id: carrier_id.to_string(),
            reason: "empty",
        });
    }
    if carrier_id == "." || carrier_id == ".." {
        return Err(Error::InvalidCarrierId {
            id: carrier_id.to_string(),
            reason: "reserved path component",
        });
    }
    if carrier_id.contains('/') || carrier_id.contains('\\') {
        return Err(Error::InvalidCarrierId {
            id: carrier_id.to_string(),
            reason: "must not contain path separators",
        });
    }
    Ok(())
}

pub struct FileModelStore {
    models_dir: PathBuf,
}

impl FileModelStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    fn path_for(&self, carrier_id: &str) -> PathBuf {
        self.models_dir.join(format!("{carrier_id}.json"))
    }
}

impl ModelStore for FileModelStore {
    #[tracing::instrument(skip(self))]
    fn load(&self, carrier_id: &str) -> Result<Option<CarrierModel>, Error> {
        sanitize_carrier_id(carrier_id)?;
        let path = self.path_for(carrier_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(Error::Persistence { path, source });
            }
        };

        let model: CarrierModel = match serde_json::from_slice(&bytes) {
            Ok(model) => model,
            Err(e) => {
                return Err(Error::PersistenceCorruption {
                    carrier_id: carrier_id.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        if model.schema_version != SCHEMA_VERSION {
            return Err(Error::PersistenceCorruption {
                carrier_id: carrier_id.to_string(),
                reason: format!(
                    "unsupported schema_version {} (expected {SCHEMA_VERSION})",
                    model.schema_version
                ),
            });
        }
        Ok(Some(model))
    }

    #[tracing::instrument(skip(self, model), fields(carrier_id = %model.carrier_id))]
    fn save(&self, model: &CarrierModel) -> Result<(), Error> {
        sanitize_carrier_id(&model.carrier_id)?;
        fs::create_dir_all(&self.models_dir).map_err(|source| Error::Persistence {
            path: self.models_dir.clone(),
            source,
        })?;

        let target = self.path_for(&model.carrier_id);
        let tmp_path = self.path_for(&format!("{}.tmp", model.carrier_id));

        if let Err(err) = write_atomic(&tmp_path, &target, model) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
        Ok(())
    }
}

fn write_atomic(tmp_path: &Path, target: &Path, model: &CarrierModel) -> Result<(), Error> {
    let payload = serde_json::to_vec_pretty(model).map_err(|e| Error::PersistenceCorruption {
        carrier_id: model.carrier_id.clone(),
        reason: e.to_string(),
    })?;

    let file = fs::File::create(tmp_path).map_err(|source| Error::Persistence {
        path: tmp_path.to_path_buf(),
        source,
    })?;
    {
        use std::io::Write;
        let mut file = file;
        file.write_all(&payload).map_err(|source| Error::Persistence {
            path: tmp_path.to_path_buf(),
            source,
        })?;
        file.sync_all().map_err(|source| Error::Persistence {
            path: tmp_path.to_path_buf(),
            source,
        })?;
    }
    fs::rename(tmp_path, target).map_err(|source| Error::Persistence {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal_carrier_ids() {
        assert!(sanitize_carrier_id("../etc").is_err());
        assert!(sanitize_carrier_id("a/b").is_err());
        assert!(sanitize_carrier_id("..").is_err());
        assert!(sanitize_carrier_id("carrier-1").is_ok());
    }

    #[test]
    fn load_of_missing_carrier_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path());
        assert!(store.load("unknown").unwrap().is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path());
        let mut model = CarrierModel::new("carrier-1");
        let hole = model.hole_mut("hole-a", 10);
        hole.metrics.peak_torque.observe(5.0);

        store.save(&model).unwrap();
        let mut loaded = store.load("carrier-1").unwrap().unwrap();
        loaded.set_window_capacity(10);
        assert_eq!(loaded.carrier_id, "carrier-1");
        assert_eq!(loaded.holes["hole-a"].metrics.peak_torque.count, 1);
    }

    #[test]
    fn save_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path());
        let model = CarrierModel::new("carrier-1");
        store.save(&model).unwrap();
        assert!(!dir.path().join("carrier-1.json.tmp").exists());
        assert!(dir.path().join("carrier-1.json").exists());
    }

    #[test]
    fn corrupt_file_is_reported_as_persistence_corruption() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("carrier-1.json"), b"not json").unwrap();
        let store = FileModelStore::new(dir.path());
        let err = store.load("carrier-1").unwrap_err();
        assert!(matches!(err, Error::PersistenceCorruption { .. }));
    }

    #[test]
    fn schema_version_mismatch_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = CarrierModel::new("carrier-1");
        model.schema_version = 999;
        let json = serde_json::to_string(&model).unwrap();
        fs::write(dir.path().join("carrier-1.json"), json).unwrap();
        let store = FileModelStore::new(dir.path());
        let err = store.load("carrier-1").unwrap_err();
        assert!(matches!(err, Error::PersistenceCorruption { .. }));
    }
}
