//! Filesystem run store
//!
//! Layout: `root/<experiment>/<run_id>/{meta.json, model.json, scaler_X.json,
//! scaler_y.json}`. A run is assembled in a hidden staging directory and
//! published with a single rename.

use super::{Artifact, ModelRun, RunId, RunStore, META_FILE};
use crate::error::{ForecastError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const STAGING_PREFIX: &str = ".staging-";

/// Persist runs as JSON files on the local filesystem
#[derive(Debug, Clone)]
pub struct FileRunStore {
    root: PathBuf,
}

impl FileRunStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiment_dir(&self, experiment: &str) -> PathBuf {
        self.root.join(experiment)
    }

    fn run_dir(&self, experiment: &str, run_id: &RunId) -> PathBuf {
        self.experiment_dir(experiment).join(run_id.as_str())
    }

    fn write_staged(staging: &Path, run: &ModelRun, artifacts: &[Artifact]) -> Result<()> {
        fs::create_dir(staging)?;
        fs::write(staging.join(META_FILE), serde_json::to_vec_pretty(run)?)?;
        for artifact in artifacts {
            fs::write(staging.join(artifact.name), &artifact.bytes)?;
        }
        Ok(())
    }
}

impl RunStore for FileRunStore {
    fn create(&self, run: &ModelRun, artifacts: &[Artifact]) -> Result<()> {
        let experiment_dir = self.experiment_dir(&run.experiment);
        fs::create_dir_all(&experiment_dir)?;

        let staging = experiment_dir.join(format!("{}{}", STAGING_PREFIX, run.run_id));
        let target = self.run_dir(&run.experiment, &run.run_id);
        if target.exists() {
            return Err(ForecastError::Registry(format!(
                "Run {} already exists",
                run.run_id
            )));
        }

        let published = Self::write_staged(&staging, run, artifacts)
            .and_then(|()| Ok(fs::rename(&staging, &target)?));
        if let Err(err) = published {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "Failed to remove staging directory"
                    );
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn has_experiment(&self, experiment: &str) -> Result<bool> {
        Ok(self.experiment_dir(experiment).is_dir())
    }

    fn list(&self, experiment: &str) -> Result<Vec<ModelRun>> {
        let dir = self.experiment_dir(experiment);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            let meta = entry.path().join(META_FILE);
            match fs::read(&meta)
                .map_err(ForecastError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<ModelRun>(&bytes)?))
            {
                Ok(run) => runs.push(run),
                Err(err) => {
                    tracing::warn!(path = %meta.display(), error = %err, "Skipping unreadable run")
                }
            }
        }
        Ok(runs)
    }

    fn read_artifact(
        &self,
        experiment: &str,
        run_id: &RunId,
        name: &str,
    ) -> Result<Option<Vec<u8>>> {
        match fs::read(self.run_dir(experiment, run_id).join(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn delete(&self, experiment: &str, run_id: &RunId) -> Result<()> {
        match fs::remove_dir_all(self.run_dir(experiment, run_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ForecastError::NoRunFound(format!("Run {} does not exist", run_id)))
            }
            Err(err) => Err(err.into()),
        }
    }
}
