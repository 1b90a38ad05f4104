//! In-memory run store

use super::{Artifact, ModelRun, RunId, RunStore};
use crate::error::{ForecastError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredRun {
    run: ModelRun,
    artifacts: HashMap<String, Vec<u8>>,
}

type Experiments = HashMap<String, BTreeMap<RunId, StoredRun>>;

/// Run store backed by a map; contents are lost on drop
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    experiments: RwLock<Experiments>,
}

impl MemoryRunStore {
    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Experiments>> {
        self.experiments
            .read()
            .map_err(|_| ForecastError::Registry("Run store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Experiments>> {
        self.experiments
            .write()
            .map_err(|_| ForecastError::Registry("Run store lock poisoned".to_string()))
    }

    /// Drop one artifact of a stored run
    pub fn remove_artifact(&self, experiment: &str, run_id: &RunId, name: &str) -> Result<bool> {
        let mut experiments = self.write()?;
        Ok(experiments
            .get_mut(experiment)
            .and_then(|runs| runs.get_mut(run_id))
            .and_then(|stored| stored.artifacts.remove(name))
            .is_some())
    }
}

impl RunStore for MemoryRunStore {
    fn create(&self, run: &ModelRun, artifacts: &[Artifact]) -> Result<()> {
        let mut experiments = self.write()?;
        let runs = experiments.entry(run.experiment.clone()).or_default();
        if runs.contains_key(&run.run_id) {
            return Err(ForecastError::Registry(format!(
                "Run {} already exists",
                run.run_id
            )));
        }
        runs.insert(
            run.run_id.clone(),
            StoredRun {
                run: run.clone(),
                artifacts: artifacts
                    .iter()
                    .map(|a| (a.name.to_string(), a.bytes.clone()))
                    .collect(),
            },
        );
        Ok(())
    }

    fn has_experiment(&self, experiment: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(experiment))
    }

    fn list(&self, experiment: &str) -> Result<Vec<ModelRun>> {
        Ok(self
            .read()?
            .get(experiment)
            .map(|runs| runs.values().map(|stored| stored.run.clone()).collect())
            .unwrap_or_default())
    }

    fn read_artifact(
        &self,
        experiment: &str,
        run_id: &RunId,
        name: &str,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read()?
            .get(experiment)
            .and_then(|runs| runs.get(run_id))
            .and_then(|stored| stored.artifacts.get(name).cloned()))
    }

    fn delete(&self, experiment: &str, run_id: &RunId) -> Result<()> {
        self.write()?
            .get_mut(experiment)
            .and_then(|runs| runs.remove(run_id))
            .map(|_| ())
            .ok_or_else(|| ForecastError::NoRunFound(format!("Run {} does not exist", run_id)))
    }
}
