//! Named workers plus the default worker.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::Worker;
use crate::error::WorkerError;

/// Name of the worker components run on unless configured otherwise.
pub const DEFAULT_WORKER: &str = "default";

/// Owns every worker of an application.
pub struct WorkerRegistry {
    default: Arc<Worker>,
    workers: RwLock<BTreeMap<String, Arc<Worker>>>,
}

impl WorkerRegistry {
    /// Create a registry with a running default worker.
    pub fn new() -> Result<Self, WorkerError> {
        let default = Arc::new(Worker::spawn(DEFAULT_WORKER)?);
        let mut workers = BTreeMap::new();
        workers.insert(DEFAULT_WORKER.to_string(), default.clone());
        Ok(Self {
            default,
            workers: RwLock::new(workers),
        })
    }

    #[must_use]
    pub fn default_worker(&self) -> Arc<Worker> {
        self.default.clone()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Worker>> {
        self.workers.read().get(name).cloned()
    }

    /// Return the named worker, spawning it on first use.
    pub fn get_or_spawn(&self, name: &str) -> Result<Arc<Worker>, WorkerError> {
        if let Some(worker) = self.get(name) {
            return Ok(worker);
        }
        let mut workers = self.workers.write();
        if let Some(worker) = workers.get(name) {
            return Ok(worker.clone());
        }
        let worker = Arc::new(Worker::spawn(name)?);
        workers.insert(name.to_string(), worker.clone());
        info!(worker = %name, "Worker registered");
        Ok(worker)
    }

    /// Worker for an optional configured name.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<Worker>, WorkerError> {
        match name {
            Some(name) if !name.is_empty() => self.get_or_spawn(name),
            _ => Ok(self.default_worker()),
        }
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.workers.read().keys().cloned().collect()
    }

    /// Stop and join every worker, the default one last.
    pub fn stop_all(&self) {
        let workers: Vec<Arc<Worker>> = {
            let mut map = self.workers.write();
            let all = map.values().cloned().collect();
            map.retain(|name, _| name == DEFAULT_WORKER);
            all
        };
        for worker in workers.iter().filter(|w| w.name() != DEFAULT_WORKER) {
            worker.stop();
        }
        self.default.stop();
        info!(count = workers.len(), "All workers stopped");
    }
}
