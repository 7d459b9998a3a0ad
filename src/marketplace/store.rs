//! Experiment catalog storage and persistence.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::funding::amount::TokenAmount;
use crate::marketplace::types::{Experiment, NewExperiment};
use crate::observability::metrics;

/// A thread-safe catalog of listed experiments with optional JSON-file
/// persistence.
#[derive(Clone)]
pub struct ExperimentStore {
    inner: Arc<DashMap<u64, Experiment>>,
    next_id: Arc<AtomicU64>,
    persistence_path: Option<String>,
}

impl ExperimentStore {
    /// Create a new empty catalog.
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            persistence_path,
        }
    }

    /// Load from file if it exists; an absent file yields an empty catalog.
    pub fn load_from_file(path: &str) -> std::io::Result<Self> {
        let store = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            let map: HashMap<u64, Experiment> = serde_json::from_reader(reader)?;

            let max_id = map.keys().max().copied().unwrap_or(0);
            for (k, v) in map {
                store.inner.insert(k, v);
            }
            store.next_id.store(max_id + 1, Ordering::SeqCst);
            metrics::record_catalog_size(store.inner.len());
            tracing::info!(count = store.inner.len(), path, "Loaded experiment catalog");
        }
        Ok(store)
    }

    /// Save to file, if a persistence path was configured.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        if let Some(path) = &self.persistence_path {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);

            let map: HashMap<u64, Experiment> = self
                .inner
                .iter()
                .map(|r| (*r.key(), r.value().clone()))
                .collect();

            serde_json::to_writer(writer, &map)?;
            tracing::info!(count = map.len(), "Saved experiment catalog");
        }
        Ok(())
    }

    /// Create a listing, assigning the next id.
    pub fn create(&self, new: NewExperiment, funding_goal: TokenAmount) -> Experiment {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let experiment = Experiment {
            id,
            title: new.title,
            summary: new.summary,
            creator: new.creator,
            funding_goal,
            outcome_labels: new.outcome_labels,
            image_url: new.image_url,
            created_at,
        };
        self.inner.insert(id, experiment.clone());
        metrics::record_catalog_size(self.inner.len());

        if let Err(e) = self.save_to_file() {
            tracing::warn!(error = %e, "Failed to persist catalog after create");
        }
        experiment
    }

    pub fn get(&self, id: u64) -> Option<Experiment> {
        self.inner.get(&id).map(|r| r.value().clone())
    }

    /// All listings, newest first.
    pub fn list(&self) -> Vec<Experiment> {
        let mut all: Vec<Experiment> = self.inner.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| b.id.cmp(&a.id));
        all
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }
}
