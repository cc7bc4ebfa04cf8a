//! Shared application state.
//!
//! The historical dataset and the classifier artifact are loaded at most once
//! per process, on first use, and are read-only afterwards. A failed load
//! leaves the cell empty, so the next render retries instead of poisoning the
//! process.

use anyhow::Result;
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::config::Config;
use crate::data::Dataset;
use crate::ml::classifier::AnomalyClassifier;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    dataset: Arc<OnceCell<Dataset>>,
    classifier: Arc<OnceCell<AnomalyClassifier>>,
}

impl AppState {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            dataset: Arc::new(OnceCell::new()),
            classifier: Arc::new(OnceCell::new()),
        }
    }

    pub fn dataset(&self) -> Result<&Dataset> {
        self.dataset
            .get_or_try_init(|| Dataset::load(&self.cfg.data.dataset_path))
    }

    pub fn classifier(&self) -> Result<&AnomalyClassifier> {
        self.classifier
            .get_or_try_init(|| AnomalyClassifier::load(&self.cfg.data.classifier_path))
    }
}
