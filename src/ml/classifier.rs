//! Anomaly classifier artifact wrapper.
//!
//! The classifier is a random forest trained offline; the artifact is the
//! bincode-serialized model. Loading happens once per process (see
//! `state::AppState`), after which the model is read-only.

use anyhow::{Context, Result};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::path::Path;
use tracing::info;

use super::{FeatureTable, FEATURE_COUNT};

type ForestModel = RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

pub struct AnomalyClassifier {
    model: ForestModel,
}

impl AnomalyClassifier {
    /// Load a pre-trained artifact. A missing or corrupt file is fatal for
    /// the caller; there is no fallback model.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read classifier artifact {}", path.display()))?;
        let model: ForestModel = bincode::deserialize(&bytes)
            .with_context(|| format!("corrupt classifier artifact {}", path.display()))?;
        info!(path = %path.display(), "anomaly classifier loaded");
        Ok(Self { model })
    }

    /// Predict one label per row. Labels are 0 (normal) or 1 (anomaly).
    pub fn predict(&self, table: &FeatureTable) -> Result<Vec<u8>> {
        if table.is_empty() {
            return Ok(Vec::new());
        }

        let n_rows = table.len();
        let mut flat = Vec::with_capacity(n_rows * FEATURE_COUNT);
        for row in table.rows() {
            flat.extend_from_slice(row);
        }
        let x = DenseMatrix::new(n_rows, FEATURE_COUNT, flat, false);

        let labels = self
            .model
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("classifier prediction failed: {e}"))?;

        if labels.len() != n_rows {
            anyhow::bail!(
                "classifier returned {} labels for {} rows",
                labels.len(),
                n_rows
            );
        }

        Ok(labels.into_iter().map(|l| (l != 0) as u8).collect())
    }

    /// Fit a new forest. This is the offline tooling surface that produces
    /// artifacts; the service itself never trains.
    pub fn fit(table: &FeatureTable, labels: &[u8]) -> Result<Self> {
        if table.is_empty() {
            anyhow::bail!("cannot fit on an empty feature table");
        }
        if table.len() != labels.len() {
            anyhow::bail!(
                "feature and label count mismatch: {} rows, {} labels",
                table.len(),
                labels.len()
            );
        }

        let n_rows = table.len();
        let mut flat = Vec::with_capacity(n_rows * FEATURE_COUNT);
        for row in table.rows() {
            flat.extend_from_slice(row);
        }
        let x = DenseMatrix::new(n_rows, FEATURE_COUNT, flat, false);
        let y: Vec<u32> = labels.iter().map(|&l| l as u32).collect();

        // all 16 candidate features per split; the schema is low-dimensional
        let params = RandomForestClassifierParameters::default()
            .with_n_trees(50)
            .with_max_depth(8)
            .with_m(FEATURE_COUNT)
            .with_seed(42);

        let model = RandomForestClassifier::fit(&x, &y, params)
            .map_err(|e| anyhow::anyhow!("random forest training failed: {e}"))?;

        Ok(Self { model })
    }

    /// Serialize the model to an artifact file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(&self.model).context("failed to serialize classifier")?;
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write classifier artifact {}", path.display()))?;
        Ok(())
    }
}
