//! Preprocessing pipeline and forest bundled as one persistable model

use super::artifact::ModelArtifact;
use super::forest::{ForestConfig, RandomForestRegressor};
use super::Regressor;
use crate::error::{ArtifactError, ModelError, Result};
use crate::preprocess::Preprocessor;
use crate::table::RecordSet;
use chrono::NaiveDateTime;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Trained sales model: the frozen preprocessor plus the regressor fitted on
/// its output. Saved and loaded as a single artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesPredictionModel {
    preprocessor: Preprocessor,
    regressor: RandomForestRegressor,
}

impl SalesPredictionModel {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            preprocessor: Preprocessor::new(),
            regressor: RandomForestRegressor::new(config),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.regressor.is_fitted()
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn preprocessor_mut(&mut self) -> &mut Preprocessor {
        &mut self.preprocessor
    }

    pub fn regressor(&self) -> &RandomForestRegressor {
        &self.regressor
    }

    /// Fit the regressor on an already preprocessed matrix
    pub fn fit(
        &mut self,
        features: ArrayView2<f64>,
        target: ArrayView1<f64>,
    ) -> std::result::Result<(), ModelError> {
        self.regressor.fit(features, target)?;
        debug!(
            rows = features.nrows(),
            features = features.ncols(),
            trees = self.regressor.n_trees(),
            "Fitted random forest"
        );
        Ok(())
    }

    /// Predicted Utilization, one value per row
    pub fn predict(&self, features: ArrayView2<f64>) -> std::result::Result<Array1<f64>, ModelError> {
        self.regressor.predict(features)
    }

    /// Fit the preprocessor and the regressor on raw training records
    pub fn fit_records(&mut self, records: &RecordSet, now: NaiveDateTime) -> Result<()> {
        let (features, target) = self.preprocessor.fit_transform(records, now)?;
        self.fit(features.view(), target.view())?;
        Ok(())
    }

    /// Preprocess raw inference records and predict
    pub fn predict_records(&self, records: &RecordSet, now: NaiveDateTime) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted.into());
        }
        let features = self.preprocessor.transform(records, now)?;
        Ok(self.predict(features.view())?)
    }

    /// Feature names paired with normalized importances, highest first
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let mut pairs: Vec<(String, f64)> = self
            .preprocessor
            .feature_names()
            .into_iter()
            .zip(self.regressor.feature_importances().iter().copied())
            .collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        pairs
    }

    /// Persist to `path` as a checksummed artifact
    pub fn save(&self, path: &Path) -> std::result::Result<(), ArtifactError> {
        ModelArtifact::seal(self, path)?.write(path)?;
        info!(path = ?path, "Model saved");
        Ok(())
    }

    /// Restore a model previously written by [`save`](Self::save)
    pub fn load(path: &Path) -> std::result::Result<Self, ArtifactError> {
        let model: Self = ModelArtifact::read(path)?.open(path)?;
        info!(path = ?path, trees = model.regressor.n_trees(), "Model loaded");
        Ok(model)
    }
}

impl Default for SalesPredictionModel {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictorError;
    use crate::models::TransactionRecord;
    use ndarray::array;
    use tempfile::tempdir;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-06-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn small() -> SalesPredictionModel {
        SalesPredictionModel::new(ForestConfig {
            n_trees: 8,
            max_depth: 5,
            ..Default::default()
        })
    }

    fn records() -> Vec<TransactionRecord> {
        (0..30)
            .map(|i| TransactionRecord {
                customer_id: i,
                product_id: 100 + i % 4,
                branch_code: ["B1", "B2", "B3"][(i % 3) as usize].to_string(),
                customer_value: if i % 2 == 0 { "gold" } else { "silver" }.to_string(),
                utilization: if i % 3 == 0 { 0.8 } else { 0.2 },
                quantity: (i % 5) as f64 + 1.0,
                price_per_unit: 10.0 + i as f64,
                purchase_date: format!("2024-05-{:02}", (i % 28) + 1),
            })
            .collect()
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = small();
        let x = array![[0.0, 1.0]];
        assert_eq!(model.predict(x.view()), Err(ModelError::NotFitted));

        let set = RecordSet::from(records().as_slice());
        assert!(matches!(
            model.predict_records(&set, now()),
            Err(PredictorError::Model(ModelError::NotFitted))
        ));
    }

    #[test]
    fn test_fit_records_learns_branch_signal() {
        let mut model = small();
        let set = RecordSet::from(records().as_slice());
        model.fit_records(&set, now()).unwrap();

        let pred = model.predict_records(&set, now()).unwrap();
        assert_eq!(pred.len(), 30);
        assert!(pred[0] > pred[1], "B1 rows carry the high utilization");
    }

    #[test]
    fn test_feature_importances_are_named_and_sorted() {
        let mut model = small();
        model
            .fit_records(&RecordSet::from(records().as_slice()), now())
            .unwrap();

        let importances = model.feature_importances();
        assert_eq!(importances.len(), model.preprocessor().n_features());
        assert!(importances.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_save_load_gives_identical_predictions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models").join("sales.json");
        let set = RecordSet::from(records().as_slice());

        let mut model = small();
        model.fit_records(&set, now()).unwrap();
        model.save(&path).unwrap();

        let loaded = SalesPredictionModel::load(&path).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(
            loaded.predict_records(&set, now()).unwrap(),
            model.predict_records(&set, now()).unwrap()
        );
    }

    #[test]
    fn test_load_missing_artifact() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            SalesPredictionModel::load(&dir.path().join("nope.json")),
            Err(ArtifactError::Io { .. })
        ));
    }

    #[test]
    fn test_deep_tree_survives_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deep.json");

        let n = 300;
        let x = ndarray::Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(n, |i| 2.5f64.powi(i as i32));
        let mut model = SalesPredictionModel::new(ForestConfig {
            n_trees: 1,
            max_depth: 500,
            bootstrap: false,
            ..Default::default()
        });
        model.fit(x.view(), y.view()).unwrap();
        assert!(model.regressor().max_tree_depth() > 128);

        model.save(&path).unwrap();
        let loaded = SalesPredictionModel::load(&path).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(
            loaded.predict(x.view()).unwrap(),
            model.predict(x.view()).unwrap()
        );
    }
}
