//! Train and predict orchestration
//!
//! `PredictionService` wires the store, preprocessor, model and artifact
//! together. Each run is all-or-nothing: the first error aborts it and
//! nothing partial is written.

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::Prediction;
use crate::observability::{RunMetrics, StructuredLogger};
use crate::predictor::{
    mean_absolute_error, r2_score, train_test_split, PredictionFormatter, RandomForestRegressor,
    Regressor, SalesPredictionModel,
};
use crate::store::SalesStore;
use crate::table::RecordSet;
use chrono::NaiveDateTime;
use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Below this many rows no holdout split is made
pub const MIN_HOLDOUT_ROWS: usize = 10;

/// Validation scores on the held-out rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldoutMetrics {
    pub train_rows: usize,
    pub test_rows: usize,
    pub r2: f64,
    pub mae: f64,
}

/// Outcome of a training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub features: usize,
    pub holdout: Option<HoldoutMetrics>,
    pub model_path: PathBuf,
    pub top_features: Vec<(String, f64)>,
}

/// Outcome of a prediction run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    pub candidates: usize,
    pub predictions: Vec<Prediction>,
}

/// Runs training and prediction against a sales store
pub struct PredictionService<S: SalesStore> {
    config: AppConfig,
    store: S,
    metrics: RunMetrics,
    logger: StructuredLogger,
}

impl<S: SalesStore> PredictionService<S> {
    pub fn new(config: AppConfig, store: S) -> Self {
        Self {
            config,
            store,
            metrics: RunMetrics::new(),
            logger: StructuredLogger::new("sales-predictor"),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Train on every stored record and save the model
    pub async fn train(&self, now: NaiveDateTime) -> Result<TrainingReport> {
        let started = Instant::now();

        let records = self.store.training_records().await?;
        self.metrics.add_rows_loaded(records.len());
        info!(rows = records.len(), "Loaded training data");

        let set = RecordSet::from(records.as_slice());
        let mut model = SalesPredictionModel::new(self.config.forest_config());
        let (features, target) = model.preprocessor_mut().fit_transform(&set, now)?;

        let holdout = self.evaluate_holdout(features.view(), target.view())?;
        if let Some(h) = &holdout {
            self.metrics.set_holdout_r2(h.r2);
            info!(
                r2 = h.r2,
                mae = h.mae,
                test_rows = h.test_rows,
                "Holdout evaluation"
            );
        }

        model.fit(features.view(), target.view())?;
        model.save(&self.config.model_path)?;

        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.observe_training_duration(elapsed);
        self.logger.log_training_completed(
            features.nrows(),
            features.ncols(),
            holdout.as_ref().map(|h| h.r2),
            holdout.as_ref().map(|h| h.mae),
            &self.config.model_path.display().to_string(),
            elapsed,
        );

        Ok(TrainingReport {
            rows: features.nrows(),
            features: features.ncols(),
            holdout,
            model_path: self.config.model_path.clone(),
            top_features: model.feature_importances().into_iter().take(5).collect(),
        })
    }

    /// Fit a throwaway forest on a seeded split and score the held-out rows
    fn evaluate_holdout(
        &self,
        features: ArrayView2<f64>,
        target: ArrayView1<f64>,
    ) -> Result<Option<HoldoutMetrics>> {
        let n = features.nrows();
        if self.config.validation_fraction <= 0.0 || n < MIN_HOLDOUT_ROWS {
            debug!(rows = n, "Skipping holdout evaluation");
            return Ok(None);
        }

        let split = train_test_split(n, self.config.validation_fraction, self.config.random_seed);
        let x_train = features.select(Axis(0), &split.train);
        let y_train = target.select(Axis(0), &split.train);
        let x_test = features.select(Axis(0), &split.test);
        let y_test = target.select(Axis(0), &split.test);

        let mut forest = RandomForestRegressor::new(self.config.forest_config());
        forest.fit(x_train.view(), y_train.view())?;
        let predicted = forest.predict(x_test.view())?;

        Ok(Some(HoldoutMetrics {
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            r2: r2_score(y_test.view(), predicted.view()),
            mae: mean_absolute_error(y_test.view(), predicted.view()),
        }))
    }

    /// Score inactive customers with the saved model and store the results
    pub async fn predict(&self, now: NaiveDateTime) -> Result<PredictionReport> {
        let started = Instant::now();

        let model = SalesPredictionModel::load(&self.config.model_path)?;
        let candidates = self
            .store
            .customers_for_prediction(now, self.config.inactivity_days)
            .await?;
        self.metrics.add_rows_loaded(candidates.len());

        let predictions = if candidates.is_empty() {
            Vec::new()
        } else {
            let set = RecordSet::from(candidates.as_slice());
            let scores = model.predict_records(&set, now)?;
            let formatter = PredictionFormatter::new(self.config.inactivity_days);

            let predictions: Vec<Prediction> = candidates
                .iter()
                .zip(scores.iter())
                .map(|(summary, &score)| formatter.format(summary, score, now))
                .collect();

            let written = self.store.insert_predictions(&predictions).await?;
            self.metrics.add_predictions_written(written);
            predictions
        };

        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.observe_prediction_duration(elapsed);
        self.logger
            .log_predictions_written(candidates.len(), predictions.len(), elapsed);

        Ok(PredictionReport {
            candidates: candidates.len(),
            predictions,
        })
    }
}
