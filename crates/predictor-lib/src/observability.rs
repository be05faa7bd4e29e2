//! Observability infrastructure for training and prediction runs
//!
//! Provides:
//! - Prometheus metrics (rows loaded, predictions written, run durations, holdout R²)
//! - Structured logging of run events with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, Encoder, Gauge, Histogram,
    IntCounter, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for run durations (in seconds)
const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RunMetricsInner> = OnceLock::new();

struct RunMetricsInner {
    rows_loaded: IntCounter,
    predictions_written: IntCounter,
    training_duration_seconds: Histogram,
    prediction_duration_seconds: Histogram,
    holdout_r2: Gauge,
}

impl RunMetricsInner {
    fn new() -> Self {
        Self {
            rows_loaded: register_int_counter!(
                "sales_predictor_rows_loaded_total",
                "Rows read from the database"
            )
            .expect("Failed to register rows_loaded"),

            predictions_written: register_int_counter!(
                "sales_predictor_predictions_written_total",
                "Predictions inserted into the Predictions table"
            )
            .expect("Failed to register predictions_written"),

            training_duration_seconds: register_histogram!(
                "sales_predictor_training_duration_seconds",
                "Wall time of a training run",
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            prediction_duration_seconds: register_histogram!(
                "sales_predictor_prediction_duration_seconds",
                "Wall time of a prediction run",
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_duration_seconds"),

            holdout_r2: register_gauge!(
                "sales_predictor_holdout_r2",
                "R² of the last training run on its holdout split"
            )
            .expect("Failed to register holdout_r2"),
        }
    }
}

/// Run metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics; clones share them.
#[derive(Clone)]
pub struct RunMetrics {
    _private: (),
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RunMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RunMetricsInner {
        GLOBAL_METRICS.get_or_init(RunMetricsInner::new)
    }

    pub fn add_rows_loaded(&self, rows: usize) {
        self.inner().rows_loaded.inc_by(rows as u64);
    }

    pub fn add_predictions_written(&self, count: usize) {
        self.inner().predictions_written.inc_by(count as u64);
    }

    pub fn observe_training_duration(&self, secs: f64) {
        self.inner().training_duration_seconds.observe(secs);
    }

    pub fn observe_prediction_duration(&self, secs: f64) {
        self.inner().prediction_duration_seconds.observe(secs);
    }

    pub fn set_holdout_r2(&self, r2: f64) {
        self.inner().holdout_r2.set(r2);
    }

    pub fn rows_loaded(&self) -> u64 {
        self.inner().rows_loaded.get()
    }

    pub fn predictions_written(&self) -> u64 {
        self.inner().predictions_written.get()
    }

    /// Prometheus text exposition of every registered metric
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for run events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Log a finished training run
    pub fn log_training_completed(
        &self,
        rows: usize,
        features: usize,
        holdout_r2: Option<f64>,
        holdout_mae: Option<f64>,
        model_path: &str,
        duration_secs: f64,
    ) {
        info!(
            event = "training_completed",
            component = %self.component,
            rows = rows,
            features = features,
            holdout_r2 = ?holdout_r2,
            holdout_mae = ?holdout_mae,
            model_path = %model_path,
            duration_secs = duration_secs,
            "Model training completed"
        );
    }

    /// Log predictions written to the database
    pub fn log_predictions_written(&self, candidates: usize, written: usize, duration_secs: f64) {
        if candidates == 0 {
            warn!(
                event = "predictions_written",
                component = %self.component,
                candidates = candidates,
                written = written,
                "No inactive customers to score"
            );
        } else {
            info!(
                event = "predictions_written",
                component = %self.component,
                candidates = candidates,
                written = written,
                duration_secs = duration_secs,
                "Predictions written"
            );
        }
    }
}
