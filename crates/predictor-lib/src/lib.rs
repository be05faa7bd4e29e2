//! Sales prediction library
//!
//! This crate provides the core functionality for:
//! - Loading purchase history and customer aggregates from SQL
//! - Feature preprocessing (recency, scaling, one-hot encoding)
//! - Random forest training, persistence and scoring
//! - Train/predict orchestration with logging and metrics

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod preprocess;
pub mod service;
pub mod store;
pub mod table;

pub use config::AppConfig;
pub use error::{ArtifactError, ModelError, PredictorError, PreprocessError, Result};
pub use models::*;
pub use observability::{RunMetrics, StructuredLogger};
pub use predictor::{ForestConfig, SalesPredictionModel};
pub use preprocess::{Mode, Preprocessor};
pub use service::{PredictionReport, PredictionService, TrainingReport};
pub use store::{SalesStore, SqlStore};
pub use table::RecordSet;
