//! Error types for the sales predictor

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error returned by the orchestration service
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("failed to connect to database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("database query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Failures while turning records into a feature matrix
#[derive(Debug, Error, PartialEq)]
pub enum PreprocessError {
    #[error("required column `{0}` is missing from the input")]
    MissingColumn(String),

    #[error("column `{column}` has no value in row {row}")]
    MissingValue { column: String, row: usize },

    #[error("cannot parse `{value}` in column `{column}` as a date")]
    InvalidDate { column: String, value: String },

    #[error("preprocessor has not been fitted")]
    NotFitted,

    #[error("cannot fit preprocessing on an empty record set")]
    EmptyInput,

    #[error("column `{column}` must be {expected}")]
    WrongColumnType {
        column: String,
        expected: &'static str,
    },
}

/// Failures of the regression model itself
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("model has not been fitted or loaded")]
    NotFitted,

    #[error("model was trained on {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("feature matrix has {rows} rows but target has {targets} values")]
    TargetLengthMismatch { rows: usize, targets: usize },

    #[error("cannot fit on an empty feature matrix")]
    EmptyTrainingSet,
}

/// Failures reading or writing the model artifact
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("model artifact {path:?} has format version {found}, expected {expected}")]
    Incompatible {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

pub type Result<T> = std::result::Result<T, PredictorError>;
