//! Application configuration

use crate::predictor::ForestConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Predictor configuration, read from the environment (and `.env`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Database URL
    #[serde(default = "default_db_connection_string")]
    pub db_connection_string: String,

    /// Where the trained model artifact lives
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Trees in the random forest
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Maximum tree depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Seed for bootstrap sampling and the holdout split
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    /// Share of training rows held out for validation (0 disables)
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,

    /// Days without a purchase before a customer is scored
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: i64,
}

fn default_db_connection_string() -> String {
    "sqlite://sales.db".to_string()
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/sales_prediction_model.json")
}

fn default_n_trees() -> usize {
    100
}

fn default_max_depth() -> usize {
    10
}

fn default_random_seed() -> u64 {
    42
}

fn default_validation_fraction() -> f64 {
    0.2
}

fn default_inactivity_days() -> i64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_connection_string: default_db_connection_string(),
            model_path: default_model_path(),
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            random_seed: default_random_seed(),
            validation_fraction: default_validation_fraction(),
            inactivity_days: default_inactivity_days(),
        }
    }
}

/// Upper bound on `INACTIVITY_DAYS`, keeping date arithmetic in range
pub const MAX_INACTIVITY_DAYS: i64 = 36_500;

impl AppConfig {
    /// Load configuration from `.env` and the process environment
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        Self::from_environment(config::Environment::default())
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_vars(vars: config::Map<String, String>) -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default().source(Some(vars)))
    }

    fn from_environment(env: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder().add_source(env).build()?;
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.n_trees == 0 {
            return Err(config::ConfigError::Message("N_TREES must be at least 1".to_string()));
        }
        if self.max_depth == 0 {
            return Err(config::ConfigError::Message("MAX_DEPTH must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(config::ConfigError::Message(format!(
                "VALIDATION_FRACTION must be in [0, 1), got {}",
                self.validation_fraction
            )));
        }
        if !(0..=MAX_INACTIVITY_DAYS).contains(&self.inactivity_days) {
            return Err(config::ConfigError::Message(format!(
                "INACTIVITY_DAYS must be between 0 and {}, got {}",
                MAX_INACTIVITY_DAYS, self.inactivity_days
            )));
        }
        Ok(())
    }

    /// Forest settings derived from this configuration
    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            seed: self.random_seed,
            ..ForestConfig::default()
        }
    }
}
