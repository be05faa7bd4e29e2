//! Sales prediction model

mod artifact;
mod evaluation;
mod forest;
mod model;
mod output;

pub use artifact::{compute_checksum, ModelArtifact, FORMAT_VERSION};
pub use evaluation::{mean_absolute_error, r2_score, train_test_split, Split};
pub use forest::{ForestConfig, RandomForestRegressor};
pub use model::SalesPredictionModel;
pub use output::{PredictionFormatter, DATE_FORMAT};

use crate::error::ModelError;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Trait for regression implementations
pub trait Regressor: Send + Sync {
    /// Fit on a feature matrix and its target vector
    fn fit(&mut self, features: ArrayView2<f64>, target: ArrayView1<f64>) -> Result<(), ModelError>;

    /// One prediction per feature row
    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<f64>, ModelError>;

    /// Feature count seen at fit time, `None` before fitting
    fn n_features(&self) -> Option<usize>;
}
