//! Feature preprocessing
//!
//! Turns a [`RecordSet`] into a numeric feature matrix: derives recency
//! features from dates, standardizes numeric columns and one-hot encodes
//! categorical columns. Training fits and freezes the stage state; inference
//! only applies it, so the column layout never drifts between the two.

mod dates;
mod stages;

pub use dates::{parse_date, whole_days_since};
pub use stages::{OneHotEncoder, Stage, StandardScaler, Transform};

use crate::error::PreprocessError;
use crate::table::{columns::*, Column, RecordSet};
use chrono::NaiveDateTime;
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Categorical inputs, one-hot encoded
pub const CATEGORICAL_FEATURES: &[&str] = &[BRANCH_CODE, CUSTOMER_VALUE];

/// Numeric inputs always present in the layout
pub const BASE_NUMERIC_FEATURES: &[&str] = &[QUANTITY, PRICE_PER_UNIT];

/// Aggregate inference columns and the training slot each one fills
const AGGREGATE_SUBSTITUTES: &[(&str, &str)] = &[
    (AVG_QUANTITY, QUANTITY),
    (AVG_PRICE, PRICE_PER_UNIT),
    (DAYS_SINCE_LAST_PURCHASE, DAYS_SINCE_PURCHASE),
];

/// Whether a preprocess call may fit stage state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Inference,
}

/// Output of [`Preprocessor::preprocess`]
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub features: Array2<f64>,
    /// Utilization target, only produced in training mode
    pub target: Option<Array1<f64>>,
}

/// Ordered pipeline of transform stages with frozen state after fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    stages: Vec<Stage>,
    fitted: bool,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Width of the produced feature matrix (0 before fitting)
    pub fn n_features(&self) -> usize {
        self.stages.iter().map(|s| s.transform().width()).sum()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.stages
            .iter()
            .flat_map(|s| s.transform().output_names())
            .collect()
    }

    /// Single entry point dispatching on `mode`
    pub fn preprocess(
        &mut self,
        records: &RecordSet,
        mode: Mode,
        now: NaiveDateTime,
    ) -> Result<FeatureSet, PreprocessError> {
        match mode {
            Mode::Training => {
                let (features, target) = self.fit_transform(records, now)?;
                Ok(FeatureSet {
                    features,
                    target: Some(target),
                })
            }
            Mode::Inference => Ok(FeatureSet {
                features: self.transform(records, now)?,
                target: None,
            }),
        }
    }

    /// Fit every stage on `records` and return (features, Utilization target).
    /// Refitting replaces any previous state.
    pub fn fit_transform(
        &mut self,
        records: &RecordSet,
        now: NaiveDateTime,
    ) -> Result<(Array2<f64>, Array1<f64>), PreprocessError> {
        if records.is_empty() {
            return Err(PreprocessError::EmptyInput);
        }

        let target = Array1::from(records.required_numbers(UTILIZATION)?);
        let frame = derive_training_frame(records, now)?;

        let mut numeric: Vec<String> = BASE_NUMERIC_FEATURES.iter().map(|c| c.to_string()).collect();
        if frame.has_column(DAYS_SINCE_PURCHASE) {
            numeric.push(DAYS_SINCE_PURCHASE.to_string());
        }
        let categorical = CATEGORICAL_FEATURES.iter().map(|c| c.to_string()).collect();

        let mut stages = vec![
            Stage::Scale(StandardScaler::new(numeric)),
            Stage::Encode(OneHotEncoder::new(categorical)),
        ];
        for stage in &mut stages {
            let transform = stage.transform_mut();
            transform.fit(&frame)?;
            debug!(stage = transform.name(), width = transform.width(), "Fitted stage");
        }

        self.stages = stages;
        self.fitted = true;

        let features = self.apply_stages(&frame)?;
        debug!(
            rows = features.nrows(),
            features = features.ncols(),
            "Fitted preprocessing pipeline"
        );
        Ok((features, target))
    }

    /// Apply the frozen stages to inference input
    pub fn transform(
        &self,
        records: &RecordSet,
        now: NaiveDateTime,
    ) -> Result<Array2<f64>, PreprocessError> {
        if !self.fitted {
            return Err(PreprocessError::NotFitted);
        }

        let frame = derive_inference_frame(records, now)?;
        if self.uses_column(DAYS_SINCE_PURCHASE) && !frame.has_column(DAYS_SINCE_PURCHASE) {
            return Err(PreprocessError::MissingColumn(PURCHASE_DATE.to_string()));
        }

        self.apply_stages(&frame)
    }

    fn uses_column(&self, name: &str) -> bool {
        self.stages.iter().any(|stage| match stage {
            Stage::Scale(s) => s.columns().iter().any(|c| c == name),
            Stage::Encode(e) => e.columns().iter().any(|c| c == name),
        })
    }

    fn apply_stages(&self, frame: &RecordSet) -> Result<Array2<f64>, PreprocessError> {
        let blocks = self
            .stages
            .iter()
            .map(|stage| stage.transform().apply(frame))
            .collect::<Result<Vec<_>, _>>()?;
        let views: Vec<ArrayView2<f64>> = blocks.iter().map(|b| b.view()).collect();

        Ok(concatenate(Axis(1), &views).unwrap_or_else(|_| Array2::zeros((frame.len(), 0))))
    }
}

/// Training input: raw columns plus DaysSincePurchase when a purchase date
/// is available
fn derive_training_frame(
    records: &RecordSet,
    now: NaiveDateTime,
) -> Result<RecordSet, PreprocessError> {
    let mut frame = records.clone();
    if records.has_column(PURCHASE_DATE) {
        let days = dates::days_since_column(PURCHASE_DATE, records.text(PURCHASE_DATE)?, now)?;
        frame.insert(DAYS_SINCE_PURCHASE, Column::Number(days));
    }
    Ok(frame)
}

/// Inference input: aggregate customer columns, when all are present, fill
/// the slots of the raw per-purchase columns
fn derive_inference_frame(
    records: &RecordSet,
    now: NaiveDateTime,
) -> Result<RecordSet, PreprocessError> {
    let has_aggregates = [AVG_QUANTITY, AVG_PRICE, LAST_PURCHASE]
        .iter()
        .all(|c| records.has_column(c));

    if !has_aggregates {
        return derive_training_frame(records, now);
    }

    let mut frame = records.clone();
    let days = dates::days_since_column(LAST_PURCHASE, records.text(LAST_PURCHASE)?, now)?;
    frame.insert(DAYS_SINCE_LAST_PURCHASE, Column::Number(days));

    for (aggregate, slot) in AGGREGATE_SUBSTITUTES {
        let values = frame.number(aggregate)?.to_vec();
        frame.insert(slot, Column::Number(values));
    }
    Ok(frame)
}
