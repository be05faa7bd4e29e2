//! Ordered transform stages of the preprocessing pipeline
//!
//! Each stage owns a fixed list of input columns, learns its parameters in
//! `fit` and emits a block of feature columns in `apply`. Stage state is
//! serialized with the model so inference reuses it unchanged.

use crate::error::PreprocessError;
use crate::table::RecordSet;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Below this standard deviation a column is treated as constant
const MIN_STD: f64 = 1e-12;

/// Fit/apply contract shared by all pipeline stages
pub trait Transform {
    /// Stable stage name used in logs and feature names
    fn name(&self) -> &'static str;

    /// Learn stage parameters from training input
    fn fit(&mut self, frame: &RecordSet) -> Result<(), PreprocessError>;

    /// Transform input with the learned parameters
    fn apply(&self, frame: &RecordSet) -> Result<Array2<f64>, PreprocessError>;

    /// Number of output columns
    fn width(&self) -> usize;

    /// Names of the output columns, in order
    fn output_names(&self) -> Vec<String>;
}

/// Standardizes numeric columns to zero mean and unit variance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            means: Vec::new(),
            scales: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    fn is_fitted(&self) -> bool {
        self.means.len() == self.columns.len() && self.scales.len() == self.columns.len()
    }
}

impl Transform for StandardScaler {
    fn name(&self) -> &'static str {
        "scaler"
    }

    fn fit(&mut self, frame: &RecordSet) -> Result<(), PreprocessError> {
        if frame.is_empty() {
            return Err(PreprocessError::EmptyInput);
        }

        let mut means = Vec::with_capacity(self.columns.len());
        let mut scales = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let values = frame.required_numbers(column)?;
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();

            means.push(mean);
            scales.push(if std < MIN_STD { 1.0 } else { std });
        }

        self.means = means;
        self.scales = scales;
        Ok(())
    }

    fn apply(&self, frame: &RecordSet) -> Result<Array2<f64>, PreprocessError> {
        if !self.is_fitted() {
            return Err(PreprocessError::NotFitted);
        }

        let mut out = Array2::zeros((frame.len(), self.columns.len()));
        for (j, column) in self.columns.iter().enumerate() {
            let values = frame.required_numbers(column)?;
            for (i, value) in values.into_iter().enumerate() {
                out[[i, j]] = (value - self.means[j]) / self.scales[j];
            }
        }
        Ok(out)
    }

    fn width(&self) -> usize {
        self.columns.len()
    }

    fn output_names(&self) -> Vec<String> {
        self.columns.clone()
    }
}

/// One-hot encodes text columns; unseen categories encode as all zeros
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    /// Sorted categories per column, learned at fit time
    categories: Vec<Vec<String>>,
}

impl OneHotEncoder {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            categories: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    fn is_fitted(&self) -> bool {
        self.categories.len() == self.columns.len()
    }

    fn required_texts<'a>(
        frame: &'a RecordSet,
        column: &str,
    ) -> Result<Vec<&'a str>, PreprocessError> {
        frame
            .text(column)?
            .iter()
            .enumerate()
            .map(|(row, value)| {
                value.as_deref().ok_or_else(|| PreprocessError::MissingValue {
                    column: column.to_string(),
                    row,
                })
            })
            .collect()
    }
}

impl Transform for OneHotEncoder {
    fn name(&self) -> &'static str {
        "encoder"
    }

    fn fit(&mut self, frame: &RecordSet) -> Result<(), PreprocessError> {
        if frame.is_empty() {
            return Err(PreprocessError::EmptyInput);
        }

        let mut categories = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let seen: BTreeSet<&str> = Self::required_texts(frame, column)?.into_iter().collect();
            categories.push(seen.into_iter().map(str::to_string).collect());
        }

        self.categories = categories;
        Ok(())
    }

    fn apply(&self, frame: &RecordSet) -> Result<Array2<f64>, PreprocessError> {
        if !self.is_fitted() {
            return Err(PreprocessError::NotFitted);
        }

        let mut out = Array2::zeros((frame.len(), self.width()));
        let mut offset = 0;
        for (column, categories) in self.columns.iter().zip(&self.categories) {
            let values = Self::required_texts(frame, column)?;
            for (i, value) in values.into_iter().enumerate() {
                // ignore-unknown: leave the whole block at zero
                if let Ok(k) = categories.binary_search_by(|c| c.as_str().cmp(value)) {
                    out[[i, offset + k]] = 1.0;
                }
            }
            offset += categories.len();
        }
        Ok(out)
    }

    fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    fn output_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(column, categories)| {
                categories.iter().map(move |c| format!("{column}={c}"))
            })
            .collect()
    }
}

/// A pipeline stage; the enum keeps the pipeline serializable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    Scale(StandardScaler),
    Encode(OneHotEncoder),
}

impl Stage {
    pub fn transform(&self) -> &dyn Transform {
        match self {
            Stage::Scale(s) => s,
            Stage::Encode(e) => e,
        }
    }

    pub fn transform_mut(&mut self) -> &mut dyn Transform {
        match self {
            Stage::Scale(s) => s,
            Stage::Encode(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_frame(values: &[f64]) -> RecordSet {
        RecordSet::new(values.len()).with_number("x", values.iter().copied().map(Some).collect())
    }

    fn text_frame(values: &[&str]) -> RecordSet {
        RecordSet::new(values.len())
            .with_text("c", values.iter().map(|v| Some(v.to_string())).collect())
    }

    #[test]
    fn test_scaler_zero_mean_unit_variance() {
        let frame = numeric_frame(&[1.0, 2.0, 3.0, 4.0]);
        let mut scaler = StandardScaler::new(vec!["x".to_string()]);
        scaler.fit(&frame).unwrap();

        let out = scaler.apply(&frame).unwrap();
        let mean = out.column(0).sum() / 4.0;
        let var = out.column(0).iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scaler_constant_column_uses_unit_scale() {
        let frame = numeric_frame(&[5.0, 5.0, 5.0]);
        let mut scaler = StandardScaler::new(vec!["x".to_string()]);
        scaler.fit(&frame).unwrap();

        assert_eq!(scaler.scales(), &[1.0]);
        assert!(scaler.apply(&frame).unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_scaler_reuses_training_statistics() {
        let mut scaler = StandardScaler::new(vec!["x".to_string()]);
        scaler.fit(&numeric_frame(&[0.0, 2.0])).unwrap();

        let out = scaler.apply(&numeric_frame(&[4.0])).unwrap();
        assert_eq!(out[[0, 0]], 3.0);
    }

    #[test]
    fn test_unfitted_stages_refuse_to_apply() {
        let scaler = StandardScaler::new(vec!["x".to_string()]);
        assert_eq!(
            scaler.apply(&numeric_frame(&[1.0])),
            Err(PreprocessError::NotFitted)
        );

        let encoder = OneHotEncoder::new(vec!["c".to_string()]);
        assert_eq!(
            encoder.apply(&text_frame(&["a"])),
            Err(PreprocessError::NotFitted)
        );
    }

    #[test]
    fn test_encoder_sorted_categories() {
        let mut encoder = OneHotEncoder::new(vec!["c".to_string()]);
        encoder.fit(&text_frame(&["b", "a", "b"])).unwrap();

        assert_eq!(encoder.categories(), &[vec!["a".to_string(), "b".to_string()]]);
        assert_eq!(encoder.output_names(), vec!["c=a", "c=b"]);

        let out = encoder.apply(&text_frame(&["a", "b"])).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(out.row(1).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_encoder_ignores_unknown_category() {
        let mut encoder = OneHotEncoder::new(vec!["c".to_string()]);
        encoder.fit(&text_frame(&["a", "b"])).unwrap();

        let out = encoder.apply(&text_frame(&["zzz"])).unwrap();
        assert_eq!(out.shape(), &[1, 2]);
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_encoder_rejects_null_cell() {
        let mut encoder = OneHotEncoder::new(vec!["c".to_string()]);
        encoder.fit(&text_frame(&["a"])).unwrap();

        let frame = RecordSet::new(1).with_text("c", vec![None]);
        assert_eq!(
            encoder.apply(&frame),
            Err(PreprocessError::MissingValue {
                column: "c".to_string(),
                row: 0
            })
        );
    }

    #[test]
    fn test_stage_serde_keeps_state() {
        let mut encoder = OneHotEncoder::new(vec!["c".to_string()]);
        encoder.fit(&text_frame(&["x", "y"])).unwrap();
        let stage = Stage::Encode(encoder);

        let json = serde_json::to_string(&stage).unwrap();
        assert!(json.contains("\"kind\":\"encode\""));
        let back: Stage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stage);
    }

    #[test]
    fn test_stage_names_and_widths() {
        let mut stage = Stage::Scale(StandardScaler::new(vec!["x".to_string()]));
        stage.transform_mut().fit(&numeric_frame(&[1.0, 2.0])).unwrap();
        assert_eq!(stage.transform().name(), "scaler");
        assert_eq!(stage.transform().width(), 1);

        let mut stage = Stage::Encode(OneHotEncoder::new(vec!["c".to_string()]));
        stage.transform_mut().fit(&text_frame(&["a", "b", "a"])).unwrap();
        assert_eq!(stage.transform().name(), "encoder");
        assert_eq!(stage.transform().width(), 2);
    }
}
