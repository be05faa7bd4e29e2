//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use predictor_lib::{Prediction, PredictionReport, TrainingReport};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for run reports
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Customer")]
    customer_id: i64,
    #[tabled(rename = "Product")]
    product_id: i64,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Next Purchase")]
    next_purchase_date: String,
}

impl From<&Prediction> for PredictionRow {
    fn from(p: &Prediction) -> Self {
        Self {
            customer_id: p.customer_id,
            product_id: p.product_id,
            score: format!("{:.3}", p.prediction_score),
            next_purchase_date: p.next_purchase_date.clone(),
        }
    }
}

#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    name: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to render JSON: {}", e)),
    }
}

/// Print the outcome of a training run
pub fn print_training_report(report: &TrainingReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            print_success(&format!(
                "Model trained on {} rows ({} features) and saved to {}",
                report.rows,
                report.features,
                report.model_path.display()
            ));
            match &report.holdout {
                Some(h) => print_info(&format!(
                    "Holdout ({} rows): R² {:.3}, MAE {:.3}",
                    h.test_rows, h.r2, h.mae
                )),
                None => print_warning("Too few rows for a holdout evaluation"),
            }

            let rows: Vec<FeatureRow> = report
                .top_features
                .iter()
                .map(|(name, importance)| FeatureRow {
                    name: name.clone(),
                    importance: format!("{:.3}", importance),
                })
                .collect();
            if !rows.is_empty() {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
    }
}

/// Print the outcome of a prediction run
pub fn print_prediction_report(report: &PredictionReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            if report.predictions.is_empty() {
                print_warning("No inactive customers to score");
                return;
            }
            print_success(&format!(
                "Wrote {} predictions to the Predictions table",
                report.predictions.len()
            ));
            let rows: Vec<PredictionRow> = report.predictions.iter().map(PredictionRow::from).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_row_rounds_score() {
        let p = Prediction {
            customer_id: 3,
            product_id: 8,
            prediction_score: 0.123456,
            next_purchase_date: "2024-07-01".to_string(),
        };
        let row = PredictionRow::from(&p);
        assert_eq!(row.score, "0.123");
        assert_eq!(row.next_purchase_date, "2024-07-01");

        let table = Table::new(vec![row]).to_string();
        assert!(table.contains("Next Purchase"));
        assert!(table.contains("2024-07-01"));
    }
}
