//! Core data models for the sales predictor

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One historical purchase from the `TrainingData` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    #[sqlx(rename = "CustomerID")]
    pub customer_id: i64,
    #[sqlx(rename = "ProductID")]
    pub product_id: i64,
    #[sqlx(rename = "BranchCode")]
    pub branch_code: String,
    #[sqlx(rename = "CustomerValue")]
    pub customer_value: String,
    #[sqlx(rename = "Utilization")]
    pub utilization: f64,
    #[sqlx(rename = "Quantity")]
    pub quantity: f64,
    #[sqlx(rename = "PricePerUnit")]
    pub price_per_unit: f64,
    /// Raw date text as stored; parsed during preprocessing
    #[sqlx(rename = "PurchaseDate")]
    pub purchase_date: String,
}

/// Per-customer aggregate used to select and score prediction candidates
///
/// Context fields come from the customer's most recent transaction and may
/// be absent in the source table; the preprocessor rejects rows missing a
/// field the fitted layout needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CustomerSummary {
    #[sqlx(rename = "CustomerID")]
    pub customer_id: i64,
    #[sqlx(rename = "AvgQuantity")]
    pub avg_quantity: Option<f64>,
    #[sqlx(rename = "AvgPrice")]
    pub avg_price: Option<f64>,
    #[sqlx(rename = "LastPurchase")]
    pub last_purchase: Option<String>,
    #[sqlx(rename = "FirstPurchase")]
    pub first_purchase: Option<String>,
    #[sqlx(rename = "PurchaseCount")]
    pub purchase_count: i64,
    #[sqlx(rename = "BranchCode")]
    pub branch_code: Option<String>,
    #[sqlx(rename = "CustomerValue")]
    pub customer_value: Option<String>,
    #[sqlx(rename = "LastProduct")]
    pub last_product: Option<i64>,
}

/// Prediction row written to the `Predictions` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub customer_id: i64,
    pub product_id: i64,
    pub prediction_score: f64,
    /// `YYYY-MM-DD`
    pub next_purchase_date: String,
}
