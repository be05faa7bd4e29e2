//! Data access for training rows, prediction candidates and results

mod sql;

pub use sql::SqlStore;

use crate::error::Result;
use crate::models::{CustomerSummary, Prediction, TransactionRecord};
use crate::preprocess::parse_date;
use chrono::{Duration, NaiveDateTime};

pub use async_trait::async_trait;

/// Trait for sales data storage implementations
#[async_trait]
pub trait SalesStore: Send + Sync {
    /// Every row of the training table
    async fn training_records(&self) -> Result<Vec<TransactionRecord>>;

    /// Per-customer aggregates for customers inactive for more than
    /// `inactivity_days` before `now`
    async fn customers_for_prediction(
        &self,
        now: NaiveDateTime,
        inactivity_days: i64,
    ) -> Result<Vec<CustomerSummary>>;

    /// Insert all predictions in one transaction; returns the row count
    async fn insert_predictions(&self, predictions: &[Prediction]) -> Result<usize>;
}

/// A customer is a candidate when the last purchase lies strictly more than
/// `inactivity_days` before `now`. Unparseable dates are kept so that
/// preprocessing reports them.
pub fn is_prediction_candidate(
    summary: &CustomerSummary,
    now: NaiveDateTime,
    inactivity_days: i64,
) -> bool {
    match summary.last_purchase.as_deref() {
        None => false,
        Some(raw) => match parse_date(raw) {
            Some(last) => now - last > Duration::days(inactivity_days),
            None => true,
        },
    }
}
