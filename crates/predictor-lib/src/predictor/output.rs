//! Prediction output assembly
//!
//! Turns a raw Utilization score and the customer's purchase summary into
//! the stored `Prediction` row.

use crate::models::{CustomerSummary, Prediction};
use crate::preprocess::parse_date;
use chrono::{Duration, NaiveDateTime};

/// Storage format of `NextPurchaseDate`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Product id written when the customer's last product is unknown
const UNKNOWN_PRODUCT: i64 = 0;

/// Assembles `Prediction` rows from model scores
#[derive(Debug, Clone)]
pub struct PredictionFormatter {
    /// Gap used when a customer's purchase cadence is unknown
    fallback_gap_days: i64,
}

impl PredictionFormatter {
    pub fn new(fallback_gap_days: i64) -> Self {
        Self {
            fallback_gap_days: fallback_gap_days.max(1),
        }
    }

    /// Format a raw score for one customer
    pub fn format(&self, summary: &CustomerSummary, score: f64, now: NaiveDateTime) -> Prediction {
        Prediction {
            customer_id: summary.customer_id,
            product_id: summary.last_product.unwrap_or(UNKNOWN_PRODUCT),
            prediction_score: score,
            next_purchase_date: self.next_purchase_date(summary, now).format(DATE_FORMAT).to_string(),
        }
    }

    /// Last purchase plus the average gap between purchases, never earlier
    /// than `now` plus that gap when the projection is already past
    pub fn next_purchase_date(&self, summary: &CustomerSummary, now: NaiveDateTime) -> NaiveDateTime {
        let last = summary.last_purchase.as_deref().and_then(parse_date);
        let gap = Duration::days(self.gap_days(summary, last));

        let projected = last.unwrap_or(now) + gap;
        if projected < now {
            now + gap
        } else {
            projected
        }
    }

    fn gap_days(&self, summary: &CustomerSummary, last: Option<NaiveDateTime>) -> i64 {
        let first = summary.first_purchase.as_deref().and_then(parse_date);

        match (first, last) {
            (Some(first), Some(last)) if summary.purchase_count >= 2 => {
                let span = (last - first).num_days() as f64;
                let gap = (span / (summary.purchase_count - 1) as f64).round() as i64;
                if gap >= 1 {
                    gap
                } else {
                    self.fallback_gap_days
                }
            }
            _ => self.fallback_gap_days,
        }
    }
}
