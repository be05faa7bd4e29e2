//! Column-oriented record set consumed by the preprocessor
//!
//! Both transaction rows and customer summaries are flattened into named
//! columns so feature derivation can ask "is this column present?" the same
//! way for training and inference input.

use crate::error::PreprocessError;
use crate::models::{CustomerSummary, TransactionRecord};
use std::collections::BTreeMap;

/// Column names shared with the storage schema
pub mod columns {
    pub const CUSTOMER_ID: &str = "CustomerID";
    pub const PRODUCT_ID: &str = "ProductID";
    pub const BRANCH_CODE: &str = "BranchCode";
    pub const CUSTOMER_VALUE: &str = "CustomerValue";
    pub const UTILIZATION: &str = "Utilization";
    pub const QUANTITY: &str = "Quantity";
    pub const PRICE_PER_UNIT: &str = "PricePerUnit";
    pub const PURCHASE_DATE: &str = "PurchaseDate";
    pub const DAYS_SINCE_PURCHASE: &str = "DaysSincePurchase";
    pub const AVG_QUANTITY: &str = "AvgQuantity";
    pub const AVG_PRICE: &str = "AvgPrice";
    pub const LAST_PURCHASE: &str = "LastPurchase";
    pub const DAYS_SINCE_LAST_PURCHASE: &str = "DaysSinceLastPurchase";
}

/// A single typed column; `None` marks a null cell
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<Option<String>>),
    Number(Vec<Option<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Text(values) => values.len(),
            Column::Number(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tabular record set with a fixed row count and named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    rows: usize,
    columns: BTreeMap<String, Column>,
}

impl RecordSet {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            columns: BTreeMap::new(),
        }
    }

    /// Add or replace a text column. Every column must have `len()` cells.
    pub fn with_text(mut self, name: &str, values: Vec<Option<String>>) -> Self {
        self.insert(name, Column::Text(values));
        self
    }

    /// Add or replace a numeric column. Every column must have `len()` cells.
    pub fn with_number(mut self, name: &str, values: Vec<Option<f64>>) -> Self {
        self.insert(name, Column::Number(values));
        self
    }

    pub fn insert(&mut self, name: &str, column: Column) {
        debug_assert_eq!(column.len(), self.rows, "column `{name}` has the wrong length");
        self.columns.insert(name.to_string(), column);
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Borrow a text column, failing if it is absent or numeric
    pub fn text(&self, name: &str) -> Result<&[Option<String>], PreprocessError> {
        match self.columns.get(name) {
            Some(Column::Text(values)) => Ok(values),
            Some(Column::Number(_)) => Err(PreprocessError::WrongColumnType {
                column: name.to_string(),
                expected: "text",
            }),
            None => Err(PreprocessError::MissingColumn(name.to_string())),
        }
    }

    /// Borrow a numeric column, failing if it is absent or text
    pub fn number(&self, name: &str) -> Result<&[Option<f64>], PreprocessError> {
        match self.columns.get(name) {
            Some(Column::Number(values)) => Ok(values),
            Some(Column::Text(_)) => Err(PreprocessError::WrongColumnType {
                column: name.to_string(),
                expected: "numeric",
            }),
            None => Err(PreprocessError::MissingColumn(name.to_string())),
        }
    }

    /// Numeric column with every cell present
    pub fn required_numbers(&self, name: &str) -> Result<Vec<f64>, PreprocessError> {
        self.number(name)?
            .iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| PreprocessError::MissingValue {
                    column: name.to_string(),
                    row,
                })
            })
            .collect()
    }
}

impl From<&[TransactionRecord]> for RecordSet {
    fn from(records: &[TransactionRecord]) -> Self {
        use columns::*;

        let numbers = |f: fn(&TransactionRecord) -> f64| -> Vec<Option<f64>> {
            records.iter().map(|r| Some(f(r))).collect()
        };
        let texts = |f: fn(&TransactionRecord) -> &str| -> Vec<Option<String>> {
            records.iter().map(|r| Some(f(r).to_string())).collect()
        };

        RecordSet::new(records.len())
            .with_number(CUSTOMER_ID, numbers(|r| r.customer_id as f64))
            .with_number(PRODUCT_ID, numbers(|r| r.product_id as f64))
            .with_text(BRANCH_CODE, texts(|r| r.branch_code.as_str()))
            .with_text(CUSTOMER_VALUE, texts(|r| r.customer_value.as_str()))
            .with_number(UTILIZATION, numbers(|r| r.utilization))
            .with_number(QUANTITY, numbers(|r| r.quantity))
            .with_number(PRICE_PER_UNIT, numbers(|r| r.price_per_unit))
            .with_text(PURCHASE_DATE, texts(|r| r.purchase_date.as_str()))
    }
}

impl From<&[CustomerSummary]> for RecordSet {
    fn from(summaries: &[CustomerSummary]) -> Self {
        use columns::*;

        RecordSet::new(summaries.len())
            .with_number(
                CUSTOMER_ID,
                summaries.iter().map(|s| Some(s.customer_id as f64)).collect(),
            )
            .with_number(AVG_QUANTITY, summaries.iter().map(|s| s.avg_quantity).collect())
            .with_number(AVG_PRICE, summaries.iter().map(|s| s.avg_price).collect())
            .with_text(
                LAST_PURCHASE,
                summaries.iter().map(|s| s.last_purchase.clone()).collect(),
            )
            .with_text(
                BRANCH_CODE,
                summaries.iter().map(|s| s.branch_code.clone()).collect(),
            )
            .with_text(
                CUSTOMER_VALUE,
                summaries.iter().map(|s| s.customer_value.clone()).collect(),
            )
    }
}
