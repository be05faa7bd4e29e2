//! SQLite-backed sales store

use super::{async_trait, is_prediction_candidate, SalesStore};
use crate::error::{PredictorError, Result};
use crate::models::{CustomerSummary, Prediction, TransactionRecord};
use chrono::{Duration, NaiveDateTime};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

/// Default pool size for file-backed databases
const MAX_CONNECTIONS: u32 = 4;

const TRAINING_QUERY: &str = r#"
SELECT CAST(CustomerID AS INTEGER) AS CustomerID,
       CAST(ProductID AS INTEGER) AS ProductID,
       BranchCode,
       CustomerValue,
       CAST(Utilization AS REAL) AS Utilization,
       CAST(Quantity AS REAL) AS Quantity,
       CAST(PricePerUnit AS REAL) AS PricePerUnit,
       CAST(PurchaseDate AS TEXT) AS PurchaseDate
FROM TrainingData
"#;

// Context columns come from the customer's most recent transaction.
const CANDIDATES_QUERY: &str = r#"
SELECT a.CustomerID AS CustomerID,
       a.AvgQuantity AS AvgQuantity,
       a.AvgPrice AS AvgPrice,
       a.LastPurchase AS LastPurchase,
       a.FirstPurchase AS FirstPurchase,
       a.PurchaseCount AS PurchaseCount,
       t.BranchCode AS BranchCode,
       t.CustomerValue AS CustomerValue,
       CAST(t.ProductID AS INTEGER) AS LastProduct
FROM (
    SELECT CAST(CustomerID AS INTEGER) AS CustomerID,
           CAST(AVG(Quantity) AS REAL) AS AvgQuantity,
           CAST(AVG(PricePerUnit) AS REAL) AS AvgPrice,
           CAST(MAX(PurchaseDate) AS TEXT) AS LastPurchase,
           CAST(MIN(PurchaseDate) AS TEXT) AS FirstPurchase,
           COUNT(*) AS PurchaseCount
    FROM Transactions
    GROUP BY CustomerID
    HAVING MAX(PurchaseDate) < ?
) a
JOIN Transactions t
  ON t.CustomerID = a.CustomerID AND t.PurchaseDate = a.LastPurchase
ORDER BY a.CustomerID, t.ProductID DESC
"#;

const INSERT_PREDICTION: &str = r#"
INSERT INTO Predictions (CustomerID, ProductID, PredictionScore, NextPurchaseDate)
VALUES (?, ?, ?, ?)
"#;

/// Sales store over a pooled SQLite connection
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Connect to `url`. In-memory databases get a single long-lived
    /// connection so every query sees the same data.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<std::time::Duration>)
                .max_lifetime(None::<std::time::Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = options
            .connect(url)
            .await
            .map_err(PredictorError::Connection)?;

        info!(in_memory, "Connected to sales database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SalesStore for SqlStore {
    async fn training_records(&self) -> Result<Vec<TransactionRecord>> {
        let records = sqlx::query_as::<_, TransactionRecord>(TRAINING_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(PredictorError::Query)?;

        debug!(rows = records.len(), "Loaded training records");
        Ok(records)
    }

    async fn customers_for_prediction(
        &self,
        now: NaiveDateTime,
        inactivity_days: i64,
    ) -> Result<Vec<CustomerSummary>> {
        // Loose date-string bound; the exact cutoff is applied below
        let bound = (now - Duration::days(inactivity_days) + Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();

        let mut summaries = sqlx::query_as::<_, CustomerSummary>(CANDIDATES_QUERY)
            .bind(&bound)
            .fetch_all(&self.pool)
            .await
            .map_err(PredictorError::Query)?;

        summaries.dedup_by_key(|s| s.customer_id);
        summaries.retain(|s| is_prediction_candidate(s, now, inactivity_days));

        debug!(
            candidates = summaries.len(),
            inactivity_days,
            "Selected customers for prediction"
        );
        Ok(summaries)
    }

    async fn insert_predictions(&self, predictions: &[Prediction]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(PredictorError::Query)?;

        for prediction in predictions {
            sqlx::query(INSERT_PREDICTION)
                .bind(prediction.customer_id)
                .bind(prediction.product_id)
                .bind(prediction.prediction_score)
                .bind(&prediction.next_purchase_date)
                .execute(&mut *tx)
                .await
                .map_err(PredictorError::Query)?;
        }

        tx.commit().await.map_err(PredictorError::Query)?;
        debug!(rows = predictions.len(), "Inserted predictions");
        Ok(predictions.len())
    }
}
