//! Train and predict against an in-memory SQLite database

use chrono::{Duration, NaiveDateTime};
use predictor_lib::{AppConfig, PredictionService, PredictorError, SalesStore, SqlStore};
use sqlx::Executor;
use tempfile::tempdir;

const SCHEMA: &str = r#"
CREATE TABLE TrainingData (
    CustomerID INTEGER NOT NULL,
    ProductID INTEGER NOT NULL,
    BranchCode TEXT NOT NULL,
    CustomerValue TEXT NOT NULL,
    Utilization REAL NOT NULL,
    Quantity REAL NOT NULL,
    PricePerUnit REAL NOT NULL,
    PurchaseDate TEXT NOT NULL
);
CREATE TABLE Transactions (
    CustomerID INTEGER NOT NULL,
    ProductID INTEGER NOT NULL,
    BranchCode TEXT,
    CustomerValue TEXT,
    Quantity REAL NOT NULL,
    PricePerUnit REAL NOT NULL,
    PurchaseDate TEXT NOT NULL
);
CREATE TABLE Predictions (
    CustomerID INTEGER NOT NULL,
    ProductID INTEGER NOT NULL,
    PredictionScore REAL NOT NULL,
    NextPurchaseDate TEXT NOT NULL
);
"#;

const VALUES: [&str; 3] = ["bronze", "silver", "gold"];

fn now() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-09-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

async fn setup() -> SqlStore {
    let store = SqlStore::connect("sqlite::memory:").await.unwrap();
    store.pool().execute(SCHEMA).await.unwrap();
    store
}

async fn seed_training(store: &SqlStore, rows: i64) {
    for i in 0..rows {
        let date = now() - Duration::days(10 + i % 90);
        sqlx::query("INSERT INTO TrainingData VALUES (?, ?, ?, ?, ?, ?, ?, ?)")
            .bind(i % 25)
            .bind(1 + i % 6)
            .bind(format!("BR{}", i % 3))
            .bind(VALUES[(i % 3) as usize])
            .bind(((i * 37) % 100) as f64 / 100.0)
            .bind((1 + i % 9) as f64)
            .bind(2.5 + (i % 5) as f64)
            .bind(date.format("%Y-%m-%d").to_string())
            .execute(store.pool())
            .await
            .unwrap();
    }
}

async fn add_transaction(store: &SqlStore, customer: i64, branch: &str, days_ago: i64) {
    let date = now() - Duration::days(days_ago);
    sqlx::query("INSERT INTO Transactions VALUES (?, ?, ?, ?, ?, ?, ?)")
        .bind(customer)
        .bind(100 + customer)
        .bind(branch)
        .bind(VALUES[(customer % 3) as usize])
        .bind(2.0)
        .bind(4.0)
        .bind(date.format("%Y-%m-%d %H:%M:%S").to_string())
        .execute(store.pool())
        .await
        .unwrap();
}

fn config(dir: &std::path::Path) -> AppConfig {
    AppConfig {
        db_connection_string: "sqlite::memory:".to_string(),
        model_path: dir.join("models").join("sales_prediction_model.json"),
        n_trees: 20,
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn test_train_then_predict_unseen_branches() {
    let dir = tempdir().unwrap();
    let store = setup().await;
    seed_training(&store, 100).await;

    // Disjoint branch codes, every customer inactive for 31+ days
    for customer in 1..=10 {
        let branch = if customer % 2 == 0 { "NEW-A" } else { "NEW-B" };
        add_transaction(&store, customer, branch, 90).await;
        add_transaction(&store, customer, branch, 31 + customer).await;
    }

    let service = PredictionService::new(config(dir.path()), store);

    let training = service.train(now()).await.unwrap();
    assert_eq!(training.rows, 100);
    assert!(training.model_path.exists());
    assert!(training.holdout.is_some());

    let report = service.predict(now()).await.unwrap();
    assert_eq!(report.candidates, 10);
    assert_eq!(report.predictions.len(), 10);
    for p in &report.predictions {
        assert_eq!(p.product_id, 100 + p.customer_id);
        assert!(p.prediction_score.is_finite());
        assert!((0.0..=1.0).contains(&p.prediction_score));
        assert_eq!(p.next_purchase_date.len(), 10);
    }

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Predictions")
        .fetch_one(service.store().pool())
        .await
        .unwrap();
    assert_eq!(stored, 10);
}

#[tokio::test]
async fn test_recent_customers_are_not_scored() {
    let dir = tempdir().unwrap();
    let store = setup().await;
    seed_training(&store, 40).await;

    add_transaction(&store, 1, "BR0", 45).await;
    // exactly at the threshold: not strictly older than 30 days
    add_transaction(&store, 2, "BR1", 30).await;
    add_transaction(&store, 3, "BR2", 5).await;

    let service = PredictionService::new(config(dir.path()), store);
    service.train(now()).await.unwrap();

    let report = service.predict(now()).await.unwrap();
    let ids: Vec<i64> = report.predictions.iter().map(|p| p.customer_id).collect();
    assert_eq!(ids, vec![1]);
}

#[tokio::test]
async fn test_candidates_exclude_threshold_day() {
    let store = setup().await;
    add_transaction(&store, 7, "BR0", 31).await;
    add_transaction(&store, 8, "BR0", 30).await;

    let candidates = store.customers_for_prediction(now(), 30).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].customer_id, 7);
}

#[tokio::test]
async fn test_predict_before_train_fails() {
    let dir = tempdir().unwrap();
    let store = setup().await;
    add_transaction(&store, 1, "BR0", 60).await;

    let service = PredictionService::new(config(dir.path()), store);
    let result = service.predict(now()).await;
    assert!(matches!(result, Err(PredictorError::Artifact(_))));

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Predictions")
        .fetch_one(service.store().pool())
        .await
        .unwrap();
    assert_eq!(stored, 0);
}
