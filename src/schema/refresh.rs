//! Periodic schema snapshot reload from a JSON file.
//!
//! The refresher stands in for the schema-discovery side: it builds a
//! complete snapshot off to the side and only then swaps it into the
//! handle. A failed reload keeps the previous snapshot.

use crate::error::GuardError;
use crate::schema::model::{SchemaSnapshot, SharedSchema};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reload the snapshot file once and publish it.
///
/// Returns the number of tables in the new snapshot.
pub async fn reload_schema(schema: &SharedSchema, path: &Path) -> Result<usize, GuardError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| GuardError::io(path.display().to_string(), e))?;
    let snapshot = SchemaSnapshot::from_json(&text)?;
    let count = snapshot.table_count();
    schema.replace(snapshot);
    Ok(count)
}

/// Spawn a task that reloads the snapshot file every `interval`.
///
/// The first reload happens immediately.
pub fn spawn_schema_refresher(
    schema: SharedSchema,
    path: PathBuf,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match reload_schema(&schema, &path).await {
                Ok(count) => debug!("Schema snapshot reloaded: {} tables", count),
                Err(e) => warn!(
                    "Schema reload from {} failed, keeping previous snapshot: {}",
                    path.display(),
                    e
                ),
            }
        }
    })
}

/// Load the initial snapshot and, if `interval` is non-zero, keep it fresh.
pub async fn start_schema_refresh(
    schema: SharedSchema,
    path: PathBuf,
    interval: Duration,
) -> Result<Option<JoinHandle<()>>, GuardError> {
    let count = reload_schema(&schema, &path).await?;
    info!("Loaded schema snapshot from {} ({} tables)", path.display(), count);

    if interval.is_zero() {
        return Ok(None);
    }
    Ok(Some(spawn_schema_refresher(schema, path, interval)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::new_shared_schema;

    fn temp_schema_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sql-guard-schema-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_reload_publishes_snapshot() {
        let path = temp_schema_file(r#"{ "tables": { "orders": ["id"], "customers": [] } }"#);
        let schema = new_shared_schema();

        let count = reload_schema(&schema, &path).await.unwrap();
        assert_eq!(count, 2);
        assert!(schema.current().unwrap().contains_table("orders"));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous() {
        let schema = new_shared_schema();
        schema.replace(SchemaSnapshot::from_table_names(vec!["orders"]).unwrap());

        let path = temp_schema_file("{ broken");
        assert!(reload_schema(&schema, &path).await.is_err());
        assert!(schema.current().unwrap().contains_table("orders"));

        let missing = std::env::temp_dir().join("sql-guard-missing-schema.json");
        let err = reload_schema(&schema, &missing).await.unwrap_err();
        assert!(matches!(err, GuardError::Io { .. }));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_refresher_picks_up_changes() {
        let path = temp_schema_file(r#"{ "tables": ["orders"] }"#);
        let schema = new_shared_schema();

        let task = start_schema_refresh(schema.clone(), path.clone(), Duration::from_millis(20))
            .await
            .unwrap()
            .expect("refresher task");
        assert!(schema.current().unwrap().contains_table("orders"));

        std::fs::write(&path, r#"{ "tables": ["invoices"] }"#).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(schema.current().unwrap().contains_table("invoices"));

        task.abort();
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_zero_interval_loads_once() {
        let path = temp_schema_file(r#"{ "tables": ["orders"] }"#);
        let schema = new_shared_schema();

        let task = start_schema_refresh(schema.clone(), path.clone(), Duration::ZERO)
            .await
            .unwrap();
        assert!(task.is_none());
        assert!(schema.current().is_some());

        std::fs::remove_file(path).ok();
    }
}
