//! Schema snapshots and the handle that swaps them.
//!
//! A [`SchemaSnapshot`] is immutable once built. The schema-discovery side
//! publishes a new snapshot by replacing the `Arc` held in a
//! [`SchemaHandle`]; a validation in flight keeps the `Arc` it started
//! with, so it never observes a partial refresh.

use crate::error::GuardError;
use crate::security::normalize_table_name;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Read-only view of the database schema consulted by the validator.
pub trait SchemaModel: Send + Sync {
    /// Names of all known tables.
    fn known_tables(&self) -> BTreeSet<String>;

    /// Column names of a table, if the model tracks them.
    fn columns(&self, _table: &str) -> Option<BTreeSet<String>> {
        None
    }
}

/// Point-in-time set of tables and their columns.
///
/// Table names are stored normalized (lower-case, no schema qualifier, no
/// quotes); columns are stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, BTreeSet<String>>,
    captured_at: DateTime<Utc>,
}

/// On-disk snapshot layout. `tables` is either a map of table name to
/// column list or a plain list of table names.
#[derive(Debug, Deserialize)]
struct SnapshotFile {
    tables: TablesField,
    #[serde(default)]
    captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TablesField {
    WithColumns(BTreeMap<String, Vec<String>>),
    Names(Vec<String>),
}

impl SchemaSnapshot {
    /// Build a snapshot from (table, columns) pairs.
    ///
    /// Tables whose names collide after normalization have their columns
    /// merged.
    pub fn new<T, C, S>(tables: T) -> Result<Self, GuardError>
    where
        T: IntoIterator<Item = (S, C)>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (table, columns) in tables {
            let name = normalize_table_name(table.as_ref());
            if name.is_empty() {
                return Err(GuardError::schema(format!(
                    "Table name '{}' is empty after normalization",
                    table.as_ref()
                )));
            }
            normalized
                .entry(name)
                .or_default()
                .extend(columns.into_iter().map(|c| c.as_ref().to_lowercase()));
        }

        Ok(Self {
            tables: normalized,
            captured_at: Utc::now(),
        })
    }

    /// Build a snapshot from table names only.
    pub fn from_table_names<I, S>(names: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(names.into_iter().map(|n| (n, Vec::<S>::new())))
    }

    /// An empty snapshot. The schema check treats it like a missing schema.
    pub fn empty() -> Self {
        Self {
            tables: BTreeMap::new(),
            captured_at: Utc::now(),
        }
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json(json: &str) -> Result<Self, GuardError> {
        let file: SnapshotFile =
            serde_json::from_str(json).map_err(|e| GuardError::json("schema snapshot", e))?;

        let mut snapshot = match file.tables {
            TablesField::WithColumns(map) => Self::new(map)?,
            TablesField::Names(names) => Self::from_table_names(names)?,
        };
        if let Some(captured_at) = file.captured_at {
            snapshot.captured_at = captured_at;
        }
        Ok(snapshot)
    }

    /// Load a snapshot from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GuardError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GuardError::io(path.display().to_string(), e))?;
        Self::from_json(&text)
    }

    /// Check whether a table exists. The name is normalized first.
    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(&normalize_table_name(table))
    }

    /// Number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Whether the snapshot has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// When the snapshot was taken.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl SchemaModel for SchemaSnapshot {
    fn known_tables(&self) -> BTreeSet<String> {
        self.tables.keys().cloned().collect()
    }

    fn columns(&self, table: &str) -> Option<BTreeSet<String>> {
        self.tables.get(&normalize_table_name(table)).cloned()
    }
}

/// Slot holding the current schema snapshot, if any.
#[derive(Debug, Default)]
pub struct SchemaHandle {
    current: RwLock<Option<Arc<SchemaSnapshot>>>,
}

/// Shared schema handle type.
pub type SharedSchema = Arc<SchemaHandle>;

/// Create a new shared schema handle with no snapshot.
pub fn new_shared_schema() -> SharedSchema {
    Arc::new(SchemaHandle::default())
}

impl SchemaHandle {
    /// The snapshot to use for one validation.
    pub fn current(&self) -> Option<Arc<SchemaSnapshot>> {
        self.current.read().clone()
    }

    /// Publish a new snapshot, returning the previous one.
    pub fn replace(&self, snapshot: SchemaSnapshot) -> Option<Arc<SchemaSnapshot>> {
        self.current.write().replace(Arc::new(snapshot))
    }

    /// Drop the current snapshot; schema checks are skipped until a new one
    /// is published.
    pub fn clear(&self) -> Option<Arc<SchemaSnapshot>> {
        self.current.write().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_normalizes_names() {
        let snapshot = SchemaSnapshot::new(vec![
            ("public.Orders", vec!["ID", "Customer_Id"]),
            ("\"Customers\"", vec!["id"]),
        ])
        .unwrap();

        assert_eq!(
            snapshot.known_tables(),
            BTreeSet::from(["customers".to_string(), "orders".to_string()])
        );
        assert!(snapshot.contains_table("ORDERS"));
        assert!(snapshot.contains_table("sales.orders"));
        assert_eq!(
            snapshot.columns("orders"),
            Some(BTreeSet::from(["customer_id".to_string(), "id".to_string()]))
        );
    }

    #[test]
    fn test_colliding_names_merge_columns() {
        let snapshot = SchemaSnapshot::new(vec![
            ("sales.orders", vec!["id"]),
            ("archive.orders", vec!["archived_at"]),
        ])
        .unwrap();
        assert_eq!(snapshot.table_count(), 1);
        assert_eq!(snapshot.columns("orders").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = SchemaSnapshot::from_table_names(vec!["public."]).unwrap_err();
        assert!(matches!(err, GuardError::Schema(_)));
    }

    #[test]
    fn test_from_json_with_columns() {
        let snapshot = SchemaSnapshot::from_json(
            r#"{
                "tables": { "orders": ["id", "total"], "customers": ["id", "name"] },
                "captured_at": "2026-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(snapshot.table_count(), 2);
        assert_eq!(snapshot.captured_at().to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_from_json_names_only() {
        let snapshot = SchemaSnapshot::from_json(r#"{ "tables": ["orders", "customers"] }"#)
            .unwrap();
        assert!(snapshot.contains_table("customers"));
        assert_eq!(snapshot.columns("customers"), Some(BTreeSet::new()));
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(SchemaSnapshot::from_json(r#"{ "tables": 7 }"#).is_err());
        assert!(SchemaSnapshot::from_json("nope").is_err());
    }

    #[test]
    fn test_handle_swap() {
        let handle = SchemaHandle::default();
        assert!(handle.current().is_none());

        let first = SchemaSnapshot::from_table_names(vec!["orders"]).unwrap();
        assert!(handle.replace(first).is_none());

        let held = handle.current().unwrap();
        let second = SchemaSnapshot::from_table_names(vec!["customers"]).unwrap();
        let previous = handle.replace(second).unwrap();

        // A snapshot taken before the swap is unaffected by it
        assert!(held.contains_table("orders"));
        assert!(Arc::ptr_eq(&held, &previous));
        assert!(handle.current().unwrap().contains_table("customers"));

        assert!(handle.clear().is_some());
        assert!(handle.current().is_none());
    }
}
