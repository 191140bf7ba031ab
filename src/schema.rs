//! Schema model, table reference extraction, and name suggestions.

mod extract;
mod fuzzy;
mod model;
mod refresh;

pub use extract::{extract_table_references, extract_tables, TableReferences};
pub use fuzzy::{similarity, FuzzyMatcher, Suggestion};
pub use model::{new_shared_schema, SchemaHandle, SchemaModel, SchemaSnapshot, SharedSchema};
pub use refresh::{reload_schema, spawn_schema_refresher, start_schema_refresh};
