//! # SQL Guard
//!
//! A validation gate for machine-generated SQL. Every candidate query must
//! pass before it may be executed against a database.
//!
//! This crate provides:
//! - **Security gates**: length limit, SELECT/WITH-only, dangerous keyword
//!   blocklist, injection pattern scan, single-statement check
//! - **Schema conformance**: referenced tables must exist in the current
//!   schema snapshot, with "did you mean" suggestions for near misses
//! - **Schema refresh**: snapshots reloaded from a JSON file and swapped in
//!   atomically
//!
//! ## Example
//!
//! ```
//! use sql_guard::{validate, SchemaSnapshot};
//!
//! let schema = SchemaSnapshot::from_table_names(["customers", "orders"]).unwrap();
//! let verdict = validate("SELECT * FROM custmers", Some(&schema));
//!
//! assert!(!verdict.is_valid);
//! assert_eq!(verdict.suggestions, vec!["customers"]);
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod schema;
pub mod security;
pub mod service;
pub mod telemetry;

pub use config::GuardConfig;
pub use error::{GuardError, Violation};
pub use schema::{SchemaModel, SchemaSnapshot, SharedSchema};
pub use security::{validate, QueryValidator, ValidationStage, Verdict};
pub use service::GuardService;
