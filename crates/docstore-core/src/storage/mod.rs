//! Storage layer
//!
//! The backend behind the adapter.
//!
//! ## Architecture
//!
//! - **`Datastore`**: the contract any embedded document database fulfils
//! - **`SqliteDatastore`**: the bundled implementation; one JSON document per
//!   row, matching delegated to SQLite's JSON functions
//!
//! Errors raised here reach callers unchanged.

pub mod datastore;
pub mod error;
mod query;
pub mod schema;
pub mod sqlite;

pub use datastore::Datastore;
pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::{FieldIndex, SqliteDatastore};
