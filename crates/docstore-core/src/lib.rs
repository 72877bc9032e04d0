//! docstore core library
//!
//! A thin adapter exposing create/read/update/delete over an embedded
//! document database, with validation and sanitization hooks supplied by the
//! model layer.
//!
//! # Architecture
//!
//! - **Adapter**: validates before writes, sanitizes after reads, forwards
//!   everything else untouched
//! - **Backend**: an embedded SQLite database holding one JSON document per
//!   row; all matching and persistence happens there
//!
//! # Quick Start
//!
//! ```text
//! let adapter = DocumentStoreAdapter::open(&DatastoreConfig::in_memory(), validate, Passthrough)?;
//!
//! let user = adapter.create(body, Some(&Version::from(1)))?;
//! let id = record_id(&user).unwrap();
//!
//! adapter.update(&id_query(id), changes, None)?;
//! let users = adapter.read(&id_query(id), None)?;
//! adapter.delete(&id_query(id))?;
//! ```
//!
//! # Modules
//!
//! - `adapter`: the adapter contract and its standard implementation
//! - `hooks`: validator and sanitizer traits
//! - `extend`: adding operations to adapters
//! - `nonblocking`: async facade
//! - `storage`: backend trait and the SQLite backend
//! - `models`: records, queries, version discriminators
//! - `config`: backend configuration

pub mod adapter;
pub mod config;
pub mod extend;
pub mod hooks;
pub mod models;
pub mod nonblocking;
pub mod storage;

pub use adapter::{AdapterError, AdapterResult, DocumentAdapter, DocumentStoreAdapter};
pub use config::DatastoreConfig;
pub use extend::AdapterExt;
pub use hooks::{AcceptAll, Passthrough, Sanitizer, Validator};
pub use models::{id_query, record_id, Query, Record, Version, ID_FIELD};
pub use nonblocking::AsyncAdapter;
pub use storage::{Datastore, FieldIndex, SqliteDatastore, StorageError, StorageResult};
