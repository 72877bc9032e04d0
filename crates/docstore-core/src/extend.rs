//! Extending adapters
//!
//! New named operations are added at compile time, in one of two ways:
//!
//! - **Extension traits**: a trait with default methods, implemented for every
//!   [`DocumentAdapter`]. The methods run with the adapter as `self` and can
//!   reach its store handle through [`DocumentAdapter::datastore`].
//!   [`AdapterExt`] is the one this crate ships.
//! - **Wrapping types**: a struct embedding a base adapter that implements
//!   [`DocumentAdapter`] by delegating the accessors. It can add inherent
//!   methods and override any built-in operation, since every operation is a
//!   provided trait method.
//!
//! ```ignore
//! trait SayFoo: DocumentAdapter {
//!     fn say_foo(&self) -> &'static str {
//!         "foo"
//!     }
//! }
//!
//! impl<A: DocumentAdapter> SayFoo for A {}
//! ```

use crate::adapter::{AdapterResult, BackendError, DocumentAdapter};
use crate::models::{id_query, Query, Record, Version};
use crate::storage::Datastore;

/// Convenience operations available on every adapter
pub trait AdapterExt: DocumentAdapter {
    /// First sanitized match, if any
    fn read_one(
        &self,
        query: &Query,
        version: Option<&Version>,
    ) -> Result<Option<Record>, BackendError<Self>> {
        Ok(self.read(query, version)?.into_iter().next())
    }

    /// Sanitized record with the given `_id`
    fn read_by_id(
        &self,
        id: &str,
        version: Option<&Version>,
    ) -> Result<Option<Record>, BackendError<Self>> {
        self.read_one(&id_query(id), version)
    }

    /// Number of records matching `query`, counted by the backend
    fn count(&self, query: &Query) -> Result<usize, BackendError<Self>> {
        self.datastore().count(query)
    }

    /// Validate and apply `body` to the record with the given `_id`
    ///
    /// Returns whether a record was updated.
    fn update_by_id(
        &self,
        id: &str,
        body: Record,
        version: Option<&Version>,
    ) -> AdapterResult<bool, Self> {
        Ok(self.update(&id_query(id), body, version)? > 0)
    }

    /// Delete the record with the given `_id`
    ///
    /// Returns whether a record was deleted.
    fn delete_by_id(&self, id: &str) -> Result<bool, BackendError<Self>> {
        Ok(self.delete(&id_query(id))? > 0)
    }
}

impl<A: DocumentAdapter + ?Sized> AdapterExt for A {}
