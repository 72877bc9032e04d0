//! Backend store contract
//!
//! Everything the adapter needs from an embedded document database. The
//! adapter never looks inside queries or records; matching, persistence and
//! identifier generation are the backend's business.

use crate::models::{Query, Record};

/// An embedded document database
///
/// # Implementors
///
/// - [`super::SqliteDatastore`] - SQLite-backed, file or in-memory
pub trait Datastore {
    /// Whatever the backend raises; surfaced to callers unchanged
    type Error: std::error::Error + 'static;

    /// Insert one record, assigning `_id` when absent
    ///
    /// Returns the stored record including its identifier.
    fn insert(&self, record: Record) -> Result<Record, Self::Error>;

    /// All records matching `query`, in insertion order
    fn find(&self, query: &Query) -> Result<Vec<Record>, Self::Error>;

    /// Number of records matching `query`
    fn count(&self, query: &Query) -> Result<usize, Self::Error>;

    /// Set `fields` on matching records
    ///
    /// With `multi` false only the first match (in insertion order) is touched.
    /// Returns the number of records updated.
    fn update(&self, query: &Query, fields: &Record, multi: bool) -> Result<usize, Self::Error>;

    /// Remove matching records
    ///
    /// With `multi` false only the first match is removed.
    /// Returns the number of records removed.
    fn remove(&self, query: &Query, multi: bool) -> Result<usize, Self::Error>;

    /// Release backend resources, reporting any failure to do so
    fn close(self) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        Ok(())
    }
}
