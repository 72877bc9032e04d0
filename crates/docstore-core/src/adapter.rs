//! Document store adapter
//!
//! The [`DocumentAdapter`] trait carries the whole contract: validate before
//! every write, sanitize after every read, forward everything else to the
//! backend untouched. [`DocumentStoreAdapter`] is the plain implementation;
//! wrapping types can implement the trait themselves to add or override
//! operations (see [`crate::extend`]).
//!
//! ## Usage
//!
//! ```ignore
//! let adapter = DocumentStoreAdapter::open(&DatastoreConfig::in_memory(), validate, Passthrough)?;
//!
//! let user = adapter.create(body, Some(&Version::from(1)))?;
//! let found = adapter.read(&id_query(record_id(&user).unwrap()), None)?;
//! ```

use thiserror::Error;
use tracing::debug;

use crate::config::DatastoreConfig;
use crate::hooks::{Sanitizer, Validator};
use crate::models::{record_id, Query, Record, Version};
use crate::storage::{Datastore, SqliteDatastore, StorageResult};

/// Why a write was refused
#[derive(Debug, Error)]
pub enum AdapterError<V, B> {
    /// The validator's payload, unchanged; the backend was not touched
    #[error("Validation failed: {0:?}")]
    Validation(V),

    /// The backend's error, unchanged
    #[error(transparent)]
    Backend(B),
}

impl<V, B> AdapterError<V, B> {
    /// The validation payload, if validation failed
    pub fn validation(&self) -> Option<&V> {
        match self {
            AdapterError::Validation(payload) => Some(payload),
            AdapterError::Backend(_) => None,
        }
    }

    /// The backend error, if the backend failed
    pub fn backend(&self) -> Option<&B> {
        match self {
            AdapterError::Validation(_) => None,
            AdapterError::Backend(err) => Some(err),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AdapterError::Validation(_))
    }
}

/// Error payload produced by an adapter's validator
pub type ValidationError<A> = <<A as DocumentAdapter>::Validator as Validator>::Error;

/// Error raised by an adapter's backend
pub type BackendError<A> = <<A as DocumentAdapter>::Store as Datastore>::Error;

/// Result of a validated write on adapter `A`
pub type AdapterResult<T, A> = Result<T, AdapterError<ValidationError<A>, BackendError<A>>>;

/// CRUD over a document store with model-layer hooks
///
/// Implementors provide the three collaborators; the operations have default
/// implementations that wrappers may override.
pub trait DocumentAdapter {
    type Store: Datastore;
    type Validator: Validator;
    type Sanitizer: Sanitizer;

    /// The backend store handle
    fn datastore(&self) -> &Self::Store;

    fn validator(&self) -> &Self::Validator;

    fn sanitizer(&self) -> &Self::Sanitizer;

    /// Validate `body`, then insert it
    ///
    /// Returns the stored record including its backend-generated `_id`.
    fn create(&self, body: Record, version: Option<&Version>) -> AdapterResult<Record, Self> {
        if let Err(payload) = self.validator().validate(&body, version) {
            debug!("Validation rejected create (version={:?})", version);
            return Err(AdapterError::Validation(payload));
        }

        let record = self
            .datastore()
            .insert(body)
            .map_err(AdapterError::Backend)?;

        debug!("Created record {:?}", record_id(&record));
        Ok(record)
    }

    /// Find records matching `query`, each passed through the sanitizer
    ///
    /// Backend order is preserved; no matches is an empty result.
    fn read(
        &self,
        query: &Query,
        version: Option<&Version>,
    ) -> Result<Vec<Record>, BackendError<Self>> {
        let records = self.datastore().find(query)?;
        debug!("Read {} record(s) (version={:?})", records.len(), version);

        let sanitizer = self.sanitizer();
        Ok(records
            .into_iter()
            .map(|record| sanitizer.sanitize(record, version))
            .collect())
    }

    /// Validate `body`, then set its fields on every record matching `query`
    ///
    /// Returns the number of records updated.
    fn update(
        &self,
        query: &Query,
        body: Record,
        version: Option<&Version>,
    ) -> AdapterResult<usize, Self> {
        if let Err(payload) = self.validator().validate(&body, version) {
            debug!("Validation rejected update (version={:?})", version);
            return Err(AdapterError::Validation(payload));
        }

        let updated = self
            .datastore()
            .update(query, &body, true)
            .map_err(AdapterError::Backend)?;

        debug!("Updated {} record(s)", updated);
        Ok(updated)
    }

    /// Remove every record matching `query`
    ///
    /// Returns the number of records removed.
    fn delete(&self, query: &Query) -> Result<usize, BackendError<Self>> {
        let removed = self.datastore().remove(query, true)?;
        debug!("Deleted {} record(s)", removed);
        Ok(removed)
    }
}

/// The standard adapter: one owned store handle plus the two hooks
pub struct DocumentStoreAdapter<V, S, B = SqliteDatastore> {
    datastore: B,
    validator: V,
    sanitizer: S,
}

impl<V: Validator, S: Sanitizer> DocumentStoreAdapter<V, S, SqliteDatastore> {
    /// Open a SQLite store from `config` and wrap it
    pub fn open(config: &DatastoreConfig, validator: V, sanitizer: S) -> StorageResult<Self> {
        let datastore = SqliteDatastore::open(config)?;
        Ok(Self::new(datastore, validator, sanitizer))
    }
}

impl<V, S, B> DocumentStoreAdapter<V, S, B> {
    /// Wrap an already-open store
    pub fn new(datastore: B, validator: V, sanitizer: S) -> Self {
        Self {
            datastore,
            validator,
            sanitizer,
        }
    }

    /// Give up the hooks and return the store handle
    pub fn into_datastore(self) -> B {
        self.datastore
    }
}

impl<V, S, B: Datastore> DocumentStoreAdapter<V, S, B> {
    /// Close the store handle deterministically
    pub fn close(self) -> Result<(), B::Error> {
        self.datastore.close()
    }
}

impl<V, S, B> DocumentAdapter for DocumentStoreAdapter<V, S, B>
where
    V: Validator,
    S: Sanitizer,
    B: Datastore,
{
    type Store = B;
    type Validator = V;
    type Sanitizer = S;

    fn datastore(&self) -> &B {
        &self.datastore
    }

    fn validator(&self) -> &V {
        &self.validator
    }

    fn sanitizer(&self) -> &S {
        &self.sanitizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{AcceptAll, Passthrough};
    use crate::models::id_query;
    use crate::storage::StorageError;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::error::Error as _;
    use tempfile::TempDir;

    type ValidateFn = fn(&Record, Option<&Version>) -> Result<(), Value>;
    type SanitizeFn = fn(Record, Option<&Version>) -> Record;
    type TestAdapter = DocumentStoreAdapter<ValidateFn, SanitizeFn>;

    /// Mock model validation: `failValidate` in the body forces a failure
    fn validate(body: &Record, _version: Option<&Version>) -> Result<(), Value> {
        if body.contains_key("failValidate") {
            return Err(json!({"error": true}));
        }
        Ok(())
    }

    fn sanitize(record: Record, _version: Option<&Version>) -> Record {
        record
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn adapter() -> TestAdapter {
        DocumentStoreAdapter::open(
            &DatastoreConfig::in_memory(),
            validate as ValidateFn,
            sanitize as SanitizeFn,
        )
        .unwrap()
    }

    fn jsmith() -> Record {
        record(json!({"name": "jsmith", "email": "jsmith@gmail.com"}))
    }

    #[test]
    fn test_construct_creates_store() {
        let adapter = adapter();
        assert!(adapter.datastore().is_in_memory());
        assert!(adapter.read(&Query::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_create_fails_validation() {
        let adapter = adapter();

        let err = adapter
            .create(record(json!({"failValidate": true})), None)
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(err.validation(), Some(&json!({"error": true})));
        assert!(adapter.read(&Query::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_create_returns_generated_id() {
        let adapter = adapter();

        let created = adapter.create(jsmith(), Some(&Version::from(1))).unwrap();

        assert!(record_id(&created).is_some());
        assert_eq!(created["name"], "jsmith");
    }

    #[test]
    fn test_read_by_id_returns_body_plus_id() {
        let adapter = adapter();
        let created = adapter.create(jsmith(), None).unwrap();
        let id = record_id(&created).unwrap();

        let found = adapter.read(&id_query(id), Some(&Version::from(1))).unwrap();

        let mut expected = jsmith();
        expected.insert("_id".to_string(), json!(id));
        assert_eq!(found, vec![expected]);
    }

    #[test]
    fn test_read_no_matches_is_empty() {
        let adapter = adapter();
        adapter.create(jsmith(), None).unwrap();

        let found = adapter.read(&record(json!({"name": "nobody"})), None).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_read_sanitizes_every_record_in_order() {
        fn redact(mut record: Record, version: Option<&Version>) -> Record {
            record.remove("email");
            record.insert("version".to_string(), json!(version.map(|v| v.to_string())));
            record
        }

        let adapter =
            DocumentStoreAdapter::open(&DatastoreConfig::in_memory(), AcceptAll, redact).unwrap();
        for name in ["a", "b", "c"] {
            adapter
                .create(record(json!({"name": name, "email": "x@y.z"})), None)
                .unwrap();
        }

        let found = adapter.read(&Query::new(), Some(&"v2".into())).unwrap();

        assert_eq!(found.len(), 3);
        for (record, name) in found.iter().zip(["a", "b", "c"]) {
            assert_eq!(record["name"], name);
            assert_eq!(record["version"], "v2");
            assert!(!record.contains_key("email"));
        }
    }

    #[test]
    fn test_update_fails_validation_without_touching_store() {
        let adapter = adapter();
        let created = adapter.create(jsmith(), None).unwrap();
        let id = record_id(&created).unwrap();

        let err = adapter
            .update(&id_query(id), record(json!({"name": "x", "failValidate": true})), None)
            .unwrap_err();

        assert_eq!(err.validation(), Some(&json!({"error": true})));
        let found = adapter.read(&id_query(id), None).unwrap();
        assert_eq!(found, vec![created.clone()]);
    }

    #[test]
    fn test_update_by_id() {
        let adapter = adapter();
        let created = adapter.create(jsmith(), None).unwrap();
        let id = record_id(&created).unwrap();

        let updated = adapter
            .update(&id_query(id), record(json!({"name": "jsmith1"})), Some(&1.into()))
            .unwrap();
        assert_eq!(updated, 1);

        let found = adapter.read(&id_query(id), None).unwrap();
        assert_eq!(found[0]["name"], "jsmith1");
        assert_eq!(found[0]["email"], "jsmith@gmail.com");
    }

    #[test]
    fn test_update_touches_every_match() {
        let adapter = adapter();
        for _ in 0..3 {
            adapter.create(jsmith(), None).unwrap();
        }
        adapter
            .create(record(json!({"name": "other"})), None)
            .unwrap();

        let updated = adapter
            .update(
                &record(json!({"name": "jsmith"})),
                record(json!({"active": false})),
                None,
            )
            .unwrap();

        assert_eq!(updated, 3);
        let inactive = adapter.read(&record(json!({"active": false})), None).unwrap();
        assert_eq!(inactive.len(), 3);
    }

    #[test]
    fn test_delete_by_id() {
        let adapter = adapter();
        let created = adapter.create(jsmith(), None).unwrap();
        let id = record_id(&created).unwrap();

        assert_eq!(adapter.delete(&id_query(id)).unwrap(), 1);
        assert!(adapter.read(&id_query(id), None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_every_match() {
        let adapter = adapter();
        for _ in 0..4 {
            adapter.create(jsmith(), None).unwrap();
        }
        let keep = adapter.create(record(json!({"name": "keep"})), None).unwrap();

        assert_eq!(adapter.delete(&record(json!({"name": "jsmith"}))).unwrap(), 4);
        assert_eq!(adapter.read(&Query::new(), None).unwrap(), vec![keep]);
    }

    #[test]
    fn test_backend_errors_propagate() {
        let adapter = adapter();
        adapter
            .create(record(json!({"_id": "dup", "name": "a"})), None)
            .unwrap();

        let err = adapter
            .create(record(json!({"_id": "dup", "name": "b"})), None)
            .unwrap_err();
        assert!(matches!(
            err.backend(),
            Some(StorageError::UniqueViolation { .. })
        ));
        assert!(err.to_string().contains("Unique constraint violated"));

        let err = adapter.read(&record(json!({"$where": "x"})), None).unwrap_err();
        assert!(matches!(err, StorageError::InvalidQuery(_)));

        let err = adapter
            .update(&id_query("dup"), record(json!({"_id": "other"})), None)
            .unwrap_err();
        assert!(matches!(err, AdapterError::Backend(StorageError::ImmutableId)));
    }

    #[test]
    fn test_hooks_receive_version() {
        struct Recording {
            seen: RefCell<Vec<Option<Version>>>,
        }

        impl Validator for Recording {
            type Error = String;

            fn validate(&self, _body: &Record, version: Option<&Version>) -> Result<(), String> {
                self.seen.borrow_mut().push(version.cloned());
                match version {
                    Some(Version::Name(name)) if name == "legacy" => {
                        Err("legacy writes are closed".to_string())
                    }
                    _ => Ok(()),
                }
            }
        }

        let validator = Recording {
            seen: RefCell::new(Vec::new()),
        };
        let adapter =
            DocumentStoreAdapter::open(&DatastoreConfig::in_memory(), validator, Passthrough)
                .unwrap();

        adapter.create(jsmith(), None).unwrap();
        adapter.create(jsmith(), Some(&Version::from(2))).unwrap();
        let err = adapter.create(jsmith(), Some(&"legacy".into())).unwrap_err();
        assert_eq!(err.validation().map(String::as_str), Some("legacy writes are closed"));
        assert_eq!(
            err.to_string(),
            "Validation failed: \"legacy writes are closed\""
        );

        assert_eq!(
            *adapter.validator().seen.borrow(),
            vec![None, Some(Version::Number(2)), Some(Version::from("legacy"))]
        );
        assert_eq!(adapter.read(&Query::new(), None).unwrap().len(), 2);
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let first = adapter();
        let second = adapter();

        let created = first.create(jsmith(), None).unwrap();

        assert!(second.read(&Query::new(), None).unwrap().is_empty());
        let id = record_id(&created).unwrap();
        assert!(second.read(&id_query(id), None).unwrap().is_empty());
        assert_eq!(first.read(&id_query(id), None).unwrap().len(), 1);
    }

    #[test]
    fn test_close_and_reopen_persistent_store() {
        let temp_dir = TempDir::new().unwrap();
        let config = DatastoreConfig::persistent(temp_dir.path().join("docs.db"));

        let adapter = DocumentStoreAdapter::open(&config, AcceptAll, Passthrough).unwrap();
        let created = adapter.create(jsmith(), None).unwrap();
        adapter.close().unwrap();

        let reopened = DocumentStoreAdapter::open(&config, AcceptAll, Passthrough).unwrap();
        assert_eq!(reopened.read(&Query::new(), None).unwrap(), vec![created]);

        let store = reopened.into_datastore();
        assert_eq!(store.count(&Query::new()).unwrap(), 1);
    }

    #[test]
    fn test_error_source_is_backend_source() {
        let adapter =
            DocumentStoreAdapter::open(&DatastoreConfig::in_memory(), AcceptAll, Passthrough)
                .unwrap();
        adapter
            .datastore()
            .connection()
            .execute("INSERT INTO documents (id, body) VALUES ('bad', '1')", [])
            .unwrap();

        let err = adapter.read(&Query::new(), None).unwrap_err();
        assert!(matches!(err, StorageError::CorruptRecord { .. }));

        let message = err.to_string();
        let wrapped: AdapterError<(), StorageError> = AdapterError::Backend(err);
        assert!(wrapped.source().is_some());
        assert!(wrapped.validation().is_none());
        assert_eq!(wrapped.to_string(), message);
    }

    #[test]
    fn test_validation_error_display() {
        let err: AdapterError<&str, StorageError> = AdapterError::Validation("name missing");
        assert_eq!(err.to_string(), "Validation failed: \"name missing\"");
        assert!(err.source().is_none());
        assert!(err.backend().is_none());
    }
}
