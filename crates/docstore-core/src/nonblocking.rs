//! Async facade over an adapter
//!
//! Each operation runs on tokio's blocking pool and resolves once the backend
//! call returns. The SQLite connection is not `Sync`, so the adapter sits
//! behind a mutex and operations on one `AsyncAdapter` (and its clones) run
//! one at a time.
//!
//! There is no built-in timeout; wrap the returned future in
//! `tokio::time::timeout` if one is needed.

use std::panic;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::adapter::{AdapterResult, BackendError, DocumentAdapter, ValidationError};
use crate::models::{Query, Record, Version};

/// Shared, async handle to an adapter
pub struct AsyncAdapter<A> {
    inner: Arc<Mutex<A>>,
}

impl<A> Clone for AsyncAdapter<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> AsyncAdapter<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            inner: Arc::new(Mutex::new(adapter)),
        }
    }

    /// Run `f` with the adapter as its context and return exactly its result
    ///
    /// This is how ad-hoc operations are attached at runtime. A panic in `f`
    /// is resumed on the awaiting task.
    pub async fn call<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&A) -> R + Send + 'static,
        R: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let task = tokio::task::spawn_blocking(move || {
            let adapter = inner.lock().unwrap_or_else(PoisonError::into_inner);
            f(&*adapter)
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
            Err(e) => panic!("adapter task did not complete: {}", e),
        }
    }

    /// Take the adapter back once no clones remain
    pub fn into_inner(self) -> Option<A> {
        Arc::try_unwrap(self.inner)
            .ok()
            .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<A> AsyncAdapter<A>
where
    A: DocumentAdapter + Send + 'static,
    ValidationError<A>: Send + 'static,
    BackendError<A>: Send + 'static,
{
    /// See [`DocumentAdapter::create`]
    pub async fn create(
        &self,
        body: Record,
        version: Option<Version>,
    ) -> AdapterResult<Record, A> {
        debug!("Dispatching create");
        self.call(move |adapter| adapter.create(body, version.as_ref()))
            .await
    }

    /// See [`DocumentAdapter::read`]
    pub async fn read(
        &self,
        query: Query,
        version: Option<Version>,
    ) -> Result<Vec<Record>, BackendError<A>> {
        debug!("Dispatching read");
        self.call(move |adapter| adapter.read(&query, version.as_ref()))
            .await
    }

    /// See [`DocumentAdapter::update`]
    pub async fn update(
        &self,
        query: Query,
        body: Record,
        version: Option<Version>,
    ) -> AdapterResult<usize, A> {
        debug!("Dispatching update");
        self.call(move |adapter| adapter.update(&query, body, version.as_ref()))
            .await
    }

    /// See [`DocumentAdapter::delete`]
    pub async fn delete(&self, query: Query) -> Result<usize, BackendError<A>> {
        debug!("Dispatching delete");
        self.call(move |adapter| adapter.delete(&query)).await
    }
}
