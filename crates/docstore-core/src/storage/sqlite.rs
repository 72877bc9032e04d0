//! SQLite-backed datastore
//!
//! Stores each record as a JSON document in the `documents` table and
//! delegates matching to SQLite's JSON functions (see [`super::query`]).
//!
//! ## Modes
//!
//! - In-memory: `in_memory_only` set, or no `filename`. Each open yields a
//!   private database.
//! - Persistent: `filename` set. Parent directories are created on open.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::datastore::Datastore;
use super::error::{StorageError, StorageResult};
use super::query::{compile, json_path};
use super::schema::{init_schema, needs_init, FIELD_INDEX_PREFIX};
use crate::config::DatastoreConfig;
use crate::models::{Query, Record, ID_FIELD};

const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// An index created with [`SqliteDatastore::ensure_index`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIndex {
    /// Indexed field, in dotted notation
    pub field: String,
    /// Whether duplicate values are rejected
    pub unique: bool,
}

/// Embedded document store on top of SQLite
pub struct SqliteDatastore {
    conn: Connection,
    path: Option<PathBuf>,
    timestamp_data: bool,
}

impl SqliteDatastore {
    /// Open the store described by `config`
    pub fn open(config: &DatastoreConfig) -> StorageResult<Self> {
        let (conn, path) = match &config.filename {
            Some(path) if !config.in_memory_only => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
                }
                (Connection::open(path)?, Some(path.clone()))
            }
            _ => (Connection::open_in_memory()?, None),
        };

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        match &path {
            Some(p) => info!("Opened datastore at {:?}", p),
            None => debug!("Opened in-memory datastore"),
        }

        Ok(Self {
            conn,
            path,
            timestamp_data: config.timestamp_data,
        })
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::open(&DatastoreConfig::in_memory())
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Database file, or `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }

    /// Index `field`, optionally rejecting duplicate values
    ///
    /// Records that lack the field never collide. Calling this for a field
    /// that is already indexed is a no-op.
    pub fn ensure_index(&self, field: &str, unique: bool) -> StorageResult<()> {
        let path = index_path(field)?;
        let sql = format!(
            "CREATE {}INDEX IF NOT EXISTS \"{}{}\" ON documents(json_extract(body, '{}'))",
            if unique { "UNIQUE " } else { "" },
            FIELD_INDEX_PREFIX,
            field,
            path
        );
        self.conn
            .execute_batch(&sql)
            .map_err(StorageError::from_sqlite)?;

        info!("Ensured index on {} (unique={})", field, unique);
        Ok(())
    }

    /// Drop the index on `field`, if any
    pub fn remove_index(&self, field: &str) -> StorageResult<()> {
        index_path(field)?;
        self.conn.execute_batch(&format!(
            "DROP INDEX IF EXISTS \"{}{}\"",
            FIELD_INDEX_PREFIX, field
        ))?;

        info!("Removed index on {}", field);
        Ok(())
    }

    /// List field indexes, ordered by field
    pub fn indexes(&self) -> StorageResult<Vec<FieldIndex>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, \"unique\" FROM pragma_index_list('documents') ORDER BY name")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(name, unique)| {
                name.strip_prefix(FIELD_INDEX_PREFIX).map(|field| FieldIndex {
                    field: field.to_string(),
                    unique,
                })
            })
            .collect())
    }

    /// Restrict a filter to its first match when `multi` is off
    fn scope(clause: &str, multi: bool) -> String {
        if multi {
            clause.to_string()
        } else {
            format!(
                "seq = (SELECT seq FROM documents WHERE {} ORDER BY seq LIMIT 1)",
                clause
            )
        }
    }
}

impl Datastore for SqliteDatastore {
    type Error = StorageError;

    fn insert(&self, mut record: Record) -> StorageResult<Record> {
        check_field_names(&record)?;

        let id = match record.get(ID_FIELD) {
            None => {
                let id = Uuid::new_v4().simple().to_string();
                record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(StorageError::InvalidId(format!(
                    "expected a string, got {}",
                    other
                )))
            }
        };

        if self.timestamp_data {
            let now = timestamp();
            record
                .entry(CREATED_AT)
                .or_insert_with(|| Value::String(now.clone()));
            record.entry(UPDATED_AT).or_insert(Value::String(now));
        }

        let body = serde_json::to_string(&record)?;
        self.conn
            .execute(
                "INSERT INTO documents (id, body) VALUES (?, ?)",
                params![id, body],
            )
            .map_err(StorageError::from_sqlite)?;

        debug!("Inserted record {}", id);
        Ok(record)
    }

    fn find(&self, query: &Query) -> StorageResult<Vec<Record>> {
        let filter = compile(query)?;
        let sql = format!(
            "SELECT id, body FROM documents WHERE {} ORDER BY seq",
            filter.clause
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, body) = row?;
            records.push(decode(id, &body)?);
        }

        Ok(records)
    }

    fn count(&self, query: &Query) -> StorageResult<usize> {
        let filter = compile(query)?;
        let sql = format!("SELECT COUNT(*) FROM documents WHERE {}", filter.clause);

        let count: i64 =
            self.conn
                .query_row(&sql, params_from_iter(filter.params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn update(&self, query: &Query, fields: &Record, multi: bool) -> StorageResult<usize> {
        let mut assignments = Vec::with_capacity(fields.len() + 1);
        let mut params = Vec::with_capacity(fields.len() * 2 + 2);

        for (key, value) in fields {
            if key == ID_FIELD {
                return Err(StorageError::ImmutableId);
            }
            if key.split('.').any(|segment| segment.starts_with('$')) {
                return Err(StorageError::InvalidFieldName { field: key.clone() });
            }
            check_value_names(value)?;

            let path = json_path(key)
                .map_err(|_| StorageError::InvalidFieldName { field: key.clone() })?;
            assignments.push("?, json(?)");
            params.push(SqlValue::Text(path));
            params.push(SqlValue::Text(value.to_string()));
        }

        if self.timestamp_data {
            assignments.push("?, json(?)");
            params.push(SqlValue::Text(format!("$.\"{}\"", UPDATED_AT)));
            params.push(SqlValue::Text(Value::String(timestamp()).to_string()));
        }

        let set_expr = if assignments.is_empty() {
            "body".to_string()
        } else {
            format!("json_set(body, {})", assignments.join(", "))
        };

        let filter = compile(query)?;
        let sql = format!(
            "UPDATE documents SET body = {} WHERE {}",
            set_expr,
            Self::scope(&filter.clause, multi)
        );
        params.extend(filter.params);

        let updated = self
            .conn
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(StorageError::from_sqlite)?;

        debug!("Updated {} record(s) (multi={})", updated, multi);
        Ok(updated)
    }

    fn remove(&self, query: &Query, multi: bool) -> StorageResult<usize> {
        let filter = compile(query)?;
        let sql = format!(
            "DELETE FROM documents WHERE {}",
            Self::scope(&filter.clause, multi)
        );

        let removed = self
            .conn
            .execute(&sql, params_from_iter(filter.params.iter()))?;

        debug!("Removed {} record(s) (multi={})", removed, multi);
        Ok(removed)
    }

    fn close(self) -> StorageResult<()> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| StorageError::Database(e))?;

        match path {
            Some(p) => info!("Closed datastore at {:?}", p),
            None => debug!("Closed in-memory datastore"),
        }
        Ok(())
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode(id: String, body: &str) -> StorageResult<Record> {
    serde_json::from_str(body).map_err(|source| {
        warn!("Failed to decode record {}: {}", id, source);
        StorageError::CorruptRecord { id, source }
    })
}

/// Reject keys the store cannot address: `$`-prefixed, dotted or quoted
fn check_field_names(record: &Record) -> StorageResult<()> {
    for (key, value) in record {
        if key.starts_with('$') || key.contains('.') || key.contains('"') {
            return Err(StorageError::InvalidFieldName { field: key.clone() });
        }
        check_value_names(value)?;
    }
    Ok(())
}

fn check_value_names(value: &Value) -> StorageResult<()> {
    match value {
        Value::Object(map) => check_field_names(map),
        Value::Array(items) => items.iter().try_for_each(check_value_names),
        _ => Ok(()),
    }
}

/// Validate an index field and return its JSON path
///
/// Index DDL cannot take bound parameters, so fields are limited to
/// alphanumerics and underscores (dots separate segments).
fn index_path(field: &str) -> StorageResult<String> {
    let valid = !field.is_empty()
        && field.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if !valid {
        return Err(StorageError::InvalidFieldName {
            field: field.to_string(),
        });
    }
    json_path(field)
}
