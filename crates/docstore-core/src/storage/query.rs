//! Query translation
//!
//! Turns a query map into a SQL `WHERE` clause over the `body` column.
//! Matching itself is done by SQLite's `json_type`/`json_extract`; this
//! module only maps query shapes onto those functions.
//!
//! Supported shapes:
//!
//! - `{"field": value}`: type-aware equality
//! - `{"field": {"$gt": 1, "$lte": 5}}`: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`,
//!   `$lte`, `$in`, `$nin`, `$exists`
//! - `{"$or": [..]}`, `{"$and": [..]}`, `{"$not": {..}}`
//! - dotted paths (`"address.city"`, `"tags.0"`)

use rusqlite::types::Value as SqlValue;
use serde_json::{Number, Value};

use super::error::{StorageError, StorageResult};
use crate::models::Query;

/// A compiled `WHERE` clause with its positional parameters
#[derive(Debug)]
pub(crate) struct Filter {
    pub(crate) clause: String,
    pub(crate) params: Vec<SqlValue>,
}

/// Compile a query into a filter
pub(crate) fn compile(query: &Query) -> StorageResult<Filter> {
    let mut builder = Builder::default();
    let clause = builder.query(query)?;
    Ok(Filter {
        clause,
        params: builder.params,
    })
}

/// Convert a dotted field name into a SQLite JSON path
///
/// `"a.b"` becomes `$."a"."b"`; numeric segments after the first index arrays.
pub(crate) fn json_path(field: &str) -> StorageResult<String> {
    let mut path = String::from("$");
    for (i, segment) in field.split('.').enumerate() {
        if segment.is_empty() {
            return Err(invalid(format!("empty segment in field '{}'", field)));
        }
        if segment.contains('"') {
            return Err(invalid(format!("field '{}' contains a double quote", field)));
        }
        if i > 0 && segment.bytes().all(|b| b.is_ascii_digit()) {
            path.push('[');
            path.push_str(segment);
            path.push(']');
        } else {
            path.push_str(".\"");
            path.push_str(segment);
            path.push('"');
        }
    }
    Ok(path)
}

/// Convert a JSON number into a SQL parameter
pub(crate) fn number_param(n: &Number) -> SqlValue {
    match n.as_i64() {
        Some(i) => SqlValue::Integer(i),
        None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
    }
}

fn invalid(msg: String) -> StorageError {
    StorageError::InvalidQuery(msg)
}

#[derive(Default)]
struct Builder {
    params: Vec<SqlValue>,
}

impl Builder {
    fn query(&mut self, query: &Query) -> StorageResult<String> {
        if query.is_empty() {
            return Ok("1".to_string());
        }

        let mut parts = Vec::with_capacity(query.len());
        for (key, value) in query {
            let part = match key.as_str() {
                "$and" => self.logical(key, value, " AND ")?,
                "$or" => self.logical(key, value, " OR ")?,
                "$not" => match value {
                    Value::Object(inner) => format!("NOT COALESCE(({}), 0)", self.query(inner)?),
                    _ => return Err(invalid("$not operator requires a query".to_string())),
                },
                op if op.starts_with('$') => {
                    return Err(invalid(format!("unknown logical operator {}", op)))
                }
                _ => self.field(key, value)?,
            };
            parts.push(format!("({})", part));
        }

        Ok(parts.join(" AND "))
    }

    fn logical(&mut self, op: &str, value: &Value, joiner: &str) -> StorageResult<String> {
        let items = match value {
            Value::Array(items) if !items.is_empty() => items,
            _ => {
                return Err(invalid(format!(
                    "{} operator requires a non-empty array of queries",
                    op
                )))
            }
        };

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(inner) => parts.push(format!("({})", self.query(inner)?)),
                _ => return Err(invalid(format!("{} operator requires queries", op))),
            }
        }
        Ok(parts.join(joiner))
    }

    fn field(&mut self, field: &str, condition: &Value) -> StorageResult<String> {
        let path = json_path(field)?;

        let ops = match condition {
            Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => ops,
            _ => return Ok(self.equals(&path, condition)),
        };

        if !ops.keys().all(|k| k.starts_with('$')) {
            return Err(invalid(format!(
                "cannot mix operators and fields in condition on '{}'",
                field
            )));
        }

        let mut parts = Vec::with_capacity(ops.len());
        for (op, operand) in ops {
            parts.push(format!("({})", self.operator(&path, op, operand)?));
        }
        Ok(parts.join(" AND "))
    }

    fn operator(&mut self, path: &str, op: &str, operand: &Value) -> StorageResult<String> {
        match op {
            "$eq" => Ok(self.equals(path, operand)),
            "$ne" => Ok(format!("NOT COALESCE({}, 0)", self.equals(path, operand))),
            "$gt" => self.compare(path, op, ">", operand),
            "$gte" => self.compare(path, op, ">=", operand),
            "$lt" => self.compare(path, op, "<", operand),
            "$lte" => self.compare(path, op, "<=", operand),
            "$in" => self.any_of(path, op, operand),
            "$nin" => Ok(format!("NOT COALESCE({}, 0)", self.any_of(path, op, operand)?)),
            "$exists" => match operand {
                Value::Bool(exists) => {
                    self.bind_path(path);
                    let test = if *exists { "IS NOT NULL" } else { "IS NULL" };
                    Ok(format!("json_type(body, ?) {}", test))
                }
                _ => Err(invalid("$exists operator requires a boolean".to_string())),
            },
            _ => Err(invalid(format!("unknown comparison operator {}", op))),
        }
    }

    fn equals(&mut self, path: &str, value: &Value) -> String {
        match value {
            Value::Null => {
                self.bind_path(path);
                "json_type(body, ?) = 'null'".to_string()
            }
            Value::Bool(b) => {
                self.bind_path(path);
                format!("json_type(body, ?) = '{}'", b)
            }
            Value::Number(n) => {
                self.bind_path(path);
                self.bind_path(path);
                self.params.push(number_param(n));
                "(json_type(body, ?) IN ('integer', 'real') AND json_extract(body, ?) = ?)"
                    .to_string()
            }
            Value::String(s) => {
                self.bind_path(path);
                self.bind_path(path);
                self.params.push(SqlValue::Text(s.clone()));
                "(json_type(body, ?) = 'text' AND json_extract(body, ?) = ?)".to_string()
            }
            Value::Array(_) | Value::Object(_) => {
                let kind = if value.is_array() { "array" } else { "object" };
                self.bind_path(path);
                self.bind_path(path);
                self.params.push(SqlValue::Text(value.to_string()));
                format!(
                    "(json_type(body, ?) = '{}' AND json_extract(body, ?) = json(?))",
                    kind
                )
            }
        }
    }

    fn compare(
        &mut self,
        path: &str,
        op: &str,
        sql_op: &str,
        operand: &Value,
    ) -> StorageResult<String> {
        let (type_test, param) = match operand {
            Value::Number(n) => ("json_type(body, ?) IN ('integer', 'real')", number_param(n)),
            Value::String(s) => ("json_type(body, ?) = 'text'", SqlValue::Text(s.clone())),
            _ => {
                return Err(invalid(format!(
                    "{} operator requires a number or a string",
                    op
                )))
            }
        };

        self.bind_path(path);
        self.bind_path(path);
        self.params.push(param);
        Ok(format!(
            "({} AND json_extract(body, ?) {} ?)",
            type_test, sql_op
        ))
    }

    fn any_of(&mut self, path: &str, op: &str, operand: &Value) -> StorageResult<String> {
        let items = match operand {
            Value::Array(items) => items,
            _ => return Err(invalid(format!("{} operator requires an array", op))),
        };
        if items.is_empty() {
            return Ok("0".to_string());
        }

        let parts: Vec<String> = items.iter().map(|v| self.equals(path, v)).collect();
        Ok(format!("({})", parts.join(" OR ")))
    }

    fn bind_path(&mut self, path: &str) {
        self.params.push(SqlValue::Text(path.to_string()));
    }
}
