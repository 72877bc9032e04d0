//! Data models
//!
//! Records and queries are untyped JSON maps; their shape is owned by the
//! model layer's hooks and by the backend, not by the adapter.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the backend-assigned identifier
pub const ID_FIELD: &str = "_id";

/// One stored document: field names mapped to JSON values
pub type Record = Map<String, Value>;

/// Backend-defined filter criteria
pub type Query = Map<String, Value>;

/// Schema revision selector passed to the validation and sanitization hooks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Version {
    /// Numeric revision, e.g. `1`
    Number(i64),
    /// Named revision, e.g. `"v2"`
    Name(String),
}

impl From<i64> for Version {
    fn from(n: i64) -> Self {
        Version::Number(n)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version::Name(s.to_string())
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Version::Name(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Number(n) => write!(f, "{}", n),
            Version::Name(s) => f.write_str(s),
        }
    }
}

/// Get the `_id` of a record, if it has a string one
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// Build a query matching a single identifier
pub fn id_query(id: &str) -> Query {
    let mut query = Query::new();
    query.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_conversions() {
        assert_eq!(Version::from(1), Version::Number(1));
        assert_eq!(Version::from("v2"), Version::Name("v2".to_string()));
        assert_eq!(Version::from(1).to_string(), "1");
        assert_eq!(Version::from("v2").to_string(), "v2");
    }

    #[test]
    fn test_version_untagged_serde() {
        let v: Version = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(v, Version::Number(3));

        let v: Version = serde_json::from_value(json!("beta")).unwrap();
        assert_eq!(v, Version::Name("beta".to_string()));

        assert_eq!(serde_json::to_value(Version::Number(3)).unwrap(), json!(3));
    }

    #[test]
    fn test_record_id_and_id_query() {
        let query = id_query("abc");
        assert_eq!(Value::Object(query.clone()), json!({"_id": "abc"}));
        assert_eq!(record_id(&query), Some("abc"));

        let mut numeric = Record::new();
        numeric.insert(ID_FIELD.to_string(), json!(7));
        assert_eq!(record_id(&numeric), None);
    }
}
