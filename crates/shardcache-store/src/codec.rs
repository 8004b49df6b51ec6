//! Record codec for cache payloads
//!
//! A cached record is a flat JSON object with exactly four fields:
//!
//! ```text
//! {"login":"alice","first_name":"Alice","last_name":"Smith","age":30}
//! ```
//!
//! Decoding is strict about the required fields and their types and never
//! fills in defaults. Unknown extra fields are ignored.

use serde_json::{Map, Value as JsonValue};
use shardcache_common::{Error, Person, Result};

/// Field names of the transport form, in encoding order
pub const FIELDS: [&str; 4] = ["login", "first_name", "last_name", "age"];

/// Maps records to and from their cache transport form
pub struct RecordCodec;

impl RecordCodec {
    /// Encode a record as a field map
    #[must_use]
    pub fn encode(person: &Person) -> Map<String, JsonValue> {
        let mut fields = Map::new();
        fields.insert("login".to_string(), person.login.clone().into());
        fields.insert("first_name".to_string(), person.first_name.clone().into());
        fields.insert("last_name".to_string(), person.last_name.clone().into());
        fields.insert("age".to_string(), person.age.into());
        fields
    }

    /// Decode a field map into a record
    pub fn decode(fields: &Map<String, JsonValue>) -> Result<Person> {
        let person = Person {
            login: text_field(fields, "login")?,
            first_name: text_field(fields, "first_name")?,
            last_name: text_field(fields, "last_name")?,
            age: int_field(fields, "age")?,
        };
        if person.login.is_empty() {
            return Err(Error::malformed("field `login` is empty"));
        }
        Ok(person)
    }

    /// Encode a record as the string stored in the cache
    pub fn to_payload(person: &Person) -> Result<String> {
        serde_json::to_string(&Self::encode(person))
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a string read from the cache
    pub fn from_payload(payload: &str) -> Result<Person> {
        match serde_json::from_str::<JsonValue>(payload) {
            Ok(JsonValue::Object(fields)) => Self::decode(&fields),
            Ok(other) => Err(Error::malformed(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            ))),
            Err(e) => Err(Error::malformed(e.to_string())),
        }
    }
}

fn text_field(fields: &Map<String, JsonValue>, name: &str) -> Result<String> {
    match fields.get(name) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::malformed(format!(
            "field `{name}` must be a string, got {}",
            json_type(other)
        ))),
        None => Err(Error::malformed(format!("missing field `{name}`"))),
    }
}

fn int_field(fields: &Map<String, JsonValue>, name: &str) -> Result<i64> {
    match fields.get(name) {
        Some(value) => value.as_i64().ok_or_else(|| {
            Error::malformed(format!(
                "field `{name}` must be an integer, got {}",
                json_type(value)
            ))
        }),
        None => Err(Error::malformed(format!("missing field `{name}`"))),
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "integer",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
