//! Resolved models: definitions validated and flattened for runtime use.

use crate::schema::{FieldType, OnDelete, ValidationRule};
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Values the store fills in when the caller leaves the field out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generated {
    AutoIncrement,
    Uuid,
    CreatedAt,
    UpdatedAt,
}

#[derive(Clone, Debug)]
pub struct Reference {
    pub model: String,
    pub key: String,
    pub on_delete: OnDelete,
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: FieldType,
    pub allow_null: bool,
    pub unique: bool,
    pub default: Option<Value>,
    pub generated: Option<Generated>,
    pub references: Option<Reference>,
    pub validate: Option<ValidationRule>,
}

impl FieldInfo {
    /// Whether a missing value is filled in by the store rather than rejected.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.generated.is_some()
    }

    /// Parse a path or query-string value according to this field's type.
    /// Falls back to the raw string so the store reports the mismatch.
    pub fn coerce(&self, raw: &str) -> Value {
        match self.field_type {
            FieldType::Integer => {
                if let Ok(n) = raw.parse::<i64>() {
                    return Value::Number(n.into());
                }
            }
            FieldType::Float => {
                if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
                    return Value::Number(n);
                }
            }
            FieldType::Boolean => {
                if raw.eq_ignore_ascii_case("true") {
                    return Value::Bool(true);
                }
                if raw.eq_ignore_ascii_case("false") {
                    return Value::Bool(false);
                }
            }
            FieldType::Uuid => {
                if let Ok(u) = uuid::Uuid::parse_str(raw) {
                    return Value::String(u.to_string());
                }
            }
            FieldType::Text | FieldType::Timestamp | FieldType::Json => {}
        }
        Value::String(raw.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    HasMany,
    HasOne,
    BelongsTo,
}

#[derive(Clone, Debug)]
pub struct Association {
    pub name: String,
    pub target: String,
    /// On the target for has_many/has_one, on this model for belongs_to.
    pub foreign_key: String,
    pub cardinality: Cardinality,
    pub through: Option<String>,
}

impl Association {
    /// Only plain one-to-many associations get nested child routes.
    pub fn yields_child_routes(&self) -> bool {
        self.cardinality == Cardinality::HasMany && self.through.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct ModelDescriptor {
    pub name: String,
    pub plural: String,
    pub table: String,
    pub primary_key: String,
    pub fields: Vec<FieldInfo>,
    pub associations: Vec<Association>,
    pub timestamps: bool,
}

impl ModelDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn primary_key_field(&self) -> Option<&FieldInfo> {
        self.field(&self.primary_key)
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Coerce a raw value for `field`; unknown fields keep the string.
    pub fn coerce(&self, field: &str, raw: &str) -> Value {
        self.field(field)
            .map(|f| f.coerce(raw))
            .unwrap_or_else(|| Value::String(raw.to_string()))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Loose equality between a stored value and a raw path/query string: `1` matches `"1"`.
pub fn value_matches(value: &Value, raw: &str) -> bool {
    match value {
        Value::String(s) => s == raw,
        Value::Number(n) => {
            if n.to_string() == raw {
                return true;
            }
            match (n.as_i64(), raw.parse::<i64>()) {
                (Some(a), Ok(b)) => a == b,
                _ => matches!((n.as_f64(), raw.parse::<f64>()), (Some(a), Ok(b)) if a == b),
            }
        }
        Value::Bool(b) => b.to_string() == raw,
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => value.to_string() == raw,
    }
}

/// Loose equality between two JSON values, used when comparing keys across models.
pub fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), other) | (other, Value::String(s)) => value_matches(other, s),
        (Value::Number(x), Value::Number(y)) => numbers_match(x, y),
        _ => a == b,
    }
}

/// Integers compare exactly; floats only when either side is not an integer.
fn numbers_match(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    if x.is_f64() || y.is_f64() {
        return x.as_f64() == y.as_f64();
    }
    false
}

/// Registry of resolved models, looked up by singular name.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    pub models: Vec<Arc<ModelDescriptor>>,
    pub model_by_name: HashMap<String, Arc<ModelDescriptor>>,
}

impl Schema {
    pub fn model(&self, name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.model_by_name.get(name)
    }

    /// Models whose fields reference `target`, with the referencing field.
    pub fn referencing<'a>(&'a self, target: &'a str) -> impl Iterator<Item = (&'a ModelDescriptor, &'a FieldInfo)> + 'a {
        self.models.iter().flat_map(move |m| {
            m.fields
                .iter()
                .filter(move |f| f.references.as_ref().map(|r| r.model == target).unwrap_or(false))
                .map(move |f| (m.as_ref(), f))
        })
    }
}
