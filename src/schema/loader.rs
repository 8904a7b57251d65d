//! Resolve model definitions into a `Schema`, from structs or JSON.

use crate::error::ConfigError;
use crate::naming::pluralize;
use crate::schema::resolved::{
    Association, Cardinality, FieldInfo, Generated, ModelDescriptor, Reference, Schema, CREATED_AT, UPDATED_AT,
};
use crate::schema::types::*;
use crate::schema::validate;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Build the schema from model definitions (validates first).
pub fn resolve(configs: &[ModelConfig]) -> Result<Schema, ConfigError> {
    validate(configs)?;

    let plural_by_name: HashMap<&str, String> = configs
        .iter()
        .map(|m| (m.name.as_str(), m.plural.clone().unwrap_or_else(|| pluralize(&m.name))))
        .collect();

    let mut models = Vec::with_capacity(configs.len());
    let mut model_by_name = HashMap::new();

    for m in configs {
        let mut fields: Vec<FieldInfo> = m.fields.iter().map(resolve_field).collect();

        let primary_key = match m.fields.iter().find(|f| f.primary_key) {
            Some(pk) => pk.name.clone(),
            None if fields.iter().any(|f| f.name == "id") => "id".to_string(),
            None => {
                fields.insert(
                    0,
                    FieldInfo {
                        name: "id".into(),
                        field_type: FieldType::Integer,
                        allow_null: false,
                        unique: false,
                        default: None,
                        generated: Some(Generated::AutoIncrement),
                        references: None,
                        validate: None,
                    },
                );
                "id".to_string()
            }
        };
        if let Some(pk) = fields.iter_mut().find(|f| f.name == primary_key) {
            pk.allow_null = false;
        }

        if m.timestamps {
            for (name, generated) in [(CREATED_AT, Generated::CreatedAt), (UPDATED_AT, Generated::UpdatedAt)] {
                if !fields.iter().any(|f| f.name == name) {
                    fields.push(FieldInfo {
                        name: name.to_string(),
                        field_type: FieldType::Timestamp,
                        allow_null: false,
                        unique: false,
                        default: None,
                        generated: Some(generated),
                        references: None,
                        validate: None,
                    });
                }
            }
        }

        let associations = m
            .associations
            .iter()
            .map(|a| {
                let cardinality = match a.kind {
                    AssociationKind::HasMany => Cardinality::HasMany,
                    AssociationKind::HasOne => Cardinality::HasOne,
                    AssociationKind::BelongsTo => Cardinality::BelongsTo,
                };
                let name = a.name.clone().unwrap_or_else(|| match cardinality {
                    Cardinality::HasMany => plural_by_name
                        .get(a.target.as_str())
                        .cloned()
                        .unwrap_or_else(|| pluralize(&a.target)),
                    Cardinality::HasOne | Cardinality::BelongsTo => a.target.clone(),
                });
                Association {
                    name,
                    target: a.target.clone(),
                    foreign_key: a.foreign_key.clone(),
                    cardinality,
                    through: a.through.clone(),
                }
            })
            .collect();

        let plural = plural_by_name
            .get(m.name.as_str())
            .cloned()
            .unwrap_or_else(|| pluralize(&m.name));
        let model = Arc::new(ModelDescriptor {
            name: m.name.clone(),
            table: m.table.clone().unwrap_or_else(|| plural.clone()),
            plural,
            primary_key,
            fields,
            associations,
            timestamps: m.timestamps,
        });
        model_by_name.insert(m.name.clone(), model.clone());
        models.push(model);
    }

    Ok(Schema { models, model_by_name })
}

fn resolve_field(f: &FieldConfig) -> FieldInfo {
    let generated = if f.auto_increment {
        Some(Generated::AutoIncrement)
    } else if f.primary_key && f.type_ == FieldType::Uuid && f.default.is_none() {
        Some(Generated::Uuid)
    } else {
        None
    };
    FieldInfo {
        name: f.name.clone(),
        field_type: f.type_,
        allow_null: f.allow_null && !f.primary_key,
        unique: f.unique,
        default: f.default.clone(),
        generated,
        references: f.references.as_ref().map(|r| Reference {
            model: r.model.clone(),
            key: r.key.clone(),
            on_delete: r.on_delete,
        }),
        validate: f.validate.clone(),
    }
}

/// Parse a JSON array of model definitions and resolve it.
pub fn from_json_str(json: &str) -> Result<Schema, ConfigError> {
    let configs: Vec<ModelConfig> = serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
    resolve(&configs)
}

/// Read a JSON file of model definitions (e.g. `models.json`) and resolve it.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<Schema, ConfigError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), "loading models");
    from_json_str(&json)
}
