//! Model definition validation: identifiers, primary keys, referential integrity.

use crate::error::ConfigError;
use crate::schema::{AssociationKind, ModelConfig};
use std::collections::{HashMap, HashSet};

/// Names end up quoted in SQL, so only plain identifiers are accepted.
fn check_identifier(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid_start = chars.next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(name.to_string()))
    }
}

pub fn validate(models: &[ModelConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for m in models {
        check_identifier(&m.name)?;
        if let Some(table) = &m.table {
            check_identifier(table)?;
        }
        if !names.insert(m.name.as_str()) {
            return Err(ConfigError::DuplicateModel(m.name.clone()));
        }
    }

    let fields_by_model: HashMap<&str, HashSet<&str>> = models
        .iter()
        .map(|m| (m.name.as_str(), m.fields.iter().map(|f| f.name.as_str()).collect()))
        .collect();
    // Models without an explicit key get an implicit `id`.
    let has_field = |model: &str, field: &str| {
        fields_by_model
            .get(model)
            .map(|fields| fields.contains(field) || field == "id")
            .unwrap_or(false)
    };

    for m in models {
        let mut seen = HashSet::new();
        for f in &m.fields {
            check_identifier(&f.name)?;
            if !seen.insert(f.name.as_str()) {
                return Err(ConfigError::InvalidIdentifier(format!("{}.{} declared twice", m.name, f.name)));
            }
        }

        let pks: Vec<_> = m.fields.iter().filter(|f| f.primary_key).collect();
        if pks.len() > 1 {
            return Err(ConfigError::InvalidPrimaryKey {
                model: m.name.clone(),
                field: pks.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(","),
            });
        }
        if let Some(pk) = pks.first() {
            if pk.default.as_ref().map(|d| d.is_null()).unwrap_or(false) {
                return Err(ConfigError::InvalidPrimaryKey {
                    model: m.name.clone(),
                    field: pk.name.clone(),
                });
            }
        }

        for f in &m.fields {
            if let Some(r) = &f.references {
                if !names.contains(r.model.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "model",
                        id: r.model.clone(),
                    });
                }
                if !has_field(&r.model, &r.key) {
                    return Err(ConfigError::MissingReference {
                        kind: "field",
                        id: format!("{}.{}", r.model, r.key),
                    });
                }
            }
        }

        for a in &m.associations {
            if !names.contains(a.target.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "model",
                    id: a.target.clone(),
                });
            }
            if let Some(name) = &a.name {
                check_identifier(name)?;
            }
            if let Some(through) = &a.through {
                check_identifier(through)?;
                continue;
            }
            let owner = match a.kind {
                AssociationKind::HasMany | AssociationKind::HasOne => a.target.as_str(),
                AssociationKind::BelongsTo => m.name.as_str(),
            };
            if !has_field(owner, &a.foreign_key) {
                return Err(ConfigError::MissingReference {
                    kind: "foreign key",
                    id: format!("{}.{}", owner, a.foreign_key),
                });
            }
        }
    }

    Ok(())
}
