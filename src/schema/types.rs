//! Raw model definitions as loaded from JSON.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Boolean,
    Uuid,
    Timestamp,
    Json,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    Restrict,
    Cascade,
    SetNull,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub model: String,
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default)]
    pub on_delete: OnDelete,
}

fn default_key() -> String {
    "id".into()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default = "default_true")]
    pub allow_null: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub references: Option<ReferenceConfig>,
    #[serde(default)]
    pub validate: Option<ValidationRule>,
}

fn default_true() -> bool {
    true
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, type_: FieldType) -> Self {
        FieldConfig {
            name: name.into(),
            type_,
            allow_null: true,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
            references: None,
            validate: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.allow_null = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn references(mut self, model: impl Into<String>, on_delete: OnDelete) -> Self {
        self.references = Some(ReferenceConfig {
            model: model.into(),
            key: default_key(),
            on_delete,
        });
        self
    }

    pub fn validate(mut self, rule: ValidationRule) -> Self {
        self.validate = Some(rule);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    HasMany,
    HasOne,
    BelongsTo,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationConfig {
    /// Defaults to the target's plural for has_many, the target name otherwise.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: AssociationKind,
    pub target: String,
    pub foreign_key: String,
    /// Pivot table for many-to-many; such associations never get child routes.
    #[serde(default)]
    pub through: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub plural: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
    #[serde(default)]
    pub timestamps: bool,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        ModelConfig {
            name: name.into(),
            plural: None,
            table: None,
            fields: Vec::new(),
            associations: Vec::new(),
            timestamps: false,
        }
    }

    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    pub fn field(mut self, field: FieldConfig) -> Self {
        self.fields.push(field);
        self
    }

    pub fn timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    pub fn has_many(mut self, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.associations.push(AssociationConfig {
            name: None,
            kind: AssociationKind::HasMany,
            target: target.into(),
            foreign_key: foreign_key.into(),
            through: None,
        });
        self
    }

    pub fn has_one(mut self, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.associations.push(AssociationConfig {
            name: None,
            kind: AssociationKind::HasOne,
            target: target.into(),
            foreign_key: foreign_key.into(),
            through: None,
        });
        self
    }

    pub fn belongs_to(mut self, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.associations.push(AssociationConfig {
            name: None,
            kind: AssociationKind::BelongsTo,
            target: target.into(),
            foreign_key: foreign_key.into(),
            through: None,
        });
        self
    }

    pub fn belongs_to_many(
        mut self,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        through: impl Into<String>,
    ) -> Self {
        self.associations.push(AssociationConfig {
            name: None,
            kind: AssociationKind::HasMany,
            target: target.into(),
            foreign_key: foreign_key.into(),
            through: Some(through.into()),
        });
        self
    }
}
