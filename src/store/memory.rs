//! In-process record store. Enforces the rules a relational store would:
//! not-null and field validation, type checks, unique keys, and foreign keys
//! with restrict / cascade / set-null on delete.

use crate::error::{AppError, ConfigError, FieldError};
use crate::query::QueryDescriptor;
use crate::schema::{
    resolve, values_match, Association, Cardinality, FieldInfo, FieldType, Generated, ModelConfig, ModelDescriptor,
    OnDelete, RecordValidator, Schema,
};
use crate::store::{merge_update, model_fields, prepare_insert, project, Dialect, Record, RecordStore};
use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
struct Table {
    rows: Vec<Record>,
    next_id: i64,
}

impl Default for Table {
    fn default() -> Self {
        Table {
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

type Tables = HashMap<String, Table>;

pub struct MemoryStore {
    schema: Schema,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(schema: Schema) -> Self {
        let tables = schema
            .models
            .iter()
            .map(|m| (m.name.clone(), Table::default()))
            .collect();
        MemoryStore {
            schema,
            tables: RwLock::new(tables),
        }
    }

    pub fn from_models(models: &[ModelConfig]) -> Result<Self, ConfigError> {
        Ok(Self::new(resolve(models)?))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, AppError> {
        self.tables
            .read()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, AppError> {
        self.tables
            .write()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }

    fn select(&self, tables: &Tables, model: &ModelDescriptor, query: &QueryDescriptor) -> Vec<Record> {
        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        rows(tables, &model.name)
            .iter()
            .filter(|row| query.matches(row))
            .skip(offset)
            .take(limit)
            .map(|row| {
                let included: Vec<(String, Value)> = query
                    .include
                    .iter()
                    .filter_map(|name| model.association(name))
                    .map(|a| (a.name.clone(), self.load_association(tables, model, a, row)))
                    .collect();
                let mut out = project(row.clone(), query.attributes.as_deref());
                out.extend(included);
                out
            })
            .collect()
    }

    fn load_association(&self, tables: &Tables, model: &ModelDescriptor, assoc: &Association, row: &Record) -> Value {
        let Some(target) = self.schema.model(&assoc.target) else {
            return Value::Null;
        };
        let key = row.get(&model.primary_key);
        match (assoc.cardinality, &assoc.through) {
            (Cardinality::HasMany, Some(through)) => {
                let Some(pivot) = self
                    .schema
                    .models
                    .iter()
                    .find(|m| m.name == *through || m.table == *through)
                else {
                    return Value::Array(Vec::new());
                };
                let Some(target_ref) = pivot
                    .fields
                    .iter()
                    .find(|f| f.name != assoc.foreign_key && f.references.as_ref().map(|r| r.model == target.name).unwrap_or(false))
                else {
                    return Value::Array(Vec::new());
                };
                let target_key = target_ref
                    .references
                    .as_ref()
                    .map(|r| r.key.as_str())
                    .unwrap_or(target.primary_key.as_str());
                let linked: Vec<&Value> = matching(tables, &pivot.name, &assoc.foreign_key, key)
                    .filter_map(|p| p.get(&target_ref.name))
                    .collect();
                Value::Array(
                    rows(tables, &target.name)
                        .iter()
                        .filter(|t| t.get(target_key).map(|v| linked.iter().any(|l| values_match(l, v))).unwrap_or(false))
                        .cloned()
                        .map(Value::Object)
                        .collect(),
                )
            }
            (Cardinality::HasMany, None) => Value::Array(
                matching(tables, &target.name, &assoc.foreign_key, key)
                    .cloned()
                    .map(Value::Object)
                    .collect(),
            ),
            (Cardinality::HasOne, _) => matching(tables, &target.name, &assoc.foreign_key, key)
                .next()
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null),
            (Cardinality::BelongsTo, _) => matching(tables, &target.name, &target.primary_key, row.get(&assoc.foreign_key))
                .next()
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null),
        }
    }

    fn check_references(&self, tables: &Tables, model: &ModelDescriptor, record: &Record) -> Result<(), AppError> {
        for field in &model.fields {
            let Some(reference) = &field.references else { continue };
            let value = match record.get(&field.name) {
                None | Some(Value::Null) => continue,
                Some(v) => v,
            };
            if matching(tables, &reference.model, &reference.key, Some(value)).next().is_none() {
                return Err(AppError::ForeignKeyConstraint(format!(
                    "{}.{} = {} has no matching {}.{}",
                    model.table, field.name, value, reference.model, reference.key
                )));
            }
        }
        Ok(())
    }

    /// Collect every row a delete touches, following on-delete rules. Fails on restrict.
    fn plan_delete(
        &self,
        tables: &Tables,
        model: &ModelDescriptor,
        indices: Vec<usize>,
        plan: &mut DeletePlan,
    ) -> Result<(), AppError> {
        let table_rows = rows(tables, &model.name);
        for idx in indices {
            if !plan.deletes.entry(model.name.clone()).or_default().insert(idx) {
                continue;
            }
            let Some(row) = table_rows.get(idx) else { continue };
            for (referencing, field) in self.schema.referencing(&model.name) {
                let Some(reference) = &field.references else { continue };
                let key = row.get(&reference.key);
                let dependents: Vec<usize> = rows(tables, &referencing.name)
                    .iter()
                    .enumerate()
                    .filter(|(i, r)| {
                        !plan.is_deleted(&referencing.name, *i) && key_matches(r.get(&field.name), key)
                    })
                    .map(|(i, _)| i)
                    .collect();
                if dependents.is_empty() {
                    continue;
                }
                match reference.on_delete {
                    OnDelete::Restrict => {
                        return Err(AppError::ForeignKeyConstraint(format!(
                            "{}.{} still references {}",
                            referencing.table, field.name, model.table
                        )))
                    }
                    OnDelete::Cascade => self.plan_delete(tables, referencing, dependents, plan)?,
                    OnDelete::SetNull => {
                        if !field.allow_null {
                            return Err(AppError::Validation(vec![FieldError::not_null(&field.name)]));
                        }
                        plan.nulls.extend(
                            dependents
                                .into_iter()
                                .map(|i| (referencing.name.clone(), i, field.name.clone())),
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct DeletePlan {
    deletes: HashMap<String, BTreeSet<usize>>,
    nulls: Vec<(String, usize, String)>,
}

impl DeletePlan {
    fn is_deleted(&self, model: &str, idx: usize) -> bool {
        self.deletes.get(model).map(|s| s.contains(&idx)).unwrap_or(false)
    }
}

fn rows<'a>(tables: &'a Tables, model: &str) -> &'a [Record] {
    tables.get(model).map(|t| t.rows.as_slice()).unwrap_or(&[])
}

fn key_matches(value: Option<&Value>, key: Option<&Value>) -> bool {
    match (value, key) {
        (Some(v), Some(k)) if !v.is_null() && !k.is_null() => values_match(v, k),
        _ => false,
    }
}

fn matching<'a>(tables: &'a Tables, model: &str, field: &'a str, key: Option<&'a Value>) -> impl Iterator<Item = &'a Record> + 'a {
    rows(tables, model)
        .iter()
        .filter(move |r| key_matches(r.get(field), key))
}

fn type_error(type_name: &str, value: &Value) -> AppError {
    AppError::Database(format!("invalid input syntax for type {}: {}", type_name, value))
}

/// Check a value against the field's type, converting numeric and boolean strings.
fn normalize(field: &FieldInfo, value: Value) -> Result<Value, AppError> {
    if value.is_null() {
        return Ok(value);
    }
    match field.field_type {
        FieldType::Integer => match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| type_error("integer", &value)),
            _ => Err(type_error("integer", &value)),
        },
        FieldType::Float => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| type_error("double precision", &value)),
            _ => Err(type_error("double precision", &value)),
        },
        FieldType::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(type_error("boolean", &value)),
        },
        FieldType::Uuid => value
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(|u| Value::String(u.to_string()))
            .ok_or_else(|| type_error("uuid", &value)),
        FieldType::Timestamp => match value.as_str().map(DateTime::parse_from_rfc3339) {
            Some(Ok(_)) => Ok(value),
            _ => Err(type_error("timestamp with time zone", &value)),
        },
        FieldType::Text => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(type_error("text", &other)),
        },
        FieldType::Json => Ok(value),
    }
}

fn check_unique(table_rows: &[Record], model: &ModelDescriptor, record: &Record, skip: Option<usize>) -> Result<(), AppError> {
    let errors: Vec<FieldError> = model
        .fields
        .iter()
        .filter(|f| f.unique || f.name == model.primary_key)
        .filter(|f| {
            let Some(value) = record.get(&f.name).filter(|v| !v.is_null()) else {
                return false;
            };
            table_rows
                .iter()
                .enumerate()
                .any(|(i, r)| Some(i) != skip && r.get(&f.name).map(|v| values_match(v, value)).unwrap_or(false))
        })
        .map(|f| FieldError::unique(&f.name))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::UniqueConstraint(errors))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn dialect(&self) -> Dialect {
        Dialect::Memory
    }

    async fn find_one(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Option<Record>, AppError> {
        tracing::debug!(model = %model.name, conditions = ?query.conditions, "memory find_one");
        let tables = self.read()?;
        Ok(self.select(&tables, model, query).into_iter().next())
    }

    async fn find_all(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Vec<Record>, AppError> {
        tracing::debug!(
            model = %model.name,
            conditions = ?query.conditions,
            limit = ?query.limit,
            offset = ?query.offset,
            "memory find_all"
        );
        let tables = self.read()?;
        Ok(self.select(&tables, model, query))
    }

    async fn count(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError> {
        let tables = self.read()?;
        Ok(rows(&tables, &model.name).iter().filter(|r| query.matches(r)).count() as u64)
    }

    async fn create(&self, model: &ModelDescriptor, input: Record, query: &QueryDescriptor) -> Result<Record, AppError> {
        tracing::debug!(model = %model.name, "memory create");
        let mut tables = self.write()?;

        let mut row = Record::new();
        for (name, value) in prepare_insert(model, input) {
            let field = model
                .field(&name)
                .ok_or_else(|| AppError::Internal(format!("unknown field {}", name)))?;
            row.insert(name, normalize(field, value)?);
        }
        let auto_increment = model
            .fields
            .iter()
            .find(|f| f.generated == Some(Generated::AutoIncrement));
        if let Some(field) = auto_increment {
            if row.get(&field.name).map(Value::is_null).unwrap_or(true) {
                let next_id = tables.get(&model.name).map(|t| t.next_id).unwrap_or(1);
                row.insert(field.name.clone(), Value::Number(next_id.into()));
            }
        }

        RecordValidator::validate(model, &row)?;
        check_unique(rows(&tables, &model.name), model, &row, None)?;
        self.check_references(&tables, model, &row)?;

        let table = tables.entry(model.name.clone()).or_default();
        let used_id = auto_increment.and_then(|f| row.get(&f.name)).and_then(Value::as_i64);
        if let Some(id) = used_id {
            table.next_id = table.next_id.max(id.saturating_add(1));
        }
        table.rows.push(row.clone());
        Ok(project(row, query.attributes.as_deref()))
    }

    async fn update(&self, model: &ModelDescriptor, id: &Value, record: Record) -> Result<Record, AppError> {
        tracing::debug!(model = %model.name, id = %id, "memory update");
        let mut tables = self.write()?;
        let table_rows = rows(&tables, &model.name);
        let idx = table_rows
            .iter()
            .position(|r| key_matches(r.get(&model.primary_key), Some(id)))
            .ok_or(AppError::NotFound)?;

        let mut changes = Record::new();
        for (name, value) in model_fields(model, record) {
            let Some(field) = model.field(&name) else { continue };
            changes.insert(name, normalize(field, value)?);
        }
        let row = merge_update(model, table_rows[idx].clone(), changes);

        RecordValidator::validate(model, &row)?;
        check_unique(table_rows, model, &row, Some(idx))?;
        self.check_references(&tables, model, &row)?;

        let old_key = table_rows[idx].get(&model.primary_key);
        let key_changed = !key_matches(row.get(&model.primary_key), old_key);
        if key_changed {
            for (referencing, field) in self.schema.referencing(&model.name) {
                let referenced_key = field.references.as_ref().map(|r| r.key.as_str());
                if referenced_key != Some(model.primary_key.as_str()) {
                    continue;
                }
                if matching(&tables, &referencing.name, &field.name, old_key).next().is_some() {
                    return Err(AppError::ForeignKeyConstraint(format!(
                        "{}.{} still references {}",
                        referencing.table, field.name, model.table
                    )));
                }
            }
        }

        let table = tables
            .get_mut(&model.name)
            .ok_or_else(|| AppError::Internal(format!("unknown model {}", model.name)))?;
        table.rows[idx] = row.clone();
        Ok(row)
    }

    async fn destroy(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError> {
        tracing::debug!(model = %model.name, conditions = ?query.conditions, "memory destroy");
        let mut tables = self.write()?;
        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let targets: Vec<usize> = rows(&tables, &model.name)
            .iter()
            .enumerate()
            .filter(|(_, r)| query.matches(r))
            .skip(offset)
            .take(limit)
            .map(|(i, _)| i)
            .collect();
        let deleted = targets.len() as u64;

        let mut plan = DeletePlan::default();
        self.plan_delete(&tables, model, targets, &mut plan)?;

        for (name, idx, field) in &plan.nulls {
            if plan.is_deleted(name, *idx) {
                continue;
            }
            if let Some(row) = tables.get_mut(name).and_then(|t| t.rows.get_mut(*idx)) {
                row.insert(field.clone(), Value::Null);
            }
        }
        for (name, indices) in &plan.deletes {
            if let Some(table) = tables.get_mut(name) {
                for idx in indices.iter().rev() {
                    if *idx < table.rows.len() {
                        table.rows.remove(*idx);
                    }
                }
            }
        }
        if plan.deletes.len() > 1 || !plan.nulls.is_empty() {
            tracing::debug!(model = %model.name, touched = plan.deletes.len(), "cascaded delete");
        }
        Ok(deleted)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("models", &self.schema.models.len())
            .finish()
    }
}
