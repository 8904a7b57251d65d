//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a model and a query descriptor.

use crate::query::{Condition, QueryDescriptor};
use crate::schema::{Association, Cardinality, FieldInfo, FieldType, ModelDescriptor, Schema};
use crate::store::Record;
use serde_json::Value;

const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: names are validated identifiers).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn column(alias: &str, name: &str) -> String {
    format!("{}.{}", alias, quoted(name))
}

fn pg_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Integer => "bigint",
        FieldType::Float => "double precision",
        FieldType::Text => "text",
        FieldType::Boolean => "boolean",
        FieldType::Uuid => "uuid",
        FieldType::Timestamp => "timestamptz",
        FieldType::Json => "jsonb",
    }
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Placeholder cast to the field's column type so string values bind correctly.
    fn typed_param(&mut self, field: Option<&FieldInfo>, v: Value) -> String {
        let n = self.push_param(v);
        match field {
            Some(f) => format!("${}::{}", n, pg_type(f.field_type)),
            None => format!("${}", n),
        }
    }
}

fn select_column_list(model: &ModelDescriptor, alias: &str, attributes: Option<&[String]>) -> String {
    model
        .fields
        .iter()
        .filter(|f| attributes.map(|a| a.iter().any(|n| *n == f.name)).unwrap_or(true))
        .map(|f| format!("{} AS {}", column(alias, &f.name), quoted(&f.name)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(q: &mut QueryBuf, model: &ModelDescriptor, query: &QueryDescriptor) -> String {
    let parts: Vec<String> = query
        .conditions
        .iter()
        .map(|(name, condition)| {
            let col = column(MAIN_ALIAS, name);
            match condition {
                Condition::Eq(Value::Null) => format!("{} IS NULL", col),
                Condition::Eq(v) => {
                    let ph = q.typed_param(model.field(name), v.clone());
                    format!("{} = {}", col, ph)
                }
                Condition::Like { pattern, case_insensitive } => {
                    let n = q.push_param(Value::String(pattern.clone()));
                    let op = if *case_insensitive { "ILIKE" } else { "LIKE" };
                    format!("{}::text {} ${}::text", col, op, n)
                }
            }
        })
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// Scalar subquery loading one association of the row aliased `main`, as json.
fn include_subquery(schema: &Schema, model: &ModelDescriptor, assoc: &Association) -> Option<String> {
    let target = schema.model(&assoc.target)?;
    let cols = select_column_list(target, "t", None);
    let table = quoted(&target.table);
    let order = column("t", &target.primary_key);
    let many = |from: String| {
        format!(
            "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT {} FROM {} ORDER BY {}) sub)",
            cols, from, order
        )
    };
    let one = |from: String| format!("(SELECT row_to_json(sub) FROM (SELECT {} FROM {} LIMIT 1) sub)", cols, from);
    let pk = column(MAIN_ALIAS, &model.primary_key);
    Some(match (assoc.cardinality, &assoc.through) {
        (Cardinality::HasMany, Some(through)) => {
            let pivot = schema
                .models
                .iter()
                .find(|m| m.name == *through || m.table == *through)?;
            let link = pivot.fields.iter().find(|f| {
                f.name != assoc.foreign_key && f.references.as_ref().map(|r| r.model == target.name).unwrap_or(false)
            })?;
            let key = link.references.as_ref().map(|r| r.key.as_str()).unwrap_or(target.primary_key.as_str());
            many(format!(
                "{} t JOIN {} p ON {} = {} WHERE {} = {}",
                table,
                quoted(&pivot.table),
                column("p", &link.name),
                column("t", key),
                column("p", &assoc.foreign_key),
                pk
            ))
        }
        (Cardinality::HasMany, None) => many(format!("{} t WHERE {} = {}", table, column("t", &assoc.foreign_key), pk)),
        (Cardinality::HasOne, _) => one(format!("{} t WHERE {} = {}", table, column("t", &assoc.foreign_key), pk)),
        (Cardinality::BelongsTo, _) => one(format!(
            "{} t WHERE {} = {}",
            table,
            column("t", &target.primary_key),
            column(MAIN_ALIAS, &assoc.foreign_key)
        )),
    })
}

/// SELECT with conditions, projection, includes (json subqueries), ORDER BY pk, LIMIT/OFFSET.
pub fn select(schema: &Schema, model: &ModelDescriptor, query: &QueryDescriptor) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut select_parts = vec![select_column_list(model, MAIN_ALIAS, query.attributes.as_deref())];
    for name in &query.include {
        let Some(assoc) = model.association(name) else { continue };
        if let Some(sub) = include_subquery(schema, model, assoc) {
            select_parts.push(format!("{} AS {}", sub, quoted(&assoc.name)));
        }
    }
    let where_sql = where_clause(&mut q, model, query);
    let limit = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {} {}{} ORDER BY {}{}{}",
        select_parts.join(", "),
        quoted(&model.table),
        MAIN_ALIAS,
        where_sql,
        column(MAIN_ALIAS, &model.primary_key),
        limit,
        offset
    );
    q
}

pub fn count(model: &ModelDescriptor, query: &QueryDescriptor) -> QueryBuf {
    let mut q = QueryBuf::default();
    let where_sql = where_clause(&mut q, model, query);
    q.sql = format!("SELECT COUNT(*) FROM {} {}{}", quoted(&model.table), MAIN_ALIAS, where_sql);
    q
}

/// INSERT of the row's fields. Columns left out (auto-increment keys) take the table default.
pub fn insert(model: &ModelDescriptor, row: &Record, returning: bool) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for field in &model.fields {
        let Some(v) = row.get(&field.name) else { continue };
        cols.push(quoted(&field.name));
        placeholders.push(q.typed_param(Some(field), v.clone()));
    }
    let table = format!("{} AS {}", quoted(&model.table), MAIN_ALIAS);
    let returning = if returning {
        format!(" RETURNING {}", select_column_list(model, MAIN_ALIAS, None))
    } else {
        String::new()
    };
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES{}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE the row stored under `id`, setting every field the row carries.
pub fn update(model: &ModelDescriptor, id: &Value, row: &Record) -> QueryBuf {
    let mut q = QueryBuf::default();
    let sets: Vec<String> = model
        .fields
        .iter()
        .filter_map(|field| {
            let v = row.get(&field.name)?;
            Some(format!("{} = {}", quoted(&field.name), q.typed_param(Some(field), v.clone())))
        })
        .collect();
    let id_ph = q.typed_param(model.primary_key_field(), id.clone());
    let returning = select_column_list(model, MAIN_ALIAS, None);
    let pk = column(MAIN_ALIAS, &model.primary_key);
    q.sql = if sets.is_empty() {
        format!("SELECT {} FROM {} {} WHERE {} = {}", returning, quoted(&model.table), MAIN_ALIAS, pk, id_ph)
    } else {
        format!(
            "UPDATE {} {} SET {} WHERE {} = {} RETURNING {}",
            quoted(&model.table),
            MAIN_ALIAS,
            sets.join(", "),
            pk,
            id_ph,
            returning
        )
    };
    q
}

/// DELETE matching rows; a limit goes through a ctid subselect since DELETE has no LIMIT.
pub fn delete(model: &ModelDescriptor, query: &QueryDescriptor) -> QueryBuf {
    let mut q = QueryBuf::default();
    let table = quoted(&model.table);
    let where_sql = where_clause(&mut q, model, query);
    q.sql = match query.limit {
        Some(n) => format!(
            "DELETE FROM {t} WHERE ctid IN (SELECT {m}.ctid FROM {t} {m}{w} LIMIT {n})",
            t = table,
            m = MAIN_ALIAS,
            w = where_sql,
            n = n
        ),
        None => format!("DELETE FROM {} {}{}", table, MAIN_ALIAS, where_sql),
    };
    q
}
