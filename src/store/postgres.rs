//! PostgreSQL record store over sqlx. Statements come from `crate::sql`; tables are expected to exist.

use crate::error::AppError;
use crate::query::QueryDescriptor;
use crate::schema::{ModelDescriptor, RecordValidator, Schema};
use crate::sql::{self, PgBindValue, QueryBuf};
use crate::store::{merge_update, prepare_insert, Dialect, Record, RecordStore};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::PgPool;

pub struct PgStore {
    pool: PgPool,
    schema: Schema,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: Schema) -> Self {
        PgStore { pool, schema }
    }

    pub async fn connect(database_url: &str, schema: Schema) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;
        Ok(Self::new(pool, schema))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn bind(q: &QueryBuf) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        q.params
            .iter()
            .fold(sqlx::query(&q.sql), |query, p| query.bind(PgBindValue::from(p)))
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        let rows = Self::bind(q).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Record>, AppError> {
        let row = Self::bind(q).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_record))
    }
}

#[async_trait]
impl RecordStore for PgStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn find_one(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Option<Record>, AppError> {
        let query = QueryDescriptor {
            limit: Some(1),
            ..query.clone()
        };
        self.query_optional(&sql::select(&self.schema, model, &query)).await
    }

    async fn find_all(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<Vec<Record>, AppError> {
        self.query_many(&sql::select(&self.schema, model, query)).await
    }

    async fn count(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError> {
        use sqlx::Row;
        let q = sql::count(model, query);
        let row = Self::bind(&q).fetch_one(&self.pool).await?;
        let n: i64 = row.try_get(0)?;
        Ok(n.max(0) as u64)
    }

    async fn create(&self, model: &ModelDescriptor, input: Record, query: &QueryDescriptor) -> Result<Record, AppError> {
        let row = prepare_insert(model, input);
        RecordValidator::validate(model, &row)?;
        let q = sql::insert(model, &row, true);
        let created = self.query_optional(&q).await?.ok_or(AppError::NotFound)?;
        Ok(crate::store::project(created, query.attributes.as_deref()))
    }

    async fn update(&self, model: &ModelDescriptor, id: &Value, record: Record) -> Result<Record, AppError> {
        let row = merge_update(model, Record::new(), record);
        RecordValidator::validate(model, &row)?;
        self.query_optional(&sql::update(model, id, &row))
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn destroy(&self, model: &ModelDescriptor, query: &QueryDescriptor) -> Result<u64, AppError> {
        let q = sql::delete(model, query);
        let result = Self::bind(&q).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("models", &self.schema.models.len())
            .finish()
    }
}

fn row_to_record(row: &PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.name())))
        .collect()
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
