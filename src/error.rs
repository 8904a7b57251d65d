//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::error::ErrorKind;
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

/// Raised synchronously while resolving models or building controllers and routers.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("'model' must be a valid model: {0}")]
    InvalidModel(String),
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: model {model} field {field}")]
    InvalidPrimaryKey { model: String, field: String },
    #[error("duplicate model: {0}")]
    DuplicateModel(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("config load: {0}")]
    Load(String),
}

/// One violated field: `{message, field}` in the response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub message: String,
    pub field: String,
}

impl FieldError {
    pub fn new(message: impl Into<String>, field: impl Into<String>) -> Self {
        FieldError {
            message: message.into(),
            field: field.into(),
        }
    }

    pub fn not_null(field: &str) -> Self {
        FieldError::new(format!("{} cannot be null", field), field)
    }

    pub fn unique(field: &str) -> Self {
        FieldError::new(format!("{} must be unique", field), field)
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("record not found")]
    NotFound,
    #[error("validation: {}", join_fields(.0))]
    Validation(Vec<FieldError>),
    #[error("unique constraint: {}", join_fields(.0))]
    UniqueConstraint(Vec<FieldError>),
    /// Carries the store's detail for logging; the client only sees a fixed message.
    #[error("foreign key constraint error: {0}")]
    ForeignKeyConstraint(String),
    #[error("{0}")]
    Database(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(message, field)])
    }

    /// Status and body for this failure. Matches on the variant only.
    pub fn classify(&self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, ErrorBody::message("record not found")),
            AppError::Validation(fields) | AppError::UniqueConstraint(fields) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorBody::fields(fields))
            }
            AppError::ForeignKeyConstraint(_) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::message("foreign key constraint error"),
            ),
            AppError::Database(message) => (StatusCode::UNPROCESSABLE_ENTITY, ErrorBody::message(message)),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, ErrorBody::message(message)),
            AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::message(self.to_string()),
            ),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        let sqlx::Error::Database(db) = &e else {
            return match e {
                sqlx::Error::RowNotFound => AppError::NotFound,
                other => AppError::Internal(other.to_string()),
            };
        };
        let column = db
            .try_downcast_ref::<PgDatabaseError>()
            .and_then(PgDatabaseError::column)
            .map(str::to_string);
        match db.kind() {
            ErrorKind::UniqueViolation => {
                let field = column
                    .or_else(|| db.constraint().map(str::to_string))
                    .unwrap_or_default();
                AppError::UniqueConstraint(vec![FieldError::unique(&field)])
            }
            ErrorKind::ForeignKeyViolation => AppError::ForeignKeyConstraint(db.message().to_string()),
            ErrorKind::NotNullViolation => {
                let field = column.unwrap_or_default();
                AppError::Validation(vec![FieldError::not_null(&field)])
            }
            _ => AppError::Database(db.message().to_string()),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorBody {
    fn message(message: impl Into<String>) -> Self {
        ErrorBody {
            errors: vec![ErrorEntry {
                message: message.into(),
                field: None,
            }],
        }
    }

    fn fields(fields: &[FieldError]) -> Self {
        ErrorBody {
            errors: fields
                .iter()
                .map(|f| ErrorEntry {
                    message: f.message.clone(),
                    field: Some(f.field.clone()),
                })
                .collect(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.classify();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}
