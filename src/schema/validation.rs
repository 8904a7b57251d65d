//! Record validation from field definitions: nullability and per-field rules.
//! Runs in the model layer before any write, whichever store is behind it.

use crate::error::{AppError, FieldError};
use crate::schema::{FieldInfo, ModelDescriptor, ValidationRule};
use crate::store::Record;
use regex::Regex;
use serde_json::Value;

pub struct RecordValidator;

impl RecordValidator {
    /// Validate a full row. Collects at most one error per violated field.
    pub fn validate(model: &ModelDescriptor, record: &Record) -> Result<(), AppError> {
        let mut errors = Vec::new();
        for field in &model.fields {
            let error = match record.get(&field.name) {
                None if field.has_default() || field.allow_null => None,
                None => Some(FieldError::not_null(&field.name)),
                Some(Value::Null) if field.allow_null || field.generated.is_some() => None,
                Some(Value::Null) => Some(FieldError::not_null(&field.name)),
                Some(v) => field
                    .validate
                    .as_ref()
                    .and_then(|rule| check_rule(field, v, rule).err()),
            };
            errors.extend(error);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

fn check_rule(field: &FieldInfo, v: &Value, rule: &ValidationRule) -> Result<(), FieldError> {
    let col = field.name.as_str();
    let fail = |message: String| -> Result<(), FieldError> { Err(FieldError::new(message, col)) };
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let (Some(max), Some(s)) = (rule.max_length, v.as_str()) {
        if s.chars().count() > max as usize {
            return fail(format!("{} must be at most {} characters", col, max));
        }
    }
    if let (Some(min), Some(s)) = (rule.min_length, v.as_str()) {
        if s.chars().count() < min as usize {
            return fail(format!("{} must be at least {} characters", col, min));
        }
    }
    if let Some(pattern) = &rule.pattern {
        let re = Regex::new(pattern).map_err(|_| FieldError::new(format!("invalid pattern for {}", col), col))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return fail(format!("{} does not match required pattern", col));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return fail(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            ));
        }
    }
    if let (Some(min), Some(n)) = (rule.minimum, v.as_f64()) {
        if n < min {
            return fail(format!("{} must be at least {}", col, min));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, v.as_f64()) {
        if n > max {
            return fail(format!("{} must be at most {}", col, max));
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), FieldError> {
    let Some(s) = v.as_str() else {
        return Ok(());
    };
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = s
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
                .unwrap_or(false);
            if !valid {
                return Err(FieldError::new(format!("{} must be a valid email", col), col));
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err(FieldError::new(format!("{} must be a valid UUID", col), col));
            }
        }
        _ => {}
    }
    Ok(())
}
