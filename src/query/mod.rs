//! Query descriptors: what a request asks of the store, built without I/O.

use crate::config::ControllerConfig;
use crate::extractors::ResourceRequest;
use crate::schema::{values_match, ModelDescriptor};
use axum::http::Method;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq(Value),
    /// SQL-style pattern: `%` any run, `_` any single character.
    Like { pattern: String, case_insensitive: bool },
}

impl Condition {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Condition::Eq(Value::Null), None | Some(Value::Null)) => true,
            (Condition::Eq(_), None) => false,
            (Condition::Eq(expected), Some(actual)) => values_match(expected, actual),
            (Condition::Like { pattern, case_insensitive }, Some(actual)) => {
                let text = match actual {
                    Value::String(s) => s.clone(),
                    Value::Null => return false,
                    other => other.to_string(),
                };
                like_match(pattern, &text, *case_insensitive)
            }
            (Condition::Like { .. }, None) => false,
        }
    }
}

/// SQL LIKE semantics over chars.
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let fold = |s: &str| -> Vec<char> {
        if case_insensitive {
            s.to_lowercase().chars().collect()
        } else {
            s.chars().collect()
        }
    };
    let p = fold(pattern);
    let t = fold(text);
    // Iterative wildcard match with single backtrack point.
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '%')
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryDescriptor {
    pub conditions: BTreeMap<String, Condition>,
    /// Association names to eager-load.
    pub include: Vec<String>,
    /// Projection; `None` returns every field.
    pub attributes: Option<Vec<String>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Return the written row (creates).
    pub returning: bool,
}

impl QueryDescriptor {
    pub fn matches(&self, record: &serde_json::Map<String, Value>) -> bool {
        self.conditions
            .iter()
            .all(|(field, condition)| condition.matches(record.get(field)))
    }
}

fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')
        .filter(|f| !f.is_empty())
}

fn parse_attributes(raw: &str, model: &ModelDescriptor) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    for segment in raw.split(',') {
        let segment = segment.trim();
        if segment.is_empty() || !model.has_field(segment) {
            return None;
        }
        fields.push(segment.to_string());
    }
    Some(fields)
}

/// Translate a request into a query descriptor for `model`.
pub fn build_query(
    method: &Method,
    request: &ResourceRequest,
    model: &ModelDescriptor,
    config: &ControllerConfig,
) -> QueryDescriptor {
    let mut query = QueryDescriptor::default();

    if let Some(id) = &request.id {
        query
            .conditions
            .insert(model.primary_key.clone(), Condition::Eq(model.coerce(&model.primary_key, id)));
    }

    if *method == Method::POST {
        query.returning = true;
    } else if *method == Method::DELETE {
        query.limit = Some(1);
    } else if *method == Method::GET {
        apply_modifiers(&mut query, request, model, config);
        if request.id.is_some() || config.include_relations_in_get_all {
            query.include = config.relationships.clone();
        }
    }

    config.hooks.run_before_query(&mut query, request);
    query
}

fn apply_modifiers(query: &mut QueryDescriptor, request: &ResourceRequest, model: &ModelDescriptor, config: &ControllerConfig) {
    let requested_limit = request.query_param("limit").and_then(|v| v.trim().parse::<u64>().ok());
    query.limit = match (config.limit, requested_limit) {
        (Some(ceiling), Some(requested)) => Some(ceiling.min(requested)),
        (ceiling, requested) => ceiling.or(requested),
    };
    query.offset = request.query_param("offset").and_then(|v| v.trim().parse::<u64>().ok());

    for (key, value) in &request.query {
        if let Some(field) = bracketed(key, "filter") {
            if model.has_field(field) && field != model.primary_key {
                query
                    .conditions
                    .insert(field.to_string(), Condition::Eq(model.coerce(field, value)));
            }
        } else if let Some(field) = bracketed(key, "search") {
            if model.has_field(field) && field != model.primary_key {
                query.conditions.insert(
                    field.to_string(),
                    Condition::Like {
                        pattern: format!("%{}%", value),
                        case_insensitive: !config.use_like,
                    },
                );
            }
        }
    }

    if let Some(raw) = request.query_param("attributes") {
        query.attributes = parse_attributes(raw, model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControllerOptions, Hooks};
    use crate::schema::{resolve, FieldConfig, FieldType, ModelConfig};
    use serde_json::json;
    use std::sync::Arc;

    fn author() -> Arc<ModelDescriptor> {
        let schema = resolve(&[ModelConfig::new("author")
            .field(FieldConfig::new("name", FieldType::Text))
            .field(FieldConfig::new("age", FieldType::Integer))])
        .unwrap();
        schema.model("author").unwrap().clone()
    }

    fn get(uri: &str) -> ResourceRequest {
        ResourceRequest::new(Method::GET, uri.parse().unwrap())
    }

    fn config(options: ControllerOptions) -> ControllerConfig {
        ControllerConfig::reduce([&options])
    }

    #[test]
    fn path_id_is_coerced_primary_key_condition() {
        let q = build_query(&Method::GET, &get("/1").with_id("1"), &author(), &config(ControllerOptions::new()));
        assert_eq!(q.conditions.get("id"), Some(&Condition::Eq(json!(1))));
    }

    #[test]
    fn non_numeric_id_stays_a_string() {
        let q = build_query(&Method::GET, &get("/abc").with_id("abc"), &author(), &config(ControllerOptions::new()));
        assert_eq!(q.conditions.get("id"), Some(&Condition::Eq(json!("abc"))));
    }

    #[test]
    fn limit_is_capped_by_ceiling() {
        let model = author();
        let capped = config(ControllerOptions::new().limit(1));
        assert_eq!(build_query(&Method::GET, &get("/?limit=10"), &model, &capped).limit, Some(1));
        assert_eq!(build_query(&Method::GET, &get("/"), &model, &capped).limit, Some(1));

        let open = config(ControllerOptions::new());
        assert_eq!(build_query(&Method::GET, &get("/?limit=10"), &model, &open).limit, Some(10));
        assert_eq!(build_query(&Method::GET, &get("/?limit=ten"), &model, &open).limit, None);
        assert_eq!(build_query(&Method::GET, &get("/?offset=3"), &model, &open).offset, Some(3));
    }

    #[test]
    fn filter_and_search_translate() {
        let q = build_query(
            &Method::GET,
            &get("/?filter[age]=40&search[name]=bu&filter[unknown]=x"),
            &author(),
            &config(ControllerOptions::new()),
        );
        assert_eq!(q.conditions.get("age"), Some(&Condition::Eq(json!(40))));
        assert_eq!(
            q.conditions.get("name"),
            Some(&Condition::Like {
                pattern: "%bu%".into(),
                case_insensitive: false,
            })
        );
        assert!(!q.conditions.contains_key("unknown"));
    }

    #[test]
    fn search_is_case_insensitive_without_like() {
        let q = build_query(&Method::GET, &get("/?search[name]=b"), &author(), &config(ControllerOptions::new().use_like(false)));
        assert!(matches!(q.conditions.get("name"), Some(Condition::Like { case_insensitive: true, .. })));
    }

    #[test]
    fn later_parameter_wins_on_same_field() {
        let model = author();
        let cfg = config(ControllerOptions::new());
        let q = build_query(&Method::GET, &get("/?search[name]=b&filter[name]=Bud"), &model, &cfg);
        assert_eq!(q.conditions.get("name"), Some(&Condition::Eq(json!("Bud"))));
        let q = build_query(&Method::GET, &get("/?filter[name]=Bud&search[name]=b"), &model, &cfg);
        assert!(matches!(q.conditions.get("name"), Some(Condition::Like { .. })));
    }

    #[test]
    fn primary_key_is_ignored_from_query_string() {
        let q = build_query(&Method::GET, &get("/?filter[id]=1&search[id]=1"), &author(), &config(ControllerOptions::new()));
        assert!(q.conditions.is_empty());
    }

    #[test]
    fn attributes_projection_and_malformed() {
        let model = author();
        let cfg = config(ControllerOptions::new());
        let q = build_query(&Method::GET, &get("/?attributes=id,name"), &model, &cfg);
        assert_eq!(q.attributes, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(build_query(&Method::GET, &get("/?attributes=id,,name"), &model, &cfg).attributes, None);
        assert_eq!(build_query(&Method::GET, &get("/?attributes=nope"), &model, &cfg).attributes, None);
    }

    #[test]
    fn method_specific_flags() {
        let model = author();
        let cfg = config(ControllerOptions::new().limit(5));
        let post = build_query(&Method::POST, &ResourceRequest::new(Method::POST, "/?limit=2".parse().unwrap()), &model, &cfg);
        assert!(post.returning);
        assert_eq!(post.limit, None);

        let del = build_query(
            &Method::DELETE,
            &ResourceRequest::new(Method::DELETE, "/1".parse().unwrap()).with_id("1"),
            &model,
            &cfg,
        );
        assert_eq!(del.limit, Some(1));
        assert!(!del.returning);
    }

    #[test]
    fn includes_on_get_by_id_only_unless_configured() {
        let model = author();
        let cfg = config(ControllerOptions::new().relationships(["posts"]));
        assert!(build_query(&Method::GET, &get("/"), &model, &cfg).include.is_empty());
        assert_eq!(build_query(&Method::GET, &get("/1").with_id("1"), &model, &cfg).include, ["posts"]);

        let all = config(ControllerOptions::new().relationships(["posts"]).include_relations_in_get_all(true));
        assert_eq!(build_query(&Method::GET, &get("/"), &model, &all).include, ["posts"]);
    }

    #[test]
    fn before_query_hook_runs_last() {
        let hooks = Hooks::default().before_query(|q, _req| {
            q.limit = Some(99);
        });
        let cfg = config(ControllerOptions::new().limit(1).hooks(hooks));
        assert_eq!(build_query(&Method::GET, &get("/"), &author(), &cfg).limit, Some(99));
    }

    #[test]
    fn like_semantics() {
        assert!(like_match("%ud%", "Bud", false));
        assert!(!like_match("%UD%", "Bud", false));
        assert!(like_match("%UD%", "Bud", true));
        assert!(like_match("B_d", "Bud", false));
        assert!(!like_match("B_d", "Budd", false));
        assert!(like_match("%", "", false));
        assert!(like_match("%a%b%", "xaxxbx", false));
    }
}
