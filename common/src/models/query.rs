//! Query models.
//!
//! A query is a stored, parameterised operation against a datasource. The
//! runner types describe the contract with the external execution engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use super::datasource::Datasource;

/// CRUD-style verb of a query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryVerb {
    Create,
    Read,
    Update,
    Delete,
}

/// Declared query parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct QueryParameter {
    pub name: String,
    #[serde(default)]
    pub default: Value,
}

/// Stored query document.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    #[validate(length(min = 1, message = "datasourceId is required"))]
    pub datasource_id: String,

    #[validate(length(min = 1, message = "Query name is required"))]
    pub name: String,

    pub query_verb: QueryVerb,

    /// Datasource-specific query definition (SQL, REST path, bucket...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<QueryParameter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// Set on READ queries when returned to a caller; never stored.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub readable: Option<bool>,
}

impl Query {
    /// Flags READ queries as readable.
    pub fn enrich(mut self) -> Self {
        if self.query_verb == QueryVerb::Read {
            self.readable = Some(true);
        }
        self
    }

    /// Removes the members that could expose datasource internals to a live app.
    pub fn strip_internals(mut self) -> Self {
        self.fields = None;
        self.parameters = None;
        self
    }

    /// Caller-supplied parameter values completed with declared defaults.
    ///
    /// A value counts as missing when it is absent, `null` or an empty string.
    pub fn parameters_with_defaults(
        &self,
        supplied: HashMap<String, Value>,
    ) -> HashMap<String, Value> {
        let mut enriched = supplied;
        for parameter in self.parameters.iter().flatten() {
            let missing = match enriched.get(&parameter.name) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if missing {
                enriched.insert(parameter.name.clone(), parameter.default.clone());
            }
        }
        enriched
    }
}

/// Body of a preview request: an unsaved query plus its target datasource.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub datasource_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub query_verb: QueryVerb,
    #[serde(default)]
    pub fields: Value,
    /// Parameter values by name.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub transformer: Option<String>,
    /// Id of the query being edited, when it has been saved before.
    #[serde(default)]
    pub query_id: Option<String>,
}

/// Result of a preview run.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub rows: Vec<Value>,
    pub schema_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Body of an execute request.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub pagination: Option<Value>,
}

/// Input handed to the query runner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_id: String,
    pub datasource: Datasource,
    pub query_verb: QueryVerb,
    pub fields: Value,
    pub parameters: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
}

/// Output of the query runner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub info: Option<Value>,
    #[serde(default)]
    pub extra: Option<Map<String, Value>>,
    #[serde(default)]
    pub pagination: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(verb: QueryVerb) -> Query {
        serde_json::from_value(json!({
            "_id": "query_ds_1",
            "datasourceId": "ds",
            "name": "users",
            "queryVerb": verb,
            "fields": { "sql": "select * from users limit {{ limit }}" },
            "parameters": [
                { "name": "limit", "default": 10 },
                { "name": "offset", "default": "0" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_only_read_queries_become_readable() {
        assert_eq!(query(QueryVerb::Read).enrich().readable, Some(true));
        for verb in [QueryVerb::Create, QueryVerb::Update, QueryVerb::Delete] {
            assert_eq!(query(verb).enrich().readable, None);
        }
    }

    #[test]
    fn test_stored_readable_flag_is_ignored() {
        let q: Query = serde_json::from_value(json!({
            "datasourceId": "ds",
            "name": "create",
            "queryVerb": "create",
            "readable": true
        }))
        .unwrap();
        assert_eq!(q.enrich().readable, None);
    }

    #[test]
    fn test_missing_parameters_take_defaults() {
        let q = query(QueryVerb::Read);
        let mut supplied = HashMap::new();
        supplied.insert("offset".to_string(), json!("20"));
        let enriched = q.parameters_with_defaults(supplied);
        assert_eq!(enriched["limit"], json!(10));
        assert_eq!(enriched["offset"], json!("20"));
    }

    #[test]
    fn test_empty_and_null_values_take_defaults() {
        let q = query(QueryVerb::Read);
        let mut supplied = HashMap::new();
        supplied.insert("limit".to_string(), Value::Null);
        supplied.insert("offset".to_string(), json!(""));
        supplied.insert("extra".to_string(), json!(true));
        let enriched = q.parameters_with_defaults(supplied);
        assert_eq!(enriched["limit"], json!(10));
        assert_eq!(enriched["offset"], json!("0"));
        assert_eq!(enriched["extra"], json!(true));
    }

    #[test]
    fn test_strip_internals_drops_fields_and_parameters() {
        let value = serde_json::to_value(query(QueryVerb::Read).strip_internals()).unwrap();
        assert!(value.get("fields").is_none());
        assert!(value.get("parameters").is_none());
        assert_eq!(value["name"], "users");
    }
}
