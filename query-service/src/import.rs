//! Bulk import of REST queries from an API description.
//!
//! Understands OpenAPI 3 and Swagger 2 documents in JSON form. Every
//! path/method pair becomes one query against a REST datasource.

use serde::Serialize;
use serde_json::{json, Map, Value};
use utoipa::ToSchema;

use common::errors::{AppError, AppResult};
use common::models::{Query, QueryParameter, QueryVerb};
use common::store::AppDb;
use common::utils::IdGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    OpenApi3,
    Swagger2,
}

/// Connection details read from an API description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    pub url: String,
    pub name: String,
}

/// A query that could not be stored.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub queries: Vec<Query>,
    pub error_queries: Vec<ImportFailure>,
}

/// Importer for REST API descriptions.
#[derive(Debug)]
pub struct RestImporter {
    format: Format,
    doc: Value,
}

impl RestImporter {
    /// Parses and recognises the import payload.
    pub fn init(data: &str) -> AppResult<Self> {
        let doc: Value = serde_json::from_str(data).map_err(|e| {
            AppError::BadRequest(format!("Import data is not a valid API description: {}", e))
        })?;

        let format = if doc
            .get("openapi")
            .and_then(Value::as_str)
            .is_some_and(|v| v.starts_with('3'))
        {
            Format::OpenApi3
        } else if doc.get("swagger").and_then(Value::as_str) == Some("2.0") {
            Format::Swagger2
        } else {
            return Err(AppError::BadRequest(
                "Unsupported import format: expected OpenAPI 3 or Swagger 2".to_string(),
            ));
        };

        Ok(Self { format, doc })
    }

    /// Base url and display name of the described API.
    pub fn info(&self) -> ImportInfo {
        let name = self
            .doc
            .pointer("/info/title")
            .and_then(Value::as_str)
            .unwrap_or("Imported API")
            .to_string();
        ImportInfo {
            url: self.base_url(),
            name,
        }
    }

    fn base_url(&self) -> String {
        let url = match self.format {
            Format::OpenApi3 => self
                .doc
                .pointer("/servers/0/url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            Format::Swagger2 => {
                let host = self.doc.get("host").and_then(Value::as_str).unwrap_or_default();
                if host.is_empty() {
                    String::new()
                } else {
                    let scheme = self
                        .doc
                        .pointer("/schemes/0")
                        .and_then(Value::as_str)
                        .unwrap_or("https");
                    let base_path = self.doc.get("basePath").and_then(Value::as_str).unwrap_or("");
                    format!("{}://{}{}", scheme, host, base_path)
                }
            }
        };
        url.trim_end_matches('/').to_string()
    }

    /// Builds one query per path and method, without storing anything.
    pub fn queries(&self, datasource_id: &str) -> Vec<Query> {
        let base_url = self.base_url();
        let Some(paths) = self.doc.get("paths").and_then(Value::as_object) else {
            return Vec::new();
        };

        let mut queries = Vec::new();
        for (path, item) in paths {
            let shared = item.get("parameters").and_then(Value::as_array);
            for (method, operation) in item.as_object().into_iter().flatten() {
                let Some(verb) = verb_for(method) else {
                    continue;
                };
                let mut parameters: Vec<&Value> = shared.into_iter().flatten().collect();
                parameters.extend(
                    operation
                        .get("parameters")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten(),
                );
                queries.push(self.build_query(
                    datasource_id,
                    &base_url,
                    path,
                    method,
                    verb,
                    operation,
                    &parameters,
                ));
            }
        }
        queries
    }

    #[allow(clippy::too_many_arguments)]
    fn build_query(
        &self,
        datasource_id: &str,
        base_url: &str,
        path: &str,
        method: &str,
        verb: QueryVerb,
        operation: &Value,
        parameters: &[&Value],
    ) -> Query {
        let name = operation
            .get("operationId")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("{} {}", method.to_uppercase(), path));

        let mut declared = Vec::new();
        let mut query_string = Vec::new();
        let mut headers = Map::new();
        for parameter in parameters {
            let Some(param_name) = parameter.get("name").and_then(Value::as_str) else {
                continue;
            };
            let binding = format!("{{{{{}}}}}", param_name);
            match parameter.get("in").and_then(Value::as_str) {
                Some("query") => query_string.push(format!("{}={}", param_name, binding)),
                Some("header") => {
                    headers.insert(param_name.to_string(), Value::String(binding));
                }
                Some("path") => {}
                _ => continue,
            }
            let default = parameter
                .pointer("/schema/default")
                .or_else(|| parameter.get("default"))
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));
            declared.push(QueryParameter {
                name: param_name.to_string(),
                default,
            });
        }

        let request_body = self.request_body(operation, parameters);
        let fields = json!({
            "path": format!("{}{}", base_url, to_bindings(path)),
            "queryString": query_string.join("&"),
            "headers": headers,
            "bodyType": if request_body.is_null() { "none" } else { "json" },
            "requestBody": request_body,
        });

        Query {
            id: Some(IdGenerator::query_id(datasource_id)),
            rev: None,
            datasource_id: datasource_id.to_string(),
            name,
            query_verb: verb,
            fields: Some(fields),
            parameters: Some(declared),
            transformer: Some("return data".to_string()),
            schema: None,
            readable: None,
        }
    }

    /// Example request body, if the operation documents one.
    fn request_body(&self, operation: &Value, parameters: &[&Value]) -> Value {
        match self.format {
            Format::OpenApi3 => {
                let media = operation.pointer("/requestBody/content/application~1json");
                media
                    .and_then(|m| m.get("example").or_else(|| m.pointer("/schema/example")))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            Format::Swagger2 => parameters
                .iter()
                .find(|p| p.get("in").and_then(Value::as_str) == Some("body"))
                .and_then(|p| p.pointer("/schema/example"))
                .cloned()
                .unwrap_or(Value::Null),
        }
    }

    /// Stores every query of the description under `datasource_id`.
    pub async fn import_queries(&self, datasource_id: &str, db: &AppDb) -> AppResult<ImportResult> {
        let mut queries = Vec::new();
        let mut error_queries = Vec::new();
        for mut query in self.queries(datasource_id) {
            match db.put(&query).await {
                Ok(rev) => {
                    query.rev = Some(rev);
                    queries.push(query);
                }
                Err(e) => {
                    tracing::warn!(query = %query.name, error = %e, "query import failed");
                    error_queries.push(ImportFailure {
                        name: query.name,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(ImportResult {
            queries,
            error_queries,
        })
    }
}

fn verb_for(method: &str) -> Option<QueryVerb> {
    match method.to_lowercase().as_str() {
        "get" => Some(QueryVerb::Read),
        "post" => Some(QueryVerb::Create),
        "put" | "patch" => Some(QueryVerb::Update),
        "delete" => Some(QueryVerb::Delete),
        _ => None,
    }
}

/// `/pets/{petId}` -> `/pets/{{petId}}`
fn to_bindings(path: &str) -> String {
    path.replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use common::store::MemoryDocumentStore;

    const PETSTORE: &str = r#"{
        "openapi": "3.0.0",
        "info": { "title": "Petstore", "version": "1.0.0" },
        "servers": [{ "url": "https://petstore.example.com/v1/" }],
        "paths": {
            "/pets": {
                "get": {
                    "operationId": "listPets",
                    "parameters": [
                        { "name": "limit", "in": "query", "schema": { "type": "integer", "default": 10 } }
                    ]
                },
                "post": {
                    "operationId": "createPet",
                    "requestBody": {
                        "content": { "application/json": { "example": { "name": "Rex" } } }
                    }
                }
            },
            "/pets/{petId}": {
                "parameters": [{ "name": "petId", "in": "path", "required": true }],
                "delete": {},
                "trace": {}
            }
        }
    }"#;

    #[test]
    fn test_openapi3_info() {
        let importer = RestImporter::init(PETSTORE).unwrap();
        assert_eq!(
            importer.info(),
            ImportInfo {
                url: "https://petstore.example.com/v1".into(),
                name: "Petstore".into()
            }
        );
    }

    #[test]
    fn test_swagger2_info() {
        let importer = RestImporter::init(
            r#"{"swagger": "2.0", "info": {"title": "Legacy"}, "host": "api.legacy.io",
                "basePath": "/v2", "schemes": ["http"], "paths": {}}"#,
        )
        .unwrap();
        assert_eq!(importer.info().url, "http://api.legacy.io/v2");
        assert!(importer.queries("datasource_1").is_empty());
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(matches!(
            RestImporter::init(r#"{"hello": "world"}"#),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(RestImporter::init("curl -X GET"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_queries_per_operation() {
        let importer = RestImporter::init(PETSTORE).unwrap();
        let queries = importer.queries("datasource_1");
        assert_eq!(queries.len(), 3);

        let list = queries.iter().find(|q| q.name == "listPets").unwrap();
        assert_eq!(list.query_verb, QueryVerb::Read);
        assert!(list.id.as_deref().unwrap().starts_with("query_datasource_1_"));
        let fields = list.fields.as_ref().unwrap();
        assert_eq!(fields["path"], "https://petstore.example.com/v1/pets");
        assert_eq!(fields["queryString"], "limit={{limit}}");
        assert_eq!(
            list.parameters.as_ref().unwrap(),
            &vec![QueryParameter { name: "limit".into(), default: json!(10) }]
        );

        let create = queries.iter().find(|q| q.name == "createPet").unwrap();
        assert_eq!(create.query_verb, QueryVerb::Create);
        assert_eq!(create.fields.as_ref().unwrap()["requestBody"], json!({ "name": "Rex" }));

        let delete = queries.iter().find(|q| q.name == "DELETE /pets/{petId}").unwrap();
        assert_eq!(delete.query_verb, QueryVerb::Delete);
        assert_eq!(
            delete.fields.as_ref().unwrap()["path"],
            "https://petstore.example.com/v1/pets/{{petId}}"
        );
        assert_eq!(delete.parameters.as_ref().unwrap()[0].name, "petId");
    }

    #[tokio::test]
    async fn test_import_queries_persists_documents() {
        let db = AppDb::new(Arc::new(MemoryDocumentStore::new()), "app_dev_1");
        let importer = RestImporter::init(PETSTORE).unwrap();
        let result = importer.import_queries("datasource_1", &db).await.unwrap();
        assert_eq!(result.queries.len(), 3);
        assert!(result.error_queries.is_empty());
        assert!(result.queries.iter().all(|q| q.rev.is_some()));

        let stored: Vec<Query> = db.all_docs("query_").await.unwrap();
        assert_eq!(stored.len(), 3);
    }
}
