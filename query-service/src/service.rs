//! Query store and execution service.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::events::{notify, Event, EventEmitter};
use common::middleware::AppContext;
use common::models::{
    Datasource, ExecuteRequest, PreviewRequest, PreviewResponse, Query, RunRequest, RunResponse,
};
use common::store::AppDb;
use common::utils::id_generator::{is_prod_app_id, QUERY_PREFIX};
use common::utils::IdGenerator;

use crate::datasource::save_datasource;
use crate::import::{ImportResult, RestImporter};
use crate::quota::QueryQuota;
use crate::runner::Runner;
use crate::state::AppState;
use crate::variables::{remove_dynamic_variables, VariableCache};

/// Body of an import request.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    /// API description (OpenAPI 3 / Swagger 2 JSON).
    pub data: String,
    /// Existing datasource to import into; a new REST datasource is created when absent.
    #[serde(default)]
    pub datasource_id: Option<String>,
}

/// Result of an import, with the datasource the queries were attached to.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    #[serde(flatten)]
    pub result: ImportResult,
    pub datasource_id: String,
}

/// Query service bound to one application database.
pub struct QueryService {
    db: AppDb,
    runner: Runner,
    quota: Arc<QueryQuota>,
    events: Arc<dyn EventEmitter>,
    variables: Arc<dyn VariableCache>,
}

impl QueryService {
    /// Creates a service for the application named in the request context.
    pub fn new(state: &AppState, ctx: &AppContext) -> Self {
        Self {
            db: AppDb::new(state.store.clone(), ctx.app_id.clone()),
            runner: state.runner.clone(),
            quota: state.quota.clone(),
            events: state.events.clone(),
            variables: state.variables.clone(),
        }
    }

    /// All queries of the app.
    pub async fn fetch(&self) -> AppResult<Vec<Query>> {
        let queries: Vec<Query> = self.db.all_docs(QUERY_PREFIX).await?;
        Ok(queries.into_iter().map(Query::enrich).collect())
    }

    /// One query; published apps never see its fields or parameters.
    pub async fn find(&self, query_id: &str) -> AppResult<Query> {
        let query = self.db.get::<Query>(query_id).await?.enrich();
        if is_prod_app_id(self.db.app_id()) {
            return Ok(query.strip_internals());
        }
        Ok(query)
    }

    /// Creates or updates a query.
    pub async fn save(&self, mut query: Query) -> AppResult<Query> {
        query.validate()?;
        // the datasource must exist before queries can point at it
        let _: Datasource = self.db.get(&query.datasource_id).await?;

        let created = query.id.is_none();
        if created {
            query.id = Some(IdGenerator::query_id(&query.datasource_id));
        }
        query.readable = None;

        let rev = self.db.put(&query).await?;
        query.rev = Some(rev);

        let query_id = query.id.clone().unwrap_or_default();
        let datasource_id = query.datasource_id.clone();
        let event = if created {
            Event::QueryCreated { datasource_id, query_id }
        } else {
            Event::QueryUpdated { datasource_id, query_id }
        };
        notify(self.events.as_ref(), event).await;

        tracing::info!(query_id = ?query.id, created, "query saved");
        Ok(query)
    }

    /// Deletes a query after clearing the dynamic variables it owns.
    pub async fn destroy(&self, query_id: &str, rev: &str) -> AppResult<()> {
        remove_dynamic_variables(&self.db, self.variables.as_ref(), query_id).await?;

        let query: Query = self.db.get(query_id).await?;
        self.db.remove(query_id, rev).await?;

        notify(
            self.events.as_ref(),
            Event::QueryDeleted {
                datasource_id: query.datasource_id,
                query_id: query_id.to_string(),
            },
        )
        .await;
        tracing::info!(query_id = %query_id, "query deleted");
        Ok(())
    }

    /// Runs an unsaved query.
    pub async fn preview(&self, req: PreviewRequest) -> AppResult<PreviewResponse> {
        let datasource: Datasource = self.db.get(&req.datasource_id).await?;
        let request = RunRequest {
            app_id: self.db.app_id().to_string(),
            datasource,
            query_verb: req.query_verb,
            fields: req.fields,
            parameters: req.parameters,
            transformer: req.transformer,
            // lets dynamic variables avoid calling the query being previewed
            query_id: req.query_id,
            pagination: None,
        };

        let output = self.run(request).await?;
        notify(
            self.events.as_ref(),
            Event::QueryPreviewed {
                datasource_id: req.datasource_id,
            },
        )
        .await;

        Ok(PreviewResponse {
            schema_fields: schema_fields(&output.rows, &output.keys),
            rows: output.rows,
            info: output.info,
            extra: output.extra.map(Value::Object),
        })
    }

    /// Runs a saved query with caller parameters completed from its defaults.
    pub async fn execute(&self, query_id: &str, req: ExecuteRequest) -> AppResult<RunResponse> {
        let query: Query = self.db.get(query_id).await?;
        let datasource: Datasource = self.db.get(&query.datasource_id).await?;

        let parameters = query.parameters_with_defaults(req.parameters);
        let request = RunRequest {
            app_id: self.db.app_id().to_string(),
            datasource,
            query_verb: query.query_verb,
            fields: query.fields.unwrap_or_else(|| Value::Object(Map::new())),
            parameters,
            transformer: query.transformer,
            query_id: Some(query_id.to_string()),
            pagination: req.pagination,
        };
        self.run(request).await
    }

    /// Imports queries, creating a REST datasource when none is given.
    pub async fn import(&self, req: ImportRequest) -> AppResult<ImportResponse> {
        let importer = RestImporter::init(&req.data)?;

        let datasource_id = match req.datasource_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                let _: Datasource = self.db.get(&id).await?;
                id
            }
            None => {
                let info = importer.info();
                let datasource = Datasource::rest(info.name, info.url);
                let saved = save_datasource(&self.db, self.events.as_ref(), datasource).await?;
                saved
                    .id
                    .ok_or_else(|| AppError::Internal("saved datasource has no id".to_string()))?
            }
        };

        let result = importer.import_queries(&datasource_id, &self.db).await?;
        notify(
            self.events.as_ref(),
            Event::QueriesImported {
                datasource_id: datasource_id.clone(),
                count: result.queries.len(),
            },
        )
        .await;

        Ok(ImportResponse {
            result,
            datasource_id,
        })
    }

    /// Metered runner call; every failure is reported as an execution error.
    async fn run(&self, request: RunRequest) -> AppResult<RunResponse> {
        let app_id = request.app_id.clone();
        let runner = &self.runner;
        self.quota
            .add_query(&app_id, move || runner.run(request))
            .await
            .map_err(|e| match e {
                AppError::Execution(_) | AppError::UsageLimit(_) => e,
                other => AppError::Execution(other.to_string()),
            })
    }
}

/// Sorted, de-duplicated keys of all object rows; runner keys when no row is an object.
pub fn schema_fields(rows: &[Value], keys: &[String]) -> Vec<String> {
    let mut fields: BTreeSet<String> = rows
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|row| row.keys().cloned())
        .collect();
    if fields.is_empty() {
        fields = keys.iter().cloned().collect();
    }
    fields.into_iter().collect()
}

/// Version 2 execution body: `{data, pagination, ...extra}`.
pub fn execution_body(output: RunResponse) -> Value {
    let mut body = Map::new();
    body.insert("data".to_string(), Value::Array(output.rows));
    if let Some(pagination) = output.pagination {
        body.insert("pagination".to_string(), pagination);
    }
    if let Some(extra) = output.extra {
        body.extend(extra);
    }
    Value::Object(body)
}
