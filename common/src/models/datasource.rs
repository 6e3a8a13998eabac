//! Datasource models.
//!
//! A datasource is one configured external system. The `source` tag selects
//! the variant and the shape of `config`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stored datasource document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Datasource {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub source: DatasourceSource,
}

/// Supported datasource kinds, each with its own configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", content = "config")]
pub enum DatasourceSource {
    #[serde(rename = "REST")]
    Rest(RestConfig),
    #[serde(rename = "S3")]
    S3(S3Config),
    #[serde(rename = "POSTGRES")]
    Postgres(SqlConfig),
    #[serde(rename = "MYSQL")]
    MySql(SqlConfig),
}

impl DatasourceSource {
    /// The `source` tag as stored.
    pub fn tag(&self) -> &'static str {
        match self {
            DatasourceSource::Rest(_) => "REST",
            DatasourceSource::S3(_) => "S3",
            DatasourceSource::Postgres(_) => "POSTGRES",
            DatasourceSource::MySql(_) => "MYSQL",
        }
    }
}

/// REST API datasource configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestConfig {
    pub url: String,
    #[serde(default)]
    pub default_headers: Vec<RestHeader>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dynamic_variables: Vec<DynamicVariable>,
}

/// Header sent with every request to a REST datasource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RestHeader {
    pub key: String,
    pub value: String,
}

/// Object storage datasource configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    /// Custom (non-AWS) endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Relational database datasource configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SqlConfig {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

/// A datasource-scoped value produced by running a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DynamicVariable {
    pub name: String,
    pub query_id: String,
    #[serde(default)]
    pub value: String,
}

impl DynamicVariable {
    /// Key under which the cached value of this variable is stored.
    pub fn cache_key(&self) -> String {
        format!("query_vars:{}:{}", self.query_id, self.name)
    }
}

impl Datasource {
    /// Builds a REST datasource with no default headers.
    pub fn rest(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            rev: None,
            name: name.into(),
            source: DatasourceSource::Rest(RestConfig {
                url: url.into(),
                default_headers: Vec::new(),
                dynamic_variables: Vec::new(),
            }),
        }
    }

    /// Dynamic variables defined on this datasource, if its kind has any.
    pub fn dynamic_variables(&self) -> &[DynamicVariable] {
        match &self.source {
            DatasourceSource::Rest(config) => &config.dynamic_variables,
            _ => &[],
        }
    }

    /// Removes every dynamic variable created by `query_id`, returning the removed ones.
    pub fn take_dynamic_variables_of(&mut self, query_id: &str) -> Vec<DynamicVariable> {
        match &mut self.source {
            DatasourceSource::Rest(config) => {
                let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut config.dynamic_variables)
                    .into_iter()
                    .partition(|dv| dv.query_id == query_id);
                config.dynamic_variables = kept;
                removed
            }
            _ => Vec::new(),
        }
    }
}
