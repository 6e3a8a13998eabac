//! Application models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::utils::id_generator::APP_METADATA_ID;

/// The single metadata document of an application database.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub app_id: String,
    pub name: String,
    /// Path the published app is reachable under, e.g. `/cypress-tests`.
    pub url: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl AppMetadata {
    /// Metadata for a freshly created application.
    pub fn new(app_id: impl Into<String>, name: impl Into<String>, version: &str) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: APP_METADATA_ID.to_string(),
            rev: None,
            app_id: app_id.into(),
            url: format!("/{}", slugify(&name)),
            name,
            version: version.to_string(),
            created_at: now,
            updated_at: now,
            published_at: None,
        }
    }

    /// Slug part of the app url.
    pub fn slug(&self) -> &str {
        self.url.trim_start_matches('/')
    }
}

/// Turns an app name into its url slug: "Cypress Tests" -> "cypress-tests".
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Publish state shown in the builder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum AppStatus {
    Published,
    Unpublished,
}

/// Application as listed in the builder.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppSummary {
    pub app_id: String,
    pub name: String,
    pub url: String,
    pub status: AppStatus,
    /// Public link, present only while published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_published_at: Option<DateTime<Utc>>,
}

/// Body for creating an application.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAppRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}
