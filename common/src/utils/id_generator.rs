//! Document identifier helpers.
//!
//! Ids carry their document type as a prefix so that a single app database
//! can be listed per type with a prefix scan.

use uuid::Uuid;

/// Separator between id segments.
pub const SEPARATOR: &str = "_";
/// Prefix shared by every query document.
pub const QUERY_PREFIX: &str = "query_";
/// Prefix shared by every datasource document.
pub const DATASOURCE_PREFIX: &str = "datasource_";
/// Prefix shared by every application database.
pub const APP_PREFIX: &str = "app_";
/// Prefix of development (builder) application databases.
pub const APP_DEV_PREFIX: &str = "app_dev_";
/// Id of the single metadata document in each application database.
pub const APP_METADATA_ID: &str = "app_metadata";

/// Generates unique identifiers for various entities.
pub struct IdGenerator;

impl IdGenerator {
    fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Generates a query id scoped to its datasource.
    pub fn query_id(datasource_id: &str) -> String {
        format!("{}{}{}{}", QUERY_PREFIX, datasource_id, SEPARATOR, Self::new_id())
    }

    /// Generates a datasource id.
    pub fn datasource_id() -> String {
        format!("{}{}", DATASOURCE_PREFIX, Self::new_id())
    }

    /// Generates the id of a new development application.
    pub fn dev_app_id() -> String {
        format!("{}{}", APP_DEV_PREFIX, Self::new_id())
    }

    /// Generates a unique request ID.
    pub fn request_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generates a short unique ID (first 8 characters of UUID).
    pub fn short_id() -> String {
        Uuid::new_v4().to_string()[..8].to_string()
    }
}

/// Whether the id names a development copy of an application.
pub fn is_dev_app_id(app_id: &str) -> bool {
    app_id.starts_with(APP_DEV_PREFIX)
}

/// Whether the id names a published (production) application.
pub fn is_prod_app_id(app_id: &str) -> bool {
    app_id.starts_with(APP_PREFIX) && !is_dev_app_id(app_id)
}

/// Production id for a development app id; production ids map to themselves.
pub fn prod_app_id(app_id: &str) -> String {
    match app_id.strip_prefix(APP_DEV_PREFIX) {
        Some(rest) => format!("{}{}", APP_PREFIX, rest),
        None => app_id.to_string(),
    }
}

/// Development id for a production app id; development ids map to themselves.
pub fn dev_app_id(app_id: &str) -> String {
    if is_dev_app_id(app_id) {
        return app_id.to_string();
    }
    match app_id.strip_prefix(APP_PREFIX) {
        Some(rest) => format!("{}{}", APP_DEV_PREFIX, rest),
        None => app_id.to_string(),
    }
}
