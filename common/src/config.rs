//! Service configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Default runner timeout in milliseconds.
pub const DEFAULT_QUERY_THREAD_TIMEOUT_MS: u64 = 10_000;

/// Default cap on an attachment upload request body (200 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" | "jest" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    /// Bucket holding application attachments.
    pub apps_bucket: String,
    /// Local directory standing in for the object store; `None` means S3.
    pub local_dir: Option<PathBuf>,
    /// Region for the S3 client.
    pub region: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// SQLite URL for the document store; `None` keeps documents in memory.
    pub database_url: Option<String>,
    /// Redis URL for the dynamic variable cache; `None` keeps it in memory.
    pub redis_url: Option<String>,
    /// Base URL of the external query runner.
    pub runner_url: String,
    /// Upper bound for a single query run.
    pub query_thread_timeout: Duration,
    /// Maximum query runs per application; `None` is unlimited.
    pub query_quota_limit: Option<u64>,
    /// Directory containing the `builder` and `new_design_ui` asset roots.
    pub top_level_path: PathBuf,
    /// Directory containing the client library bundle.
    pub client_library_dir: PathBuf,
    /// Archive with the beta builder UI.
    pub beta_ui_archive_url: String,
    /// Externally visible base URL, used for published app links.
    pub public_base_url: String,
    /// Largest accepted attachment upload request, in bytes.
    pub max_upload_bytes: usize,
    pub object_store: ObjectStoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "service".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: Environment::Development,
            database_url: None,
            redis_url: None,
            runner_url: "http://127.0.0.1:8090".to_string(),
            query_thread_timeout: Duration::from_millis(DEFAULT_QUERY_THREAD_TIMEOUT_MS),
            query_quota_limit: None,
            top_level_path: PathBuf::from("."),
            client_library_dir: PathBuf::from("client/dist"),
            beta_ui_archive_url: "https://cdn.example.com/beta/design_ui/new_ui.tar.gz"
                .to_string(),
            public_base_url: "http://localhost:10000".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            object_store: ObjectStoreConfig {
                apps_bucket: "app-assets".to_string(),
                local_dir: None,
                region: None,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration for the named service from the environment.
    pub fn load_with_service(service_name: &str) -> Self {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            host: env_string("SERVER_HOST").unwrap_or(defaults.host),
            port: env_parse("SERVER_PORT").unwrap_or(defaults.port),
            environment: env_string("APP_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or(defaults.environment),
            database_url: env_string("DATABASE_URL"),
            redis_url: env_string("REDIS_URL"),
            runner_url: env_string("RUNNER_URL").unwrap_or(defaults.runner_url),
            query_thread_timeout: env_parse("QUERY_THREAD_TIMEOUT")
                .map(Duration::from_millis)
                .unwrap_or(defaults.query_thread_timeout),
            query_quota_limit: env_parse("QUERY_QUOTA_LIMIT"),
            top_level_path: env_string("TOP_LEVEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.top_level_path),
            client_library_dir: env_string("CLIENT_LIBRARY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.client_library_dir),
            beta_ui_archive_url: env_string("BETA_UI_ARCHIVE_URL")
                .unwrap_or(defaults.beta_ui_archive_url),
            public_base_url: env_string("PUBLIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
            object_store: ObjectStoreConfig {
                apps_bucket: env_string("APPS_BUCKET")
                    .unwrap_or(defaults.object_store.apps_bucket),
                local_dir: env_string("OBJECT_STORE_DIR").map(PathBuf::from),
                region: env_string("AWS_REGION"),
            },
        }
    }

    pub fn is_test(&self) -> bool {
        self.environment == Environment::Test
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse().ok())
}

/// Load .env file from the working directory (best-effort, no error if missing).
pub fn load_dotenv() {
    let env_path = std::path::Path::new(".env");
    if !env_path.exists() {
        return;
    }
    if let Ok(content) = std::fs::read_to_string(env_path) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');
                // Only set if not already set by the environment
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("TEST"), Environment::Test);
        assert_eq!(Environment::parse("anything"), Environment::Development);
    }

    #[test]
    fn test_default_timeout() {
        let config = AppConfig::default();
        assert_eq!(config.query_thread_timeout, Duration::from_millis(10_000));
        assert!(config.query_quota_limit.is_none());
        assert_eq!(config.max_upload_bytes, 200 * 1024 * 1024);
    }
}
