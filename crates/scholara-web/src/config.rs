use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use scholara_core::config_file::{self, ConfigFile};
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_DATABASE_PATH: &str = "scholara.db";
pub const DEFAULT_MAX_UPLOAD_MB: u32 = 25;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
pub const DEFAULT_GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

/// Server configuration, resolved once at startup and shared through
/// [`AppState`](crate::state::AppState).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub environment: Environment,
    pub gemini_api_key: Option<String>,
    pub google_search_api_key: Option<String>,
    pub google_cse_id: Option<String>,
    pub admin_setup_key: Option<String>,
    pub search_url: String,
    pub gemini_url: String,
    pub max_upload_bytes: usize,
    pub upstream_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            environment: Environment::default(),
            gemini_api_key: None,
            google_search_api_key: None,
            google_cse_id: None,
            admin_setup_key: None,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            gemini_url: DEFAULT_GEMINI_URL.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB as usize * 1024 * 1024,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Resolve from process environment over the TOML config cascade.
    pub fn load() -> Self {
        Self::resolve(config_file::load_config(), |key| std::env::var(key).ok())
    }

    /// Environment variables (via `env`) take precedence over `file`,
    /// which takes precedence over defaults. Blank values count as unset.
    pub fn resolve(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| nonblank(env(key));
        let keys = file.api_keys.unwrap_or_default();
        let server = file.server.unwrap_or_default();
        let endpoints = file.endpoints.unwrap_or_default();
        let defaults = Self::default();

        let environment = var("SCHOLARA_ENV")
            .or_else(|| var("NODE_ENV"))
            .or(nonblank(server.environment))
            .map(|e| Environment::parse(&e))
            .unwrap_or_default();

        let max_upload_mb = parse_var("SCHOLARA_MAX_UPLOAD_MB", var("SCHOLARA_MAX_UPLOAD_MB"))
            .or(server.max_upload_mb)
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        let timeout_secs = parse_var(
            "SCHOLARA_UPSTREAM_TIMEOUT_SECS",
            var("SCHOLARA_UPSTREAM_TIMEOUT_SECS"),
        )
        .or(server.upstream_timeout_secs)
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);

        let config = Self {
            port: parse_var("SCHOLARA_PORT", var("SCHOLARA_PORT"))
                .or(server.port)
                .unwrap_or(defaults.port),
            database_path: var("SCHOLARA_DB_PATH")
                .or(nonblank(server.database_path))
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            environment,
            gemini_api_key: var("GEMINI_API_KEY").or(nonblank(keys.gemini_api_key)),
            google_search_api_key: var("GOOGLE_SEARCH_API_KEY")
                .or(nonblank(keys.google_search_api_key)),
            google_cse_id: var("GOOGLE_CSE_ID").or(nonblank(keys.google_cse_id)),
            admin_setup_key: var("ADMIN_SETUP_KEY").or(nonblank(keys.admin_setup_key)),
            search_url: var("SEARCH_API_URL")
                .or(nonblank(endpoints.search_url))
                .unwrap_or(defaults.search_url),
            gemini_url: var("GEMINI_API_URL")
                .or(nonblank(endpoints.gemini_url))
                .unwrap_or(defaults.gemini_url),
            max_upload_bytes: max_upload_mb as usize * 1024 * 1024,
            upstream_timeout: Duration::from_secs(timeout_secs),
        };

        config.log_summary();
        config
    }

    fn log_summary(&self) {
        info!(
            port = self.port,
            database = %self.database_path.display(),
            production = self.environment.is_production(),
            "server configuration resolved"
        );
        if self.google_search_api_key.is_none() || self.google_cse_id.is_none() {
            warn!("GOOGLE_SEARCH_API_KEY or GOOGLE_CSE_ID not set; search proxy will fail");
        }
        if self.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY not set; AI proxy will fail");
        }
    }
}

fn nonblank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>) -> Option<T>
where
    T::Err: Display,
{
    let value = value?;
    value
        .trim()
        .parse()
        .map_err(|e| warn!("Invalid {key} value '{value}': {e}, ignoring"))
        .ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use scholara_core::config_file::{ApiKeysConfig, ServerSettings};

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = ServerConfig::resolve(ConfigFile::default(), env_from(&[]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.search_url, DEFAULT_SEARCH_URL);
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn env_overrides_file() {
        let file = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                gemini_api_key: Some("from-file".into()),
                google_cse_id: Some("cx-file".into()),
                ..Default::default()
            }),
            server: Some(ServerSettings {
                port: Some(9000),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = ServerConfig::resolve(
            file,
            env_from(&[("GEMINI_API_KEY", "from-env"), ("SCHOLARA_PORT", "7000")]),
        );
        assert_eq!(config.gemini_api_key.as_deref(), Some("from-env"));
        assert_eq!(config.google_cse_id.as_deref(), Some("cx-file"));
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn blank_env_counts_as_unset() {
        let config = ServerConfig::resolve(
            ConfigFile::default(),
            env_from(&[("GOOGLE_SEARCH_API_KEY", "  ")]),
        );
        assert!(config.google_search_api_key.is_none());
    }

    #[test]
    fn node_env_selects_production() {
        let config =
            ServerConfig::resolve(ConfigFile::default(), env_from(&[("NODE_ENV", "production")]));
        assert!(config.environment.is_production());

        let config = ServerConfig::resolve(
            ConfigFile::default(),
            env_from(&[("SCHOLARA_ENV", "development"), ("NODE_ENV", "production")]),
        );
        assert!(!config.environment.is_production());
    }

    #[test]
    fn unparsable_port_falls_back() {
        let config =
            ServerConfig::resolve(ConfigFile::default(), env_from(&[("SCHOLARA_PORT", "http")]));
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
