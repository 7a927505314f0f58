use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub server: Option<ServerSettings>,
    pub endpoints: Option<EndpointsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub gemini_api_key: Option<String>,
    pub google_search_api_key: Option<String>,
    pub google_cse_id: Option<String>,
    pub admin_setup_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    pub port: Option<u16>,
    pub database_path: Option<String>,
    /// `production` suppresses error detail in responses.
    pub environment: Option<String>,
    pub max_upload_mb: Option<u32>,
    pub upstream_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsConfig {
    pub search_url: Option<String>,
    pub gemini_url: Option<String>,
}

/// Platform config directory path: `<config_dir>/scholara/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scholara").join("config.toml"))
}

/// Load config by cascading CWD `.scholara.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".scholara.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

fn pick<S, T>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (ka, kb) = (&overlay.api_keys, &base.api_keys);
    let (sa, sb) = (&overlay.server, &base.server);
    let (ea, eb) = (&overlay.endpoints, &base.endpoints);

    ConfigFile {
        api_keys: Some(ApiKeysConfig {
            gemini_api_key: pick(ka, kb, |k| k.gemini_api_key.clone()),
            google_search_api_key: pick(ka, kb, |k| k.google_search_api_key.clone()),
            google_cse_id: pick(ka, kb, |k| k.google_cse_id.clone()),
            admin_setup_key: pick(ka, kb, |k| k.admin_setup_key.clone()),
        }),
        server: Some(ServerSettings {
            port: pick(sa, sb, |s| s.port),
            database_path: pick(sa, sb, |s| s.database_path.clone()),
            environment: pick(sa, sb, |s| s.environment.clone()),
            max_upload_mb: pick(sa, sb, |s| s.max_upload_mb),
            upstream_timeout_secs: pick(sa, sb, |s| s.upstream_timeout_secs),
        }),
        endpoints: Some(EndpointsConfig {
            search_url: pick(ea, eb, |e| e.search_url.clone()),
            gemini_url: pick(ea, eb, |e| e.gemini_url.clone()),
        }),
    }
}
