//! # Configuration loader
//!
//! Reads the TOML file into [`GatewayConfig`], then applies the two layers the
//! file cannot carry by itself: secrets from the environment and platform
//! default locations for the on-disk stores.

use anyhow::Context;
use std::path::{Path, PathBuf};

use fg_core::config::GatewayConfig;

pub const APP_DIR_NAME: &str = "folio-gateway";
pub const ENV_API_KEY: &str = "FOLIO_API_KEY";
pub const ENV_SIGNING_SECRET: &str = "FOLIO_SIGNING_SECRET";
pub const ENV_BASE_URL: &str = "FOLIO_BASE_URL";

/// Load configuration from a TOML file.
///
/// Pure loading: missing fields take defaults, nothing is validated.
pub fn load_config(config_path: PathBuf) -> anyhow::Result<GatewayConfig> {
    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    GatewayConfig::from_toml_str(&content).context("Failed to parse config as TOML")
}

/// `<config dir>/folio-gateway/config.toml`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"))
}

/// Loads `explicit` if given (it must exist), else the default file if it
/// exists, else built-in defaults. Environment overrides and default storage
/// paths are applied in every case.
pub fn resolve_config(explicit: Option<PathBuf>) -> anyhow::Result<GatewayConfig> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => load_config(path)?,
            None => GatewayConfig::default(),
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    fill_storage_defaults(&mut config, dirs::data_local_dir().as_deref());
    Ok(config)
}

/// Secrets usually live outside the config file. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    if let Some(key) = lookup(ENV_API_KEY) {
        config.api.api_key = key;
    }
    if let Some(secret) = lookup(ENV_SIGNING_SECRET) {
        config.api.signing_secret = secret;
    }
    if let Some(url) = lookup(ENV_BASE_URL) {
        config.api.base_url = url;
    }
}

/// Fills empty store paths under `<data_dir>/folio-gateway/`. With no data
/// dir the paths stay empty and the runtime keeps those stores in memory.
pub fn fill_storage_defaults(config: &mut GatewayConfig, data_dir: Option<&Path>) {
    let Some(base) = data_dir.map(|d| d.join(APP_DIR_NAME)) else {
        return;
    };
    let storage = &mut config.storage;
    if storage.database_path.as_os_str().is_empty() {
        storage.database_path = base.join("uploads.db");
    }
    if storage.kv_path.as_os_str().is_empty() {
        storage.kv_path = base.join("kv.json");
    }
    if storage.log_dir.as_os_str().is_empty() {
        storage.log_dir = base.join("logs");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_reads_valid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [api]
            base_url = "https://api.folio.dev"
            request_timeout_ms = 5000

            [storage]
            database_path = "/tmp/folio/uploads.db"
            "#
        )
        .unwrap();

        let config = load_config(file.path().to_path_buf()).unwrap();

        assert_eq!(config.api.base_url, "https://api.folio.dev");
        assert_eq!(config.api.request_timeout_ms, 5000);
        assert_eq!(
            config.storage.database_path,
            PathBuf::from("/tmp/folio/uploads.db")
        );
    }

    #[test]
    fn test_load_config_missing_file_names_path() {
        let err = load_config(PathBuf::from("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    fn test_load_config_rejects_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[api\nbase_url =").unwrap();

        let err = load_config(file.path().to_path_buf()).unwrap_err();
        assert!(format!("{err:#}").contains("TOML"));
    }

    #[test]
    fn env_overrides_replace_secrets_but_skip_blank_values() {
        let env: HashMap<&str, &str> = [
            (ENV_API_KEY, "env-key"),
            (ENV_SIGNING_SECRET, "  "),
        ]
        .into_iter()
        .collect();
        let mut config = GatewayConfig::default();
        config.api.signing_secret = "from-file".to_string();

        apply_env_overrides(&mut config, |name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.api_key, "env-key");
        assert_eq!(config.api.signing_secret, "from-file");
        assert_eq!(config.api.base_url, GatewayConfig::default().api.base_url);
    }

    #[test]
    fn storage_defaults_only_fill_empty_paths() {
        let mut config = GatewayConfig::default();
        config.storage.kv_path = PathBuf::from("/srv/kv.json");

        fill_storage_defaults(&mut config, Some(Path::new("/data")));

        assert_eq!(
            config.storage.database_path,
            PathBuf::from("/data/folio-gateway/uploads.db")
        );
        assert_eq!(config.storage.kv_path, PathBuf::from("/srv/kv.json"));
        assert_eq!(config.storage.log_dir, PathBuf::from("/data/folio-gateway/logs"));
    }

    #[test]
    fn storage_paths_stay_empty_without_data_dir() {
        let mut config = GatewayConfig::default();
        fill_storage_defaults(&mut config, None);
        assert!(config.storage.database_path.as_os_str().is_empty());
    }
}
