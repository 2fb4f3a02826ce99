//! Configuration management for the CLI

use anyhow::{Context, Result};
use fleet_lib::EngineConfig;
use std::path::{Path, PathBuf};

/// Resolve the engine configuration
///
/// An explicit `--config` must exist. Without one the per-user file is used
/// when present, otherwise defaults plus `FLEET__*` variables.
pub fn load_engine_config(
    explicit: Option<&Path>,
    catalog_url: Option<&str>,
) -> Result<EngineConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    };

    let mut config = EngineConfig::load(path.as_deref()).with_context(|| match &path {
        Some(p) => format!("Invalid configuration in {}", p.display()),
        None => "Invalid configuration in environment".to_string(),
    })?;

    if let Some(url) = catalog_url {
        config.catalog.endpoint = Some(url.to_string());
        config.validate().context("Invalid --catalog-url")?;
    }

    Ok(config)
}

/// Get the per-user configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("fleetctl").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pricing]\ncache_ttl_hours = 6").unwrap();

        let config = load_engine_config(Some(file.path()), None).unwrap();
        assert_eq!(config.pricing.cache_ttl_hours, 6);
        assert_eq!(config.catalog.endpoint, None);
    }

    #[test]
    fn test_catalog_url_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[catalog]\nendpoint = \"http://old:8080\"").unwrap();

        let config = load_engine_config(Some(file.path()), Some("http://pricing:9090")).unwrap();
        assert_eq!(config.catalog.endpoint.as_deref(), Some("http://pricing:9090"));

        assert!(load_engine_config(Some(file.path()), Some("not a url")).is_err());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(load_engine_config(Some(Path::new("/nonexistent/fleetctl.toml")), None).is_err());
    }
}
