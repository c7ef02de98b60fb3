//! Configuration loader.
//!
//! Loads the sync configuration from environment variables or a TOML
//! file.
//!
//! ## Loading Strategy
//! 1. If `NIMBUS_CLOUD_URL` is set, the whole configuration comes from
//!    environment variables (single-cloud setups).
//! 2. Otherwise the loader reads the file named by `NIMBUS_CONFIG`, or
//!    probes `./nimbus.toml` then `./config.toml`.
//!
//! ## Environment Variables
//! - `NIMBUS_CLOUD_URL`: Endpoint URL of the cloud to sync
//! - `NIMBUS_CLOUD_NAME`: Display name (defaults to the URL host)
//! - `NIMBUS_ACCESS_TOKEN` / `NIMBUS_REFRESH_TOKEN`: Initial tokens
//! - `NIMBUS_FETCH_INTERVAL`: Seconds between fetch cycles
//! - `NIMBUS_PREVIEW`: Preview mode (true/false)
//! - `NIMBUS_CONFIG`: Path to the TOML config file

use std::path::{Path, PathBuf};
use std::time::Duration;

use nimbus_domain::{Cloud, NimbusError, Result, SyncSettings, TokenSet};
use serde::Deserialize;
use url::Url;

/// Top-level sync configuration: shared settings plus the seed cloud
/// set handed to the sync manager at startup.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub settings: SyncSettings,
    pub clouds: Vec<Cloud>,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    sync: SyncSection,
    #[serde(rename = "cloud", default)]
    clouds: Vec<CloudSeed>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncSection {
    fetch_interval_seconds: Option<u64>,
    preview: Option<bool>,
}

/// One cloud as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudSeed {
    pub cloud_url: String,
    pub name: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub sync_all: bool,
    #[serde(default)]
    pub synced_namespaces: Vec<String>,
    #[serde(default)]
    pub ignored_namespaces: Vec<String>,
}

impl CloudSeed {
    /// Materialize the seed into a `Cloud`.
    ///
    /// Persisted tokens carry no expiry; if the access token went stale
    /// while the process was down, the first 401 refreshes it.
    #[must_use]
    pub fn into_cloud(self) -> Cloud {
        let mut cloud = Cloud::new(self.cloud_url, self.name);
        if let Some(access_token) = self.access_token {
            cloud.update_tokens(TokenSet::new(access_token, self.refresh_token, 0));
        }
        cloud.sync_all = self.sync_all;
        cloud.synced_namespaces = self.synced_namespaces;
        cloud.ignored_namespaces = self.ignored_namespaces;
        cloud
    }
}

/// Load configuration, preferring environment variables.
///
/// # Errors
/// Returns `NimbusError::Config` when neither the environment nor a
/// config file yields a usable configuration.
pub fn load() -> Result<SyncConfig> {
    if std::env::var("NIMBUS_CLOUD_URL").is_ok() {
        tracing::info!("configuration loaded from environment variables");
        return load_from_env();
    }
    let path = std::env::var("NIMBUS_CONFIG").ok().map(PathBuf::from);
    load_from_file(path)
}

fn load_from_env() -> Result<SyncConfig> {
    let cloud_url = env_var("NIMBUS_CLOUD_URL")?;
    let name = match std::env::var("NIMBUS_CLOUD_NAME") {
        Ok(name) => name,
        Err(_) => Url::parse(&cloud_url)
            .ok()
            .and_then(|url| url.host_str().map(ToString::to_string))
            .unwrap_or_else(|| cloud_url.clone()),
    };

    let mut cloud = Cloud::new(cloud_url, name);
    if let Ok(access_token) = std::env::var("NIMBUS_ACCESS_TOKEN") {
        let refresh_token = std::env::var("NIMBUS_REFRESH_TOKEN").ok();
        cloud.update_tokens(TokenSet::new(access_token, refresh_token, 0));
    }
    cloud.sync_all = true;

    Ok(SyncConfig { settings: settings_from_env()?, clouds: vec![cloud] })
}

fn settings_from_env() -> Result<SyncSettings> {
    let mut settings = SyncSettings::default();
    if let Ok(raw) = std::env::var("NIMBUS_FETCH_INTERVAL") {
        let seconds: u64 = raw
            .parse()
            .map_err(|err| NimbusError::Config(format!("invalid NIMBUS_FETCH_INTERVAL: {err}")))?;
        settings.fetch_interval = Duration::from_secs(seconds);
    }
    settings.preview = env_bool("NIMBUS_PREVIEW", settings.preview);
    Ok(settings)
}

/// Load configuration from a TOML file.
///
/// When `path` is `None`, probes `./nimbus.toml` then `./config.toml`.
///
/// # Errors
/// Returns `NimbusError::Config` when no file is found or the contents
/// do not parse.
pub fn load_from_file(path: Option<PathBuf>) -> Result<SyncConfig> {
    let config_path = match path {
        Some(path) => {
            if !path.exists() {
                return Err(NimbusError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            path
        }
        None => probe_config_paths().ok_or_else(|| {
            NimbusError::Config("no config file found in the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|err| NimbusError::Config(format!("failed to read config file: {err}")))?;
    parse_config(&contents)
}

fn parse_config(contents: &str) -> Result<SyncConfig> {
    let file: FileConfig = toml::from_str(contents)
        .map_err(|err| NimbusError::Config(format!("invalid config file: {err}")))?;

    let mut settings = SyncSettings::default();
    if let Some(seconds) = file.sync.fetch_interval_seconds {
        settings.fetch_interval = Duration::from_secs(seconds);
    }
    if let Some(preview) = file.sync.preview {
        settings.preview = preview;
    }

    let clouds = file.clouds.into_iter().map(CloudSeed::into_cloud).collect();
    Ok(SyncConfig { settings, clouds })
}

fn probe_config_paths() -> Option<PathBuf> {
    ["nimbus.toml", "config.toml"].iter().map(Path::new).find(|p| p.exists()).map(Path::to_path_buf)
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| NimbusError::Config(format!("missing environment variable {name}")))
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name).map(|v| matches!(v.as_str(), "true" | "1" | "yes")).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
[sync]
fetch_interval_seconds = 120
preview = true

[[cloud]]
cloud_url = "https://one.example.com"
name = "one"
access_token = "a-1"
refresh_token = "r-1"
sync_all = true

[[cloud]]
cloud_url = "https://two.example.com"
name = "two"
synced_namespaces = ["team-a"]
ignored_namespaces = ["scratch"]
"#;

    #[test]
    fn parses_settings_and_clouds() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.settings.fetch_interval, Duration::from_secs(120));
        assert!(config.settings.preview);
        assert_eq!(config.clouds.len(), 2);

        let one = &config.clouds[0];
        assert_eq!(one.cloud_url, "https://one.example.com");
        assert!(one.sync_all);
        assert_eq!(one.access_token(), Some("a-1"));
        assert_eq!(one.refresh_token(), Some("r-1"));

        let two = &config.clouds[1];
        assert!(two.access_token().is_none());
        assert_eq!(two.synced_namespaces, ["team-a"]);
        assert_eq!(two.ignored_namespaces, ["scratch"]);
    }

    #[test]
    fn persisted_tokens_carry_no_expiry() {
        let config = parse_config(SAMPLE).unwrap();
        let tokens = config.clouds[0].tokens.as_ref().unwrap();
        assert!(tokens.expires_at.is_none());
        assert!(!tokens.is_expired(300));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.settings.fetch_interval, SyncSettings::default().fetch_interval);
        assert!(!config.settings.preview);
        assert!(config.clouds.is_empty());
    }

    #[test]
    fn load_from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.clouds.len(), 2);
    }

    #[test]
    fn load_from_file_rejects_missing_path() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/nimbus.toml"))).unwrap_err();
        assert!(matches!(err, NimbusError::Config(_)));
    }
}
