//! Configuration management for scandesk using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backend used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";
/// File under the data directory holding the bearer token.
pub const TOKEN_FILENAME: &str = "token";

const API_URL_ENV: &str = "SCANDESK_API_URL";
const TOKEN_ENV: &str = "SCANDESK_TOKEN";

/// Effective application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the document backend.
    pub api_url: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Directory for the stored token.
    pub data_dir: PathBuf,
    /// Default directory for exported archives.
    pub export_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // Platform data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scandesk");

        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: 30,
            user_agent: format!("scandesk/{}", env!("CARGO_PKG_VERSION")),
            data_dir,
            export_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join(TOKEN_FILENAME)
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    /// Persist a bearer token, readable only by the current user.
    pub fn save_token(&self, token: &str) -> std::io::Result<PathBuf> {
        self.ensure_directories()?;
        let path = self.token_path();
        std::fs::write(&path, token)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(path)
    }

    /// Stored token, preferring `SCANDESK_TOKEN` when set.
    pub fn load_token(&self) -> Option<String> {
        if let Some(token) = non_empty_env(TOKEN_ENV) {
            return Some(token);
        }
        std::fs::read_to_string(self.token_path())
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Remove the stored token. Returns whether one existed.
    pub fn clear_token(&self) -> std::io::Result<bool> {
        match std::fs::remove_file(self.token_path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Base URL of the document backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Default export directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    pub async fn load() -> Self {
        match prefer::load("scandesk").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref api_url) = self.api_url {
            settings.api_url = api_url.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref export_dir) = self.export_dir {
            settings.export_dir = self.resolve_path(export_dir, base_dir);
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Backend URL (--api-url flag).
    pub api_url: Option<String>,
    /// Data directory (--data-dir flag).
    pub data_dir: Option<PathBuf>,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Load settings with explicit options.
///
/// Precedence, lowest first: defaults, config file, environment, flags.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Config::default()
        }),
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    let base_dir = config.base_dir().unwrap_or_else(current_dir);
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(api_url) = non_empty_env(API_URL_ENV) {
        tracing::debug!("Using {} from environment: {}", API_URL_ENV, api_url);
        settings.api_url = api_url;
    }

    if let Some(api_url) = options.api_url {
        settings.api_url = api_url;
    }
    if let Some(data_dir) = options.data_dir {
        settings.data_dir = if data_dir.is_absolute() {
            data_dir
        } else {
            current_dir().join(data_dir)
        };
    }

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert!(settings.data_dir.ends_with("scandesk"));
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scandesk.toml");
        std::fs::write(
            &path,
            "api_url = \"https://ocr.example.com\"\nrequest_timeout = 5\nexport_dir = \"exports\"\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.api_url.as_deref(), Some("https://ocr.example.com"));
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path());
        assert_eq!(settings.request_timeout, 5);
        assert_eq!(settings.export_dir, dir.path().join("exports"));
    }

    #[tokio::test]
    async fn test_load_yaml_and_json_config() {
        let dir = tempdir().unwrap();

        let yaml = dir.path().join("scandesk.yaml");
        std::fs::write(&yaml, "user_agent: custom-agent\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.user_agent.as_deref(), Some("custom-agent"));

        let json = dir.path().join("scandesk.json");
        std::fs::write(&json, r#"{"data_dir": "/var/lib/scandesk"}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert_eq!(config.data_dir.as_deref(), Some("/var/lib/scandesk"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scandesk.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from_path(&path).await.is_err());
    }

    #[test]
    fn test_resolve_path() {
        let config = Config::default();
        let base = Path::new("/etc/scandesk");
        assert_eq!(
            config.resolve_path("/tmp/out", base),
            PathBuf::from("/tmp/out")
        );
        assert_eq!(
            config.resolve_path("out", base),
            PathBuf::from("/etc/scandesk/out")
        );
    }

    #[tokio::test]
    async fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scandesk.json");
        std::fs::write(&path, r#"{"api_url": "http://from-file"}"#).unwrap();

        let (settings, config) = load_settings_with_options(LoadOptions {
            config_path: Some(path),
            api_url: Some("http://from-flag".to_string()),
            data_dir: Some(dir.path().to_path_buf()),
        })
        .await;

        assert_eq!(config.api_url.as_deref(), Some("http://from-file"));
        assert_eq!(settings.api_url, "http://from-flag");
        assert_eq!(settings.data_dir, dir.path());
    }

    #[test]
    fn test_token_roundtrip() {
        let dir = tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().join("nested"));

        settings.save_token("abc.def.ghi\n").unwrap();
        let stored = std::fs::read_to_string(settings.token_path()).unwrap();
        assert_eq!(stored.trim(), "abc.def.ghi");

        assert!(settings.clear_token().unwrap());
        assert!(!settings.clear_token().unwrap());
        assert!(!settings.token_path().exists());
    }
}
