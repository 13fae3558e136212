use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::IpAddr;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".OpenMarks";
const CONFIG_FILE: &str = "config.json";
const ENV_PORT: &str = "OPENMARKS_PORT";
const ENV_DB_PATH: &str = "OPENMARKS_DB_PATH";
pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_host: IpAddr,
    pub api_port: u16,
    pub db_path: PathBuf,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            api_host: IpAddr::from([127, 0, 0, 1]),
            api_port: 3100,
            db_path: root.join("db").join("bookmarks.db"),
            default_limit: DEFAULT_LIMIT,
            max_limit: 200,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    /// `OPENMARKS_PORT` and `OPENMARKS_DB_PATH` take precedence over the file.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(port) = env::var(ENV_PORT) {
            self.api_port = port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("{ENV_PORT} must be a port number: {port}"))?;
        }

        if let Ok(path) = env::var(ENV_DB_PATH) {
            if !path.trim().is_empty() {
                self.db_path = expand_home(path.trim());
            }
        }

        Ok(self)
    }

    /// Limit to use for a bookmark listing: absent or zero means the default,
    /// anything above `max_limit` is capped.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|limit| *limit > 0)
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "api_host" => {
                self.api_host = value
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| anyhow!("api_host must be an IP address"))?;
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "db_path" => {
                self.db_path = expand_home(value.trim());
            }
            "default_limit" => {
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("default_limit must be a number"))?;
                if parsed == 0 {
                    bail!("default_limit must be greater than 0");
                }
                self.default_limit = parsed;
            }
            "max_limit" => {
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("max_limit must be a number"))?;
                if parsed == 0 {
                    bail!("max_limit must be greater than 0");
                }
                self.max_limit = parsed;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: api_host|api.host, api_port|api.port, db_path|db.path, default_limit|bookmarks.default_limit, max_limit|bookmarks.max_limit"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "api_host" => Some(self.api_host.to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "default_limit" => Some(self.default_limit.to_string()),
            "max_limit" => Some(self.max_limit.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "api_host" | "api.host" => "api_host",
        "api_port" | "api.port" => "api_port",
        "db_path" | "db.path" => "db_path",
        "default_limit" | "bookmarks.default_limit" => "default_limit",
        "max_limit" | "bookmarks.max_limit" => "max_limit",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn effective_limit_defaults_and_caps() {
        let config = Config::default();

        assert_eq!(config.effective_limit(None), 20);
        assert_eq!(config.effective_limit(Some(0)), 20);
        assert_eq!(config.effective_limit(Some(5)), 5);
        assert_eq!(config.effective_limit(Some(10_000)), 200);
    }

    #[test]
    fn set_and_get_with_dotted_aliases() {
        let mut config = Config::default();

        config.set_value("api.port", "4100").expect("port");
        config.set_value("bookmarks.default_limit", "12").expect("limit");

        assert_eq!(config.get_value("api_port").as_deref(), Some("4100"));
        assert_eq!(config.get_value("default_limit").as_deref(), Some("12"));
        assert!(config.set_value("default_limit", "0").is_err());
        assert!(config.set_value("unknown", "1").is_err());
        assert!(config.get_value("unknown").is_none());
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.set_value("api.port", "4321").expect("port");
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.api_port, 4321);
        assert_eq!(loaded.default_limit, 20);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_port": 9000}"#).expect("write");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.api_port, 9000);
        assert_eq!(loaded.max_limit, 200);
    }
}
