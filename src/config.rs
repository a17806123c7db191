use crate::error::{Result, ViralflowError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

pub const CONFIG_DIR_ENV: &str = "VIRALFLOW_GUI_CONFIG_DIR";
pub const CONFIG_FILE: &str = "config.json";
pub const PARAMS_FILE: &str = "params.json";

/// Maps a system locale such as `pt_BR.UTF-8` onto a supported UI locale.
pub fn default_locale(system: Option<&str>) -> String {
    let lower = system.unwrap_or("en").to_lowercase();
    if lower.starts_with("pt") {
        "pt-BR".to_string()
    } else {
        "en".to_string()
    }
}

pub fn system_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty() && v != "C" && v != "POSIX")
}

/// Where the configuration and parameter store live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Explicit directory, then `VIRALFLOW_GUI_CONFIG_DIR`, then
    /// `$HOME/.config/viralflow-gui`.
    pub fn resolve(explicit: Option<PathBuf>, home: Option<&Path>) -> Self {
        if let Some(dir) = explicit {
            return Self::new(dir);
        }
        if let Some(dir) = std::env::var(CONFIG_DIR_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            return Self::new(dir);
        }
        match home {
            Some(home) => Self::new(home.join(".config").join("viralflow-gui")),
            None => Self::new(".viralflow-gui"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn params_path(&self) -> PathBuf {
        self.config_dir.join(PARAMS_FILE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub repo_path: Option<PathBuf>,
    pub locale: String,
    pub containers_built: bool,
}

impl AppConfig {
    pub fn with_locale(locale: String) -> Self {
        Self {
            repo_path: None,
            locale,
            containers_built: false,
        }
    }

    /// Lenient decoding: a missing locale or a non-boolean `containersBuilt`
    /// falls back instead of failing.
    fn from_json(value: &Value, default_locale: &str) -> Self {
        let repo_path = value
            .get("repoPath")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let locale = value
            .get("locale")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(default_locale)
            .to_string();
        let containers_built = value
            .get("containersBuilt")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            repo_path,
            locale,
            containers_built,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    default_locale: String,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, default_locale: String) -> Self {
        Self {
            path: path.into(),
            default_locale,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Never fails: an absent or unreadable file yields the default config.
    pub fn load(&self) -> AppConfig {
        match self.try_load() {
            Ok(Some(config)) => config,
            Ok(None) => AppConfig::with_locale(self.default_locale.clone()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read config");
                AppConfig::with_locale(self.default_locale.clone())
            }
        }
    }

    fn try_load(&self) -> Result<Option<AppConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path).map_err(|e| ViralflowError::read(&self.path, e))?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| ViralflowError::parse_json(&self.path, e))?;
        Ok(Some(AppConfig::from_json(&value, &self.default_locale)))
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| ViralflowError::write(dir, e))?;
        }
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, text).map_err(|e| ViralflowError::write(&self.path, e))?;
        debug!(path = %self.path.display(), "saved config");
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut AppConfig)) -> Result<AppConfig> {
        let mut config = self.load();
        change(&mut config);
        self.save(&config)?;
        Ok(config)
    }

    pub fn set_repo_path(&self, repo_path: Option<PathBuf>) -> Result<AppConfig> {
        let repo_path = repo_path.filter(|p| !p.as_os_str().is_empty());
        self.update(|c| c.repo_path = repo_path)
    }

    /// `None` or an empty locale restores the system default.
    pub fn set_locale(&self, locale: Option<&str>) -> Result<AppConfig> {
        let locale = locale
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_locale.clone());
        self.update(|c| c.locale = locale)
    }

    pub fn set_containers_built(&self, built: bool) -> Result<AppConfig> {
        self.update(|c| c.containers_built = built)
    }
}
