use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

pub const MICROMAMBA_ENV: &str = "VIRALFLOW_MICROMAMBA";
pub const MAMBA_ROOT_PREFIX_ENV: &str = "MAMBA_ROOT_PREFIX";

fn normalized_non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_value(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .and_then(|v| normalized_non_empty(&v))
}

pub fn home_dir_from_env() -> Option<PathBuf> {
    env_value("HOME")
        .or_else(|| env_value("USERPROFILE"))
        .map(PathBuf::from)
}

/// Resolves external tool locations: explicit override, then environment
/// variable, then a default.
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    overrides: HashMap<String, String>,
    home: Option<PathBuf>,
}

impl ToolResolver {
    pub fn new(home: Option<PathBuf>) -> Self {
        Self {
            overrides: HashMap::new(),
            home,
        }
    }

    pub fn from_env() -> Self {
        Self::new(home_dir_from_env())
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// An empty value removes the override.
    pub fn set_override(&mut self, env_var: &str, configured: &str) {
        if let Some(value) = normalized_non_empty(configured) {
            self.overrides.insert(env_var.to_string(), value);
        } else {
            self.overrides.remove(env_var);
        }
    }

    pub fn get_override(&self, env_var: &str) -> Option<String> {
        self.overrides.get(env_var).cloned()
    }

    fn configured(&self, env_var: &str) -> Option<String> {
        self.get_override(env_var).or_else(|| env_value(env_var))
    }

    /// `~/bin/micromamba` is preferred over a PATH lookup when present.
    pub fn micromamba_command(&self) -> String {
        if let Some(configured) = self.configured(MICROMAMBA_ENV) {
            return configured;
        }
        if let Some(home) = &self.home {
            let from_home_bin = home.join("bin").join("micromamba");
            if from_home_bin.is_file() {
                return from_home_bin.display().to_string();
            }
        }
        "micromamba".to_string()
    }

    /// Extra environment for micromamba invocations.
    pub fn micromamba_env(&self) -> Vec<(String, String)> {
        if let Some(prefix) = self.configured(MAMBA_ROOT_PREFIX_ENV) {
            return vec![(MAMBA_ROOT_PREFIX_ENV.to_string(), prefix)];
        }
        self.home
            .as_ref()
            .map(|home| {
                vec![(
                    MAMBA_ROOT_PREFIX_ENV.to_string(),
                    home.join("micromamba").display().to_string(),
                )]
            })
            .unwrap_or_default()
    }
}
