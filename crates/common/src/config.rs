//! Panel configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CONVEYOR_CONFIG";

/// Panel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Panel HTTP listen address
    pub listen_addr: String,

    /// Conveyor backend connection
    pub backend: BackendConfig,

    /// Panel API settings
    pub web: WebConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            backend: BackendConfig::default(),
            web: WebConfig::default(),
        }
    }
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL including API version and project, e.g. `http://conveyor:9999/v1/<project>`
    pub endpoint: String,

    /// Sent as `X-Auth-Token`
    pub auth_token: Option<String>,

    /// Plans per index page
    pub page_size: usize,

    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9999/v1".to_string(),
            auth_token: None,
            page_size: 20,
            timeout_secs: 30,
        }
    }
}

/// Panel API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bearer token required on `/api/plans`; open when unset
    pub auth_token: Option<String>,

    /// Plan level used when a create request names none
    pub default_plan_level: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            default_plan_level: "atomic".to_string(),
        }
    }
}

impl PanelConfig {
    /// Load configuration from file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path from `CONVEYOR_CONFIG`, else `conveyor-panel.toml` in the working directory
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("conveyor-panel.toml"))
    }

    /// Apply `CONVEYOR_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("CONVEYOR_WEB_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(url) = lookup("CONVEYOR_BACKEND_URL") {
            self.backend.endpoint = url;
        }
        if let Some(token) = lookup("CONVEYOR_BACKEND_TOKEN") {
            self.backend.auth_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(token) = lookup("CONVEYOR_WEB_AUTH_TOKEN") {
            self.web.auth_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(size) = lookup("CONVEYOR_PAGE_SIZE") {
            self.backend.page_size = size.parse().map_err(|_| {
                Error::InvalidConfig(format!("CONVEYOR_PAGE_SIZE must be a number, got '{}'", size))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.endpoint.is_empty() {
            return Err(Error::InvalidConfig("backend.endpoint is empty".to_string()));
        }
        if self.backend.page_size == 0 {
            return Err(Error::InvalidConfig(
                "backend.page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
