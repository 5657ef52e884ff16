//! Conveyor CLI
//!
//! Command-line client for listing, editing and running clone and migrate
//! plans against the Conveyor backend.

pub mod commands;
pub mod output;

use conveyor_common::PanelConfig;
use std::path::PathBuf;

/// Connection overrides given on the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

/// Loads the panel config (file, then environment, then flags).
pub fn load_config(overrides: &Overrides) -> conveyor_common::Result<PanelConfig> {
    let path = overrides
        .config
        .clone()
        .unwrap_or_else(PanelConfig::default_path);
    let mut config = PanelConfig::load(&path)?;
    config.apply_env()?;
    apply_overrides(&mut config, overrides);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut PanelConfig, overrides: &Overrides) {
    if let Some(endpoint) = &overrides.endpoint {
        config.backend.endpoint = endpoint.clone();
    }
    if let Some(token) = overrides.token.as_deref().filter(|t| !t.is_empty()) {
        config.backend.auth_token = Some(token.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.toml");
        std::fs::write(
            &path,
            "[backend]\nendpoint = \"http://backend:9999/v1\"\nauth_token = \"file-token\"\n",
        )
        .unwrap();

        let mut config = PanelConfig::load(&path).unwrap();
        apply_overrides(
            &mut config,
            &Overrides {
                config: Some(path.clone()),
                endpoint: Some("http://other:9999/v1".to_string()),
                token: Some(String::new()),
            },
        );
        assert_eq!(config.backend.endpoint, "http://other:9999/v1");
        assert_eq!(config.backend.auth_token.as_deref(), Some("file-token"));
    }
}
