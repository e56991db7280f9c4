use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use portal_client::ClientConfig;
use serde::Deserialize;

use crate::session::SessionRegistry;

/// Settings shared by the web portal and the CLI.
///
/// Read from an optional YAML file, then overridden by `PORTAL_*` variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub api_base_url: String,
    pub web_port: u16,
    pub http_timeout_secs: u64,
    pub user_agent: Option<String>,
    pub session_file: PathBuf,
    pub assets_dir: PathBuf,
    /// Browser sessions unused this long are dropped.
    pub session_idle_secs: u64,
    /// How long a signed-in user's role is trusted before it is re-read.
    pub user_refresh_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            web_port: 8080,
            http_timeout_secs: 20,
            user_agent: None,
            session_file: PathBuf::from(".portal-session.json"),
            assets_dir: PathBuf::from("assets/static"),
            session_idle_secs: 8 * 60 * 60,
            user_refresh_secs: 60,
        }
    }
}

impl PortalConfig {
    /// `.env`, then the YAML file named by `PORTAL_CONFIG` (default
    /// `portal.yaml`, skipped when absent), then environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var("PORTAL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("portal.yaml"));
        let mut config = if path.exists() {
            Self::from_yaml_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&yaml).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PORTAL_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("PORTAL_WEB_PORT").and_then(|v| v.parse().ok()) {
            self.web_port = v;
        }
        if let Some(v) = lookup("PORTAL_HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.http_timeout_secs = v;
        }
        if let Some(v) = lookup("PORTAL_USER_AGENT") {
            self.user_agent = Some(v);
        }
        if let Some(v) = lookup("PORTAL_SESSION_FILE") {
            self.session_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("PORTAL_ASSETS_DIR") {
            self.assets_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PORTAL_SESSION_IDLE_SECS").and_then(|v| v.parse().ok()) {
            self.session_idle_secs = v;
        }
        if let Some(v) = lookup("PORTAL_USER_REFRESH_SECS").and_then(|v| v.parse().ok()) {
            self.user_refresh_secs = v;
        }
    }

    pub fn session_registry(&self) -> SessionRegistry {
        SessionRegistry::new(
            Duration::from_secs(self.session_idle_secs),
            Duration::from_secs(self.user_refresh_secs),
        )
    }

    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            base_url: self.api_base_url.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs.max(1)),
            user_agent: self.user_agent.clone().or(defaults.user_agent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("portal.yaml");
        std::fs::write(&path, "api_base_url: https://api.example.com\nweb_port: 9000\n").unwrap();

        let config = PortalConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.web_port, 9000);
        assert_eq!(config.http_timeout_secs, 20);
        assert_eq!(config.assets_dir, PathBuf::from("assets/static"));
        assert_eq!(config.user_refresh_secs, 60);
    }

    #[test]
    fn env_overrides_win_and_bad_numbers_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("PORTAL_API_BASE_URL", "http://backend:8000"),
            ("PORTAL_WEB_PORT", "not-a-port"),
            ("PORTAL_HTTP_TIMEOUT_SECS", "5"),
            ("PORTAL_SESSION_IDLE_SECS", "900"),
            ("PORTAL_USER_REFRESH_SECS", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = PortalConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_base_url, "http://backend:8000");
        assert_eq!(config.web_port, 8080);
        assert_eq!(config.session_idle_secs, 900);
        assert_eq!(config.user_refresh_secs, 0);

        let client = config.client_config();
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert!(client.user_agent.is_some());
    }
}
