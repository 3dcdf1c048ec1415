use crate::error::{BridgeError, Result};
use crate::models::DEFAULT_MODELS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk configuration. Every field has a default so an absent file is
/// equivalent to an empty one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Model ids reported by `/v1/models`.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// The model every request is dispatched to, whatever the client asked for.
    #[serde(default = "default_upstream_model")]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
}

/// Environment variable that overrides `upstream.base_url`.
pub const BASE_URL_ENV: &str = "UPSTREAM_BASE_URL";

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "UPSTREAM_API_KEY".to_string()
}

fn default_upstream_model() -> String {
    "deepseek-reasoner".to_string()
}

fn default_secret_env() -> String {
    "BRIDGE_SECRET".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u64 {
    2048
}

fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| (*m).to_string()).collect()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            model: default_upstream_model(),
            timeout_secs: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream: UpstreamConfig::default(),
            auth: AuthConfig::default(),
            defaults: DefaultsConfig::default(),
            models: default_models(),
        }
    }
}

/// Configuration with every secret and override resolved. Built once at
/// startup and shared read-only by all handlers.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub port: u16,
    pub upstream_url: String,
    pub upstream_key: String,
    pub upstream_model: String,
    pub timeout: Option<Duration>,
    pub secret: String,
    pub defaults: DefaultsConfig,
    pub models: Vec<String>,
}

impl ResolvedConfig {
    /// Full URL of the upstream chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.upstream_url.trim_end_matches('/'))
    }
}

impl BridgeConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve using `lookup` to read variables. Empty values count as unset.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let secret = read(&self.auth.secret_env).ok_or_else(|| {
            BridgeError::config(format!(
                "Environment variable '{}' not set. A shared secret is required to accept requests.",
                self.auth.secret_env
            ))
        })?;

        let upstream_key = read(&self.upstream.api_key_env).ok_or_else(|| {
            BridgeError::config(format!(
                "Environment variable '{}' not set. Set it with your upstream API key.",
                self.upstream.api_key_env
            ))
        })?;

        let upstream_url = read(BASE_URL_ENV).unwrap_or_else(|| self.upstream.base_url.clone());
        if !upstream_url.starts_with("http://") && !upstream_url.starts_with("https://") {
            return Err(BridgeError::config(format!(
                "Upstream base URL '{upstream_url}' must start with http:// or https://"
            )));
        }

        if self.models.is_empty() {
            return Err(BridgeError::config("`models` must list at least one model id"));
        }

        Ok(ResolvedConfig {
            port: self.port,
            upstream_url,
            upstream_key,
            upstream_model: self.upstream.model.clone(),
            timeout: self.upstream.timeout_secs.map(Duration::from_secs),
            secret,
            defaults: self.defaults,
            models: self.models.clone(),
        })
    }
}

/// Candidate config file locations, in search order.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("completion-bridge.toml")];

    if cfg!(target_os = "macos") {
        if let Some(home) = home_dir() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("completion-bridge")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("completion-bridge").join("config.toml"));
        }
        if let Some(home) = home_dir() {
            paths.push(home.join(".config").join("completion-bridge").join("config.toml"));
        }
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".completion-bridge.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000
models = ["alpha", "beta"]

[upstream]
base_url = "http://localhost:9000/v1"
model = "my-model"
timeout_secs = 30

[defaults]
temperature = 0.2
"#
        )
        .unwrap();

        let config = BridgeConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.upstream.model, "my-model");
        assert_eq!(config.upstream.api_key_env, "UPSTREAM_API_KEY");
        assert_eq!(config.upstream.timeout_secs, Some(30));
        assert_eq!(config.defaults.temperature, 0.2);
        assert_eq!(config.defaults.max_tokens, 2048);
        assert_eq!(config.models, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = BridgeConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.upstream.model, "deepseek-reasoner");
        assert_eq!(config.defaults, DefaultsConfig::default());
        assert_eq!(config.models.len(), DEFAULT_MODELS.len());
    }

    #[test]
    fn test_resolve_reads_environment() {
        let config = BridgeConfig::default();
        let resolved = config
            .resolve_with(env(&[
                ("BRIDGE_SECRET", "s3cret"),
                ("UPSTREAM_API_KEY", "sk-up"),
                ("UPSTREAM_BASE_URL", "http://127.0.0.1:8080/v1/"),
            ]))
            .unwrap();

        assert_eq!(resolved.secret, "s3cret");
        assert_eq!(resolved.upstream_key, "sk-up");
        assert_eq!(resolved.completions_url(), "http://127.0.0.1:8080/v1/chat/completions");
        assert_eq!(resolved.timeout, None);
    }

    #[test]
    fn test_resolve_requires_secret() {
        let config = BridgeConfig::default();
        let err = config
            .resolve_with(env(&[("UPSTREAM_API_KEY", "sk-up")]))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config { .. }));
        assert!(err.to_string().contains("BRIDGE_SECRET"));
    }

    #[test]
    fn test_resolve_rejects_blank_secret() {
        let config = BridgeConfig::default();
        let err = config
            .resolve_with(env(&[("BRIDGE_SECRET", "  "), ("UPSTREAM_API_KEY", "sk-up")]))
            .unwrap_err();
        assert!(err.to_string().contains("BRIDGE_SECRET"));
    }

    #[test]
    fn test_resolve_requires_upstream_key() {
        let config = BridgeConfig::default();
        let err = config
            .resolve_with(env(&[("BRIDGE_SECRET", "s3cret")]))
            .unwrap_err();
        assert!(err.to_string().contains("UPSTREAM_API_KEY"));
    }

    #[test]
    fn test_resolve_rejects_bad_url() {
        let mut config = BridgeConfig::default();
        config.upstream.base_url = "api.example.com".to_string();
        let err = config
            .resolve_with(env(&[("BRIDGE_SECRET", "s"), ("UPSTREAM_API_KEY", "k")]))
            .unwrap_err();
        assert!(err.to_string().contains("http://"));
    }
}
