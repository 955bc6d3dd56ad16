use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::services::auth_service::LoginBackend;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub livy: LivyConfig,

    pub reports: ReportsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/dataplate.db".to_string(),
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,

    pub port: u16,

    /// Whether to set the Secure flag on session cookies.
    /// Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Sessions expire after this many minutes without a request.
    pub session_idle_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            secure_cookies: true,
            session_idle_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Credential backend: "ldap" or "demo".
    pub backend: String,

    /// Roles given to every user on first login.
    pub default_roles: Vec<String>,

    /// Usernames that receive the "admin" role on first login.
    pub admin_users: Vec<String>,

    pub ldap: LdapConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            backend: "ldap".to_string(),
            default_roles: Vec::new(),
            admin_users: Vec::new(),
            ldap: LdapConfig::default(),
        }
    }
}

impl AuthConfig {
    pub fn login_backend(&self) -> Result<LoginBackend> {
        self.backend.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapConfig {
    /// e.g. `ldap://ldap.example.org:389` or `ldaps://...`
    pub url: String,

    pub base_dn: String,

    /// Full DN to search users under. Falls back to `base_dn` when empty.
    pub user_search_base: String,

    pub user_login_attr: String,

    pub user_object_filter: String,

    pub display_name_attr: String,

    /// Direct bind template such as `uid={username},ou=people,dc=example,dc=org`.
    /// When set, no search is performed before the user bind.
    pub user_dn_template: Option<String>,

    /// Service account used for the user search. Anonymous search when unset.
    pub bind_dn: Option<String>,

    pub bind_password: Option<String>,

    pub starttls: bool,

    pub connect_timeout_seconds: u64,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            base_dn: "dc=example,dc=org".to_string(),
            user_search_base: String::new(),
            user_login_attr: "uid".to_string(),
            user_object_filter: "(objectClass=person)".to_string(),
            display_name_attr: "displayName".to_string(),
            user_dn_template: None,
            bind_dn: None,
            bind_password: None,
            starttls: false,
            connect_timeout_seconds: 10,
        }
    }
}

impl LdapConfig {
    #[must_use]
    pub fn search_base(&self) -> &str {
        if self.user_search_base.is_empty() {
            &self.base_dn
        } else {
            &self.user_search_base
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivyConfig {
    pub url: String,

    /// Session kind requested when a new session is created (spark, pyspark, sql...)
    pub session_kind: String,

    /// Create a new session when the tracked one is gone or finished.
    pub auto_create_session: bool,

    pub request_timeout_seconds: u64,

    pub statement_poll_interval_ms: u64,

    pub statement_timeout_seconds: u64,
}

impl Default for LivyConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8998".to_string(),
            session_kind: "spark".to_string(),
            auto_create_session: true,
            request_timeout_seconds: 30,
            statement_poll_interval_ms: 1000,
            statement_timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Initial reports location, copied into the global config row on first start.
    pub location: String,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            location: "./reports".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "dataplate".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            livy: LivyConfig::default(),
            reports: ReportsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        if let Ok(explicit) = std::env::var("DATAPLATE_CONFIG") {
            paths.push(PathBuf::from(explicit));
        }

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("dataplate").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".dataplate").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let backend = self.auth.login_backend()?;

        if backend == LoginBackend::Ldap {
            url::Url::parse(&self.auth.ldap.url).context("Invalid LDAP URL")?;
            if self.auth.ldap.user_dn_template.is_none() && self.auth.ldap.search_base().is_empty()
            {
                anyhow::bail!("LDAP base_dn or user_dn_template must be set");
            }
        }

        url::Url::parse(&self.livy.url).context("Invalid Livy URL")?;

        if self.livy.statement_poll_interval_ms == 0 {
            anyhow::bail!("Livy statement poll interval must be > 0");
        }

        Ok(())
    }
}
