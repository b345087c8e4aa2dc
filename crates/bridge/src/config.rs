use crate::cache::ClientIdentityCache;
use crate::idp::{IdpConfig, IdpError, IdpRegistry};
use crate::validator::GrantLifetimes;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "BRIDGE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Upper bound for any configured lifetime (one year).
const MAX_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error("Invalid IdP configuration: {0}")]
    Idp(#[from] IdpError),
}

fn default_ca_cert_path() -> PathBuf {
    PathBuf::from("/etc/ipa/ca.crt")
}

fn default_api_version() -> String {
    "2.254".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

/// Where and how to reach the directory's JSON-RPC endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEndpointConfig {
    /// Host name (optionally `host:port`) of the directory server
    pub server: String,
    /// PEM bundle of the only CA trusted for the endpoint
    #[serde(default = "default_ca_cert_path")]
    pub ca_cert_path: PathBuf,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl IdentityEndpointConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ca_cert_path: default_ca_cert_path(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("https://{}/ipa", self.server)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Validation(
                "identity.server must not be empty".into(),
            ));
        }
        if self.server.contains("://") || self.server.contains('/') {
            return Err(ConfigError::Validation(
                "identity.server must be a host name, not a URL".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "identity.timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_code_lifetime_secs() -> u64 {
    600
}

fn default_access_token_lifetime_secs() -> u64 {
    3600
}

fn default_refresh_token_lifetime_secs() -> u64 {
    7 * 24 * 3600
}

fn default_client_cache_ttl_secs() -> u64 {
    300
}

fn default_client_cache_capacity() -> usize {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2Config {
    #[serde(default = "default_code_lifetime_secs")]
    pub code_lifetime_secs: u64,
    #[serde(default = "default_access_token_lifetime_secs")]
    pub access_token_lifetime_secs: u64,
    #[serde(default = "default_refresh_token_lifetime_secs")]
    pub refresh_token_lifetime_secs: u64,
    /// Must not exceed `code_lifetime_secs`
    #[serde(default = "default_client_cache_ttl_secs")]
    pub client_cache_ttl_secs: u64,
    #[serde(default = "default_client_cache_capacity")]
    pub client_cache_capacity: usize,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            code_lifetime_secs: default_code_lifetime_secs(),
            access_token_lifetime_secs: default_access_token_lifetime_secs(),
            refresh_token_lifetime_secs: default_refresh_token_lifetime_secs(),
            client_cache_ttl_secs: default_client_cache_ttl_secs(),
            client_cache_capacity: default_client_cache_capacity(),
        }
    }
}

impl OAuth2Config {
    pub fn lifetimes(&self) -> GrantLifetimes {
        // validate() bounds every value by MAX_LIFETIME_SECS
        let secs = |v: u64| time::Duration::seconds(v.min(MAX_LIFETIME_SECS) as i64);
        GrantLifetimes {
            code: secs(self.code_lifetime_secs),
            access_token: secs(self.access_token_lifetime_secs),
            refresh_token: secs(self.refresh_token_lifetime_secs),
        }
    }

    pub fn client_cache(&self) -> ClientIdentityCache {
        ClientIdentityCache::new(
            Duration::from_secs(self.client_cache_ttl_secs),
            self.client_cache_capacity,
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("code_lifetime_secs", self.code_lifetime_secs),
            ("access_token_lifetime_secs", self.access_token_lifetime_secs),
            ("refresh_token_lifetime_secs", self.refresh_token_lifetime_secs),
            ("client_cache_ttl_secs", self.client_cache_ttl_secs),
        ] {
            if value == 0 || value > MAX_LIFETIME_SECS {
                return Err(ConfigError::Validation(format!(
                    "oauth2.{name} must be between 1 and {MAX_LIFETIME_SECS}"
                )));
            }
        }
        if self.client_cache_ttl_secs > self.code_lifetime_secs {
            return Err(ConfigError::Validation(
                "oauth2.client_cache_ttl_secs must not exceed oauth2.code_lifetime_secs".into(),
            ));
        }
        if self.client_cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "oauth2.client_cache_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Kerberos realm every client principal must belong to
    pub realm: String,
    pub identity: IdentityEndpointConfig,
    #[serde(default)]
    pub oauth2: OAuth2Config,
    /// Durable grant store; the in-memory store is used when unset
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub idps: Vec<IdpConfig>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm.trim().is_empty() {
            return Err(ConfigError::Validation("realm must not be empty".into()));
        }
        self.identity.validate()?;
        self.oauth2.validate()?;
        self.idp_registry()?;
        Ok(())
    }

    pub fn idp_registry(&self) -> Result<IdpRegistry, ConfigError> {
        Ok(IdpRegistry::from_configs(&self.idps)?)
    }
}

/// Path of the configuration file: `$BRIDGE_CONFIG` or `config.yaml`.
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Load application configuration from the config file + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `IDENTITY__SERVER`, `OAUTH2__CODE_LIFETIME_SECS`)
/// overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File, FileFormat};
    let cfg = Config::builder()
        .add_source(File::new(path, FileFormat::Yaml))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let oauth2 = OAuth2Config::default();
        oauth2.validate().unwrap();
        let lifetimes = oauth2.lifetimes();
        assert_eq!(lifetimes, GrantLifetimes::default());
        assert!(oauth2.client_cache().ttl() <= Duration::from_secs(oauth2.code_lifetime_secs));
    }

    #[test]
    fn cache_ttl_must_not_outlive_codes() {
        let oauth2 = OAuth2Config {
            client_cache_ttl_secs: 601,
            ..OAuth2Config::default()
        };
        assert!(matches!(oauth2.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_lifetimes_are_rejected() {
        let oauth2 = OAuth2Config {
            access_token_lifetime_secs: 0,
            ..OAuth2Config::default()
        };
        assert!(oauth2.validate().is_err());
    }

    #[test]
    fn server_must_be_a_host() {
        assert!(IdentityEndpointConfig::new("ipa.example.com").validate().is_ok());
        assert!(IdentityEndpointConfig::new("https://ipa.example.com").validate().is_err());
        assert!(IdentityEndpointConfig::new("").validate().is_err());
    }

    #[test]
    fn base_url_points_at_ipa() {
        let identity = IdentityEndpointConfig::new("ipa.example.com");
        assert_eq!(identity.base_url(), "https://ipa.example.com/ipa");
        assert_eq!(identity.timeout(), Duration::from_secs(5));
    }
}
