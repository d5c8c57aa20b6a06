//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use url::Url;

use crate::error::{AppError, AppResult};

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "APSERVE";

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Federation configuration.
    pub federation: FederationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Federation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Whether federation is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Require HTTP signatures on federation GET requests.
    #[serde(default)]
    pub check_get_signature: bool,
    /// Username of the instance actor.
    #[serde(default = "default_instance_actor_username")]
    pub instance_actor_username: String,
    /// Other hostnames served by this instance.
    #[serde(default)]
    pub alternate_hosts: Vec<String>,
    /// Statically blocked hosts, merged with the instance table.
    #[serde(default)]
    pub blocked_hosts: Vec<String>,
    /// Statically silenced hosts, merged with the instance table.
    #[serde(default)]
    pub silenced_hosts: Vec<String>,
    /// Seconds between host policy reloads.
    #[serde(default = "default_host_policy_refresh_secs")]
    pub host_policy_refresh_secs: u64,
    /// Lifetime of a cached remote public key.
    #[serde(default = "default_key_cache_ttl_secs")]
    pub key_cache_ttl_secs: u64,
    /// Timeout for fetching a remote actor's key.
    #[serde(default = "default_key_fetch_timeout_secs")]
    pub key_fetch_timeout_secs: u64,
    /// Maximum allowed distance between a signed `Date` header and now.
    #[serde(default = "default_signature_max_age_secs")]
    pub signature_max_age_secs: i64,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_get_signature: false,
            instance_actor_username: default_instance_actor_username(),
            alternate_hosts: Vec::new(),
            blocked_hosts: Vec::new(),
            silenced_hosts: Vec::new(),
            host_policy_refresh_secs: default_host_policy_refresh_secs(),
            key_cache_ttl_secs: default_key_cache_ttl_secs(),
            key_fetch_timeout_secs: default_key_fetch_timeout_secs(),
            signature_max_age_secs: default_signature_max_age_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "apserve".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_instance_actor_username() -> String {
    "instance.actor".to_string()
}

const fn default_host_policy_refresh_secs() -> u64 {
    60
}

const fn default_key_cache_ttl_secs() -> u64 {
    3600
}

const fn default_key_fetch_timeout_secs() -> u64 {
    10
}

const fn default_signature_max_age_secs() -> i64 {
    300
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `APSERVE_ENV`)
    /// 3. Environment variables with `APSERVE_` prefix (after loading `.env`)
    pub fn load() -> Result<Self, config::ConfigError> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();
        let env = std::env::var("APSERVE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(env_source())
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(env_source())
            .build()?;

        config.try_deserialize()
    }

    /// Parsed public URL of this instance.
    pub fn public_url(&self) -> AppResult<Url> {
        Url::parse(&self.server.url)
            .map_err(|e| AppError::Config(format!("invalid server.url: {e}")))
    }

    /// Hostname that federation peers address this instance by.
    ///
    /// Includes the port when it is not the scheme default, matching the
    /// `Host` header remote servers sign.
    pub fn host(&self) -> AppResult<String> {
        let url = self.public_url()?;
        let host = url
            .host_str()
            .ok_or_else(|| AppError::Config("server.url has no host".to_string()))?;
        Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("federation.alternate_hosts")
        .with_list_parse_key("federation.blocked_hosts")
        .with_list_parse_key("federation.silenced_hosts")
        .try_parsing(true)
}
