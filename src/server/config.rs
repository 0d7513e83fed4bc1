use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::ssh::SshConfig;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub jwt_secret: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// When unset, container listings are cached in process memory.
    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,

    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,

    #[serde(default = "default_ssh_key_encryption_key")]
    pub ssh_key_encryption_key: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_ssh_connect_timeout_secs")]
    pub ssh_connect_timeout_secs: u64,

    #[serde(default = "default_ssh_command_timeout_secs")]
    pub ssh_command_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub ssh_verify_host_key: bool,

    #[serde(default)]
    pub ssh_known_hosts_file: Option<String>,

    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    jwt_secret: Option<String>,
    bind_address: Option<String>,
    redis_url: Option<String>,
    cache_ttl_secs: Option<u64>,
    access_token_minutes: Option<i64>,
    refresh_token_days: Option<i64>,
    ssh_key_encryption_key: Option<String>,
    log_dir: Option<String>,
    ssh_connect_timeout_secs: Option<u64>,
    ssh_command_timeout_secs: Option<u64>,
    ssh_verify_host_key: Option<bool>,
    ssh_known_hosts_file: Option<String>,
    ssh_binary: Option<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_access_token_minutes() -> i64 {
    30
}

fn default_refresh_token_days() -> i64 {
    7
}

fn default_ssh_key_encryption_key() -> String {
    // Development key. Override in production.
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_ssh_connect_timeout_secs() -> u64 {
    10
}

fn default_ssh_command_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = match config_path {
            Some(path_str) => {
                let path = Path::new(path_str);
                if path.exists() {
                    let contents = fs::read_to_string(path)
                        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                    Self::parse_partial(&contents)
                        .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
                } else {
                    PartialServerConfig::default()
                }
            }
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn parse_partial(contents: &str) -> Result<PartialServerConfig, toml::de::Error> {
        toml::from_str(contents)
    }

    fn merge(env: PartialServerConfig, file: PartialServerConfig) -> Result<Self, String> {
        let config = ServerConfig {
            database_url: env
                .database_url
                .or(file.database_url)
                .ok_or("DATABASE_URL is required")?,
            jwt_secret: env
                .jwt_secret
                .or(file.jwt_secret)
                .ok_or("JWT_SECRET is required")?,
            bind_address: env
                .bind_address
                .or(file.bind_address)
                .unwrap_or_else(default_bind_address),
            redis_url: env.redis_url.or(file.redis_url),
            cache_ttl_secs: env
                .cache_ttl_secs
                .or(file.cache_ttl_secs)
                .unwrap_or_else(default_cache_ttl_secs),
            access_token_minutes: env
                .access_token_minutes
                .or(file.access_token_minutes)
                .unwrap_or_else(default_access_token_minutes),
            refresh_token_days: env
                .refresh_token_days
                .or(file.refresh_token_days)
                .unwrap_or_else(default_refresh_token_days),
            ssh_key_encryption_key: env
                .ssh_key_encryption_key
                .or(file.ssh_key_encryption_key)
                .unwrap_or_else(default_ssh_key_encryption_key),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            ssh_connect_timeout_secs: env
                .ssh_connect_timeout_secs
                .or(file.ssh_connect_timeout_secs)
                .unwrap_or_else(default_ssh_connect_timeout_secs),
            ssh_command_timeout_secs: env
                .ssh_command_timeout_secs
                .or(file.ssh_command_timeout_secs)
                .unwrap_or_else(default_ssh_command_timeout_secs),
            ssh_verify_host_key: env
                .ssh_verify_host_key
                .or(file.ssh_verify_host_key)
                .unwrap_or(true),
            ssh_known_hosts_file: env.ssh_known_hosts_file.or(file.ssh_known_hosts_file),
            ssh_binary: env
                .ssh_binary
                .or(file.ssh_binary)
                .unwrap_or_else(default_ssh_binary),
        };

        if config.cache_ttl_secs == 0 {
            return Err("CACHE_TTL_SECS must be greater than zero".to_string());
        }

        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn ssh_config(&self) -> SshConfig {
        SshConfig {
            ssh_binary: self.ssh_binary.clone(),
            connect_timeout: Duration::from_secs(self.ssh_connect_timeout_secs),
            command_timeout: Duration::from_secs(self.ssh_command_timeout_secs),
            verify_host_key: self.ssh_verify_host_key,
            known_hosts_file: self.ssh_known_hosts_file.clone().map(Into::into),
            key_dir: None,
        }
    }
}
