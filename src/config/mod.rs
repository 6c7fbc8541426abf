use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::DeployResult;
use crate::retry::{Backoff, RetryPolicy};

pub mod environment;
pub mod resolve;
mod validate;

pub use environment::Environment;
pub use resolve::{CommandKind, DeploymentTarget, Settings};

/// Optional `hmsg.toml` tuning file. Every field has a default.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct HmsgConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_build_context")]
    pub build_context: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    pub dockerfile: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            build_context: default_build_context(),
            platform: default_platform(),
            dockerfile: None,
        }
    }
}

fn default_app_name() -> String {
    "health-message-app".to_string()
}
fn default_build_context() -> String {
    ".".to_string()
}
fn default_platform() -> String {
    "linux/amd64".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseSection {
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_db_user")]
    pub user: String,
    /// Address the container uses to reach PostgreSQL on the host.
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Private ranges admitted by pg_hba.conf besides loopback.
    #[serde(default = "default_networks")]
    pub networks: Vec<String>,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            name: default_db_name(),
            user: default_db_user(),
            host: default_db_host(),
            port: default_db_port(),
            networks: default_networks(),
        }
    }
}

fn default_db_name() -> String {
    "health_message_db".to_string()
}
fn default_db_user() -> String {
    "hmsg_user".to_string()
}
fn default_db_host() -> String {
    "172.17.0.1".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_networks() -> Vec<String> {
    vec!["172.16.0.0/12".to_string(), "192.168.0.0/16".to_string()]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_app_root")]
    pub app_root: String,
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            app_root: default_app_root(),
            config_dir: default_config_dir(),
        }
    }
}

fn default_app_root() -> String {
    "~/hmsg".to_string()
}
fn default_config_dir() -> String {
    "~/.hmsg".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VerifyConfig {
    #[serde(default = "default_db_attempts")]
    pub db_attempts: u32,
    #[serde(default = "default_db_delay")]
    pub db_delay_secs: u64,
    #[serde(default)]
    pub db_exponential: bool,
    #[serde(default = "default_settle")]
    pub container_settle_secs: u64,
    #[serde(default = "default_container_attempts")]
    pub container_attempts: u32,
    #[serde(default = "default_container_delay")]
    pub container_delay_secs: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            db_attempts: default_db_attempts(),
            db_delay_secs: default_db_delay(),
            db_exponential: false,
            container_settle_secs: default_settle(),
            container_attempts: default_container_attempts(),
            container_delay_secs: default_container_delay(),
        }
    }
}

fn default_db_attempts() -> u32 {
    5
}
fn default_db_delay() -> u64 {
    2
}
fn default_settle() -> u64 {
    10
}
fn default_container_attempts() -> u32 {
    1
}
fn default_container_delay() -> u64 {
    5
}

impl HmsgConfig {
    /// Load the tuning file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> DeployResult<Self> {
        if !path.exists() {
            tracing::debug!("{} not found, using defaults", path.display());
            let config = Self::default();
            validate::validate(&config)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> DeployResult<Self> {
        let config: Self = toml::from_str(content)?;
        validate::validate(&config)?;
        Ok(config)
    }

    pub fn config_file(&self) -> String {
        format!("{}/database.env", self.remote.config_dir.trim_end_matches('/'))
    }

    pub fn logs_dir(&self) -> String {
        format!("{}/logs", self.remote.app_root.trim_end_matches('/'))
    }

    pub fn db_retry(&self) -> RetryPolicy {
        let v = &self.verify;
        let policy = RetryPolicy::fixed(v.db_attempts, Duration::from_secs(v.db_delay_secs));
        if v.db_exponential {
            policy.with_backoff(Backoff::Exponential {
                factor: 2,
                max: Duration::from_secs(30),
            })
        } else {
            policy
        }
    }

    pub fn container_retry(&self) -> RetryPolicy {
        let v = &self.verify;
        RetryPolicy {
            max_attempts: v.container_attempts,
            initial_delay: Duration::from_secs(v.container_settle_secs),
            delay: Duration::from_secs(v.container_delay_secs),
            backoff: Backoff::Fixed,
        }
    }
}
