use crate::config::{Environment, HmsgConfig};
use crate::retry::RetryPolicy;

pub struct DeployContext {
    pub config: HmsgConfig,
    pub environment: Environment,
    pub image_reference: String,
    pub database_url: String,
    /// Public address used for the reported URLs.
    pub host: String,
    /// The database lives elsewhere (e.g. RDS); no local config file is required.
    pub external_db: bool,
}

impl DeployContext {
    pub fn new(
        config: HmsgConfig,
        environment: Environment,
        image_reference: String,
        database_url: String,
        host: String,
    ) -> Self {
        Self {
            config,
            environment,
            image_reference,
            database_url,
            host,
            external_db: false,
        }
    }

    pub fn with_external_db(mut self, external_db: bool) -> Self {
        self.external_db = external_db;
        self
    }

    pub fn container_name(&self) -> &str {
        &self.environment.container_name
    }

    pub fn remote_logs_dir(&self) -> String {
        self.config.logs_dir()
    }

    pub fn remote_config_file(&self) -> String {
        self.config.config_file()
    }

    pub fn verify_policy(&self) -> RetryPolicy {
        self.config.container_retry()
    }
}
