use std::collections::BTreeMap;

use url::Url;

use crate::config::DatabaseSection;
use crate::error::{DeployError, DeployResult};
use crate::shell;
use crate::ssh::Remote;

pub const SCHEME: &str = "postgresql";

/// Credentials persisted on the host; the only durable artifact written there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub connection_string: String,
}

/// `postgresql://<user>:<password>@<host>:<port>/<database>` with the
/// credentials percent-encoded.
pub fn connection_string(
    user: &str,
    password: &str,
    host: &str,
    port: u16,
    database: &str,
) -> DeployResult<String> {
    let mut url = Url::parse(&format!("{}://{}:{}/{}", SCHEME, host, port, database))
        .map_err(|e| DeployError::Invalid(format!("database host '{}': {}", host, e)))?;
    let credentials_err = |_| DeployError::Invalid(format!("cannot set credentials on {}", host));
    url.set_username(user).map_err(credentials_err)?;
    url.set_password(Some(password)).map_err(credentials_err)?;
    Ok(url.to_string())
}

impl DatabaseConfig {
    pub fn new(section: &DatabaseSection, password: &str) -> DeployResult<Self> {
        Ok(Self {
            db_name: section.name.clone(),
            db_user: section.user.clone(),
            db_password: password.to_string(),
            connection_string: connection_string(
                &section.user,
                password,
                &section.host,
                section.port,
                &section.name,
            )?,
        })
    }

    pub fn render(&self) -> String {
        format!(
            "DB_NAME={}\nDB_USER={}\nDB_PASSWORD={}\nDATABASE_URL={}\n",
            self.db_name, self.db_user, self.db_password, self.connection_string
        )
    }

    pub fn parse(content: &str) -> DeployResult<Self> {
        // Values are taken verbatim; a password may start or end with spaces.
        let map: BTreeMap<&str, &str> = content
            .lines()
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            .filter_map(|l| l.split_once('='))
            .map(|(k, v)| (k.trim(), v))
            .collect();

        let field = |key: &str| {
            map.get(key)
                .map(|v| v.to_string())
                .ok_or_else(|| DeployError::Invalid(format!("database config is missing {}", key)))
        };

        Ok(Self {
            db_name: field("DB_NAME")?,
            db_user: field("DB_USER")?,
            db_password: field("DB_PASSWORD")?,
            connection_string: field("DATABASE_URL")?,
        })
    }

    /// Read the persisted config; `None` means provisioning has not run.
    pub async fn read<R: Remote + ?Sized>(remote: &R, path: &str) -> DeployResult<Option<Self>> {
        let quoted = shell::quote_path(path);
        if !remote.exec_ok(&format!("test -f {}", quoted)).await? {
            return Ok(None);
        }
        let content = remote.exec(&format!("cat {}", quoted)).await?;
        Self::parse(&content).map(Some)
    }

    /// Create the config directory and reset it to 700 whatever it was before.
    pub async fn prepare_dir<R: Remote + ?Sized>(remote: &R, dir: &str) -> DeployResult<()> {
        let dir = shell::quote_path(dir);
        remote
            .exec(&format!("mkdir -p {} && chmod 700 {}", dir, dir))
            .await?;
        Ok(())
    }

    /// Overwrite the config file and reset it to 600.
    pub async fn write<R: Remote + ?Sized>(&self, remote: &R, path: &str) -> DeployResult<()> {
        let path = shell::quote_path(path);
        remote.write_file(&path, &self.render()).await?;
        remote.exec(&format!("chmod 600 {}", path)).await?;
        Ok(())
    }
}
