use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::HmsgConfig;
use crate::error::{DeployError, DeployResult};

pub const DOCKER_REGISTRY: &str = "DOCKER_REGISTRY";
pub const EC2_HOST: &str = "EC2_HOST";
pub const EC2_USER: &str = "EC2_USER";
pub const PEM_KEY_PATH: &str = "PEM_KEY_PATH";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DB_PASSWORD: &str = "DB_PASSWORD";
pub const ENVIRONMENT: &str = "ENVIRONMENT";

pub const DEFAULT_USER: &str = "ubuntu";
pub const DEFAULT_ENVIRONMENT: &str = "production";
pub const PLACEHOLDER_PASSWORD: &str = "changeme";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Setup,
    Build,
    Deploy,
    Full,
    DatabaseLocal,
    DatabaseRds,
    Status,
    Logs,
    Help,
}

impl CommandKind {
    pub fn required(self) -> &'static [&'static str] {
        match self {
            Self::Setup | Self::Help | Self::DatabaseRds => &[],
            Self::Build => &[DOCKER_REGISTRY],
            Self::Deploy => &[EC2_HOST, PEM_KEY_PATH, DOCKER_REGISTRY, DATABASE_URL],
            Self::Full => &[DOCKER_REGISTRY, EC2_HOST, PEM_KEY_PATH, DATABASE_URL],
            Self::DatabaseLocal | Self::Status | Self::Logs => &[EC2_HOST, PEM_KEY_PATH],
        }
    }
}

/// Every required variable for `kind` that `lookup` cannot supply. Empty means ready.
pub fn missing_for<F>(kind: CommandKind, lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    kind.required()
        .iter()
        .copied()
        .filter(|name| lookup(name).map_or(true, |v| v.trim().is_empty()))
        .collect()
}

/// Where to deploy and how to log in.
#[derive(Debug, Clone)]
pub struct DeploymentTarget {
    pub host_address: String,
    pub ssh_user: String,
    pub identity_file_path: PathBuf,
}

impl DeploymentTarget {
    /// Expand `~/`, require the identity file, and restrict it to owner-read.
    pub fn new(host: &str, user: &str, identity: &str) -> DeployResult<Self> {
        let path = expand_home(identity);
        if !path.is_file() {
            return Err(DeployError::FileNotFound(format!(
                "{} ({})",
                PEM_KEY_PATH,
                path.display()
            )));
        }

        restrict_permissions(&path)?;

        Ok(Self {
            host_address: host.to_string(),
            ssh_user: user.to_string(),
            identity_file_path: path,
        })
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> DeployResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)?.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        warn!(
            "{} has mode {:o}, restricting to 400",
            path.display(),
            mode
        );
        fs::set_permissions(path, fs::Permissions::from_mode(0o400))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> DeployResult<()> {
    Ok(())
}

/// Validated configuration built once at entry and passed by reference.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config: HmsgConfig,
    pub registry: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub pem_key_path: Option<String>,
    pub database_url: Option<String>,
    pub db_password: Option<String>,
    pub environment: Option<String>,
}

impl Settings {
    pub fn from_lookup<F>(config: HmsgConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            config,
            registry: get(DOCKER_REGISTRY),
            host: get(EC2_HOST),
            user: get(EC2_USER),
            pem_key_path: get(PEM_KEY_PATH),
            database_url: get(DATABASE_URL),
            db_password: get(DB_PASSWORD),
            environment: get(ENVIRONMENT),
        }
    }

    pub fn from_env(config: HmsgConfig) -> Self {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    fn value(&self, name: &str) -> Option<String> {
        match name {
            DOCKER_REGISTRY => self.registry.clone(),
            EC2_HOST => self.host.clone(),
            EC2_USER => self.user.clone(),
            PEM_KEY_PATH => self.pem_key_path.clone(),
            DATABASE_URL => self.database_url.clone(),
            DB_PASSWORD => self.db_password.clone(),
            ENVIRONMENT => self.environment.clone(),
            _ => None,
        }
    }

    /// Fail with the complete list of missing variables for `kind`.
    pub fn require(&self, kind: CommandKind) -> DeployResult<()> {
        let missing = missing_for(kind, |name| self.value(name));
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DeployError::missing(&missing))
        }
    }

    pub fn registry(&self) -> DeployResult<&str> {
        self.registry
            .as_deref()
            .ok_or_else(|| DeployError::missing(&[DOCKER_REGISTRY]))
    }

    pub fn database_url(&self) -> DeployResult<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| DeployError::missing(&[DATABASE_URL]))
    }

    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(DEFAULT_USER)
    }

    pub fn target(&self) -> DeployResult<DeploymentTarget> {
        match (self.host.as_deref(), self.pem_key_path.as_deref()) {
            (Some(host), Some(pem)) => DeploymentTarget::new(host, self.user(), pem),
            (host, pem) => {
                let mut missing = Vec::new();
                if host.is_none() {
                    missing.push(EC2_HOST);
                }
                if pem.is_none() {
                    missing.push(PEM_KEY_PATH);
                }
                Err(DeployError::missing(&missing))
            }
        }
    }

    /// Provisioning password and whether it is the placeholder default.
    pub fn db_password(&self) -> (&str, bool) {
        match self.db_password.as_deref() {
            Some(p) => (p, false),
            None => (PLACEHOLDER_PASSWORD, true),
        }
    }

    /// CLI argument, then `ENVIRONMENT`, then `production`.
    pub fn environment_name<'a>(&'a self, arg: Option<&'a str>) -> &'a str {
        arg.or(self.environment.as_deref())
            .unwrap_or(DEFAULT_ENVIRONMENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn deploy_reports_every_missing_variable() {
        let missing = missing_for(CommandKind::Deploy, lookup(&[]));
        assert_eq!(
            missing,
            vec![EC2_HOST, PEM_KEY_PATH, DOCKER_REGISTRY, DATABASE_URL]
        );
    }

    #[test]
    fn deploy_names_database_url_specifically() {
        let settings = Settings::from_lookup(
            HmsgConfig::default(),
            lookup(&[
                (EC2_HOST, "203.0.113.10"),
                (PEM_KEY_PATH, "key.pem"),
                (DOCKER_REGISTRY, "acme"),
            ]),
        );
        let err = settings.require(CommandKind::Deploy).unwrap_err();
        match &err {
            DeployError::Configuration(names) => assert_eq!(names, &vec!["DATABASE_URL".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let missing = missing_for(CommandKind::Build, lookup(&[(DOCKER_REGISTRY, "  ")]));
        assert_eq!(missing, vec![DOCKER_REGISTRY]);
    }

    #[test]
    fn database_local_needs_only_target() {
        let missing = missing_for(CommandKind::DatabaseLocal, lookup(&[]));
        assert_eq!(missing, vec![EC2_HOST, PEM_KEY_PATH]);
        assert!(missing_for(CommandKind::DatabaseRds, lookup(&[])).is_empty());
        assert!(missing_for(CommandKind::Help, lookup(&[])).is_empty());
        assert!(missing_for(CommandKind::Setup, lookup(&[])).is_empty());
    }

    #[test]
    fn full_is_union_of_build_and_deploy() {
        let mut full = CommandKind::Full.required().to_vec();
        full.sort_unstable();
        let mut union: Vec<&str> = CommandKind::Build
            .required()
            .iter()
            .chain(CommandKind::Deploy.required())
            .copied()
            .collect();
        union.sort_unstable();
        union.dedup();
        assert_eq!(full, union);
    }

    #[test]
    fn defaults_apply() {
        let settings = Settings::from_lookup(HmsgConfig::default(), lookup(&[]));
        assert_eq!(settings.user(), "ubuntu");
        assert_eq!(settings.db_password(), ("changeme", true));
        assert_eq!(settings.environment_name(None), "production");
    }

    #[test]
    fn environment_argument_wins() {
        let settings =
            Settings::from_lookup(HmsgConfig::default(), lookup(&[(ENVIRONMENT, "staging")]));
        assert_eq!(settings.environment_name(None), "staging");
        assert_eq!(settings.environment_name(Some("qa")), "qa");
    }

    #[test]
    fn missing_identity_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pem = dir.path().join("absent.pem");
        let err = DeploymentTarget::new("h", "ubuntu", pem.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, DeployError::FileNotFound(_)));
        assert!(err.to_string().contains("PEM_KEY_PATH"));
    }

    #[cfg(unix)]
    #[test]
    fn identity_file_is_restricted_to_owner_read() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pem = dir.path().join("key.pem");
        fs::write(&pem, "-----BEGIN KEY-----").unwrap();
        fs::set_permissions(&pem, fs::Permissions::from_mode(0o644)).unwrap();

        let target = DeploymentTarget::new("h", "ubuntu", pem.to_str().unwrap()).unwrap();
        let mode = fs::metadata(&target.identity_file_path)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o400);
    }

    #[cfg(unix)]
    #[test]
    fn owner_only_identity_is_left_alone() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pem = dir.path().join("key.pem");
        fs::write(&pem, "k").unwrap();
        fs::set_permissions(&pem, fs::Permissions::from_mode(0o600)).unwrap();

        DeploymentTarget::new("h", "ubuntu", pem.to_str().unwrap()).unwrap();
        let mode = fs::metadata(&pem).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
