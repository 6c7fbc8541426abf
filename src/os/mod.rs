use crate::error::{DeployError, DeployResult};
use crate::ssh::Remote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    /// Ubuntu and Debian (apt)
    Debian,
    /// Amazon Linux, Fedora, RHEL (dnf)
    RedHat,
}

impl HostOs {
    /// Auto-detect OS by reading /etc/os-release.
    pub async fn detect<R: Remote + ?Sized>(remote: &R) -> DeployResult<Self> {
        let output = remote.exec("cat /etc/os-release").await?;
        Self::from_os_release(&output)
    }

    pub fn from_os_release(content: &str) -> DeployResult<Self> {
        let field = |key: &str| {
            content.lines().find_map(|line| {
                line.strip_prefix(key)
                    .map(|v| v.trim_matches('"').to_string())
            })
        };

        let id = field("ID=").unwrap_or_default();
        if let Ok(os) = Self::from_id(&id) {
            return Ok(os);
        }

        // Derivatives name their parent in ID_LIKE
        let like = field("ID_LIKE=").unwrap_or_default();
        like.split_whitespace()
            .find_map(|parent| Self::from_id(parent).ok())
            .ok_or_else(|| {
                DeployError::Invalid(format!(
                    "unsupported host OS '{}'. Supported: ubuntu, debian, amzn, fedora, rhel",
                    id
                ))
            })
    }

    fn from_id(id: &str) -> DeployResult<Self> {
        match id {
            "ubuntu" | "debian" => Ok(HostOs::Debian),
            "amzn" | "fedora" | "rhel" | "centos" | "rocky" | "almalinux" => Ok(HostOs::RedHat),
            other => Err(DeployError::Invalid(format!("unsupported OS id '{}'", other))),
        }
    }

    pub fn install_postgres_cmd(&self) -> &'static str {
        match self {
            HostOs::Debian => {
                "sudo apt-get update -qq && sudo DEBIAN_FRONTEND=noninteractive apt-get install -y -qq postgresql postgresql-contrib"
            }
            // The data directory is not initialized by the package on RedHat-likes
            HostOs::RedHat => {
                "sudo dnf install -y -q postgresql15-server postgresql15 || sudo dnf install -y -q postgresql-server postgresql; \
                 sudo test -f /var/lib/pgsql/data/PG_VERSION || sudo postgresql-setup --initdb"
            }
        }
    }
}
