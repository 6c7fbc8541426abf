use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::config::AppConfig;
use crate::error::{DeployError, DeployResult};
use crate::output;
use crate::release::{Release, LATEST};

/// `<registry>/<app_name>:<tag>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryImage {
    pub registry: String,
    pub app_name: String,
    pub tag: String,
}

impl RegistryImage {
    pub fn new(registry: &str, app_name: &str, release: &Release) -> Self {
        Self {
            registry: registry.trim_end_matches('/').to_string(),
            app_name: app_name.to_string(),
            tag: release.tag.clone(),
        }
    }

    pub fn repository(&self) -> String {
        format!("{}/{}", self.registry, self.app_name)
    }

    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository(), self.tag)
    }

    pub fn latest(&self) -> String {
        format!("{}:{}", self.repository(), LATEST)
    }

    /// Both references every build publishes; deduplicated when tag is `latest`.
    pub fn references(&self) -> Vec<String> {
        let mut refs = vec![self.reference()];
        if self.tag != LATEST {
            refs.push(self.latest());
        }
        refs
    }
}

/// `docker build` pinned to one platform, tagging every reference at once.
pub fn build_args(image: &RegistryImage, app: &AppConfig) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "--platform".to_string(),
        app.platform.clone(),
    ];
    for reference in image.references() {
        args.push("-t".to_string());
        args.push(reference);
    }
    if let Some(dockerfile) = &app.dockerfile {
        args.push("-f".to_string());
        args.push(dockerfile.clone());
    }
    args.push(app.build_context.clone());
    args
}

pub fn push_args(reference: &str) -> Vec<String> {
    vec!["push".to_string(), reference.to_string()]
}

fn docker(args: &[String], project_root: &Path) -> DeployResult<()> {
    debug!("docker {}", args.join(" "));

    let status = Command::new("docker")
        .args(args)
        .current_dir(project_root)
        .status()?;

    if !status.success() {
        return Err(DeployError::LocalCommand {
            command: format!("docker {}", args.join(" ")),
        });
    }
    Ok(())
}

/// Build for the configured platform, tag `tag` and `latest`, push both.
pub fn build_and_push(image: &RegistryImage, app: &AppConfig, project_root: &Path) -> DeployResult<()> {
    which::which("docker")
        .map_err(|_| DeployError::Invalid("docker is not installed or not on PATH".to_string()))?;

    output::info(&format!(
        "Building {} for {}",
        image.reference(),
        app.platform
    ));
    docker(&build_args(image, app), project_root)?;
    output::success("Image built");

    for reference in image.references() {
        output::info(&format!("Pushing {}", reference));
        docker(&push_args(&reference), project_root)?;
    }
    output::success(&format!("Pushed {}", image.references().join(" and ")));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: &str) -> RegistryImage {
        RegistryImage::new("acme", "health-message-app", &Release::named(tag).unwrap())
    }

    #[test]
    fn references() {
        let img = image("v3");
        assert_eq!(img.reference(), "acme/health-message-app:v3");
        assert_eq!(img.latest(), "acme/health-message-app:latest");
        assert_eq!(img.references().len(), 2);
        assert_eq!(image("latest").references().len(), 1);
    }

    #[test]
    fn trailing_slash_in_registry_is_dropped() {
        let img = RegistryImage::new("ghcr.io/acme/", "app", &Release::named("v1").unwrap());
        assert_eq!(img.reference(), "ghcr.io/acme/app:v1");
    }

    #[test]
    fn build_pins_platform_and_tags_both() {
        let args = build_args(&image("v3"), &AppConfig::default());
        assert_eq!(
            args,
            vec![
                "build",
                "--platform",
                "linux/amd64",
                "-t",
                "acme/health-message-app:v3",
                "-t",
                "acme/health-message-app:latest",
                "."
            ]
        );
    }

    #[test]
    fn build_uses_custom_dockerfile() {
        let app = AppConfig {
            dockerfile: Some("docker/Dockerfile.prod".to_string()),
            ..AppConfig::default()
        };
        let args = build_args(&image("v3"), &app);
        let pos = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[pos + 1], "docker/Dockerfile.prod");
        assert_eq!(args.last().map(String::as_str), Some("."));
    }
}
