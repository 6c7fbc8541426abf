use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{CommandKind, Settings};
use crate::image::{self, RegistryImage};
use crate::output;
use crate::release::Release;

pub fn run(settings: &Settings, tag: Option<&str>, project_root: &Path) -> Result<RegistryImage> {
    settings.require(CommandKind::Build)?;

    let release = Release::from_arg(tag)?;
    let image = RegistryImage::new(settings.registry()?, &settings.config.app.name, &release);

    output::header(&format!("Building {}", image.reference()));
    image::build_and_push(&image, &settings.config.app, project_root)
        .with_context(|| format!("Failed to publish {}", image.reference()))?;

    Ok(image)
}
