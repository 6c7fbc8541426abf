use chrono::Local;

use crate::error::{DeployError, DeployResult};

pub const LATEST: &str = "latest";

/// An image tag for one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
}

impl Release {
    /// Timestamp tag, e.g. `20250219-120000`.
    pub fn now() -> Self {
        Self {
            tag: Local::now().format("%Y%m%d-%H%M%S").to_string(),
        }
    }

    pub fn named(tag: &str) -> DeployResult<Self> {
        if !is_valid_tag(tag) {
            return Err(DeployError::Invalid(format!(
                "'{}' is not a valid image tag (max 128 of [A-Za-z0-9_.-], not starting with '.' or '-')",
                tag
            )));
        }
        Ok(Self {
            tag: tag.to_string(),
        })
    }

    pub fn from_arg(tag: Option<&str>) -> DeployResult<Self> {
        match tag {
            Some(t) => Self::named(t),
            None => Ok(Self::now()),
        }
    }
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    tag.len() <= 128 && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
