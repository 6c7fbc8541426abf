use super::HmsgConfig;
use crate::error::{DeployError, DeployResult};

/// Lowercase SQL identifier; PostgreSQL folds unquoted names to lowercase.
pub fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_safe_path(s: &str) -> bool {
    !s.is_empty() && !s.contains(['"', '`', '$', '\\', '\n'])
}

pub fn validate(config: &HmsgConfig) -> DeployResult<()> {
    let invalid = |msg: String| Err(DeployError::Invalid(msg));

    if config.app.name.is_empty() {
        return invalid("app.name cannot be empty".to_string());
    }

    if config.app.platform.is_empty() {
        return invalid("app.platform cannot be empty".to_string());
    }

    for (field, value) in [
        ("database.name", &config.database.name),
        ("database.user", &config.database.user),
    ] {
        if !is_sql_identifier(value) {
            return invalid(format!(
                "{} '{}' must match [a-z_][a-z0-9_]*",
                field, value
            ));
        }
    }

    if config.database.host.is_empty() {
        return invalid("database.host cannot be empty".to_string());
    }

    for net in &config.database.networks {
        if !net.contains('/') || net.contains(char::is_whitespace) {
            return invalid(format!("database.networks entry '{}' is not a CIDR", net));
        }
    }

    for (field, value) in [
        ("remote.app_root", &config.remote.app_root),
        ("remote.config_dir", &config.remote.config_dir),
    ] {
        if !is_safe_path(value) {
            return invalid(format!("{} '{}' is not a usable path", field, value));
        }
    }

    if config.verify.db_attempts == 0 {
        return invalid("verify.db_attempts must be at least 1".to_string());
    }

    if config.verify.container_attempts == 0 {
        return invalid("verify.container_attempts must be at least 1".to_string());
    }

    Ok(())
}
