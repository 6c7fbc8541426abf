use anyhow::{Context, Result};
use tracing::warn;

use crate::config::{CommandKind, Settings};
use crate::database;
use crate::output;
use crate::shell;
use crate::ssh::SshSession;

use super::DatabaseMode;

const RDS_TEMPLATE: &str = include_str!("../../templates/rds-instructions.txt.j2");

pub async fn run(settings: &Settings, mode: DatabaseMode) -> Result<()> {
    match mode {
        DatabaseMode::Local => local(settings).await,
        DatabaseMode::Rds => {
            settings.require(CommandKind::DatabaseRds)?;
            output::header("Managed database");
            print!("{}", rds_instructions(settings)?);
            Ok(())
        }
    }
}

async fn local(settings: &Settings) -> Result<()> {
    settings.require(CommandKind::DatabaseLocal)?;

    let (password, placeholder) = settings.db_password();
    if placeholder {
        warn!("DB_PASSWORD not set, provisioning with the placeholder");
        output::warning("DB_PASSWORD is not set; using the placeholder password 'changeme'");
    }

    let target = settings.target()?;
    output::header(&format!("Provisioning PostgreSQL on {}", target.host_address));

    let mut session = SshSession::open(&target).await?;
    session.mask(password);

    let result = database::provision(&session, &settings.config, password).await;
    let closed = session.close().await;
    let db = result.context("Database provisioning failed")?;
    closed?;

    println!();
    output::success("Database ready");
    output::field("Database", &db.db_name);
    output::field("User", &db.db_user);
    output::field("DATABASE_URL", &shell::mask_url(&db.connection_string));
    output::info(&format!(
        "Export DATABASE_URL with the real password, or read it from {} on the host",
        settings.config.config_file()
    ));
    if placeholder {
        output::warning("Rotate the password: export DB_PASSWORD and run `database local` again");
    }
    Ok(())
}

pub fn rds_instructions(settings: &Settings) -> Result<String> {
    let mut env = minijinja::Environment::new();
    env.add_template("rds-instructions", RDS_TEMPLATE)?;
    let tmpl = env.get_template("rds-instructions")?;

    let db = &settings.config.database;
    let rendered = tmpl.render(minijinja::context! {
        app_name => settings.config.app.name,
        db_user => db.user,
        db_name => db.name,
        db_port => db.port,
        host => settings.host,
        environment => settings.environment_name(None),
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HmsgConfig;

    #[test]
    fn rds_instructions_show_connection_format() {
        let settings = Settings::from_lookup(HmsgConfig::default(), |_| None);
        let text = rds_instructions(&settings).unwrap();
        assert!(text.contains("postgresql://hmsg_user:<password>@<endpoint>:5432/health_message_db"));
        assert!(text.contains("export DATABASE_URL="));
        assert!(text.contains("hmsg-deploy deploy production --external-db"));
        assert!(text.contains("TCP 5432"));
    }

    #[test]
    fn rds_instructions_name_the_host_when_known() {
        let settings = Settings::from_lookup(HmsgConfig::default(), |name| {
            (name == "EC2_HOST").then(|| "203.0.113.10".to_string())
        });
        let text = rds_instructions(&settings).unwrap();
        assert!(text.contains("(203.0.113.10)"));
    }
}
