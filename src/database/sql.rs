use crate::shell;

/// `psql` as the postgres superuser, optionally connected to `db`.
pub fn psql(db: Option<&str>, sql: &str) -> String {
    let db_flag = db.map(|d| format!(" -d {}", d)).unwrap_or_default();
    format!(
        "cd /tmp && sudo -u postgres psql -v ON_ERROR_STOP=1 -tA{} -c {}",
        db_flag,
        shell::quote(sql)
    )
}

pub fn role_exists(user: &str) -> String {
    psql(
        None,
        &format!("SELECT 1 FROM pg_roles WHERE rolname = {}", shell::sql_literal(user)),
    )
}

pub fn database_exists(db: &str) -> String {
    psql(
        None,
        &format!("SELECT 1 FROM pg_database WHERE datname = {}", shell::sql_literal(db)),
    )
}

pub fn create_role(user: &str, password: &str) -> String {
    psql(
        None,
        &format!(
            "CREATE ROLE {} WITH LOGIN PASSWORD {}",
            user,
            shell::sql_literal(password)
        ),
    )
}

/// Existing roles get the new password so re-provisioning rotates it.
pub fn alter_role_password(user: &str, password: &str) -> String {
    psql(
        None,
        &format!(
            "ALTER ROLE {} WITH LOGIN PASSWORD {}",
            user,
            shell::sql_literal(password)
        ),
    )
}

pub fn create_database(db: &str, owner: &str) -> String {
    psql(None, &format!("CREATE DATABASE {} OWNER {}", db, owner))
}

/// Grants that let tables created later by the app's migrations work for the same role.
pub fn grants(db: &str, user: &str) -> Vec<(&'static str, String)> {
    vec![
        (
            "Grant database privileges",
            psql(None, &format!("GRANT ALL PRIVILEGES ON DATABASE {} TO {}", db, user)),
        ),
        (
            "Grant schema usage",
            psql(Some(db), &format!("GRANT USAGE, CREATE ON SCHEMA public TO {}", user)),
        ),
        (
            "Default privileges on tables",
            psql(
                Some(db),
                &format!(
                    "ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT ALL ON TABLES TO {}",
                    user
                ),
            ),
        ),
        (
            "Default privileges on sequences",
            psql(
                Some(db),
                &format!(
                    "ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT ALL ON SEQUENCES TO {}",
                    user
                ),
            ),
        ),
    ]
}

/// Authenticated trivial query over TCP, as the app would connect.
pub fn connectivity_check(user: &str, password: &str, db: &str, port: u16) -> String {
    format!(
        "PGPASSWORD={} psql -h 127.0.0.1 -p {} -U {} -d {} -tAc 'SELECT 1'",
        shell::quote(password),
        port,
        user,
        db
    )
}

/// Listen on all interfaces and admit password auth from loopback and `networks`.
pub fn network_script(networks: &[String]) -> String {
    let rules = std::iter::once("127.0.0.1/32")
        .chain(networks.iter().map(String::as_str))
        .map(|cidr| shell::quote(&format!("host all all {} md5", cidr)))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        r#"CONF=$(cd /tmp && sudo -u postgres psql -tAc 'SHOW config_file')
HBA=$(cd /tmp && sudo -u postgres psql -tAc 'SHOW hba_file')
sudo sed -i -E "s/^#?[[:space:]]*listen_addresses[[:space:]]*=.*/listen_addresses = '*'/" "$CONF"
sudo grep -q "^listen_addresses = '\*'" "$CONF" || echo "listen_addresses = '*'" | sudo tee -a "$CONF" > /dev/null
for rule in {rules}; do
  sudo grep -qxF "$rule" "$HBA" || echo "$rule" | sudo tee -a "$HBA" > /dev/null
done"#
    )
}
