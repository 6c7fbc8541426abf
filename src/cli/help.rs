use clap::CommandFactory;
use console::style;

use crate::config::resolve::{DB_PASSWORD, DEFAULT_ENVIRONMENT, DEFAULT_USER, EC2_USER, ENVIRONMENT, PLACEHOLDER_PASSWORD};
use crate::config::CommandKind;

use super::Cli;

const COMMANDS: &[(&str, CommandKind)] = &[
    ("setup", CommandKind::Setup),
    ("build", CommandKind::Build),
    ("deploy", CommandKind::Deploy),
    ("database local", CommandKind::DatabaseLocal),
    ("database rds", CommandKind::DatabaseRds),
    ("full", CommandKind::Full),
    ("status", CommandKind::Status),
    ("logs", CommandKind::Logs),
    ("help", CommandKind::Help),
];

pub fn run() {
    let mut cmd = Cli::command();
    println!("{}", cmd.render_help());
    println!("{}", requirements());
}

/// Required environment variables per command, plus optional defaults.
pub fn requirements() -> String {
    let mut out = format!("{}\n", style("Required environment:").bold().underlined());
    for (name, kind) in COMMANDS {
        let vars = kind.required();
        let vars = if vars.is_empty() {
            "-".to_string()
        } else {
            vars.join(", ")
        };
        out.push_str(&format!("  {:<16} {}\n", name, vars));
    }

    out.push_str(&format!("\n{}\n", style("Optional:").bold().underlined()));
    out.push_str(&format!("  {:<16} default {}\n", EC2_USER, DEFAULT_USER));
    out.push_str(&format!("  {:<16} default {}\n", ENVIRONMENT, DEFAULT_ENVIRONMENT));
    out.push_str(&format!("  {:<16} default {} (change it)\n", DB_PASSWORD, PLACEHOLDER_PASSWORD));
    out
}
