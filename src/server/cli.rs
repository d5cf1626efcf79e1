use crate::email::defaults::seed_default_templates;
use crate::error::PortalError;
use crate::server::config::{config_to_toml, default_server_config, read_config};
use crate::server::server_runner::run_server;
use crate::server::tokens::issue_api_token;
use crate::store::db_interfaces::connect_to_portal_db;
use crate::store::models::Role;
use clap::{arg, command, value_parser, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "PORTAL_SERVER_CONFIG_FILE";
const DEFAULT_CONFIG_PATH: &str = "./portal.toml";

fn config_arg() -> clap::Arg {
    arg!(--config <FILE> "Path to the server's configuration file")
        .value_parser(value_parser!(PathBuf))
        .env(CONFIG_ENV)
        .default_value(DEFAULT_CONFIG_PATH)
}

pub fn portal_commands() -> Command {
    command!()
        .about("Transactional email, push broadcasts, and payments for the franchise portal")
        .subcommand_required(true)
        .subcommand(
            Command::new("server")
                .about("Run the HTTP server")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("default_server_config")
                .about("Print a default configuration file for a server"),
        )
        .subcommand(
            Command::new("seed_templates")
                .about("Write the built-in email templates into the template store")
                .arg(config_arg())
                .arg(
                    arg!(--overwrite "Replace templates that already exist")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("issue_token")
                .about("Create an API token for an operator or service")
                .arg(config_arg())
                .arg(arg!(--uid <UID> "Identity the token acts as").required(true))
                .arg(
                    arg!(--role <ROLE> "Role granted to the token")
                        .value_parser(["master_admin", "admin", "franchise_partner", "service"])
                        .required(true),
                )
                .arg(arg!(--name <NAME> "Display name").required(false)),
        )
}

pub async fn execute_command(matches: &ArgMatches) -> std::io::Result<()> {
    let result = match matches.subcommand() {
        Some(("server", matches)) => return run_server(config_path(matches)).await,
        Some(("default_server_config", _)) => print_default_config(),
        Some(("seed_templates", matches)) => {
            seed_templates_command(config_path(matches), matches.get_flag("overwrite")).await
        }
        Some(("issue_token", matches)) => issue_token_command(config_path(matches), matches).await,
        _ => {
            println!("No subcommand provided. Run with --help for options.");
            Ok(())
        }
    };
    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

fn config_path(matches: &ArgMatches) -> &Path {
    matches
        .get_one::<PathBuf>("config")
        .map(PathBuf::as_path)
        .unwrap_or(Path::new(DEFAULT_CONFIG_PATH))
}

fn print_default_config() -> Result<(), PortalError> {
    println!("{}", config_to_toml(default_server_config()?)?);
    Ok(())
}

async fn seed_templates_command(config_path: &Path, overwrite: bool) -> Result<(), PortalError> {
    let config = read_config(config_path)?;
    let db = connect_to_portal_db(&config.database_url).await?;
    let report = seed_default_templates(db.as_ref(), overwrite).await?;
    println!(
        "Templates: {} created, {} overwritten, {} skipped",
        report.created.len(),
        report.overwritten.len(),
        report.skipped.len()
    );
    Ok(())
}

async fn issue_token_command(config_path: &Path, matches: &ArgMatches) -> Result<(), PortalError> {
    let (Some(uid), Some(role)) = (
        matches.get_one::<String>("uid"),
        matches.get_one::<String>("role"),
    ) else {
        return Err(PortalError::invalid_argument("--uid and --role are required"));
    };
    let role: Role = serde_json::from_value(serde_json::Value::String(role.clone()))?;
    let config = read_config(config_path)?;
    let db = connect_to_portal_db(&config.database_url).await?;
    let token = issue_api_token(
        db.as_ref(),
        uid,
        role,
        matches.get_one::<String>("name").map(String::as_str),
    )
    .await?;
    println!("{token}");
    Ok(())
}
