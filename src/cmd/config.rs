//! Configuration view and validation commands: `qstrack config`.

use anyhow::{Context, Result};

use qstrack::config::{CONFIG_DIR, ENV_OPERATOR_ID, ENV_TOKEN, QsConfig, QsToml};

use super::super::ConfigCommands;

fn print_toml(toml: &QsToml) {
    println!("[server]");
    println!("  base_url = \"{}\"", toml.server.base_url);
    println!("  timeout_secs = {}", toml.server.timeout_secs);
    println!("  connect_timeout_secs = {}", toml.server.connect_timeout_secs);
    println!();
    println!("[scanner]");
    println!("  cooldown_ms = {}", toml.scanner.cooldown_ms);
    println!("  recent_limit = {}", toml.scanner.recent_limit);
    println!("  history_days = {}", toml.scanner.history_days);
    println!();
    println!("[tasks]");
    println!("  completed_limit = {}", toml.tasks.completed_limit);
    println!();
    println!("[board]");
    println!("  poll_interval_secs = {}", toml.board.poll_interval_secs);
    println!("  preview_limit = {}", toml.board.preview_limit);
    println!();
}

pub fn cmd_config(config: &QsConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("QS Tracker Configuration");
            println!("========================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                let toml = QsToml::load(&config_path)?;
                print_toml(&toml);
            } else {
                println!("No qstrack.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                print_toml(&QsToml::default());
                println!("Run 'qstrack config init' to create a qstrack.toml file.");
                println!();
            }

            println!("Effective values (with env/CLI overrides):");
            println!("  base_url = \"{}\"", config.base_url());
            println!("  timeout_secs = {}", config.toml.server.timeout_secs);
            println!(
                "  token = {}",
                if config.token().is_some() { "<set>" } else { "<not set>" }
            );
            match config.operator_id {
                Some(id) => println!("  operator = {}", id),
                None => println!("  operator = <from server>"),
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let mut warnings = config.validate();
            if config.token().is_none() {
                warnings.push(format!(
                    "no token configured: set {} or pass --token",
                    ENV_TOKEN
                ));
            }
            if config.operator_id.is_none() {
                println!(
                    "Operator will be resolved from the server ({} not set).",
                    ENV_OPERATOR_ID
                );
            }

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("qstrack.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !config.config_dir.exists() {
                std::fs::create_dir_all(&config.config_dir)
                    .with_context(|| format!("Failed to create {}", CONFIG_DIR))?;
            }

            QsToml::default().save(&config_path)?;

            println!("Created qstrack.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] base_url, timeout_secs");
            println!("  - [scanner] cooldown_ms, recent_limit, history_days");
            println!("  - [tasks] completed_limit");
            println!("  - [board] poll_interval_secs, preview_limit");
            println!();
            println!(
                "Keep the token out of this file: use {} or a .env file.",
                ENV_TOKEN
            );
            println!();
        }
    }

    Ok(())
}
