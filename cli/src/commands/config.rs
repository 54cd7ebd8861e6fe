// Copyright (c) 2026 nfsdriver contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use nfsdriver_core::domain::driver_config::DriverConfigManifest;
use nfsdriver_core::infrastructure::discovery::Transport;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./nfsdriver-config.yaml)
        #[arg(short, long, default_value = "./nfsdriver-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = DriverConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. NFSDRIVER_CONFIG_PATH: {}",
            std::env::var("NFSDRIVER_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./nfsdriver-config.yaml");
        println!("  4. ~/.nfsdriver/config.yaml");
        println!("  5. /etc/nfsdriver/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    let spec = &config.spec;
    println!("{}", "Driver:".bold());
    println!("  Name: {}", spec.driver_name);
    println!(
        "  Listen: {} ({})",
        spec.listen_address,
        Transport::for_address(&spec.listen_address)
    );
    println!("  Drivers path: {}", spec.drivers_path.display());
    println!(
        "  Metrics endpoint: {}",
        spec.debug_address.as_deref().unwrap_or("(disabled)")
    );
    println!();

    println!("{}", "Mount:".bold());
    println!("  Mount command: {}", spec.mount.mount_command);
    println!("  Unmount command: {}", spec.mount.unmount_command);
    println!(
        "  Attempts: {} ({} ms apart)",
        spec.mount.max_attempts, spec.mount.retry_delay_ms
    );
    match spec.mount.command_timeout_secs {
        Some(secs) => println!("  Command timeout: {}s", secs),
        None => println!("  Command timeout: {}", "(none)".dimmed()),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = DriverConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
