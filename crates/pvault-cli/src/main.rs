//! Portable Vault CLI
//!
//! Password-protected container for files and directories, driven from an
//! interactive shell.

mod cli;
mod shell;

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use std::io::{self, Write};
use std::path::Path;
use tokio::io::BufReader;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use shell::Shell;
use vault_core::{confirm_passphrase, default_config_path, load_config, Vault, VaultConfig};

/// Initialize logging
fn init_logging(default_filter: &str) {
    // Log to stderr so shell output on stdout stays clean
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .compact(),
        )
        .with(filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = match load_config(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config.log_filter);
    tracing::debug!(path = %config_path.display(), "Configuration loaded");

    match cli.command {
        None => {
            println!("Portable Vault - password-protected file container");
            println!();
            println!("Run 'pvault --help' for usage information.");
            println!("Run 'pvault create' to create a new vault.");
        }
        Some(cmd) => {
            if let Err(e) = handle_command(cmd, config).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn handle_command(cmd: Commands, config: VaultConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Create { path } => handle_create(&path, &config).await?,
        Commands::Open { path } => handle_open(&path, config).await?,
    }
    Ok(())
}

// === Command Handlers ===

async fn handle_create(path: &Path, config: &VaultConfig) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!("Vault already exists at {}", path.display()).into());
    }

    let passphrase = prompt_password("New passphrase: ")?;
    let confirm = prompt_password("Confirm passphrase: ")?;
    create_vault(path, &passphrase, &confirm, config).await?;
    println!("Created {}", display_name(path));

    Ok(())
}

/// Check the entered passphrases, then write the new empty vault
///
/// Nothing touches the disk unless both entries match and meet the
/// configured minimum length.
async fn create_vault(
    path: &Path,
    passphrase: &SecretString,
    confirm: &SecretString,
    config: &VaultConfig,
) -> Result<Vault, Box<dyn std::error::Error>> {
    confirm_passphrase(passphrase, confirm)?;

    if passphrase.expose_secret().chars().count() < config.min_passphrase_length {
        return Err(format!(
            "Passphrase must be at least {} characters",
            config.min_passphrase_length
        )
        .into());
    }

    Ok(Vault::create(path, passphrase).await?)
}

async fn handle_open(path: &Path, config: VaultConfig) -> Result<(), Box<dyn std::error::Error>> {
    let passphrase = prompt_password(&format!("Passphrase for {}: ", display_name(path)))?;
    let vault = Vault::open(path, &passphrase).await?;
    drop(passphrase);

    println!("Unlocked {} ({} entries). Type 'help' for commands.", display_name(path), vault.len());

    let stdin = BufReader::new(tokio::io::stdin());
    let mut shell = Shell::new(vault, config, stdin, io::stdout());
    shell.run().await?;

    println!("Goodbye");
    Ok(())
}

fn prompt_password(prompt: &str) -> Result<SecretString, Box<dyn std::error::Error>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let password = rpassword::read_password()?;
    Ok(SecretString::new(password))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[tokio::test]
    async fn test_create_vault_checks_passphrase_before_writing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("new.vlt");
        let config = VaultConfig::default();

        let mismatch = create_vault(&path, &secret("longenough1"), &secret("longenough2"), &config).await;
        assert!(mismatch.is_err());
        assert!(!path.exists());

        let too_short = create_vault(&path, &secret("short"), &secret("short"), &config).await;
        assert!(too_short.is_err());
        assert!(!path.exists());

        let vault = create_vault(&path, &secret("longenough1"), &secret("longenough1"), &config)
            .await
            .unwrap();
        assert!(vault.is_empty());
        assert!(path.exists());
    }
}
