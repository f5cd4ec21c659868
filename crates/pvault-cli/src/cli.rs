//! Process-level command line

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vault_core::DEFAULT_VAULT_FILE;

#[derive(Parser)]
#[command(name = "pvault")]
#[command(version)]
#[command(about = "Portable Vault - password-protected, compressed, tamper-evident file storage")]
#[command(after_help = "EXAMPLES:
  pvault create                     Create vault.vlt in the current directory
  pvault create backup.vlt          Create a named vault
  pvault open backup.vlt            Unlock a vault and start the shell")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "PVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new empty vault
    Create {
        /// Vault file to create
        #[arg(default_value = DEFAULT_VAULT_FILE)]
        path: PathBuf,
    },

    /// Unlock a vault and start the interactive shell
    Open {
        /// Vault file to open
        path: PathBuf,
    },
}
