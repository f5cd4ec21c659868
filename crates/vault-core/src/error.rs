//! Error types for vault operations

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Wrong passphrase or tampered verification token. The two causes are
    /// reported identically.
    #[error("Authentication failed: incorrect passphrase")]
    Authentication,

    #[error("Vault unreadable: {0}")]
    ContainerCorrupt(String),

    #[error("Vault format version {0} is not supported")]
    UnsupportedVersion(u32),

    #[error("Vault file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Passphrases do not match")]
    PassphraseMismatch,

    #[error("Path '{}' not found", .0.display())]
    PathNotFound(PathBuf),

    #[error("No matches found for '{0}'")]
    NoMatch(String),

    /// Per-entry integrity failure. Recovered locally by multi-entry
    /// operations, which skip the entry and keep going.
    #[error("Entry '{key}' is corrupt: {reason}")]
    EntryCorrupt { key: String, reason: String },

    #[error("Not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    pub(crate) fn entry_corrupt(key: &str, reason: impl Into<String>) -> Self {
        VaultError::EntryCorrupt {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;
