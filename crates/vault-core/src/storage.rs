//! Vault file storage
//!
//! Handles reading/writing vault files with:
//! - Atomic writes (write to temp, then rename)
//! - A magic header and version check before decoding
//! - Configuration loading from TOML

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{VaultError, VaultResult};
use crate::models::{Container, VaultConfig};

/// First bytes of every vault file
pub const MAGIC: &[u8; 4] = b"PVLT";

/// Vault file name used when none is given
pub const DEFAULT_VAULT_FILE: &str = "vault.vlt";

/// Config directory name under the platform config dir
const CONFIG_DIR: &str = "pvault";

/// Config file name
const CONFIG_FILE: &str = "config.toml";

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Temporary file written beside the vault before it is renamed into place
pub fn temp_file_path(vault_path: &Path) -> PathBuf {
    let mut name: OsString = vault_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from(DEFAULT_VAULT_FILE));
    name.push(".tmp");
    vault_path.with_file_name(name)
}

/// Serialize a container into the on-disk byte layout
pub fn encode_container(container: &Container) -> VaultResult<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(container, bincode_config())
        .map_err(|e| VaultError::Serialization(e.to_string()))?;

    let mut data = Vec::with_capacity(MAGIC.len() + body.len());
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&body);
    Ok(data)
}

/// Parse the on-disk byte layout back into a container
pub fn decode_container(data: &[u8]) -> VaultResult<Container> {
    let body = data
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| VaultError::ContainerCorrupt("not a vault file".to_string()))?;

    // The version leads the record, so it can be read before the layout it governs
    let (version, _): (u32, usize) = bincode::serde::decode_from_slice(body, bincode_config())
        .map_err(|e| VaultError::ContainerCorrupt(e.to_string()))?;
    if version != Container::CURRENT_VERSION {
        return Err(VaultError::UnsupportedVersion(version));
    }

    let (container, consumed): (Container, usize) =
        bincode::serde::decode_from_slice(body, bincode_config())
            .map_err(|e| VaultError::ContainerCorrupt(e.to_string()))?;

    if consumed != body.len() {
        return Err(VaultError::ContainerCorrupt(
            "trailing bytes after vault record".to_string(),
        ));
    }
    if !container.tables_consistent() {
        return Err(VaultError::ContainerCorrupt(
            "entry and metadata tables disagree".to_string(),
        ));
    }

    Ok(container)
}

/// Read and decode a vault file
///
/// Any failure, including I/O, is reported as
/// [`VaultError::ContainerCorrupt`] or [`VaultError::UnsupportedVersion`].
pub async fn load_container(path: &Path) -> VaultResult<Container> {
    let data = fs::read(path).await.map_err(|e| {
        VaultError::ContainerCorrupt(format!("could not read '{}': {e}", path.display()))
    })?;
    decode_container(&data)
}

/// Write a container atomically over `path`
pub async fn persist_container(path: &Path, container: &Container) -> VaultResult<()> {
    let data = encode_container(container)?;

    let temp_path = temp_file_path(path);
    write_file(&temp_path, &data).await?;
    fs::rename(&temp_path, path).await?;

    tracing::debug!(path = %path.display(), bytes = data.len(), "Vault file written");
    Ok(())
}

/// Write a brand new vault file, refusing to replace an existing one
pub async fn persist_new_container(path: &Path, container: &Container) -> VaultResult<()> {
    if fs::try_exists(path).await? {
        return Err(VaultError::AlreadyExists(path.to_path_buf()));
    }
    persist_container(path, container).await
}

async fn write_file(path: &Path, data: &[u8]) -> VaultResult<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    // Owner-only (600) from creation on Unix
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;

    // A leftover temp file keeps its old mode, so tighten it before writing
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        file.set_permissions(perms).await?;
    }

    file.write_all(data).await?;
    file.sync_all().await?;

    Ok(())
}

/// Load configuration, falling back to defaults when the file is missing
pub async fn load_config(path: &Path) -> VaultResult<VaultConfig> {
    if !fs::try_exists(path).await? {
        return Ok(VaultConfig::default());
    }

    let content = fs::read_to_string(path).await?;
    let config: VaultConfig =
        toml::from_str(&content).map_err(|e| VaultError::Config(e.to_string()))?;

    Ok(config)
}
