//! Best-effort secure erasure of plaintext files
//!
//! Overwrites are not guaranteed to reach the physical medium on
//! copy-on-write or log-structured filesystems.

use rand::rngs::OsRng;
use rand::RngCore;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::error::{VaultError, VaultResult};

/// Number of random overwrite passes
pub const SHRED_PASSES: u32 = 3;

/// Chunk size for overwrite writes
const CHUNK_SIZE: usize = 64 * 1024;

/// Overwrite a regular file with random data, then delete it
pub async fn shred(path: &Path) -> VaultResult<()> {
    let metadata = fs::symlink_metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => VaultError::PathNotFound(path.to_path_buf()),
        _ => VaultError::Io(e),
    })?;
    if !metadata.file_type().is_file() {
        return Err(VaultError::NotRegularFile(path.to_path_buf()));
    }
    let file_size = metadata.len();

    {
        let mut file = OpenOptions::new().write(true).truncate(false).open(path).await?;
        let mut buffer = vec![0u8; CHUNK_SIZE];

        for pass in 1..=SHRED_PASSES {
            file.seek(SeekFrom::Start(0)).await?;
            let mut remaining = file_size;
            while remaining > 0 {
                let len = remaining.min(CHUNK_SIZE as u64) as usize;
                OsRng.fill_bytes(&mut buffer[..len]);
                file.write_all(&buffer[..len]).await?;
                remaining -= len as u64;
            }
            file.sync_all().await?;
            tracing::debug!(path = %path.display(), pass, "Overwrite pass complete");
        }
    }

    fs::remove_file(path).await?;
    tracing::info!(path = %path.display(), bytes = file_size, "File shredded");
    Ok(())
}
