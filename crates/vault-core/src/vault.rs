//! The open vault handle
//!
//! A [`Vault`] owns the decoded container, the derived key and the staging
//! list for one session. Mutating calls take `&mut self`, build the new
//! container on a copy, and only swap it in once the atomic rewrite succeeded.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::codec::{self, NonceLedger};
use crate::crypto::{generate_nonce, generate_salt, VaultKey};
use crate::error::{VaultError, VaultResult};
use crate::models::{
    CommitOutcome, CommitReport, Container, DeleteReport, EntrySummary, ExtractReport,
    VaultStatus,
};
use crate::pattern::{output_path, KeyPattern};
use crate::staging::{self, StagingArea};
use crate::storage;

pub struct Vault {
    path: PathBuf,
    container: Container,
    key: VaultKey,
    staging: StagingArea,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("path", &self.path)
            .field("entries", &self.container.len())
            .field("staged", &self.staging.paths().len())
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// Create a new empty vault file and return it opened
    ///
    /// Fails with [`VaultError::AlreadyExists`] rather than replacing a file.
    pub async fn create(path: &Path, passphrase: &SecretString) -> VaultResult<Self> {
        if fs::try_exists(path).await? {
            return Err(VaultError::AlreadyExists(path.to_path_buf()));
        }

        let salt = generate_salt();
        let key = VaultKey::derive(passphrase.expose_secret().as_bytes(), &salt);
        let verification_nonce = generate_nonce();
        let verification_tag = key.create_verification_tag(&verification_nonce)?;

        let container = Container::new(salt, verification_nonce, verification_tag);
        storage::persist_new_container(path, &container).await?;

        tracing::info!(path = %path.display(), "Vault created");
        Ok(Self {
            path: path.to_path_buf(),
            container,
            key,
            staging: StagingArea::new(),
        })
    }

    /// Load a vault file and check the passphrase against it
    ///
    /// No entry is reachable unless the verification token authenticates.
    pub async fn open(path: &Path, passphrase: &SecretString) -> VaultResult<Self> {
        let container = storage::load_container(path).await?;

        let key = VaultKey::derive(passphrase.expose_secret().as_bytes(), &container.salt);
        if let Err(e) = key.verify(&container.verification_nonce, &container.verification_tag) {
            tracing::warn!(path = %path.display(), "Vault unlock failed");
            return Err(e);
        }

        tracing::info!(path = %path.display(), entries = container.len(), "Vault opened");
        Ok(Self {
            path: path.to_path_buf(),
            container,
            key,
            staging: StagingArea::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    /// Queue a file or directory for the next commit
    pub fn stage(&mut self, path: &Path) -> VaultResult<PathBuf> {
        let staged = self.staging.stage(path)?;
        tracing::debug!(path = %staged.display(), "Path staged");
        Ok(staged)
    }

    pub fn staged(&self) -> &[PathBuf] {
        self.staging.paths()
    }

    /// Store every staged path and rewrite the vault once
    ///
    /// Batches are best-effort: a file that cannot be read is listed in
    /// [`CommitReport::failures`] and the rest of the batch is still stored.
    /// If the rewrite itself fails, nothing changes and the staging list is
    /// kept.
    pub async fn commit(&mut self) -> VaultResult<CommitReport> {
        if self.staging.is_empty() {
            tracing::info!("Nothing staged");
            return Ok(CommitReport::nothing_staged());
        }

        let mut updated = self.container.clone();
        let mut nonces = NonceLedger::from_container(&self.container);
        let mut report = CommitReport {
            outcome: CommitOutcome::Committed,
            stored: Vec::new(),
            failures: Vec::new(),
        };

        for staged in self.staging.paths() {
            let expansion = staging::expand(staged);
            for (path, reason) in expansion.failures {
                tracing::warn!(path = %path.display(), %reason, "Skipping path");
                report.failures.push((path, reason));
            }

            for planned in expansion.files {
                let plaintext = match fs::read(&planned.disk_path).await {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!(path = %planned.disk_path.display(), error = %e, "Could not read file");
                        report.failures.push((planned.disk_path, e.to_string()));
                        continue;
                    }
                };

                let (entry, metadata) = codec::seal_entry(&self.key, nonces.fresh(), &plaintext)?;
                tracing::debug!(
                    key = %planned.key,
                    original = metadata.original_size,
                    compressed = metadata.compressed_size,
                    "Entry sealed"
                );
                updated.insert_entry(planned.key.clone(), entry, metadata);
                if !report.stored.contains(&planned.key) {
                    report.stored.push(planned.key);
                }
            }
        }

        storage::persist_container(&self.path, &updated).await?;
        self.container = updated;
        self.staging.clear();

        tracing::info!(
            stored = report.stored.len(),
            failed = report.failures.len(),
            "Vault updated"
        );
        Ok(report)
    }

    /// Write every entry matching `pattern` below `out_dir`
    ///
    /// Entries that fail integrity checks, or whose key would leave
    /// `out_dir`, are reported in [`ExtractReport::skipped`] and the rest
    /// are still written.
    pub async fn extract(&self, pattern: &str, out_dir: &Path) -> VaultResult<ExtractReport> {
        let keys = KeyPattern::parse(pattern).select(self.container.keys());
        if keys.is_empty() {
            return Err(VaultError::NoMatch(pattern.to_string()));
        }

        fs::create_dir_all(out_dir).await?;

        let mut report = ExtractReport::default();
        for key in keys {
            let Some(target) = output_path(out_dir, &key) else {
                tracing::warn!(%key, "Entry key escapes the output directory");
                report.skipped.push((key, "unsafe entry key".to_string()));
                continue;
            };
            let Some((stored, metadata)) = self.container.get(&key) else {
                continue;
            };

            let plaintext = match codec::open_entry(&self.key, &key, stored, metadata) {
                Ok(plaintext) => plaintext,
                Err(VaultError::EntryCorrupt { key, reason }) => {
                    tracing::warn!(%key, %reason, "Skipping corrupt entry");
                    report.skipped.push((key, reason));
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Err(e) = write_extracted(&target, &plaintext).await {
                tracing::warn!(%key, error = %e, "Could not write extracted entry");
                report.skipped.push((key, e.to_string()));
                continue;
            }

            tracing::debug!(%key, path = %target.display(), "Entry extracted");
            report.written.push(target);
        }

        Ok(report)
    }

    /// Remove every entry matching `pattern` and rewrite the vault once
    ///
    /// Staged paths whose file name equals `pattern` are unstaged as well.
    pub async fn delete(&mut self, pattern: &str) -> VaultResult<DeleteReport> {
        let keys = KeyPattern::parse(pattern).select(self.container.keys());

        if !keys.is_empty() {
            let mut updated = self.container.clone();
            for key in &keys {
                updated.remove_entry(key);
            }
            storage::persist_container(&self.path, &updated).await?;
            self.container = updated;
        }

        let unstaged = self.staging.unstage_named(pattern);
        if keys.is_empty() && unstaged.is_empty() {
            return Err(VaultError::NoMatch(pattern.to_string()));
        }

        tracing::info!(removed = keys.len(), unstaged = unstaged.len(), "Entries deleted");
        Ok(DeleteReport {
            removed: keys,
            unstaged,
        })
    }

    /// Entries in key order
    pub fn list(&self) -> Vec<EntrySummary> {
        self.container
            .metadata()
            .map(|(key, metadata)| EntrySummary {
                key: key.to_string(),
                original_size: metadata.original_size,
                compressed_size: metadata.compressed_size,
            })
            .collect()
    }

    pub fn status(&self) -> VaultStatus {
        self.container
            .metadata()
            .fold(VaultStatus::default(), |mut status, (_, metadata)| {
                status.entry_count += 1;
                status.total_original += metadata.original_size;
                status.total_compressed += metadata.compressed_size;
                status
            })
    }

    #[cfg(test)]
    pub(crate) fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    #[cfg(test)]
    pub(crate) fn container(&self) -> &Container {
        &self.container
    }
}

async fn write_extracted(target: &Path, data: &[u8]) -> VaultResult<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(target, data).await?;
    Ok(())
}
