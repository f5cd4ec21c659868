//! Data models for the vault container, its entries and configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::crypto::{DIGEST_SIZE, NONCE_SIZE, SALT_SIZE};

/// Vault file format
///
/// Everything a vault holds: the key-derivation salt, the verification
/// token and the two entry tables. `entries` and `metadata` always share the
/// same key set; only [`Container::insert_entry`] and
/// [`Container::remove_entry`] mutate them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Container {
    /// Schema version, checked on load
    pub format_version: u32,

    /// PBKDF2 salt, fixed for the life of the vault
    pub salt: [u8; SALT_SIZE],

    /// Nonce used for the verification token
    pub verification_nonce: [u8; NONCE_SIZE],

    /// AES-GCM output over the known verification plaintext
    pub verification_tag: Vec<u8>,

    entries: BTreeMap<String, StoredEntry>,

    metadata: BTreeMap<String, EntryMetadata>,
}

impl Container {
    pub const CURRENT_VERSION: u32 = 1;

    /// Create an empty container
    pub fn new(
        salt: [u8; SALT_SIZE],
        verification_nonce: [u8; NONCE_SIZE],
        verification_tag: Vec<u8>,
    ) -> Self {
        Self {
            format_version: Self::CURRENT_VERSION,
            salt,
            verification_nonce,
            verification_tag,
            entries: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Insert or overwrite an entry in both tables
    pub fn insert_entry(&mut self, key: String, entry: StoredEntry, metadata: EntryMetadata) {
        self.metadata.insert(key.clone(), metadata);
        self.entries.insert(key, entry);
    }

    /// Remove an entry from both tables
    pub fn remove_entry(&mut self, key: &str) -> Option<(StoredEntry, EntryMetadata)> {
        let entry = self.entries.remove(key)?;
        let metadata = self.metadata.remove(key)?;
        Some((entry, metadata))
    }

    /// Look up an entry and its metadata
    pub fn get(&self, key: &str) -> Option<(&StoredEntry, &EntryMetadata)> {
        Some((self.entries.get(key)?, self.metadata.get(key)?))
    }

    /// All entry keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entry metadata in key order
    pub fn metadata(&self) -> impl Iterator<Item = (&str, &EntryMetadata)> {
        self.metadata.iter().map(|(k, m)| (k.as_str(), m))
    }

    /// Every nonce currently in use under this vault's key
    pub fn nonces(&self) -> impl Iterator<Item = &[u8; NONCE_SIZE]> {
        std::iter::once(&self.verification_nonce).chain(self.entries.values().map(|e| &e.nonce))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether both tables carry exactly the same keys
    pub fn tables_consistent(&self) -> bool {
        self.entries.len() == self.metadata.len()
            && self.entries.keys().zip(self.metadata.keys()).all(|(a, b)| a == b)
    }

    #[cfg(test)]
    pub(crate) fn entry_mut(&mut self, key: &str) -> Option<&mut StoredEntry> {
        self.entries.get_mut(key)
    }
}

/// One encrypted entry as stored in the vault
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredEntry {
    /// AES-GCM nonce (12 bytes), unique per entry
    pub nonce: [u8; NONCE_SIZE],

    /// Encrypted compressed content
    pub ciphertext: Vec<u8>,
}

/// Plaintext facts recorded about an entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryMetadata {
    /// Size of the original file in bytes
    pub original_size: u64,

    /// Size after compression, before encryption
    pub compressed_size: u64,

    /// SHA-256 of the original uncompressed content
    pub digest: [u8; DIGEST_SIZE],
}

/// One line of a vault listing
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySummary {
    pub key: String,
    pub original_size: u64,
    pub compressed_size: u64,
}

/// Aggregate numbers for the `status` command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VaultStatus {
    pub entry_count: usize,
    pub total_original: u64,
    pub total_compressed: u64,
}

impl VaultStatus {
    /// Compressed size over original size (1.0 for an empty vault)
    pub fn compression_ratio(&self) -> f64 {
        if self.total_original == 0 {
            return 1.0;
        }
        self.total_compressed as f64 / self.total_original as f64
    }
}

/// What a commit did
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The staging list was empty; nothing was written
    NothingStaged,
    /// The vault file was rewritten
    Committed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub outcome: CommitOutcome,
    /// Keys stored or overwritten
    pub stored: Vec<String>,
    /// Files whose contribution was dropped, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

impl CommitReport {
    pub fn nothing_staged() -> Self {
        Self {
            outcome: CommitOutcome::NothingStaged,
            stored: Vec::new(),
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractReport {
    /// Files written to disk
    pub written: Vec<PathBuf>,
    /// Entries that failed integrity checks, with the reason
    pub skipped: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteReport {
    pub removed: Vec<String>,
    pub unstaged: Vec<PathBuf>,
}

/// Vault configuration (non-sensitive, stored in plaintext)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VaultConfig {
    /// Shortest passphrase accepted when creating a vault
    pub min_passphrase_length: usize,

    /// Ask before `rm` and `shred`
    pub confirm_destructive: bool,

    /// Tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            min_passphrase_length: 8,
            confirm_destructive: true,
            log_filter: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(size: u64) -> EntryMetadata {
        EntryMetadata {
            original_size: size,
            compressed_size: size / 2,
            digest: [0u8; DIGEST_SIZE],
        }
    }

    fn stored(n: u8) -> StoredEntry {
        StoredEntry {
            nonce: [n; NONCE_SIZE],
            ciphertext: vec![n; 4],
        }
    }

    #[test]
    fn test_tables_stay_in_step() {
        let mut container = Container::new([0; SALT_SIZE], [9; NONCE_SIZE], vec![]);
        container.insert_entry("a".into(), stored(1), meta(10));
        container.insert_entry("b/c".into(), stored(2), meta(20));
        container.insert_entry("a".into(), stored(3), meta(30));

        assert_eq!(container.len(), 2);
        assert!(container.tables_consistent());
        assert_eq!(container.get("a").unwrap().1.original_size, 30);

        assert!(container.remove_entry("a").is_some());
        assert!(container.remove_entry("a").is_none());
        assert!(container.tables_consistent());
        assert_eq!(container.keys().collect::<Vec<_>>(), vec!["b/c"]);
    }

    #[test]
    fn test_nonces_include_verification_nonce() {
        let mut container = Container::new([0; SALT_SIZE], [9; NONCE_SIZE], vec![]);
        container.insert_entry("x".into(), stored(1), meta(1));

        let nonces: Vec<_> = container.nonces().copied().collect();
        assert_eq!(nonces, vec![[9; NONCE_SIZE], [1; NONCE_SIZE]]);
    }

    #[test]
    fn test_compression_ratio() {
        assert_eq!(VaultStatus::default().compression_ratio(), 1.0);

        let status = VaultStatus {
            entry_count: 2,
            total_original: 200,
            total_compressed: 50,
        };
        assert!((status.compression_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: VaultConfig = toml::from_str("confirm_destructive = false").unwrap();
        assert!(!config.confirm_destructive);
        assert_eq!(config.min_passphrase_length, 8);
        assert_eq!(config.log_filter, "warn");
    }
}
