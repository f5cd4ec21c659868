//! Per-entry transform between plaintext and stored form
//!
//! Store: compress, digest the original bytes, encrypt the compressed bytes
//! under a fresh nonce. Retrieve runs the same steps backwards and checks the
//! digest. Compression runs before encryption since ciphertext does not
//! compress.

use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use std::collections::HashSet;
use std::io::Read;

use crate::crypto::{compute_digest, generate_nonce, verify_digest, VaultKey, NONCE_SIZE};
use crate::error::{VaultError, VaultResult};
use crate::models::{Container, EntryMetadata, StoredEntry};

/// Fixed zlib level used for every entry
pub const COMPRESSION_LEVEL: u32 = 6;

/// Upper bound on the buffer reserved up front when decompressing
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Tracks every nonce used under one key so none is handed out twice
pub struct NonceLedger {
    used: HashSet<[u8; NONCE_SIZE]>,
}

impl NonceLedger {
    /// Seed the ledger with the nonces already stored in a container
    pub fn from_container(container: &Container) -> Self {
        Self {
            used: container.nonces().copied().collect(),
        }
    }

    /// Draw a random nonce that has not been used before
    pub fn fresh(&mut self) -> [u8; NONCE_SIZE] {
        loop {
            let nonce = generate_nonce();
            if self.used.insert(nonce) {
                return nonce;
            }
            tracing::warn!("Random nonce collided with a stored one, drawing again");
        }
    }
}

/// Compress data with zlib at [`COMPRESSION_LEVEL`]
pub fn compress(data: &[u8]) -> VaultResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(data, Compression::new(COMPRESSION_LEVEL));
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| VaultError::Compression(format!("zlib compression failed: {e}")))?;
    Ok(compressed)
}

/// Decompress zlib data that must expand to exactly `expected_len` bytes
pub fn decompress(data: &[u8], expected_len: u64) -> VaultResult<Vec<u8>> {
    let mut decompressed = Vec::with_capacity(expected_len.min(MAX_PREALLOC) as usize);
    ZlibDecoder::new(data)
        .take(expected_len.saturating_add(1))
        .read_to_end(&mut decompressed)
        .map_err(|e| VaultError::Compression(format!("zlib decompression failed: {e}")))?;

    if decompressed.len() as u64 != expected_len {
        return Err(VaultError::Compression(format!(
            "decompressed size does not match recorded size of {expected_len} bytes"
        )));
    }
    Ok(decompressed)
}

/// Turn plaintext into its stored form
pub fn seal_entry(
    key: &VaultKey,
    nonce: [u8; NONCE_SIZE],
    plaintext: &[u8],
) -> VaultResult<(StoredEntry, EntryMetadata)> {
    let compressed = compress(plaintext)?;
    let digest = compute_digest(plaintext);
    let ciphertext = key.seal(&nonce, &compressed)?;

    let metadata = EntryMetadata {
        original_size: plaintext.len() as u64,
        compressed_size: compressed.len() as u64,
        digest,
    };
    Ok((StoredEntry { nonce, ciphertext }, metadata))
}

/// Recover the plaintext of an entry
///
/// Every failure is reported as [`VaultError::EntryCorrupt`] for `entry_key`.
pub fn open_entry(
    key: &VaultKey,
    entry_key: &str,
    stored: &StoredEntry,
    metadata: &EntryMetadata,
) -> VaultResult<Vec<u8>> {
    let compressed = key
        .open(&stored.nonce, &stored.ciphertext)
        .ok_or_else(|| VaultError::entry_corrupt(entry_key, "authentication failed"))?;

    let plaintext = decompress(&compressed, metadata.original_size)
        .map_err(|e| VaultError::entry_corrupt(entry_key, e.to_string()))?;

    if !verify_digest(&plaintext, &metadata.digest) {
        return Err(VaultError::entry_corrupt(entry_key, "content digest mismatch"));
    }
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_salt, SALT_SIZE};
    use std::sync::OnceLock;

    fn test_key() -> &'static VaultKey {
        static KEY: OnceLock<VaultKey> = OnceLock::new();
        KEY.get_or_init(|| VaultKey::derive(b"codec-tests", &[7u8; SALT_SIZE]))
    }

    #[test]
    fn test_entry_roundtrip() {
        let plaintext = b"hello hello hello hello hello hello".repeat(20);
        let (stored, metadata) = seal_entry(test_key(), generate_nonce(), &plaintext).unwrap();

        assert_eq!(metadata.original_size, plaintext.len() as u64);
        assert!(metadata.compressed_size < metadata.original_size);
        assert_eq!(metadata.digest, compute_digest(&plaintext));

        let opened = open_entry(test_key(), "k", &stored, &metadata).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_empty_entry() {
        let (stored, metadata) = seal_entry(test_key(), generate_nonce(), b"").unwrap();
        assert_eq!(metadata.original_size, 0);
        assert!(open_entry(test_key(), "empty", &stored, &metadata).unwrap().is_empty());
    }

    #[test]
    fn test_bit_flip_is_detected() {
        let (stored, metadata) = seal_entry(test_key(), generate_nonce(), b"secret notes").unwrap();

        for bit in [0usize, 7, stored.ciphertext.len() * 8 - 1] {
            let mut tampered = stored.clone();
            tampered.ciphertext[bit / 8] ^= 1 << (bit % 8);
            let err = open_entry(test_key(), "notes", &tampered, &metadata).unwrap_err();
            assert!(matches!(err, VaultError::EntryCorrupt { ref key, .. } if key == "notes"));
        }
    }

    #[test]
    fn test_wrong_key_is_detected() {
        let (stored, metadata) = seal_entry(test_key(), generate_nonce(), b"data").unwrap();
        let other = VaultKey::derive(b"someone else", &generate_salt());

        assert!(matches!(
            open_entry(&other, "k", &stored, &metadata),
            Err(VaultError::EntryCorrupt { .. })
        ));
    }

    #[test]
    fn test_digest_mismatch_is_detected() {
        let (stored, mut metadata) = seal_entry(test_key(), generate_nonce(), b"data").unwrap();
        metadata.digest[0] ^= 0xff;

        let err = open_entry(test_key(), "k", &stored, &metadata).unwrap_err();
        assert!(err.to_string().contains("digest mismatch"));
    }

    #[test]
    fn test_recorded_size_is_enforced() {
        let (stored, mut metadata) = seal_entry(test_key(), generate_nonce(), b"twelve bytes").unwrap();

        metadata.original_size = 5;
        assert!(open_entry(test_key(), "k", &stored, &metadata).is_err());

        metadata.original_size = 50;
        assert!(open_entry(test_key(), "k", &stored, &metadata).is_err());
    }

    #[test]
    fn test_nonce_ledger_never_repeats() {
        let container = Container::new([0; SALT_SIZE], [3; NONCE_SIZE], vec![]);
        let mut ledger = NonceLedger::from_container(&container);

        let drawn: HashSet<_> = (0..1000).map(|_| ledger.fresh()).collect();
        assert_eq!(drawn.len(), 1000);
        assert!(!drawn.contains(&[3; NONCE_SIZE]));
    }
}
