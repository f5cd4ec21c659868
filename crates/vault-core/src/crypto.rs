//! Cryptographic operations for vault security
//!
//! - PBKDF2-HMAC-SHA256 (480,000 iterations) for passphrase-based key derivation
//! - AES-256-GCM for entry and verification-token encryption
//! - SHA-256 content digests
//! - Secure memory handling with zeroization

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{VaultError, VaultResult};

/// Size of AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of the PBKDF2 salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of a SHA-256 digest in bytes
pub const DIGEST_SIZE: usize = 32;

/// PBKDF2 iteration count. Not configurable: the vault file does not record it.
pub const KDF_ITERATIONS: u32 = 480_000;

/// Known plaintext sealed into the verification token at creation time.
pub const VERIFICATION_PLAINTEXT: &[u8] = b"verify";

/// Symmetric key derived from the vault passphrase
pub struct VaultKey {
    key: Secret<[u8; KEY_SIZE]>,
}

impl VaultKey {
    /// Derive the vault key from a passphrase and the stored salt
    pub fn derive(passphrase: &[u8], salt: &[u8; SALT_SIZE]) -> Self {
        let mut output = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(passphrase, salt, KDF_ITERATIONS, &mut output);

        let key = output;
        // Zeroize intermediate buffer
        output.zeroize();

        Self {
            key: Secret::new(key),
        }
    }

    fn cipher(&self) -> VaultResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.expose_secret())
            .map_err(|e| VaultError::Encryption(e.to_string()))
    }

    /// Encrypt data with AES-256-GCM under a caller-chosen nonce
    ///
    /// The caller is responsible for nonce freshness; see
    /// [`NonceLedger`](crate::codec::NonceLedger).
    pub fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> VaultResult<Vec<u8>> {
        self.cipher()?
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|e| VaultError::Encryption(e.to_string()))
    }

    /// Decrypt data with AES-256-GCM
    ///
    /// Returns `None` on any authentication failure so callers can map it to
    /// the error that fits their context.
    pub fn open(&self, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Option<Vec<u8>> {
        let cipher = self.cipher().ok()?;
        cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
    }

    /// Produce a verification tag for a freshly created vault
    pub fn create_verification_tag(&self, nonce: &[u8; NONCE_SIZE]) -> VaultResult<Vec<u8>> {
        self.seal(nonce, VERIFICATION_PLAINTEXT)
    }

    /// Check the stored verification token against this key
    ///
    /// Wrong key and corrupted token both yield [`VaultError::Authentication`].
    pub fn verify(&self, nonce: &[u8; NONCE_SIZE], tag: &[u8]) -> VaultResult<()> {
        match self.open(nonce, tag) {
            Some(mut plaintext) => {
                let ok = constant_time_compare(&plaintext, VERIFICATION_PLAINTEXT);
                plaintext.zeroize();
                if ok {
                    Ok(())
                } else {
                    Err(VaultError::Authentication)
                }
            }
            None => Err(VaultError::Authentication),
        }
    }
}

/// Check that a new passphrase was typed the same way twice
pub fn confirm_passphrase(first: &SecretString, second: &SecretString) -> VaultResult<()> {
    if constant_time_compare(
        first.expose_secret().as_bytes(),
        second.expose_secret().as_bytes(),
    ) {
        Ok(())
    } else {
        Err(VaultError::PassphraseMismatch)
    }
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Generate a cryptographically secure random nonce
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Compute SHA-256 digest of data
pub fn compute_digest(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Verify SHA-256 digest
pub fn verify_digest(data: &[u8], expected: &[u8; DIGEST_SIZE]) -> bool {
    let computed = compute_digest(data);
    constant_time_compare(&computed, expected)
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
