//! Vault Core - portable password-protected file vault
//!
//! This crate provides:
//! - PBKDF2-HMAC-SHA256 key derivation and passphrase verification
//! - Per-entry zlib compression, AES-256-GCM encryption and SHA-256 digests
//! - Stage-then-commit updates written with atomic rename
//! - Pattern-based extraction and removal of entries
//! - Best-effort secure erasure of plaintext files

pub mod models;
pub mod crypto;
pub mod codec;
pub mod storage;
pub mod staging;
pub mod pattern;
pub mod shred;
pub mod vault;
pub mod error;

pub use models::*;
pub use crypto::confirm_passphrase;
pub use pattern::{KeyPattern, WILDCARD};
pub use shred::{shred, SHRED_PASSES};
pub use storage::{default_config_path, load_config, DEFAULT_VAULT_FILE};
pub use vault::Vault;
pub use error::*;
