//! Session payload encryption.
//!
//! This module is free of compression and serialisation concerns; it only
//! turns bytes into ciphertext and back.
//!
//! # Ciphertext format
//!
//! ```text
//! IV (BLOCK_SIZE bytes) || AES-CFB ciphertext (same length as plaintext)
//! ```
//!
//! There is no version prefix and no authentication tag.

pub mod cipher;

pub use cipher::{CfbCipher, Cipher, BLOCK_SIZE, KEY_SIZES};

#[cfg(test)]
pub use cipher::MockCipher;
