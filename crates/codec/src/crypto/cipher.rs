//! AES-CFB encryption and decryption of whole session payloads.
//!
//! **Algorithm:** AES in 128-bit cipher feedback mode (CFB-128). A fresh
//! random IV of one block is generated per call and prepended to the output:
//!
//! ```text
//! blob = IV (16 bytes) || AES-CFB_K(IV, plaintext)
//! ```
//!
//! **No integrity protection.** CFB has no authentication tag, so a corrupted
//! or forged blob of at least one block decrypts to garbage bytes without an
//! error. Tampering is only caught, if at all, by the stages after decryption.
//! This matches the cookie format this codec interoperates with.

use std::fmt;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{AsyncStreamCipher, BlockCipher, BlockEncryptMut, InnerIvInit};
use aes::{Aes128, Aes192, Aes256};
use common::{CipherError, KeyError};
use rand::rngs::OsRng;
use rand::RngCore;

/// AES block size in bytes; also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// Supported key lengths in bytes (AES-128, AES-192, AES-256).
pub const KEY_SIZES: [usize; 3] = [16, 24, 32];

/// Encrypts and decrypts raw byte payloads.
///
/// Implementations hold only immutable key material, so a single value can be
/// shared across threads and used for any number of calls.
#[cfg_attr(test, mockall::automock)]
pub trait Cipher: Send + Sync {
    /// Encrypt `plaintext`, returning a self-contained ciphertext.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Decrypt a ciphertext produced by [`Cipher::encrypt`].
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Expanded AES key schedule for one of the supported key sizes.
#[derive(Clone)]
enum KeySchedule {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

/// AES-CFB [`Cipher`] with a random IV prepended to every ciphertext.
///
/// Only the expanded key schedule is kept; it is zeroed on drop.
#[derive(Clone)]
pub struct CfbCipher {
    schedule: KeySchedule,
}

impl CfbCipher {
    /// Build a cipher from a 16, 24 or 32 byte secret.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] for any other secret length.
    pub fn new(secret: &[u8]) -> Result<Self, KeyError> {
        use aes::cipher::KeyInit;

        let invalid = |_| KeyError::InvalidLength(secret.len());
        let schedule = match secret.len() {
            16 => KeySchedule::Aes128(Aes128::new_from_slice(secret).map_err(invalid)?),
            24 => KeySchedule::Aes192(Aes192::new_from_slice(secret).map_err(invalid)?),
            32 => KeySchedule::Aes256(Aes256::new_from_slice(secret).map_err(invalid)?),
            n => return Err(KeyError::InvalidLength(n)),
        };
        Ok(Self { schedule })
    }

    /// Key length in bytes this cipher was built with.
    pub fn key_len(&self) -> usize {
        match self.schedule {
            KeySchedule::Aes128(_) => 16,
            KeySchedule::Aes192(_) => 24,
            KeySchedule::Aes256(_) => 32,
        }
    }

    fn apply(&self, iv: &[u8], buf: &mut [u8], direction: Direction) {
        match &self.schedule {
            KeySchedule::Aes128(block) => cfb_apply(block, iv, buf, direction),
            KeySchedule::Aes192(block) => cfb_apply(block, iv, buf, direction),
            KeySchedule::Aes256(block) => cfb_apply(block, iv, buf, direction),
        }
    }
}

impl fmt::Debug for CfbCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        write!(f, "CfbCipher(AES-{}, [REDACTED])", self.key_len() * 8)
    }
}

impl Cipher for CfbCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut out = vec![0u8; BLOCK_SIZE + plaintext.len()];
        let (iv, body) = out.split_at_mut(BLOCK_SIZE);

        // Fresh IV from the OS CSPRNG on every call; never derived or reused.
        OsRng
            .try_fill_bytes(iv)
            .map_err(|e| CipherError::Entropy(e.to_string()))?;

        body.copy_from_slice(plaintext);
        self.apply(iv, body, Direction::Encrypt);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.len() < BLOCK_SIZE {
            return Err(CipherError::ShortCiphertext {
                expected: BLOCK_SIZE,
                actual: ciphertext.len(),
            });
        }

        let (iv, body) = ciphertext.split_at(BLOCK_SIZE);
        let mut plaintext = body.to_vec();
        self.apply(iv, &mut plaintext, Direction::Decrypt);
        Ok(plaintext)
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// Run CFB over `buf` in place. `iv` is always exactly one block here.
fn cfb_apply<C>(block: &C, iv: &[u8], buf: &mut [u8], direction: Direction)
where
    C: BlockEncryptMut + BlockCipher + Clone,
{
    let iv = GenericArray::from_slice(iv);
    match direction {
        Direction::Encrypt => {
            cfb_mode::Encryptor::<C>::inner_iv_init(block.clone(), iv).encrypt(buf)
        }
        Direction::Decrypt => {
            cfb_mode::Decryptor::<C>::inner_iv_init(block.clone(), iv).decrypt(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(len: usize) -> CfbCipher {
        let key: Vec<u8> = (0..len as u8).collect();
        CfbCipher::new(&key).unwrap()
    }

    #[test]
    fn encrypt_decrypt_round_trip_all_key_sizes() {
        for len in KEY_SIZES {
            let c = cipher(len);
            let plaintext = b"session payload that spans more than one block";
            let encrypted = c.encrypt(plaintext).unwrap();
            assert_eq!(encrypted.len(), BLOCK_SIZE + plaintext.len());
            assert_eq!(c.decrypt(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert_eq!(
            CfbCipher::new(&[0u8; 10]).unwrap_err(),
            KeyError::InvalidLength(10)
        );
        assert!(CfbCipher::new(&[0u8; 0]).is_err());
        assert!(CfbCipher::new(&[0u8; 31]).is_err());
        assert!(CfbCipher::new(&[0u8; 16]).is_ok());
    }

    #[test]
    fn each_encryption_uses_a_fresh_iv() {
        let c = cipher(16);
        let a = c.encrypt(b"same").unwrap();
        let b = c.encrypt(b"same").unwrap();
        assert_ne!(a[..BLOCK_SIZE], b[..BLOCK_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn short_ciphertext_rejected() {
        let c = cipher(16);
        assert_eq!(
            c.decrypt(&[0u8; 10]).unwrap_err(),
            CipherError::ShortCiphertext {
                expected: BLOCK_SIZE,
                actual: 10
            }
        );
    }

    #[test]
    fn iv_only_ciphertext_decrypts_to_empty() {
        let c = cipher(16);
        assert_eq!(c.decrypt(&[0u8; BLOCK_SIZE]).unwrap(), Vec::<u8>::new());
        let encrypted = c.encrypt(b"").unwrap();
        assert_eq!(encrypted.len(), BLOCK_SIZE);
        assert!(c.decrypt(&encrypted).unwrap().is_empty());
    }

    #[test]
    fn tampered_ciphertext_decrypts_without_error() {
        // No authentication tag: corruption is not detected here.
        let c = cipher(32);
        let mut encrypted = c.encrypt(b"tamper me please").unwrap();
        encrypted[BLOCK_SIZE] ^= 0xFF;
        let decrypted = c.decrypt(&encrypted).unwrap();
        assert_ne!(decrypted, b"tamper me please");
        assert_eq!(decrypted.len(), 16);
    }

    #[test]
    fn wrong_key_yields_garbage_not_error() {
        let a = CfbCipher::new(&[1u8; 16]).unwrap();
        let b = CfbCipher::new(&[2u8; 16]).unwrap();
        let encrypted = a.encrypt(b"for a only").unwrap();
        assert_ne!(b.decrypt(&encrypted).unwrap(), b"for a only");
    }

    #[test]
    fn matches_nist_cfb128_vector() {
        // NIST SP 800-38A F.3.13, CFB128-AES128.Encrypt, first block.
        let key = [
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
            0x4f, 0x3c,
        ];
        let iv: Vec<u8> = (0u8..16).collect();
        let expected_ct = [
            0x3b, 0x3f, 0xd9, 0x2e, 0xb7, 0x2d, 0xad, 0x20, 0x33, 0x34, 0x49, 0xf8, 0xe8, 0x3c,
            0xfb, 0x4a,
        ];
        let plaintext = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
            0x17, 0x2a,
        ];

        let c = CfbCipher::new(&key).unwrap();
        let mut blob = iv;
        blob.extend_from_slice(&expected_ct);
        assert_eq!(c.decrypt(&blob).unwrap(), plaintext);
    }

    #[test]
    fn debug_is_redacted() {
        let c = CfbCipher::new(b"1234567890123456").unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(dbg.contains("AES-128"));
        assert!(!dbg.contains("1234567890123456"));
    }
}
