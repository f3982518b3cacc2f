//! Error taxonomy shared across crates.
//!
//! Each stage of the session pipeline has its own error type so callers can
//! tell which stage rejected a blob. [`CodecError`] wraps all of them for the
//! encode/decode orchestrators.
//!
//! None of these errors are retryable: every stage is a deterministic function
//! of its input, so the same input fails the same way.

use thiserror::Error;

/// The supplied key is not a length the cipher supports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Key must be 16, 24 or 32 bytes (AES-128/192/256).
    #[error("invalid key length: expected 16, 24 or 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Errors produced by the cipher layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// The key could not be used to build a cipher.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The ciphertext is too short to contain an initialisation vector.
    #[error("encrypted value should be at least {expected} bytes, but is only {actual} bytes")]
    ShortCiphertext {
        /// Minimum length (one cipher block).
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// The OS random source could not produce an initialisation vector.
    #[error("failed to create initialization vector: {0}")]
    Entropy(String),
}

/// Errors produced by the LZ4 frame adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    /// Decompression was asked to read a zero-length buffer.
    #[error("compressed frame is empty")]
    EmptyFrame,

    /// The frame is malformed, truncated, or fails its checksum.
    #[error("malformed lz4 frame: {0}")]
    Malformed(String),

    /// The frame writer failed while compressing.
    #[error("lz4 frame write failed: {0}")]
    Write(String),
}

/// Errors produced by the MessagePack schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    /// The session state could not be marshalled.
    #[error("error marshalling session state to msgpack: {0}")]
    Encode(String),

    /// The bytes are not a valid encoded session state.
    #[error("error unmarshalling data to session state: {0}")]
    Decode(String),
}

/// Top-level error returned by the encode/decode orchestrators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The cipher rejected the key or the ciphertext.
    #[error("cipher: {0}")]
    Cipher(#[from] CipherError),

    /// The compression stage failed.
    #[error("compression: {0}")]
    Compression(#[from] CompressionError),

    /// The serialisation stage failed.
    #[error("serialization: {0}")]
    Serialization(#[from] SerializationError),
}

impl From<KeyError> for CodecError {
    fn from(e: KeyError) -> Self {
        CodecError::Cipher(CipherError::Key(e))
    }
}

impl CodecError {
    /// Short, stable name of the failing stage.
    ///
    /// Used for log fields, CLI exit codes and the foreign-call error string.
    pub fn kind(&self) -> &'static str {
        match self {
            CodecError::Cipher(CipherError::Key(_)) => "key",
            CodecError::Cipher(CipherError::ShortCiphertext { .. }) => "iv",
            CodecError::Cipher(CipherError::Entropy(_)) => "entropy",
            CodecError::Compression(_) => "compression",
            CodecError::Serialization(_) => "serialization",
        }
    }
}
