//! Encode/decode orchestrators: serialise → [compress] → encrypt, and back.
//!
//! The `compress` flag is an out-of-band contract between the writer and the
//! reader of a blob; nothing inside the blob records it. Decoding with the
//! wrong flag is not reported as its own error. It shows up as whichever later
//! stage fails first, usually a [`CompressionError`] or a
//! [`SerializationError`].
//!
//! [`CompressionError`]: common::CompressionError
//! [`SerializationError`]: common::SerializationError

use std::sync::Arc;

use common::{CodecError, KeyError, SessionState};
use tracing::debug;

use crate::compress;
use crate::cookie::{self, CookieError};
use crate::crypto::{CfbCipher, Cipher};
use crate::serialize;

/// Encrypt a session state, compressing the serialised form first if asked.
///
/// # Errors
///
/// Returns the first stage failure; no partial blob is ever returned.
pub fn encode_session_state<C>(
    state: &SessionState,
    cipher: &C,
    compress: bool,
) -> Result<Vec<u8>, CodecError>
where
    C: Cipher + ?Sized,
{
    let packed = serialize::serialize(state)?;
    let packed_len = packed.len();

    let payload = if compress {
        compress::compress(&packed)?
    } else {
        packed
    };

    let blob = cipher.encrypt(&payload)?;
    debug!(
        packed_len,
        payload_len = payload.len(),
        blob_len = blob.len(),
        compress,
        "session state encoded"
    );
    Ok(blob)
}

/// Decrypt a blob and decode the session state inside it.
///
/// `compressed` must match the flag the blob was encoded with.
///
/// # Errors
///
/// - `CodecError::Cipher` if the blob is shorter than one cipher block.
/// - `CodecError::Compression` if `compressed` is set and the plaintext is
///   not a valid LZ4 frame.
/// - `CodecError::Serialization` if the (decompressed) plaintext is not a
///   valid session record.
pub fn decode_session_state<C>(
    blob: &[u8],
    cipher: &C,
    compressed: bool,
) -> Result<SessionState, CodecError>
where
    C: Cipher + ?Sized,
{
    let decrypted = cipher.decrypt(blob)?;

    let packed = if compressed {
        compress::decompress(&decrypted)?
    } else {
        decrypted
    };

    let state = serialize::deserialize(&packed)?;
    debug!(
        blob_len = blob.len(),
        packed_len = packed.len(),
        compressed,
        "session state decoded"
    );
    Ok(state)
}

/// Errors from the text-level helpers on [`SessionCodec`].
#[derive(Debug, thiserror::Error)]
pub enum TextDecodeError {
    /// The text could not be turned into blob bytes.
    #[error(transparent)]
    Text(#[from] CookieError),

    /// The blob bytes were rejected by the codec.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TextDecodeError {
    /// Short, stable name of the failing stage; `"text"` for bad base64 or a
    /// missing cookie, otherwise [`CodecError::kind`].
    pub fn kind(&self) -> &'static str {
        match self {
            TextDecodeError::Text(_) => "text",
            TextDecodeError::Codec(e) => e.kind(),
        }
    }
}

/// A cipher and a compression setting bundled for repeated use.
///
/// Cheap to clone; clones share the same key schedule.
#[derive(Clone)]
pub struct SessionCodec {
    cipher: Arc<dyn Cipher>,
    compress: bool,
}

impl SessionCodec {
    /// Build a codec backed by [`CfbCipher`].
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if `secret` is not 16, 24 or 32 bytes.
    pub fn new(secret: &[u8], compress: bool) -> Result<Self, KeyError> {
        Ok(Self::with_cipher(Arc::new(CfbCipher::new(secret)?), compress))
    }

    /// Build a codec around any [`Cipher`] implementation.
    pub fn with_cipher(cipher: Arc<dyn Cipher>, compress: bool) -> Self {
        Self { cipher, compress }
    }

    /// Whether blobs are compressed before encryption.
    pub fn compress(&self) -> bool {
        self.compress
    }

    /// Encode `state` into raw blob bytes.
    pub fn encode(&self, state: &SessionState) -> Result<Vec<u8>, CodecError> {
        encode_session_state(state, self.cipher.as_ref(), self.compress)
    }

    /// Decode raw blob bytes.
    pub fn decode(&self, blob: &[u8]) -> Result<SessionState, CodecError> {
        decode_session_state(blob, self.cipher.as_ref(), self.compress)
    }

    /// Encode `state` as URL-safe base64 text for a cookie or header.
    pub fn encode_to_text(&self, state: &SessionState) -> Result<String, CodecError> {
        self.encode(state).map(|blob| cookie::encode_text(&blob))
    }

    /// Decode URL-safe base64 text produced by [`SessionCodec::encode_to_text`].
    pub fn decode_text(&self, text: &str) -> Result<SessionState, TextDecodeError> {
        let blob = cookie::decode_text(text)?;
        Ok(self.decode(&blob)?)
    }
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("cipher", &"[REDACTED]")
            .field("compress", &self.compress)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::LZ4_MAGIC;
    use crate::crypto::MockCipher;
    use common::{CipherError, CompressionError, SerializationError};

    fn alice() -> SessionState {
        SessionState {
            user: "alice".into(),
            email: "alice@example.com".into(),
            ..Default::default()
        }
    }

    /// A cipher that passes bytes straight through, so tests can see what
    /// the earlier stages produced.
    fn passthrough() -> MockCipher {
        let mut mock = MockCipher::new();
        mock.expect_encrypt().returning(|p| Ok(p.to_vec()));
        mock.expect_decrypt().returning(|c| Ok(c.to_vec()));
        mock
    }

    #[test]
    fn encode_compresses_before_encrypting() {
        let mut mock = MockCipher::new();
        mock.expect_encrypt()
            .withf(|p: &[u8]| p.starts_with(&LZ4_MAGIC))
            .times(1)
            .returning(|p| Ok(p.to_vec()));
        let blob = encode_session_state(&alice(), &mock, true).unwrap();
        assert!(blob.starts_with(&LZ4_MAGIC));
    }

    #[test]
    fn encode_without_compression_encrypts_msgpack() {
        let mut mock = MockCipher::new();
        mock.expect_encrypt()
            .withf(|p: &[u8]| p == serialize::serialize(&alice()).unwrap().as_slice())
            .times(1)
            .returning(|p| Ok(p.to_vec()));
        encode_session_state(&alice(), &mock, false).unwrap();
    }

    #[test]
    fn encode_surfaces_cipher_failure() {
        let mut mock = MockCipher::new();
        mock.expect_encrypt()
            .returning(|_| Err(CipherError::Entropy("no entropy".into())));
        let err = encode_session_state(&alice(), &mock, true).unwrap_err();
        assert_eq!(err.kind(), "entropy");
    }

    #[test]
    fn decode_stops_at_cipher_failure() {
        let mut mock = MockCipher::new();
        mock.expect_decrypt().times(1).returning(|c| {
            Err(CipherError::ShortCiphertext {
                expected: 16,
                actual: c.len(),
            })
        });
        let err = decode_session_state(&[0u8; 3], &mock, true).unwrap_err();
        assert_eq!(
            err,
            CodecError::Cipher(CipherError::ShortCiphertext {
                expected: 16,
                actual: 3
            })
        );
    }

    #[test]
    fn round_trip_through_passthrough_cipher() {
        let mock = passthrough();
        for compress in [true, false] {
            let blob = encode_session_state(&alice(), &mock, compress).unwrap();
            assert_eq!(decode_session_state(&blob, &mock, compress).unwrap(), alice());
        }
    }

    #[test]
    fn compressed_flag_on_plain_blob_is_compression_error() {
        let mock = passthrough();
        let blob = encode_session_state(&alice(), &mock, false).unwrap();
        let err = decode_session_state(&blob, &mock, true).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Compression(CompressionError::Malformed(_))
        ));
    }

    #[test]
    fn plain_flag_on_compressed_blob_is_serialization_error() {
        let mock = passthrough();
        let blob = encode_session_state(&alice(), &mock, true).unwrap();
        let err = decode_session_state(&blob, &mock, false).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Serialization(SerializationError::Decode(_))
        ));
    }

    #[test]
    fn session_codec_text_round_trip() {
        let codec = SessionCodec::new(b"0123456789abcdef0123456789abcdef", true).unwrap();
        let text = codec.encode_to_text(&alice()).unwrap();
        assert!(!text.contains('='));
        assert!(!text.contains('+'));
        assert!(!text.contains('/'));
        assert_eq!(codec.decode_text(&text).unwrap(), alice());
    }

    #[test]
    fn text_errors_name_their_stage() {
        let codec = SessionCodec::new(b"1234567890123456", true).unwrap();
        assert_eq!(codec.decode_text("%%%").unwrap_err().kind(), "text");
        assert_eq!(codec.decode_text("AAAA").unwrap_err().kind(), "iv");
    }

    #[test]
    fn session_codec_rejects_bad_key() {
        assert_eq!(
            SessionCodec::new(b"short", true).unwrap_err(),
            KeyError::InvalidLength(5)
        );
    }

    #[test]
    fn session_codec_debug_is_redacted() {
        let codec = SessionCodec::new(b"1234567890123456", false).unwrap();
        let dbg = format!("{codec:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("1234567890123456"));
    }
}
