use std::sync::Arc;

use chrono::{TimeZone, Utc};
use codec::{compress, decode_session_state, encode_session_state, serialize, CfbCipher, Cipher};
use common::{CipherError, CodecError, CompressionError, KeyError, SerializationError, SessionState};

const KEY_128: &[u8] = b"0123456789abcdef";
const KEY_192: &[u8] = b"0123456789abcdef01234567";
const KEY_256: &[u8] = b"0123456789abcdef0123456789abcdef";

fn full_state() -> SessionState {
    SessionState {
        created_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        expires_on: Some(Utc.timestamp_opt(1_709_298_000, 123_456_789).unwrap()),
        access_token: "ya29.access".into(),
        id_token: "eyJhbGciOi.id.token".into(),
        refresh_token: "1//refresh".into(),
        nonce: vec![0, 1, 2, 0xFE, 0xFF],
        email: "dana@example.com".into(),
        user: "dana".into(),
        groups: vec!["zeta".into(), "alpha".into(), "mid".into()],
        preferred_username: "Dana".into(),
    }
}

fn variants() -> Vec<SessionState> {
    let full = full_state();
    vec![
        SessionState::default(),
        SessionState {
            email: full.email.clone(),
            ..Default::default()
        },
        SessionState {
            created_at: full.created_at,
            nonce: full.nonce.clone(),
            ..Default::default()
        },
        SessionState {
            groups: full.groups.clone(),
            refresh_token: full.refresh_token.clone(),
            ..Default::default()
        },
        full,
    ]
}

#[test]
fn round_trips_every_variant_with_and_without_compression() {
    for key in [KEY_128, KEY_192, KEY_256] {
        let cipher = CfbCipher::new(key).unwrap();
        for compress in [false, true] {
            for state in variants() {
                let blob = encode_session_state(&state, &cipher, compress).unwrap();
                let back = decode_session_state(&blob, &cipher, compress).unwrap();
                assert_eq!(back, state, "key {} bytes, compress {compress}", key.len());
            }
        }
    }
}

#[test]
fn groups_keep_their_order() {
    let cipher = CfbCipher::new(KEY_128).unwrap();
    let state = full_state();
    let blob = encode_session_state(&state, &cipher, true).unwrap();
    let back = decode_session_state(&blob, &cipher, true).unwrap();
    assert_eq!(back.groups, ["zeta", "alpha", "mid"]);
}

#[test]
fn absent_fields_do_not_grow_the_record() {
    let small = SessionState {
        email: "e@x".into(),
        ..Default::default()
    };
    let large = SessionState {
        email: "e@x".into(),
        user: "u".into(),
        ..Default::default()
    };
    let small_len = serialize::serialize(&small).unwrap().len();
    let large_len = serialize::serialize(&large).unwrap().len();
    assert!(small_len < large_len);
    // fixmap(1) + fixstr "e" + fixstr "e@x"
    assert_eq!(small_len, 1 + 2 + 4);
}

#[test]
fn fresh_iv_per_encryption() {
    let cipher = CfbCipher::new(KEY_256).unwrap();
    let state = full_state();
    let a = encode_session_state(&state, &cipher, false).unwrap();
    let b = encode_session_state(&state, &cipher, false).unwrap();
    assert_eq!(a.len(), b.len());
    assert_ne!(a[..16], b[..16]);
}

#[test]
fn ten_byte_blob_is_rejected_before_decryption() {
    let cipher = CfbCipher::new(KEY_128).unwrap();
    let err = decode_session_state(&[0u8; 10], &cipher, true).unwrap_err();
    assert_eq!(
        err,
        CodecError::Cipher(CipherError::ShortCiphertext {
            expected: 16,
            actual: 10
        })
    );
    assert_eq!(err.kind(), "iv");
}

#[test]
fn iv_only_blob_decrypts_to_nothing() {
    let cipher = CfbCipher::new(KEY_128).unwrap();
    assert!(cipher.decrypt(&[7u8; 16]).unwrap().is_empty());

    let err = decode_session_state(&[7u8; 16], &cipher, true).unwrap_err();
    assert_eq!(err, CodecError::Compression(CompressionError::EmptyFrame));
}

#[test]
fn bad_key_length_is_a_key_error() {
    assert_eq!(
        CfbCipher::new(b"0123456789").unwrap_err(),
        KeyError::InvalidLength(10)
    );
}

#[test]
fn compression_round_trips_edge_sizes() {
    let big: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 251) as u8).collect();
    for payload in [vec![0x42u8], big] {
        let frame = compress::compress(&payload).unwrap();
        assert_eq!(compress::decompress(&frame).unwrap(), payload);
    }
    assert_eq!(
        compress::decompress(&[]).unwrap_err(),
        CompressionError::EmptyFrame
    );
}

#[test]
fn large_session_survives_compression() {
    let cipher = CfbCipher::new(KEY_192).unwrap();
    let state = SessionState {
        access_token: "A".repeat(100_000),
        ..full_state()
    };
    let blob = encode_session_state(&state, &cipher, true).unwrap();
    assert!(blob.len() < 100_000);
    assert_eq!(decode_session_state(&blob, &cipher, true).unwrap(), state);
}

#[test]
fn compression_flag_mismatch_fails_observably() {
    let cipher = CfbCipher::new(KEY_128).unwrap();
    let state = full_state();

    let plain = encode_session_state(&state, &cipher, false).unwrap();
    assert!(matches!(
        decode_session_state(&plain, &cipher, true).unwrap_err(),
        CodecError::Compression(CompressionError::Malformed(_))
    ));

    let packed = encode_session_state(&state, &cipher, true).unwrap();
    assert!(matches!(
        decode_session_state(&packed, &cipher, false).unwrap_err(),
        CodecError::Serialization(SerializationError::Decode(_))
    ));
}

#[test]
fn wrong_key_never_yields_the_encoded_state() {
    let state = full_state();
    let blob = encode_session_state(&state, &CfbCipher::new(KEY_128).unwrap(), true).unwrap();
    let other = CfbCipher::new(b"fedcba9876543210").unwrap();
    match decode_session_state(&blob, &other, true) {
        Ok(decoded) => assert_ne!(decoded, state),
        Err(e) => assert!(matches!(
            e,
            CodecError::Compression(_) | CodecError::Serialization(_)
        )),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_cipher_is_safe_across_tasks() {
    let cipher = Arc::new(CfbCipher::new(KEY_256).unwrap());

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let cipher = Arc::clone(&cipher);
            tokio::spawn(async move {
                let state = SessionState {
                    user: format!("user-{i}"),
                    groups: vec![format!("g{i}")],
                    ..full_state()
                };
                let compress = i % 2 == 0;
                let blob = encode_session_state(&state, cipher.as_ref(), compress).unwrap();
                let back = decode_session_state(&blob, cipher.as_ref(), compress).unwrap();
                assert_eq!(back, state);
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }
}
