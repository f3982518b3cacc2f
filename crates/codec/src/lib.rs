//! Session-state codec: turns a [`SessionState`] into an opaque, encrypted
//! blob for a cookie or external session store, and back.
//!
//! # Pipeline
//!
//! ```text
//! encode: SessionState → MessagePack → [LZ4 frame] → AES-CFB (IV prepended)
//! decode: blob → AES-CFB → [LZ4 frame] → MessagePack → SessionState
//! ```
//!
//! The optional compression stage is controlled by a flag the caller supplies
//! identically on both sides; it is not recorded in the blob.
//!
//! # Security notes
//!
//! AES-CFB provides confidentiality only. There is no MAC, so this crate
//! cannot tell a tampered blob from a corrupted one or from one encrypted
//! under a different key. Callers must treat every decode failure as an
//! untrustworthy session. Integrity, if needed, belongs to the cookie layer
//! around the blob.
//!
//! [`SessionState`]: common::SessionState

pub mod compress;
pub mod config;
pub mod cookie;
pub mod crypto;
pub mod pipeline;
pub mod serialize;
pub mod telemetry;

pub use crypto::{CfbCipher, Cipher};
pub use pipeline::{decode_session_state, encode_session_state, SessionCodec, TextDecodeError};
