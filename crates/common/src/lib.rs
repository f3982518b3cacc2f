//! Session state model and error types shared across the session codec crates.

pub mod error;
pub mod session;

pub use error::{
    CipherError, CodecError, CompressionError, KeyError, SerializationError,
};
pub use session::SessionState;
