//! MessagePack serialisation of [`SessionState`].
//!
//! The wire form is a MessagePack map keyed by the short tags in
//! [`schema::FieldTag`]. Absent fields are omitted, unknown tags are skipped,
//! and timestamps use the MessagePack timestamp extension.

pub mod schema;
pub mod timestamp;

use common::{SerializationError, SessionState};

pub use schema::FieldTag;

use schema::{WireSession, WireSessionOwned};

/// Encode `state` to its compact MessagePack form.
///
/// # Errors
///
/// Returns [`SerializationError::Encode`] if the encoder fails.
pub fn serialize(state: &SessionState) -> Result<Vec<u8>, SerializationError> {
    rmp_serde::to_vec(&WireSession(state)).map_err(|e| SerializationError::Encode(e.to_string()))
}

/// Decode a [`SessionState`] from its MessagePack form.
///
/// # Errors
///
/// Returns [`SerializationError::Decode`] on truncated input, a value whose
/// type does not match its field, or input that is not a map at all.
pub fn deserialize(bytes: &[u8]) -> Result<SessionState, SerializationError> {
    rmp_serde::from_slice::<WireSessionOwned>(bytes)
        .map(|wire| wire.0)
        .map_err(|e| SerializationError::Decode(e.to_string()))
}
