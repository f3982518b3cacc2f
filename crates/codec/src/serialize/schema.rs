//! Tagged-field table mapping [`SessionState`] onto a compact MessagePack map.
//!
//! Each field has a short, stable tag and a presence predicate. Only present
//! fields are written, so an absent field costs zero bytes. Readers skip tags
//! they do not know, which lets newer writers add fields without breaking
//! older readers.

use std::fmt;

use chrono::{DateTime, Utc};
use common::SessionState;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::{ByteBuf, Bytes};

use super::timestamp::WireTimestamp;

/// Wire identifiers for every [`SessionState`] field.
///
/// Tags are part of the stored format: renaming one invalidates every
/// existing cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    CreatedAt,
    ExpiresOn,
    AccessToken,
    IdToken,
    RefreshToken,
    Nonce,
    Email,
    User,
    Groups,
    PreferredUsername,
}

impl FieldTag {
    /// All fields, in the order they are written.
    pub const ALL: [FieldTag; 10] = [
        FieldTag::CreatedAt,
        FieldTag::ExpiresOn,
        FieldTag::AccessToken,
        FieldTag::IdToken,
        FieldTag::RefreshToken,
        FieldTag::Nonce,
        FieldTag::Email,
        FieldTag::User,
        FieldTag::Groups,
        FieldTag::PreferredUsername,
    ];

    /// The short key written on the wire.
    pub fn tag(self) -> &'static str {
        match self {
            FieldTag::CreatedAt => "ca",
            FieldTag::ExpiresOn => "eo",
            FieldTag::AccessToken => "at",
            FieldTag::IdToken => "it",
            FieldTag::RefreshToken => "rt",
            FieldTag::Nonce => "n",
            FieldTag::Email => "e",
            FieldTag::User => "u",
            FieldTag::Groups => "g",
            FieldTag::PreferredUsername => "pu",
        }
    }

    /// Look up a wire key; `None` for tags this version does not know.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.tag() == tag)
    }

    /// Whether `state` carries a value for this field.
    pub fn is_present(self, state: &SessionState) -> bool {
        match self {
            FieldTag::CreatedAt => state.created_at.is_some(),
            FieldTag::ExpiresOn => state.expires_on.is_some(),
            FieldTag::AccessToken => !state.access_token.is_empty(),
            FieldTag::IdToken => !state.id_token.is_empty(),
            FieldTag::RefreshToken => !state.refresh_token.is_empty(),
            FieldTag::Nonce => !state.nonce.is_empty(),
            FieldTag::Email => !state.email.is_empty(),
            FieldTag::User => !state.user.is_empty(),
            FieldTag::Groups => !state.groups.is_empty(),
            FieldTag::PreferredUsername => !state.preferred_username.is_empty(),
        }
    }
}

/// Borrowing serializer for the wire form of a [`SessionState`].
pub struct WireSession<'a>(pub &'a SessionState);

impl Serialize for WireSession<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let state = self.0;
        let present: Vec<FieldTag> = FieldTag::ALL
            .into_iter()
            .filter(|f| f.is_present(state))
            .collect();

        let mut map = serializer.serialize_map(Some(present.len()))?;
        for field in present {
            let key = field.tag();
            match field {
                FieldTag::CreatedAt => serialize_time(&mut map, key, state.created_at)?,
                FieldTag::ExpiresOn => serialize_time(&mut map, key, state.expires_on)?,
                FieldTag::AccessToken => map.serialize_entry(key, &state.access_token)?,
                FieldTag::IdToken => map.serialize_entry(key, &state.id_token)?,
                FieldTag::RefreshToken => map.serialize_entry(key, &state.refresh_token)?,
                FieldTag::Nonce => map.serialize_entry(key, Bytes::new(&state.nonce))?,
                FieldTag::Email => map.serialize_entry(key, &state.email)?,
                FieldTag::User => map.serialize_entry(key, &state.user)?,
                FieldTag::Groups => map.serialize_entry(key, &state.groups)?,
                FieldTag::PreferredUsername => {
                    map.serialize_entry(key, &state.preferred_username)?
                }
            }
        }
        map.end()
    }
}

fn serialize_time<M: SerializeMap>(
    map: &mut M,
    key: &str,
    value: Option<DateTime<Utc>>,
) -> Result<(), M::Error> {
    match value {
        Some(ts) => map.serialize_entry(key, &WireTimestamp(ts)),
        None => Ok(()),
    }
}

/// Owned deserializer for the wire form of a [`SessionState`].
pub struct WireSessionOwned(pub SessionState);

impl<'de> Deserialize<'de> for WireSessionOwned {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_map(SessionVisitor)
            .map(WireSessionOwned)
    }
}

struct SessionVisitor;

impl<'de> Visitor<'de> for SessionVisitor {
    type Value = SessionState;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a session state map keyed by short field tags")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SessionState, A::Error> {
        let mut state = SessionState::default();

        while let Some(LossyString(key)) = map.next_key::<LossyString>()? {
            let Some(field) = FieldTag::from_tag(&key) else {
                map.next_value::<IgnoredAny>()?;
                continue;
            };

            // nil is accepted as "absent" for every field.
            match field {
                FieldTag::CreatedAt => {
                    state.created_at = map.next_value::<Option<WireTimestamp>>()?.map(|t| t.0)
                }
                FieldTag::ExpiresOn => {
                    state.expires_on = map.next_value::<Option<WireTimestamp>>()?.map(|t| t.0)
                }
                FieldTag::AccessToken => state.access_token = next_string(&mut map)?,
                FieldTag::IdToken => state.id_token = next_string(&mut map)?,
                FieldTag::RefreshToken => state.refresh_token = next_string(&mut map)?,
                FieldTag::Nonce => {
                    state.nonce = map
                        .next_value::<Option<ByteBuf>>()?
                        .map(ByteBuf::into_vec)
                        .unwrap_or_default()
                }
                FieldTag::Email => state.email = next_string(&mut map)?,
                FieldTag::User => state.user = next_string(&mut map)?,
                FieldTag::Groups => {
                    state.groups = map
                        .next_value::<Option<Vec<LossyString>>>()?
                        .map(|groups| groups.into_iter().map(|g| g.0).collect())
                        .unwrap_or_default()
                }
                FieldTag::PreferredUsername => state.preferred_username = next_string(&mut map)?,
            }
        }

        Ok(state)
    }
}

fn next_string<'de, A: MapAccess<'de>>(map: &mut A) -> Result<String, A::Error> {
    Ok(map
        .next_value::<Option<LossyString>>()?
        .map(|s| s.0)
        .unwrap_or_default())
}

/// String read from either `str` or `bin`.
///
/// Writers in other languages may put arbitrary bytes in a `str`. Invalid
/// UTF-8 sequences become U+FFFD instead of failing the whole record.
struct LossyString(String);

impl<'de> Deserialize<'de> for LossyString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_string(LossyStringVisitor)
    }
}

struct LossyStringVisitor;

impl<'de> Visitor<'de> for LossyStringVisitor {
    type Value = LossyString;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<LossyString, E> {
        Ok(LossyString(v.to_owned()))
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<LossyString, E> {
        Ok(LossyString(v))
    }

    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<LossyString, E> {
        Ok(LossyString(String::from_utf8_lossy(v).into_owned()))
    }

    fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<LossyString, E> {
        Ok(LossyString(
            String::from_utf8(v)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()),
        ))
    }
}
