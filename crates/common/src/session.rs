//! The authenticated-session record carried inside a session cookie.
//!
//! [`SessionState`] is a plain value object. The serde derives here give the
//! human-facing JSON form (full field names, RFC 3339 timestamps) used by
//! tooling; the compact cookie wire form lives in the codec crate.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Information about the currently authenticated user session.
///
/// Every field is optional. Empty strings, empty collections and `None`
/// timestamps mean "absent" and are omitted from every encoded form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id_token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,

    /// Caller-defined cryptographic nonce, arbitrary length.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nonce: Vec<u8>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Group memberships in the order the identity provider returned them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub preferred_username: String,
}

impl SessionState {
    /// Returns `true` if no field is populated.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `true` if `expires_on` is set and lies before `now`.
    ///
    /// The codec never calls this; enforcing expiry is the session layer's job.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_on.is_some_and(|exp| exp < now)
    }

    /// Time elapsed since `created_at`, if it is set.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.created_at.map(|created| now - created)
    }
}

/// One-line dump for logs and debugging tools.
///
/// Tokens are reported only as presence flags; their values are never printed.
impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session{{email:{} user:{} PreferredUsername:{}",
            self.email, self.user, self.preferred_username
        )?;
        if !self.access_token.is_empty() {
            f.write_str(" token:true")?;
        }
        if !self.id_token.is_empty() {
            f.write_str(" id_token:true")?;
        }
        if let Some(created) = self.created_at {
            write!(f, " created:{created}")?;
        }
        if let Some(expires) = self.expires_on {
            write!(f, " expires:{expires}")?;
        }
        if !self.refresh_token.is_empty() {
            f.write_str(" refresh_token:true")?;
        }
        if !self.groups.is_empty() {
            write!(f, " groups:[{}]", self.groups.join(" "))?;
        }
        f.write_str("}")
    }
}
