//! Configuration loading and validation for the session codec tool.
//!
//! All values are read from environment variables at startup. The secret is
//! never accepted on the command line and never compiled in.

use std::fmt;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::Deserialize;
use zeroize::{Zeroize, Zeroizing};

use crate::cookie::DEFAULT_COOKIE_NAME;
use crate::crypto::KEY_SIZES;

/// Cookie secret as supplied in the environment.
///
/// Zeroed on drop and redacted in `Debug` output.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CookieSecret(String);

impl CookieSecret {
    /// Wrap a secret string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Resolve the AES key bytes.
    ///
    /// A secret whose raw length is a valid AES key size is used as-is.
    /// Otherwise it is decoded as URL-safe base64 (padding optional), and the
    /// decoded bytes are used if their length is valid.
    ///
    /// # Errors
    ///
    /// Returns an error if neither form yields a 16, 24 or 32 byte key.
    pub fn key_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let raw = self.0.as_bytes();
        if KEY_SIZES.contains(&raw.len()) {
            return Ok(Zeroizing::new(raw.to_vec()));
        }

        let padded = pad_base64(self.0.trim());
        if let Ok(decoded) = URL_SAFE.decode(padded.as_bytes()) {
            let decoded = Zeroizing::new(decoded);
            if KEY_SIZES.contains(&decoded.len()) {
                return Ok(decoded);
            }
        }

        anyhow::bail!(
            "COOKIE_SECRET must be 16, 24 or 32 bytes, or URL-safe base64 of that length (got {} bytes)",
            raw.len()
        )
    }

    fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Drop for CookieSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for CookieSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("CookieSecret([REDACTED])")
    }
}

fn pad_base64(s: &str) -> Zeroizing<String> {
    let mut padded = Zeroizing::new(s.to_owned());
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    padded
}

/// Validated codec configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Secret used to derive the AES key. **Required.**
    pub cookie_secret: CookieSecret,

    /// Name of the session cookie in `Cookie` headers.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Whether session blobs are LZ4-compressed before encryption.
    #[serde(default = "default_session_compress")]
    pub session_compress: bool,

    /// Tracing log level (e.g. `"warn"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.into()
}
fn default_session_compress() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.cookie_secret.is_empty() {
            anyhow::bail!("COOKIE_SECRET is required and must not be empty");
        }
        self.cookie_secret.key_bytes()?;
        ensure_non_empty(&self.cookie_name, "COOKIE_NAME")?;
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
