//! Command-line interface for encoding and inspecting session blobs.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{CodecError, KeyError, SessionState};
use tracing::warn;

use codec::cookie::{self, CookieError};
use codec::{SessionCodec, TextDecodeError};

#[derive(Parser)]
#[command(name = "session-codec")]
#[command(about = "Encode and decode encrypted session cookie blobs")]
#[command(version)]
#[command(after_long_help = r#"
ENVIRONMENT:
    COOKIE_SECRET      16/24/32-byte secret, or URL-safe base64 of one (required)
    COOKIE_NAME        session cookie name (default: _oauth2_proxy)
    SESSION_COMPRESS   whether blobs are LZ4-compressed (default: true)
    LOG_LEVEL          log level for stderr output (default: warn)

EXAMPLES:
    # Decode a blob copied from a cookie
    session-codec decode 'KgfjpsgBTLRK...'

    # Decode straight from a Cookie header
    session-codec decode --cookie "$(cat cookie-header.txt)"

    # Encode a JSON session state
    session-codec encode --input session.json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override SESSION_COMPRESS for this invocation
    #[arg(long, global = true)]
    pub compress: Option<bool>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a base64 session blob and print the session state
    Decode {
        /// Blob text (or Cookie header with --cookie); read from stdin if omitted
        input: Option<String>,

        /// Treat the input as a full Cookie header and extract the session cookie
        #[arg(long)]
        cookie: bool,

        /// Print the full session state as JSON, tokens included
        #[arg(long)]
        json: bool,
    },
    /// Encode a JSON session state into a base64 session blob
    Encode {
        /// JSON file to read; read from stdin if omitted
        #[arg(long, short)]
        input: Option<PathBuf>,
    },
}

/// Exit status for failures that carry no codec stage.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status for a failed stage, as named by `kind()` on the codec errors.
///
/// `2` is left to clap for usage errors.
pub fn exit_code_for_kind(kind: &str) -> u8 {
    match kind {
        "text" => 3,
        "key" => 4,
        "iv" => 5,
        "entropy" => 6,
        "compression" => 7,
        "serialization" => 8,
        _ => EXIT_FAILURE,
    }
}

/// Stage name of a command failure, if it came from the codec.
pub fn error_kind(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(e) = err.downcast_ref::<TextDecodeError>() {
        Some(e.kind())
    } else if let Some(e) = err.downcast_ref::<CodecError>() {
        Some(e.kind())
    } else if err.downcast_ref::<CookieError>().is_some() {
        Some("text")
    } else if err.downcast_ref::<KeyError>().is_some() {
        Some("key")
    } else {
        None
    }
}

/// Exit status for a command failure.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    error_kind(err).map_or(EXIT_FAILURE, exit_code_for_kind)
}

/// Decode a blob and print it to `out`. Reads `stdin` when `input` is `None`.
pub fn decode<R: Read, W: Write>(
    codec: &SessionCodec,
    cookie_name: &str,
    input: Option<String>,
    from_cookie: bool,
    json: bool,
    stdin: R,
    mut out: W,
) -> Result<()> {
    let text = match input {
        Some(text) => text,
        None => read_all(stdin)?,
    };

    let blob_text = if from_cookie {
        cookie::extract_cookie_value(&text, cookie_name).map_err(|e| {
            warn!(kind = "text", error = %e, "session cookie not found");
            e
        })?
    } else {
        text.as_str()
    };

    let state = codec.decode_text(blob_text).map_err(|e| {
        warn!(kind = e.kind(), error = %e, "session blob rejected");
        e
    })?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&state)?)?;
    } else {
        writeln!(out, "{state}")?;
    }
    Ok(())
}

/// Read a JSON session state (from `input`, or `stdin` when `None`) and print
/// its blob to `out`.
pub fn encode<R: Read, W: Write>(
    codec: &SessionCodec,
    input: Option<&Path>,
    stdin: R,
    mut out: W,
) -> Result<()> {
    let raw = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => read_all(stdin)?,
    };

    let state: SessionState =
        serde_json::from_str(&raw).context("input is not a valid JSON session state")?;
    let text = codec.encode_to_text(&state).map_err(|e| {
        warn!(kind = e.kind(), error = %e, "session state rejected");
        e
    })?;
    writeln!(out, "{text}")?;
    Ok(())
}

fn read_all<R: Read>(mut reader: R) -> Result<String> {
    let mut buf = String::new();
    reader
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}
