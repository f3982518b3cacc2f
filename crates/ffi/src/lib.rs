//! C ABI adapter over [`codec::decode_session_state`].
//!
//! Lets a host runtime load this crate as a shared library and turn a session
//! cookie blob into a printable dump, e.g. from a test server that wants to
//! show who is logged in:
//!
//! ```text
//! lib = ctypes.cdll.LoadLibrary("libsession_ffi.so")
//! out = lib.decode_state(secret, blob_b64)
//! ...
//! lib.decode_state_free(out)
//! ```
//!
//! The adapter only translates C strings; all codec logic lives in `codec`.
//! Every string returned here must be released with [`decode_state_free`].

use std::ffi::{c_char, CStr, CString};

use codec::{cookie, decode_session_state, CfbCipher};
use common::CodecError;
use tracing::debug;

/// Decode a compressed session blob.
///
/// `secret` is the raw key (16, 24 or 32 bytes); `encoded` is the blob as
/// URL-safe base64, padded or not. Returns the session dump, or a string
/// starting with `error:` on failure. Returns null if either argument is null.
///
/// # Safety
///
/// `secret` and `encoded` must be null or point to valid NUL-terminated
/// strings that stay alive for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn decode_state(secret: *const c_char, encoded: *const c_char) -> *mut c_char {
    // SAFETY: forwarded caller contract.
    unsafe { decode_state_with(secret, encoded, true) }
}

/// Like [`decode_state`], with an explicit compression flag.
///
/// # Safety
///
/// Same contract as [`decode_state`].
#[no_mangle]
pub unsafe extern "C" fn decode_state_with(
    secret: *const c_char,
    encoded: *const c_char,
    compressed: bool,
) -> *mut c_char {
    if secret.is_null() || encoded.is_null() {
        return std::ptr::null_mut();
    }

    // SAFETY: both pointers are non-null and the caller guarantees they are
    // valid NUL-terminated strings.
    let (secret, encoded) = unsafe { (CStr::from_ptr(secret), CStr::from_ptr(encoded)) };

    let dump = match decode_to_dump(secret.to_bytes(), encoded.to_bytes(), compressed) {
        Ok(dump) => dump,
        Err(message) => {
            debug!(%message, "decode_state failed");
            format!("error: {message}")
        }
    };
    into_c_string(dump)
}

/// Release a string returned by [`decode_state`] or [`decode_state_with`].
///
/// # Safety
///
/// `ptr` must be null or a pointer returned by this library that has not
/// already been freed.
#[no_mangle]
pub unsafe extern "C" fn decode_state_free(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: the pointer came from `CString::into_raw` in this library.
    drop(unsafe { CString::from_raw(ptr) });
}

fn decode_to_dump(secret: &[u8], encoded: &[u8], compressed: bool) -> Result<String, String> {
    let cipher = CfbCipher::new(secret).map_err(|e| describe(&CodecError::from(e)))?;

    let text = std::str::from_utf8(encoded).map_err(|_| "blob: not valid UTF-8".to_owned())?;
    let blob = cookie::decode_text(text).map_err(|e| format!("blob: {e}"))?;

    decode_session_state(&blob, &cipher, compressed)
        .map(|state| state.to_string())
        .map_err(|e| describe(&e))
}

fn describe(e: &CodecError) -> String {
    format!("{}: {e}", e.kind())
}

fn into_c_string(s: String) -> *mut c_char {
    // Interior NULs cannot be represented; replace rather than fail.
    let s = if s.contains('\0') { s.replace('\0', "\u{FFFD}") } else { s };
    CString::new(s).unwrap_or_default().into_raw()
}
