//! LZ4 frame compression of serialised session payloads.
//!
//! LZ4 trades compression ratio for very fast decompression, which suits a
//! payload that is written once per login and read on every request.
//!
//! Frames are written with 64 KiB independent blocks and a content checksum,
//! the same frame settings the session layer uses for its own cookies.

use std::io::{Read, Write};

use common::CompressionError;
use lz4_flex::frame::{BlockMode, BlockSize, FrameDecoder, FrameEncoder, FrameInfo};

/// Magic number that opens every LZ4 frame (little-endian `0x184D2204`).
pub const LZ4_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

/// Maximum uncompressed size of a single LZ4 block.
pub const MAX_BLOCK_SIZE: usize = 64 * 1024;

fn frame_info() -> FrameInfo {
    FrameInfo::new()
        .block_size(BlockSize::Max64KB)
        .block_mode(BlockMode::Independent)
        .content_checksum(true)
}

/// Compress `payload` into a single self-terminating LZ4 frame.
///
/// A zero-length payload produces a valid frame with no data blocks.
///
/// # Errors
///
/// Returns [`CompressionError::Write`] if the frame writer fails; writing to
/// an in-memory buffer makes this effectively unreachable.
pub fn compress(payload: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut encoder = FrameEncoder::with_frame_info(frame_info(), Vec::new());
    encoder
        .write_all(payload)
        .map_err(|e| CompressionError::Write(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CompressionError::Write(e.to_string()))
}

/// Decompress one LZ4 frame produced by [`compress`].
///
/// The frame must be complete: every block, the end mark and (when the header
/// announces one) the content checksum must be present, with nothing after.
///
/// # Errors
///
/// - [`CompressionError::EmptyFrame`] if `frame` is zero-length.
/// - [`CompressionError::Malformed`] on a bad magic number, a truncated
///   header or block, a missing end mark, trailing bytes, or a checksum
///   mismatch. No partial output is ever returned.
pub fn decompress(frame: &[u8]) -> Result<Vec<u8>, CompressionError> {
    if frame.is_empty() {
        return Err(CompressionError::EmptyFrame);
    }

    let frame_len = terminated_len(frame)?;
    if frame_len != frame.len() {
        return Err(malformed(format!(
            "{} trailing bytes after end of frame",
            frame.len() - frame_len
        )));
    }

    let mut payload = Vec::with_capacity(frame.len() * 2);
    FrameDecoder::new(frame)
        .read_to_end(&mut payload)
        .map_err(|e| CompressionError::Malformed(e.to_string()))?;
    Ok(payload)
}

// FLG byte layout (LZ4 frame format 1.6).
const FLG_VERSION_MASK: u8 = 0b1100_0000;
const FLG_VERSION_01: u8 = 0b0100_0000;
const FLG_BLOCK_CHECKSUM: u8 = 0b0001_0000;
const FLG_CONTENT_SIZE: u8 = 0b0000_1000;
const FLG_CONTENT_CHECKSUM: u8 = 0b0000_0100;
const FLG_DICT_ID: u8 = 0b0000_0001;

const END_MARK: u32 = 0;
const UNCOMPRESSED_BLOCK_BIT: u32 = 0x8000_0000;

/// Walk the frame's header and block headers and return the offset just past
/// its last byte (end mark plus optional content checksum).
///
/// `FrameDecoder` treats end of input at a block boundary as a clean end of
/// stream, so truncation has to be caught here.
fn terminated_len(frame: &[u8]) -> Result<usize, CompressionError> {
    let magic = take(frame, 0, 4, "magic number")?;
    if magic != LZ4_MAGIC {
        return Err(malformed("wrong magic number"));
    }

    let flg = take(frame, 4, 1, "frame descriptor")?[0];
    if flg & FLG_VERSION_MASK != FLG_VERSION_01 {
        return Err(malformed(format!("unsupported frame version in FLG {flg:#04x}")));
    }

    // Past FLG and BD: optional content size, optional dictionary id, then HC.
    let mut pos = 6;
    if flg & FLG_CONTENT_SIZE != 0 {
        pos += 8;
    }
    if flg & FLG_DICT_ID != 0 {
        pos += 4;
    }
    take(frame, pos, 1, "header checksum")?;
    pos += 1;

    let block_checksum_len = if flg & FLG_BLOCK_CHECKSUM != 0 { 4 } else { 0 };
    loop {
        let header = take(frame, pos, 4, "block header")?;
        let word = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        pos += 4;
        if word == END_MARK {
            break;
        }
        let data_len = (word & !UNCOMPRESSED_BLOCK_BIT) as usize;
        take(frame, pos, data_len + block_checksum_len, "block")?;
        pos += data_len + block_checksum_len;
    }

    if flg & FLG_CONTENT_CHECKSUM != 0 {
        take(frame, pos, 4, "content checksum")?;
        pos += 4;
    }
    Ok(pos)
}

fn take<'a>(
    frame: &'a [u8],
    at: usize,
    len: usize,
    what: &str,
) -> Result<&'a [u8], CompressionError> {
    at.checked_add(len)
        .and_then(|end| frame.get(at..end))
        .ok_or_else(|| malformed(format!("frame truncated in {what}")))
}

fn malformed(msg: impl Into<String>) -> CompressionError {
    CompressionError::Malformed(msg.into())
}
