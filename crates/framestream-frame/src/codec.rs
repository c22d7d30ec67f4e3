use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, StreamError};
use crate::flag::Flag;
use crate::int_codec;

/// Length prefix: a signed 64-bit big-endian body length.
pub const LENGTH_PREFIX_SIZE: usize = 8;

/// The flag byte, counted as part of the body.
pub const FLAG_SIZE: usize = 1;

/// Default maximum body size (flag + payload): 16 MiB.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// One frame as it appeared on the wire, before dispatch by flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The raw flag byte. Kept raw so non-canonical end markers survive.
    pub flag_byte: u8,
    /// The payload following the flag.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(flag: Flag, payload: impl Into<Bytes>) -> Self {
        Self {
            flag_byte: flag.as_byte(),
            payload: payload.into(),
        }
    }

    pub fn flag(&self) -> Flag {
        Flag::from_byte(self.flag_byte)
    }

    /// The declared body length: payload plus the flag byte.
    pub fn body_len(&self) -> usize {
        self.payload.len() + FLAG_SIZE
    }

    /// The total wire size of this frame (prefix + flag + payload).
    pub fn wire_size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.body_len()
    }
}

/// Encode one frame into `dst`.
///
/// Wire format:
/// ```text
/// ┌───────────────────┬──────────┬──────────────────────┐
/// │ Body length (8B)  │ Flag     │ Payload              │
/// │ i64 big-endian    │ (1B)     │ (length - 1 bytes)   │
/// └───────────────────┴──────────┴──────────────────────┘
/// ```
pub fn encode_frame(flag_byte: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let prefix = encode_body_len(payload.len() + FLAG_SIZE)?;
    dst.reserve(LENGTH_PREFIX_SIZE + FLAG_SIZE + payload.len());
    dst.put_slice(&prefix);
    dst.put_u8(flag_byte);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` if `src` doesn't hold a complete frame yet. On success
/// the frame's bytes are consumed from `src`.
pub fn decode_frame(src: &mut BytesMut, max_body: usize) -> Result<Option<Frame>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let body_len = check_body_len(decode_body_len(&src[..LENGTH_PREFIX_SIZE])?, max_body)?;
    let total = LENGTH_PREFIX_SIZE + body_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let flag_byte = src.get_u8();
    let payload = src.split_to(body_len - FLAG_SIZE).freeze();

    Ok(Some(Frame { flag_byte, payload }))
}

pub(crate) fn encode_body_len(body_len: usize) -> Result<Vec<u8>> {
    Ok(int_codec::encode::<i64>(body_len as u64)?)
}

pub(crate) fn decode_body_len(prefix: &[u8]) -> Result<i64> {
    Ok(int_codec::decode::<i64>(prefix)?)
}

/// Validate a decoded body length and convert it to a buffer size.
pub(crate) fn check_body_len(body_len: i64, max_body: usize) -> Result<usize> {
    if body_len < FLAG_SIZE as i64 {
        return Err(StreamError::InvalidLength(body_len));
    }
    if body_len as u64 > max_body as u64 {
        return Err(StreamError::FrameTooLarge {
            size: body_len as u64,
            max: max_body,
        });
    }
    Ok(body_len as usize)
}

/// Configuration shared by frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size (flag + payload) in bytes. Default: 16 MiB.
    ///
    /// The wire format itself has no limit; this one guards readers against
    /// allocating whatever a peer declares. `usize::MAX` (see
    /// [`FrameConfig::unbounded`]) disables the check on both sides.
    pub max_body_size: usize,
    /// Reject flag bytes other than error/success/end instead of reading
    /// them as end-of-sequence. Default: false.
    pub strict_flags: bool,
    /// Read timeout applied to connections (see `Stream::from_connection_with_config`).
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout applied to connections.
    pub write_timeout: Option<std::time::Duration>,
}

impl FrameConfig {
    /// Defaults, but with no body size limit.
    pub fn unbounded() -> Self {
        Self {
            max_body_size: usize::MAX,
            ..Self::default()
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
            strict_flags: false,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
