use bytes::Bytes;

use crate::errinfo::{ErrInfo, ErrInfoError};
use crate::int_codec::IntCodecError;
use crate::structured::StructuredError;

/// Errors surfaced by frame reads and writes.
///
/// Four outcomes are kept apart on purpose: the channel closed
/// ([`Closed`](Self::Closed) / [`Truncated`](Self::Truncated)), a frame was
/// malformed, the peer sent an application error ([`Remote`](Self::Remote)),
/// or the peer ended the message sequence ([`EndOfSequence`](Self::EndOfSequence)).
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The channel reached end-of-file on a frame boundary.
    #[error("connection closed")]
    Closed,

    /// The channel reached end-of-file in the middle of a frame.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    Truncated { expected: usize, received: usize },

    /// Any other I/O failure on the channel.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The length prefix could not be encoded or decoded.
    #[error("length prefix: {0}")]
    IntCodec(#[from] IntCodecError),

    /// The declared body length is below the one-byte minimum (the flag).
    #[error("invalid frame length {0}")]
    InvalidLength(i64),

    /// The frame body exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: u64, max: usize },

    /// A non-canonical flag byte was read while strict flags are enabled.
    #[error("unknown frame flag {0:#04x}")]
    UnknownFlag(u8),

    /// The peer sent an error frame whose body is not a valid `ErrInfo`.
    /// The undecoded body is kept for diagnostics.
    #[error("peer reported an error but it could not be decoded: {source}")]
    MalformedErrorFrame {
        payload: Bytes,
        #[source]
        source: ErrInfoError,
    },

    /// The peer reported an application error.
    #[error("peer error {}: {}", .0.code(), .0.message())]
    Remote(ErrInfo),

    /// The peer ended the message sequence. Carries the trailing bytes of the
    /// end frame, possibly empty.
    #[error("end of message sequence")]
    EndOfSequence(Bytes),

    /// A JSON payload could not be encoded or decoded.
    #[error("json payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A structured-binary payload could not be encoded or decoded.
    #[error("structured payload: {0}")]
    Structured(#[from] StructuredError),

    /// An outgoing `ErrInfo` could not be serialized.
    #[error("error frame: {0}")]
    ErrInfo(#[from] ErrInfoError),
}

impl StreamError {
    /// True for both end-of-file variants (clean close and mid-frame close).
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::Truncated { .. })
    }

    pub fn is_end_of_sequence(&self) -> bool {
        matches!(self, Self::EndOfSequence(_))
    }

    /// The application error sent by the peer, if this is one.
    pub fn remote(&self) -> Option<&ErrInfo> {
        match self {
            Self::Remote(info) => Some(info),
            _ => None,
        }
    }

    /// Trailing bytes of an end frame, if this is end-of-sequence.
    pub fn into_trailing(self) -> Option<Bytes> {
        match self {
            Self::EndOfSequence(trailing) => Some(trailing),
            _ => None,
        }
    }

    /// True for failures that describe a broken frame rather than a broken
    /// channel or a peer-reported condition.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::IntCodec(_)
                | Self::InvalidLength(_)
                | Self::FrameTooLarge { .. }
                | Self::UnknownFlag(_)
                | Self::MalformedErrorFrame { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
